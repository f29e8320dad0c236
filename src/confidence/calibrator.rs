//! Confidence Pipeline stage 6: calibrator (spec.md §4.7). Fits and
//! applies four monotone calibration models over labeled
//! `(confidence, isActualPhi, filterType?)` samples. No teacher file
//! implements this; the numerical style (fixed-iteration gradient
//! descent, clamped parameters) follows `fuzzy.rs`'s confidence-math
//! conventions, and `ndarray` (already a teacher dependency, used there
//! for detection-score vectors) backs the per-model parameter/point
//! arithmetic.

use std::collections::HashMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::span::FilterType;

const MIN_FIT_POINTS: usize = 20;
const MIN_PER_TYPE_POINTS: usize = 30;
const PLATT_ITERS: usize = 100;
const PLATT_LR: f64 = 0.01;
const ECE_BINS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationMethod {
    Platt,
    Isotonic,
    Beta,
    Temperature,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlattParams {
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotonicModel {
    pub thresholds: Vec<f64>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BetaParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratorExport {
    pub platt_params: Option<PlattParams>,
    pub isotonic_model: Option<IsotonicModel>,
    pub beta_params: Option<BetaParams>,
    pub temperature: Option<f64>,
    pub preferred_method: CalibrationMethod,
    pub is_fitted: bool,
}

pub struct LabeledSample {
    pub confidence: f64,
    pub is_actual_phi: bool,
    pub filter_type: Option<FilterType>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    let clamped = p.clamp(1e-6, 1.0 - 1e-6);
    (clamped / (1.0 - clamped)).ln()
}

/// Fits Platt scaling by batch gradient descent, fixed iteration count and
/// learning rate per spec.md §4.7, parameters initialized to 0.
fn fit_platt(scores: &Array1<f64>, labels: &Array1<f64>) -> PlattParams {
    let n = scores.len() as f64;
    let mut a = 0.0_f64;
    let mut b = 0.0_f64;

    for _ in 0..PLATT_ITERS {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for i in 0..scores.len() {
            let pred = sigmoid(a * scores[i] + b);
            let err = pred - labels[i];
            grad_a += err * scores[i];
            grad_b += err;
        }
        a -= PLATT_LR * grad_a / n;
        b -= PLATT_LR * grad_b / n;
    }
    PlattParams { a, b }
}

fn apply_platt(params: &PlattParams, score: f64) -> f64 {
    sigmoid(params.a * score + params.b)
}

/// Pool-Adjacent-Violators isotonic regression (spec.md §4.7): sort by
/// score, repeatedly merge adjacent runs that violate monotonicity using
/// weighted means; thresholds are the mid-position score of each run.
fn fit_isotonic(scores: &[f64], labels: &[f64]) -> IsotonicModel {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap());

    struct Block {
        sum: f64,
        weight: f64,
        score_sum: f64,
    }

    let mut blocks: Vec<Block> = Vec::new();
    for &idx in &order {
        blocks.push(Block { sum: labels[idx], weight: 1.0, score_sum: scores[idx] });
        while blocks.len() >= 2 {
            let last = blocks.len() - 1;
            let mean_last = blocks[last].sum / blocks[last].weight;
            let mean_prev = blocks[last - 1].sum / blocks[last - 1].weight;
            if mean_prev <= mean_last {
                break;
            }
            let merged = Block {
                sum: blocks[last].sum + blocks[last - 1].sum,
                weight: blocks[last].weight + blocks[last - 1].weight,
                score_sum: blocks[last].score_sum + blocks[last - 1].score_sum,
            };
            blocks.truncate(last - 1);
            blocks.push(merged);
        }
    }

    let thresholds: Vec<f64> = blocks.iter().map(|b| b.score_sum / b.weight).collect();
    let values: Vec<f64> = blocks.iter().map(|b| b.sum / b.weight).collect();
    IsotonicModel { thresholds, values }
}

fn apply_isotonic(model: &IsotonicModel, score: f64) -> f64 {
    if model.thresholds.is_empty() {
        return score;
    }
    if score <= model.thresholds[0] {
        return model.values[0];
    }
    let last = model.thresholds.len() - 1;
    if score >= model.thresholds[last] {
        return model.values[last];
    }
    for i in 0..model.thresholds.len() - 1 {
        let (t0, t1) = (model.thresholds[i], model.thresholds[i + 1]);
        if score >= t0 && score <= t1 {
            let (v0, v1) = (model.values[i], model.values[i + 1]);
            if (t1 - t0).abs() < f64::EPSILON {
                return v0;
            }
            let frac = (score - t0) / (t1 - t0);
            return v0 + frac * (v1 - v0);
        }
    }
    model.values[last]
}

/// Beta calibration `a*s^b + c`, least-squares gradient descent with
/// clamped parameters (spec.md §4.7).
fn fit_beta(scores: &[f64], labels: &[f64]) -> BetaParams {
    let mut a = 1.0_f64;
    let mut b = 1.0_f64;
    let mut c = 0.0_f64;
    let n = scores.len() as f64;
    let lr = 0.01;

    for _ in 0..PLATT_ITERS {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        let mut grad_c = 0.0;
        for i in 0..scores.len() {
            let s = scores[i].max(1e-6);
            let pred = a * s.powf(b) + c;
            let err = pred - labels[i];
            grad_a += err * s.powf(b);
            grad_b += err * a * s.powf(b) * s.ln();
            grad_c += err;
        }
        a -= lr * grad_a / n;
        b -= lr * grad_b / n;
        c -= lr * grad_c / n;
        a = a.clamp(0.1, 10.0);
        b = b.clamp(0.1, 10.0);
        c = c.clamp(-0.5, 0.5);
    }
    BetaParams { a, b, c }
}

fn apply_beta(params: &BetaParams, score: f64) -> f64 {
    (params.a * score.max(1e-6).powf(params.b) + params.c).clamp(0.0, 1.0)
}

fn cross_entropy(scores: &[f64], labels: &[f64], temperature: f64) -> f64 {
    let mut loss = 0.0;
    for i in 0..scores.len() {
        let p = sigmoid(logit(scores[i]) / temperature).clamp(1e-6, 1.0 - 1e-6);
        loss -= labels[i] * p.ln() + (1.0 - labels[i]) * (1.0 - p).ln();
    }
    loss / scores.len() as f64
}

/// Temperature scaling by grid search over `0.1..5.0` step `0.1` (spec.md
/// §4.7).
fn fit_temperature(scores: &[f64], labels: &[f64]) -> f64 {
    let mut best_t = 1.0;
    let mut best_loss = f64::MAX;
    let mut t = 0.1;
    while t <= 5.0 + 1e-9 {
        let loss = cross_entropy(scores, labels, t);
        if loss < best_loss {
            best_loss = loss;
            best_t = t;
        }
        t += 0.1;
    }
    best_t
}

fn apply_temperature(temperature: f64, score: f64) -> f64 {
    sigmoid(logit(score) / temperature)
}

/// One fitted model (Platt/Isotonic/Beta/Temperature) plus whichever
/// sub-calibrator is preferred, with per-`filterType` overrides.
#[derive(Default)]
pub struct Calibrator {
    global: Option<CalibratorExport>,
    per_type: HashMap<FilterType, CalibratorExport>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits all four models on `samples` and keeps the preferred method
    /// (the method is chosen by lowest cross-entropy on the fit set).
    /// Requires `MIN_FIT_POINTS`; otherwise leaves the calibrator
    /// unfitted and `calibrate` passes scores through unchanged.
    pub fn fit(&mut self, samples: &[LabeledSample]) {
        if samples.len() < MIN_FIT_POINTS {
            return;
        }
        self.global = Some(Self::fit_export(samples));

        let mut by_type: HashMap<FilterType, Vec<&LabeledSample>> = HashMap::new();
        for sample in samples {
            if let Some(ft) = &sample.filter_type {
                by_type.entry(ft.clone()).or_default().push(sample);
            }
        }
        for (ft, group) in by_type {
            if group.len() < MIN_PER_TYPE_POINTS {
                continue;
            }
            let owned: Vec<LabeledSample> = group
                .into_iter()
                .map(|s| LabeledSample { confidence: s.confidence, is_actual_phi: s.is_actual_phi, filter_type: s.filter_type.clone() })
                .collect();
            self.per_type.insert(ft, Self::fit_export(&owned));
        }
    }

    fn fit_export(samples: &[LabeledSample]) -> CalibratorExport {
        let scores: Vec<f64> = samples.iter().map(|s| s.confidence).collect();
        let labels: Vec<f64> = samples.iter().map(|s| if s.is_actual_phi { 1.0 } else { 0.0 }).collect();
        let score_arr = Array1::from(scores.clone());
        let label_arr = Array1::from(labels.clone());

        let platt = fit_platt(&score_arr, &label_arr);
        let isotonic = fit_isotonic(&scores, &labels);
        let beta = fit_beta(&scores, &labels);
        let temperature = fit_temperature(&scores, &labels);

        let candidates: Vec<(CalibrationMethod, f64)> = vec![
            (CalibrationMethod::Platt, Self::method_loss(&scores, &labels, |s| apply_platt(&platt, s))),
            (CalibrationMethod::Isotonic, Self::method_loss(&scores, &labels, |s| apply_isotonic(&isotonic, s))),
            (CalibrationMethod::Beta, Self::method_loss(&scores, &labels, |s| apply_beta(&beta, s))),
            (CalibrationMethod::Temperature, Self::method_loss(&scores, &labels, |s| apply_temperature(temperature, s))),
        ];
        let preferred = candidates
            .into_iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(m, _)| m)
            .unwrap_or(CalibrationMethod::Platt);

        CalibratorExport {
            platt_params: Some(platt),
            isotonic_model: Some(isotonic),
            beta_params: Some(beta),
            temperature: Some(temperature),
            preferred_method: preferred,
            is_fitted: true,
        }
    }

    fn method_loss(scores: &[f64], labels: &[f64], f: impl Fn(f64) -> f64) -> f64 {
        let mut loss = 0.0;
        for i in 0..scores.len() {
            let p = f(scores[i]).clamp(1e-6, 1.0 - 1e-6);
            loss -= labels[i] * p.ln() + (1.0 - labels[i]) * (1.0 - p).ln();
        }
        loss / scores.len() as f64
    }

    /// Applies the per-type calibrator if present, else the global one,
    /// else passes the score through unchanged (spec.md §4.7: "fitting
    /// requires ≥20 points; otherwise calibrate is an identity").
    pub fn calibrate(&self, score: f64, filter_type: &FilterType) -> f64 {
        let export = self.per_type.get(filter_type).or(self.global.as_ref());
        let Some(export) = export else { return score };
        if !export.is_fitted {
            return score;
        }
        match export.preferred_method {
            CalibrationMethod::Platt => apply_platt(export.platt_params.as_ref().unwrap(), score),
            CalibrationMethod::Isotonic => apply_isotonic(export.isotonic_model.as_ref().unwrap(), score),
            CalibrationMethod::Beta => apply_beta(export.beta_params.as_ref().unwrap(), score),
            CalibrationMethod::Temperature => apply_temperature(export.temperature.unwrap(), score),
        }
    }

    pub fn export(&self) -> Option<CalibratorExport> {
        self.global.clone()
    }

    pub fn import(&mut self, export: CalibratorExport) {
        self.global = Some(export);
    }

    /// Expected/Maximum Calibration Error, Brier score, log-loss over
    /// `samples` using the fitted global calibrator (spec.md §4.7).
    pub fn report(&self, samples: &[LabeledSample]) -> CalibrationReport {
        let mut bins = vec![(0.0_f64, 0.0_f64, 0usize); ECE_BINS];
        let mut brier_sum = 0.0;
        let mut log_loss_sum = 0.0;

        for sample in samples {
            let ft = sample.filter_type.clone().unwrap_or(FilterType::Other("GLOBAL".to_string()));
            let calibrated = self.calibrate(sample.confidence, &ft);
            let label = if sample.is_actual_phi { 1.0 } else { 0.0 };

            let bin_idx = ((calibrated * ECE_BINS as f64) as usize).min(ECE_BINS - 1);
            let (conf_sum, acc_sum, count) = &mut bins[bin_idx];
            *conf_sum += calibrated;
            *acc_sum += label;
            *count += 1;

            brier_sum += (calibrated - label).powi(2);
            let clamped = calibrated.clamp(1e-6, 1.0 - 1e-6);
            log_loss_sum -= label * clamped.ln() + (1.0 - label) * (1.0 - clamped).ln();
        }

        let total = samples.len().max(1) as f64;
        let mut ece = 0.0;
        let mut mce = 0.0;
        for (conf_sum, acc_sum, count) in &bins {
            if *count == 0 {
                continue;
            }
            let avg_conf = conf_sum / *count as f64;
            let avg_acc = acc_sum / *count as f64;
            let gap = (avg_conf - avg_acc).abs();
            ece += gap * (*count as f64 / total);
            mce = mce.max(gap);
        }

        CalibrationReport {
            ece,
            mce,
            brier_score: brier_sum / total,
            log_loss: log_loss_sum / total,
        }
    }
}

pub struct CalibrationReport {
    pub ece: f64,
    pub mce: f64,
    pub brier_score: f64,
    pub log_loss: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(conf: f64, phi: bool) -> LabeledSample {
        LabeledSample { confidence: conf, is_actual_phi: phi, filter_type: None }
    }

    #[test]
    fn unfitted_calibrator_is_identity() {
        let calibrator = Calibrator::new();
        assert_eq!(calibrator.calibrate(0.73, &FilterType::Name), 0.73);
    }

    #[test]
    fn fitting_below_min_points_stays_unfitted() {
        let mut calibrator = Calibrator::new();
        let samples: Vec<_> = (0..5).map(|i| sample(i as f64 / 5.0, i % 2 == 0)).collect();
        calibrator.fit(&samples);
        assert_eq!(calibrator.calibrate(0.5, &FilterType::Name), 0.5);
    }

    #[test]
    fn isotonic_output_is_monotone_non_decreasing() {
        let scores = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        let labels = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0];
        let model = fit_isotonic(&scores, &labels);
        let mut prev = f64::MIN;
        for s in &scores {
            let out = apply_isotonic(&model, *s);
            assert!(out >= prev - 1e-9);
            prev = out;
        }
    }

    #[test]
    fn calibrated_outputs_stay_in_unit_interval() {
        let mut calibrator = Calibrator::new();
        let samples: Vec<_> = (0..40)
            .map(|i| sample(i as f64 / 40.0, i % 3 == 0))
            .collect();
        calibrator.fit(&samples);
        for i in 0..=10 {
            let out = calibrator.calibrate(i as f64 / 10.0, &FilterType::Name);
            assert!((0.0..=1.0).contains(&out));
        }
    }

    #[test]
    fn per_type_calibrator_is_preferred_when_enough_samples() {
        let mut calibrator = Calibrator::new();
        let mut samples: Vec<_> = (0..40).map(|i| sample(i as f64 / 40.0, i % 2 == 0)).collect();
        for s in samples.iter_mut() {
            s.filter_type = Some(FilterType::Ssn);
        }
        calibrator.fit(&samples);
        assert!(calibrator.per_type.contains_key(&FilterType::Ssn));
    }
}
