//! Summary statistics stored alongside every student record.
//!
//! These are the human-facing numbers shown in listings. The classifier's own
//! feature engineering lives in `ml-engine` and deliberately uses different
//! formulas; the two must not be unified.

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

/// Derived metrics for one set of test scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Mean of the valid scores, 2 decimals
    pub average: Option<f64>,
    /// Percentage change from test 1 to test 3; ±infinity when test 1 is zero
    #[serde(default, with = "crate::types::signed_infinity")]
    pub improvement_rate: Option<f64>,
    /// Population standard deviation around the rounded average
    pub std_dev: Option<f64>,
}

/// Round to 2 decimals from the exact binary value, ties to even.
fn round2(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

fn valid(score: Option<f64>) -> Option<f64> {
    score.filter(|s| !s.is_nan())
}

/// Compute the stored metrics for up to three test scores.
///
/// Never fails: missing or NaN scores simply reduce what can be derived.
/// The standard deviation uses the already rounded average as its baseline.
pub fn compute_metrics(
    score1: Option<f64>,
    score2: Option<f64>,
    score3: Option<f64>,
) -> DerivedMetrics {
    let scores: Vec<f64> = [score1, score2, score3]
        .into_iter()
        .filter_map(valid)
        .collect();

    let average = if scores.is_empty() {
        None
    } else {
        Some(round2(scores.iter().sum::<f64>() / scores.len() as f64))
    };

    let std_dev = match average {
        Some(avg) if scores.len() >= 2 => {
            let variance =
                scores.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / scores.len() as f64;
            Some(round2(variance.sqrt()))
        }
        _ => None,
    };

    let improvement_rate = match (valid(score1), valid(score3)) {
        (Some(first), Some(third)) if first != 0.0 => {
            Some(round2((third - first) / first.abs() * 100.0))
        }
        (Some(_), Some(third)) => Some(if third > 0.0 {
            f64::INFINITY
        } else if third < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }),
        _ => None,
    };

    DerivedMetrics {
        average,
        improvement_rate,
        std_dev,
    }
}
