//! Pairwise statistics.
//!
//! Every function here takes already-coerced values. Pairs where either
//! coordinate is missing are dropped, and results that need at least two
//! points (or non-zero variance) come back as `None` instead of NaN.

use serde::Serialize;

/// Minimum number of valid pairs for a correlation or a fit.
pub const MIN_PAIRS: usize = 2;

/// Slope and intercept of a least-squares line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Zip two coerced series, keeping only positions where both are present.
pub fn valid_pairs(xs: &[Option<f64>], ys: &[Option<f64>]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect()
}

struct Moments {
    sxx: f64,
    syy: f64,
    sxy: f64,
    mean_x: f64,
    mean_y: f64,
}

fn moments(pairs: &[(f64, f64)]) -> Moments {
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    Moments {
        sxx,
        syy,
        sxy,
        mean_x,
        mean_y,
    }
}

/// Pearson correlation coefficient.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < MIN_PAIRS {
        return None;
    }
    let m = moments(pairs);
    let denom = (m.sxx * m.syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let r = m.sxy / denom;
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Degree-one least-squares fit of y on x.
pub fn linear_fit(pairs: &[(f64, f64)]) -> Option<LinearFit> {
    if pairs.len() < MIN_PAIRS {
        return None;
    }
    let m = moments(pairs);
    if m.sxx == 0.0 {
        return None;
    }
    let slope = m.sxy / m.sxx;
    let intercept = m.mean_y - slope * m.mean_x;
    (slope.is_finite() && intercept.is_finite()).then_some(LinearFit { slope, intercept })
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `count` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Smallest and largest value, ignoring non-finite entries.
pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
