// 📐 Statistics - missing-aware descriptive stats and Pearson correlation
// Every function takes Option<f64> columns and skips None.

use serde::{Deserialize, Serialize};

/// Arithmetic mean over present values; None when nothing is present
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Pearson correlation over pairwise-complete observations.
///
/// Only rows where both x and y are present take part. Returns None with
/// fewer than two such rows or when either side has zero variance.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Linear-interpolated quantile of an already sorted slice
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// count / mean / std / min / quartiles / max of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    pub fn summary(&self) -> String {
        let fmt = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".to_string());
        format!(
            "{}: count={} mean={} std={} min={} 25%={} 50%={} 75%={} max={}",
            self.column,
            self.count,
            fmt(self.mean),
            fmt(self.std),
            fmt(self.min),
            fmt(self.q25),
            fmt(self.median),
            fmt(self.q75),
            fmt(self.max),
        )
    }
}

/// Describe a column, skipping missing values
pub fn describe(column: &str, values: &[Option<f64>]) -> ColumnSummary {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(|a, b| a.total_cmp(b));

    let count = present.len();
    let mean = mean(values);

    let std = match (mean, count) {
        (Some(m), n) if n >= 2 => {
            let ss: f64 = present.iter().map(|v| (v - m).powi(2)).sum();
            Some((ss / (n - 1) as f64).sqrt())
        }
        _ => None,
    };

    let q = |p: f64| (count > 0).then(|| quantile_sorted(&present, p));

    ColumnSummary {
        column: column.to_string(),
        count,
        mean,
        std,
        min: present.first().copied(),
        q25: q(0.25),
        median: q(0.5),
        q75: q(0.75),
        max: present.last().copied(),
    }
}
