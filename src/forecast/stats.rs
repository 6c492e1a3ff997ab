//! Descriptive statistics over the numeric price columns.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::market::PriceHistory;

/// `column name -> summary`, serialized as nested JSON objects.
pub type Statistics = BTreeMap<String, ColumnStats>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: f64,
    pub mean: Option<f64>,
    /// Sample standard deviation; undefined below two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub p25: Option<f64>,
    #[serde(rename = "50%")]
    pub p50: Option<f64>,
    #[serde(rename = "75%")]
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Linear interpolation between the closest ranks of a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

impl ColumnStats {
    pub fn from_values(values: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = values
            .iter()
            .filter_map(|v| v.filter(|x| x.is_finite()))
            .collect();
        present.sort_by(f64::total_cmp);

        let n = present.len();
        let mean = (n > 0).then(|| present.iter().sum::<f64>() / n as f64);
        let std = match (mean, n) {
            (Some(m), n) if n > 1 => {
                let ss: f64 = present.iter().map(|v| (v - m).powi(2)).sum();
                Some((ss / (n - 1) as f64).sqrt())
            }
            _ => None,
        };

        Self {
            count: n as f64,
            mean: mean.map(round2),
            std: std.map(round2),
            min: present.first().copied().map(round2),
            p25: percentile(&present, 0.25).map(round2),
            p50: percentile(&present, 0.50).map(round2),
            p75: percentile(&present, 0.75).map(round2),
            max: present.last().copied().map(round2),
        }
    }
}

pub fn describe(history: &PriceHistory) -> Statistics {
    history
        .columns()
        .into_iter()
        .map(|(name, values)| (name.to_string(), ColumnStats::from_values(&values)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_describe_semantics() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].into_iter().map(Some).collect();
        let s = ColumnStats::from_values(&values);

        assert_eq!(s.count, 4.0);
        assert_eq!(s.mean, Some(2.5));
        assert_eq!(s.std, Some(1.29));
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.p25, Some(1.75));
        assert_eq!(s.p50, Some(2.5));
        assert_eq!(s.p75, Some(3.25));
        assert_eq!(s.max, Some(4.0));
    }

    #[test]
    fn missing_values_are_skipped() {
        let s = ColumnStats::from_values(&[Some(2.0), None, Some(4.0)]);
        assert_eq!(s.count, 2.0);
        assert_eq!(s.mean, Some(3.0));
    }

    #[test]
    fn single_value_has_no_std() {
        let s = ColumnStats::from_values(&[Some(7.123)]);
        assert_eq!(s.std, None);
        assert_eq!(s.p75, Some(7.12));

        let empty = ColumnStats::from_values(&[]);
        assert_eq!(empty.count, 0.0);
        assert_eq!(empty.mean, None);
    }

    #[test]
    fn serializes_percentile_keys() {
        let v = serde_json::to_value(ColumnStats::from_values(&[Some(1.0), Some(3.0)])).unwrap();
        assert_eq!(v["50%"], 2.0);
        assert_eq!(v["count"], 2.0);
    }
}
