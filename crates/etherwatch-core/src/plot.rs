// ── Time-series normalization ──
//
// Maps history samples onto a `width × height` plot area with the y axis
// pointing down (screen coordinates): larger values sit closer to `y = 0`.

use strum::Display;

use crate::model::HistorySample;

/// Which throughput series to plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Field {
    #[strum(serialize = "rx")]
    Rx,
    #[strum(serialize = "tx")]
    Tx,
}

impl Field {
    pub fn value(self, sample: &HistorySample) -> f64 {
        match self {
            Self::Rx => sample.rx_bps,
            Self::Tx => sample.tx_bps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub x: f64,
    pub y: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Convert `samples` to plot coordinates.
///
/// - no samples: no points
/// - one sample: a flat line across the full width at mid height
/// - non-finite values anywhere: no points
/// - a flat series is scaled as if its minimum were zero
///
/// Coordinates are rounded to one decimal place.
#[allow(clippy::cast_precision_loss, clippy::as_conversions, clippy::float_cmp)]
pub fn to_plot_points(
    samples: &[HistorySample],
    field: Field,
    width: f64,
    height: f64,
) -> Vec<PlotPoint> {
    match samples {
        [] => return Vec::new(),
        [_] => {
            let mid = round1(height / 2.0);
            return vec![
                PlotPoint { x: 0.0, y: mid },
                PlotPoint {
                    x: round1(width),
                    y: mid,
                },
            ];
        }
        _ => {}
    }

    let values: Vec<f64> = samples.iter().map(|s| field.value(s)).collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Vec::new();
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min = 0.0;
    }
    let range = max - min;
    let scale = if range == 0.0 { 1.0 } else { range };

    let last = (values.len() - 1) as f64;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| PlotPoint {
            x: round1(i as f64 / last * width),
            y: round1(height - (v - min) / scale * height),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    const W: f64 = 220.0;
    const H: f64 = 70.0;

    fn series(rx: &[f64]) -> Vec<HistorySample> {
        rx.iter()
            .zip(0_i64..)
            .map(|(&v, i)| {
                HistorySample::new(DateTime::from_timestamp_millis(i * 1_000).unwrap(), v, v / 2.0)
            })
            .collect()
    }

    fn ys(points: &[PlotPoint]) -> Vec<f64> {
        points.iter().map(|p| p.y).collect()
    }

    #[test]
    fn empty_input_has_no_points() {
        assert!(to_plot_points(&[], Field::Rx, W, H).is_empty());
    }

    #[test]
    fn single_sample_is_a_centered_line() {
        let points = to_plot_points(&series(&[5.0]), Field::Rx, W, H);
        assert_eq!(
            points,
            vec![PlotPoint { x: 0.0, y: 35.0 }, PlotPoint { x: 220.0, y: 35.0 }]
        );
    }

    #[test]
    fn two_points_span_the_full_range() {
        let points = to_plot_points(&series(&[0.0, 10e6]), Field::Rx, W, H);
        assert_eq!(
            points,
            vec![PlotPoint { x: 0.0, y: 70.0 }, PlotPoint { x: 220.0, y: 0.0 }]
        );
    }

    #[test]
    fn flat_series_is_level() {
        let zeros = to_plot_points(&series(&[0.0, 0.0, 0.0]), Field::Rx, W, H);
        assert_eq!(ys(&zeros), vec![H, H, H]);

        let busy = to_plot_points(&series(&[4.0e8, 4.0e8, 4.0e8, 4.0e8]), Field::Tx, W, H);
        let first = busy[0].y;
        assert!(busy.iter().all(|p| (p.y - first).abs() < f64::EPSILON));
        let xs: Vec<f64> = busy.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 73.3, 146.7, 220.0]);
    }

    #[test]
    fn non_finite_values_yield_nothing() {
        let mut samples = series(&[1.0, 2.0, 3.0]);
        samples[1].rx_bps = f64::NAN;
        assert!(to_plot_points(&samples, Field::Rx, W, H).is_empty());
        assert_eq!(to_plot_points(&samples, Field::Tx, W, H).len(), 3);
    }

    #[test]
    fn negative_values_still_plot() {
        let points = to_plot_points(&series(&[-1e6, 1e6]), Field::Rx, W, H);
        assert_eq!(
            points,
            vec![PlotPoint { x: 0.0, y: 70.0 }, PlotPoint { x: 220.0, y: 0.0 }]
        );
    }

    #[test]
    fn larger_values_plot_higher() {
        let points = to_plot_points(&series(&[1.0, 3.0, 2.0]), Field::Rx, W, H);
        assert_eq!(ys(&points), vec![70.0, 0.0, 35.0]);
    }
}
