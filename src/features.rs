//! Stroke metric extraction
//!
//! Reduces raw timestamped stroke geometry into the scalar `Metrics` record used by
//! the diagnostic rules. Only pen strokes feed the timing and speed metrics; eraser
//! strokes are counted separately.

use crate::types::{Metrics, Point, Stroke};

/// Minimum number of per-stroke speed samples before acceleration is computed
const MIN_SPEED_SAMPLES: usize = 5;

/// Share of the speed samples treated as the "late" segment
const LATE_SEGMENT_FRACTION: f64 = 0.2;

/// Extractor for stroke metrics
pub struct MetricsExtractor;

impl MetricsExtractor {
    /// Extract metrics from strokes in recording order
    pub fn extract(strokes: &[Stroke]) -> Metrics {
        let (pen_strokes, eraser_strokes): (Vec<&Stroke>, Vec<&Stroke>) =
            strokes.iter().partition(|s| s.is_pen());

        let start_latency = pen_strokes
            .first()
            .and_then(|s| s.start_t())
            .unwrap_or(0.0);

        let totals = pen_strokes
            .iter()
            .filter_map(|s| StrokeKinematics::from_points(&s.points))
            .fold(PenTotals::default(), PenTotals::accumulate);

        let avg_stroke_speed = mean(&totals.speeds).unwrap_or(0.0);
        let pause_ratio = compute_pause_ratio(&pen_strokes, totals.total_time);
        let acceleration_end = compute_acceleration_end(&totals.speeds);

        tracing::trace!(
            pen_strokes = pen_strokes.len(),
            eraser_strokes = eraser_strokes.len(),
            speed_samples = totals.speeds.len(),
            total_drawing_time = totals.total_drawing_time,
            "extracted stroke metrics"
        );

        Metrics {
            start_latency: round_to(start_latency, 2),
            avg_stroke_speed: round_to(avg_stroke_speed, 1),
            pause_ratio: round_to(pause_ratio, 3),
            erase_count: eraser_strokes.len() as u32,
            acceleration_end: round_to(acceleration_end, 2),
            total_time: round_to(totals.total_time, 2),
            total_strokes: pen_strokes.len() as u32,
            total_distance: round_to(totals.total_distance, 0),
        }
    }
}

/// Path length and timing of a single stroke with at least two points
#[derive(Debug, Clone, Copy, PartialEq)]
struct StrokeKinematics {
    distance: f64,
    duration: f64,
    end_t: f64,
}

impl StrokeKinematics {
    fn from_points(points: &[Point]) -> Option<Self> {
        let [first, .., last] = points else {
            return None;
        };

        let distance = points
            .windows(2)
            .map(|pair| segment_length(&pair[0], &pair[1]))
            .sum();

        Some(Self {
            distance,
            duration: last.t - first.t,
            end_t: last.t,
        })
    }

    /// Speed in px/sec, undefined for zero-duration strokes
    fn speed(&self) -> Option<f64> {
        (self.duration > 0.0).then(|| self.distance / self.duration)
    }
}

/// Running totals over pen strokes
#[derive(Debug, Default)]
struct PenTotals {
    total_distance: f64,
    total_drawing_time: f64,
    total_time: f64,
    speeds: Vec<f64>,
}

impl PenTotals {
    fn accumulate(mut self, stroke: StrokeKinematics) -> Self {
        self.total_distance += stroke.distance;
        self.total_drawing_time += stroke.duration;
        self.total_time = self.total_time.max(stroke.end_t);
        self.speeds.extend(stroke.speed());
        self
    }
}

fn segment_length(a: &Point, b: &Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Compute pause ratio
///
/// Formula: `sum(max(0, next.start - prev.end)) / total_time` over consecutive pen
/// strokes. Pauses inside a stroke are not measured.
fn compute_pause_ratio(pen_strokes: &[&Stroke], total_time: f64) -> f64 {
    if total_time <= 0.0 {
        return 0.0;
    }

    let pause_time: f64 = pen_strokes
        .windows(2)
        .filter_map(|pair| Some((pair[1].start_t()? - pair[0].end_t()?).max(0.0)))
        .sum();

    pause_time / total_time
}

/// Compute end-of-session acceleration
///
/// Formula: `mean(last k speeds) / mean(remaining speeds)` with
/// `k = max(1, floor(0.2 * n))`. Returns 0 with fewer than 5 samples or when the
/// early mean is not positive.
fn compute_acceleration_end(speeds: &[f64]) -> f64 {
    if speeds.len() < MIN_SPEED_SAMPLES {
        return 0.0;
    }

    let late_len = ((speeds.len() as f64 * LATE_SEGMENT_FRACTION).floor() as usize).max(1);
    let (early, late) = speeds.split_at(speeds.len() - late_len);

    match (mean(early), mean(late)) {
        (Some(early_avg), Some(late_avg)) if early_avg > 0.0 => late_avg / early_avg,
        _ => 0.0,
    }
}

/// Round to a fixed number of decimal places
///
/// Rounds the exact binary value, so `1.115` (stored just below 1.115) becomes 1.11.
/// Scaling by a power of ten first would round it up instead.
pub(crate) fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}
