//! Lap statistics
//!
//! Fills the summary statistics of a lap from its trackpoints:
//! - Duration and distance, summed per track
//! - Average speed from distance and duration
//! - Maximum speed, and mean/maximum heart rate, power and cadence
//!
//! Statistics already present on the lap are left untouched, so running the
//! aggregator twice is a no-op. Means are plain arithmetic means over the
//! points that carry the metric, not weighted by time.

use crate::document::{Document, Lap, Track, Trackpoint};

/// Meters per second to kilometres per hour
pub const MPS_TO_KMH: f64 = 3.6;

/// Aggregator for lap summary statistics
pub struct LapAggregator;

impl LapAggregator {
    /// Fill every unset statistic of every lap in the document
    pub fn aggregate_document(document: &mut Document) {
        for lap in document
            .activities
            .iter_mut()
            .flat_map(|activity| activity.laps.iter_mut())
        {
            Self::aggregate(lap);
        }
    }

    /// Fill the unset statistics of one lap
    pub fn aggregate(lap: &mut Lap) {
        if lap.total_time.is_none() {
            lap.total_time = compute_duration(&lap.tracks);
        }
        if lap.distance.is_none() {
            lap.distance = compute_distance(&lap.tracks);
        }
        if lap.avg_speed.is_none() {
            lap.avg_speed = compute_avg_speed(lap.distance, lap.total_time);
        }

        let speed = Stat::collect(lap.points().filter_map(|p| p.speed));
        let heart_rate = Stat::collect(lap.points().filter_map(|p| p.heart_rate.map(f64::from)));
        let power = Stat::collect(lap.points().filter_map(|p| p.power));
        let cadence = Stat::collect(lap.points().filter_map(|p| p.cadence.map(f64::from)));

        lap.max_speed = lap.max_speed.or(speed.max);
        lap.avg_heart_rate = lap.avg_heart_rate.or_else(|| heart_rate.mean().map(round_count));
        lap.max_heart_rate = lap.max_heart_rate.or(heart_rate.max.map(round_count));
        lap.avg_power = lap.avg_power.or(power.mean());
        lap.max_power = lap.max_power.or(power.max);
        lap.avg_cadence = lap.avg_cadence.or_else(|| cadence.mean().map(round_count));
        lap.max_cadence = lap.max_cadence.or(cadence.max.map(round_count));
    }
}

/// Sum of first-to-last point spans; `None` if no track spans two points
fn compute_duration(tracks: &[Track]) -> Option<f64> {
    tracks
        .iter()
        .filter_map(|track| match (track.points.first(), track.points.last()) {
            (Some(first), Some(last)) if track.points.len() >= 2 => Some(span_seconds(first, last)),
            _ => None,
        })
        .fold(None, |acc, secs| Some(acc.unwrap_or(0.0) + secs))
}

/// Sum of each track's final cumulative distance
fn compute_distance(tracks: &[Track]) -> Option<f64> {
    tracks
        .iter()
        .filter_map(|track| track.points.last().and_then(|p| p.distance))
        .fold(None, |acc, meters| Some(acc.unwrap_or(0.0) + meters))
}

fn compute_avg_speed(distance: Option<f64>, duration: Option<f64>) -> Option<f64> {
    match (distance, duration) {
        (Some(meters), Some(secs)) if secs > 0.0 => Some(meters / secs * MPS_TO_KMH),
        _ => None,
    }
}

fn span_seconds(first: &Trackpoint, last: &Trackpoint) -> f64 {
    (last.time - first.time).num_milliseconds() as f64 / 1000.0
}

fn round_count(value: f64) -> u16 {
    value.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Running mean and maximum of one metric
#[derive(Debug, Default)]
struct Stat {
    sum: f64,
    count: usize,
    max: Option<f64>,
}

impl Stat {
    fn collect(values: impl Iterator<Item = f64>) -> Self {
        let mut stat = Self::default();
        for value in values {
            stat.sum += value;
            stat.count += 1;
            stat.max = Some(stat.max.map_or(value, |m| m.max(value)));
        }
        stat
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}
