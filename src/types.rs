//! Session types produced by the parser
//!
//! A [`Session`] is the intermediate representation of one RowPro export. It
//! is consumed once to build a [`crate::document::Document`] and then dropped.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::error::Diagnostic;

/// One row of the sample series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Time since session start (seconds)
    pub offset_seconds: f64,
    /// Cumulative distance (meters)
    pub distance_meters: f64,
    /// Pace in source units (kilometres per minute)
    pub pace: Option<f64>,
    /// Power (watts)
    pub watts: Option<f64>,
    /// Cumulative calories
    pub calories: Option<f64>,
    /// Strokes per minute
    pub stroke_rate: Option<u16>,
    /// Heart rate (bpm)
    pub heart_rate: Option<u16>,
    /// Drive/recovery ratio reported by the ergometer
    pub duty_cycle: Option<f64>,
    /// Source row file reference, kept verbatim
    pub rowfile_id: Option<String>,
}

impl Sample {
    /// Create a sample with only the required fields set
    pub fn new(offset_seconds: f64, distance_meters: f64) -> Self {
        Self {
            offset_seconds,
            distance_meters,
            pace: None,
            watts: None,
            calories: None,
            stroke_rate: None,
            heart_rate: None,
            duty_cycle: None,
            rowfile_id: None,
        }
    }
}

/// Parsed RowPro session: summary record plus ordered samples
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    /// Session start, with the offset it was recorded in
    pub start_time: Option<DateTime<FixedOffset>>,
    /// Total time (seconds)
    pub total_time: Option<f64>,
    /// Total distance (meters)
    pub total_distance: Option<f64>,
    /// Average pace in source units (kilometres per minute)
    pub avg_pace: Option<f64>,
    pub unit: Option<i64>,
    pub origin: Option<i64>,
    pub total_calories: Option<f64>,
    pub duty_cycle: Option<f64>,
    pub session_type: Option<i64>,
    pub format: Option<String>,
    /// Whether the erg was mounted on slides
    pub uses_slide: bool,
    pub session_id: Option<f64>,
    pub rowfile_id: Option<String>,
    /// Average heart rate (bpm)
    pub avg_heart_rate: Option<u16>,
    /// Samples in source order
    pub samples: Vec<Sample>,
}

impl Session {
    /// True when no summary field was populated
    pub fn summary_is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.total_time.is_none()
            && self.total_distance.is_none()
            && self.avg_pace.is_none()
            && self.unit.is_none()
            && self.origin.is_none()
            && self.total_calories.is_none()
            && self.duty_cycle.is_none()
            && self.session_type.is_none()
            && self.format.is_none()
            && !self.uses_slide
            && self.session_id.is_none()
            && self.rowfile_id.is_none()
            && self.avg_heart_rate.is_none()
    }

    /// Check that sample offsets never go backwards
    pub fn is_time_ordered(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].offset_seconds <= pair[1].offset_seconds)
    }
}

/// Parser output: the session and everything worth reporting about it
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedSession {
    pub session: Session,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_is_empty() {
        let session = Session::default();
        assert!(session.summary_is_empty());
        assert!(session.samples.is_empty());
        assert!(session.is_time_ordered());
    }

    #[test]
    fn test_time_ordering() {
        let mut session = Session::default();
        session.samples.push(Sample::new(0.0, 0.0));
        session.samples.push(Sample::new(1.5, 4.0));
        session.samples.push(Sample::new(1.5, 6.0));
        assert!(session.is_time_ordered());

        session.samples.push(Sample::new(1.0, 8.0));
        assert!(!session.is_time_ordered());
    }
}
