//! Session normalization
//!
//! This module maps a parsed RowPro [`Session`] onto the document model:
//! - One activity, one lap and one track per session
//! - Pace (kilometres per minute) converted to speed (meters per second)
//! - Sample offsets anchored to the session start

use chrono::{DateTime, Duration, FixedOffset};
use tracing::warn;

use crate::document::{Activity, Author, Creator, Document, Lap, Sport, Track, Trackpoint};
use crate::types::{Sample, Session};
use crate::{CONVERTER_VERSION, PRODUCER_NAME};

/// Device name written into every activity's `Creator`
pub const ROWPRO_CREATOR_NAME: &str = "DigitalRowing RowPro";

/// km/min to m/s
pub const PACE_TO_MPS: f64 = 1000.0 / 60.0;

/// Options applied while building the document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentOptions {
    pub sport: Sport,
    /// RowPro version written into the `Creator` element
    pub rowpro_version: Option<String>,
}

/// Normalizer for converting a session into a document
pub struct Normalizer;

impl Normalizer {
    /// Build the document for one session
    ///
    /// A session without a start time has nothing to anchor its samples to
    /// and yields a document with no activities.
    pub fn to_document(session: Session, options: &DocumentOptions) -> Document {
        let mut document = Document::new();
        document.author = Some(Author::new(PRODUCER_NAME).with_version(CONVERTER_VERSION));

        let Some(start) = session.start_time else {
            return document;
        };

        let mut activity = Activity::new(start, options.sport);
        activity.creator = Some(Creator {
            version: options.rowpro_version.clone(),
            ..Creator::named(ROWPRO_CREATOR_NAME)
        });

        let mut lap = Lap::new(start);
        lap.total_time = session.total_time;
        lap.distance = session.total_distance;
        lap.avg_speed = session.avg_pace.map(pace_to_speed);
        lap.calories = session.total_calories;
        lap.avg_heart_rate = session.avg_heart_rate;

        let mut track = Track::new();
        for sample in &session.samples {
            match sample_to_trackpoint(start, sample) {
                Some(point) => track.add_point(point),
                None => warn!(
                    offset_seconds = sample.offset_seconds,
                    "sample time out of range, point skipped"
                ),
            }
        }

        lap.add_track(track);
        activity.add_lap(lap);
        document.add_activity(activity);
        document
    }
}

/// Convert source pace to meters per second
pub fn pace_to_speed(pace: f64) -> f64 {
    pace * PACE_TO_MPS
}

/// `None` when the sample time falls outside the representable range
fn sample_to_trackpoint(start: DateTime<FixedOffset>, sample: &Sample) -> Option<Trackpoint> {
    let time = Duration::try_milliseconds((sample.offset_seconds * 1000.0).round() as i64)
        .and_then(|offset| start.checked_add_signed(offset))?;

    let mut point = Trackpoint::new(time);
    point.distance = Some(sample.distance_meters);
    point.cadence = sample.stroke_rate;
    point.heart_rate = sample.heart_rate;
    point.speed = sample.pace.map(pace_to_speed);
    point.power = sample.watts;
    Some(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2015-03-14T09:15:03+01:00").unwrap()
    }

    fn session() -> Session {
        let mut first = Sample::new(0.0, 0.0);
        first.pace = Some(0.24);
        first.watts = Some(150.5);
        first.stroke_rate = Some(24);
        first.heart_rate = Some(120);

        let mut second = Sample::new(1.5, 6.2);
        second.calories = Some(0.1);

        Session {
            start_time: Some(start()),
            total_time: Some(1800.0),
            total_distance: Some(6000.5),
            avg_pace: Some(0.24),
            total_calories: Some(350.5),
            avg_heart_rate: Some(142),
            samples: vec![first, second],
            ..Default::default()
        }
    }

    #[test]
    fn test_pace_to_speed() {
        assert!((pace_to_speed(0.24) - 4.0).abs() < 1e-12);
        assert_eq!(pace_to_speed(0.0), 0.0);
    }

    #[test]
    fn test_session_maps_to_one_lap() {
        let options = DocumentOptions {
            sport: Sport::Rowing,
            rowpro_version: Some("3.1".to_string()),
        };
        let doc = Normalizer::to_document(session(), &options);

        assert_eq!(doc.activities.len(), 1);
        let activity = &doc.activities[0];
        assert_eq!(activity.sport, Sport::Rowing);
        assert_eq!(activity.start_time, start());

        let creator = activity.creator.as_ref().unwrap();
        assert_eq!(creator.name.as_deref(), Some(ROWPRO_CREATOR_NAME));
        assert_eq!(creator.version.as_deref(), Some("3.1"));

        assert_eq!(activity.laps.len(), 1);
        let lap = &activity.laps[0];
        assert_eq!(lap.start_time, start());
        assert_eq!(lap.total_time, Some(1800.0));
        assert_eq!(lap.distance, Some(6000.5));
        assert_eq!(lap.calories, Some(350.5));
        assert_eq!(lap.avg_heart_rate, Some(142));
        assert!((lap.avg_speed.unwrap() - 4.0).abs() < 1e-12);
        assert_eq!(lap.tracks.len(), 1);
    }

    #[test]
    fn test_samples_become_trackpoints() {
        let doc = Normalizer::to_document(session(), &DocumentOptions::default());
        let points = &doc.activities[0].laps[0].tracks[0].points;

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].time, start());
        assert_eq!(points[0].cadence, Some(24));
        assert_eq!(points[0].heart_rate, Some(120));
        assert_eq!(points[0].power, Some(150.5));
        assert!((points[0].speed.unwrap() - 4.0).abs() < 1e-12);

        assert_eq!(points[1].time, start() + Duration::milliseconds(1500));
        assert_eq!(points[1].distance, Some(6.2));
        assert_eq!(points[1].speed, None);
        assert_eq!(points[1].power, None);
    }

    #[test]
    fn test_missing_start_time_gives_no_activity() {
        let mut session = session();
        session.start_time = None;

        let doc = Normalizer::to_document(session, &DocumentOptions::default());

        assert!(doc.activities.is_empty());
        assert_eq!(doc.author.as_ref().map(|a| a.name.as_str()), Some(PRODUCER_NAME));
    }

    #[test]
    fn test_unrepresentable_sample_time_is_skipped() {
        let mut session = session();
        session.samples.insert(1, Sample::new(1e15, 3.0));
        session.samples.push(Sample::new(f64::MAX, 9.0));
        session.samples.push(Sample::new(-1e15, 9.0));

        let doc = Normalizer::to_document(session, &DocumentOptions::default());
        let points = &doc.activities[0].laps[0].tracks[0].points;

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].distance, Some(6.2));
    }

    #[test]
    fn test_creator_without_version() {
        let doc = Normalizer::to_document(session(), &DocumentOptions::default());
        let creator = doc.activities[0].creator.as_ref().unwrap();

        assert_eq!(creator.version, None);
        assert_eq!(doc.activities[0].sport, Sport::Other);
    }
}
