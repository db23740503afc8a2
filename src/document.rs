//! Training Center document model
//!
//! In-memory form of a TCX document: a [`Document`] owns activities, an
//! activity owns laps, a lap owns tracks and a track owns trackpoints. Every
//! node owns its children outright; nothing points back up the tree.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sport classification of an activity
///
/// Deserialization goes through [`FromStr`], so any letter case is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Sport {
    Running,
    Biking,
    #[default]
    Other,
    Rowing,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Running => "Running",
            Sport::Biking => "Biking",
            Sport::Other => "Other",
            Sport::Rowing => "Rowing",
        }
    }

    /// Value of the `Sport` attribute; the schema only knows three sports
    pub fn schema_name(&self) -> &'static str {
        match self {
            Sport::Running => "Running",
            Sport::Biking => "Biking",
            Sport::Other | Sport::Rowing => "Other",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(Sport::Running),
            "biking" => Ok(Sport::Biking),
            "other" => Ok(Sport::Other),
            "rowing" => Ok(Sport::Rowing),
            other => Err(format!("unknown sport: {other}")),
        }
    }
}

impl TryFrom<String> for Sport {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Dotted version split into the schema's version parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParts {
    pub major: String,
    pub minor: String,
    pub build_major: Option<String>,
    pub build_minor: Option<String>,
}

impl VersionParts {
    /// `"3.1"` becomes major 3, minor 1; a missing minor is `0`
    pub fn parse(version: &str) -> Self {
        let mut parts = version.split('.').map(|p| p.trim().to_string());
        let major = parts.next().unwrap_or_default();
        let minor = parts.next().unwrap_or_else(|| "0".to_string());
        Self {
            major,
            minor,
            build_major: parts.next(),
            build_minor: parts.next(),
        }
    }
}

/// Device or application that recorded an activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Creator {
    pub name: Option<String>,
    pub version: Option<String>,
    pub unit_id: Option<String>,
    pub product_id: Option<String>,
}

impl Creator {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.version.is_none()
            && self.unit_id.is_none()
            && self.product_id.is_none()
    }
}

/// Application that wrote the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub version: Option<String>,
    pub lang: Option<String>,
    pub part_number: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            lang: None,
            part_number: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Root of the output tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub activities: Vec<Activity>,
    pub author: Option<Author>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_activity(&mut self, activity: Activity) {
        self.activities.push(activity);
    }

    /// Total number of trackpoints across all activities
    pub fn point_count(&self) -> usize {
        self.activities
            .iter()
            .flat_map(|a| &a.laps)
            .flat_map(|l| &l.tracks)
            .map(|t| t.points.len())
            .sum()
    }
}

/// One recorded activity
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    /// Activity start; also the activity `Id`
    pub start_time: DateTime<FixedOffset>,
    pub sport: Sport,
    pub creator: Option<Creator>,
    pub laps: Vec<Lap>,
}

impl Activity {
    pub fn new(start_time: DateTime<FixedOffset>, sport: Sport) -> Self {
        Self {
            start_time,
            sport,
            creator: None,
            laps: Vec::new(),
        }
    }

    pub fn add_lap(&mut self, lap: Lap) {
        self.laps.push(lap);
    }
}

/// A lap and its summary statistics
///
/// Statistics set by the caller are authoritative; the aggregator only fills
/// the ones left at `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lap {
    pub start_time: DateTime<FixedOffset>,
    /// Seconds
    pub total_time: Option<f64>,
    /// Meters
    pub distance: Option<f64>,
    /// Unit depends on who filled it: meters per second when taken from the
    /// export's summary pace, kilometres per hour when derived by
    /// [`crate::aggregator::LapAggregator`] from distance and duration.
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub avg_heart_rate: Option<u16>,
    pub max_heart_rate: Option<u16>,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    pub avg_cadence: Option<u16>,
    pub max_cadence: Option<u16>,
    pub calories: Option<f64>,
    pub tracks: Vec<Track>,
}

impl Lap {
    pub fn new(start_time: DateTime<FixedOffset>) -> Self {
        Self {
            start_time,
            total_time: None,
            distance: None,
            avg_speed: None,
            max_speed: None,
            avg_heart_rate: None,
            max_heart_rate: None,
            avg_power: None,
            max_power: None,
            avg_cadence: None,
            max_cadence: None,
            calories: None,
            tracks: Vec::new(),
        }
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Points of every track, in document order
    pub fn points(&self) -> impl Iterator<Item = &Trackpoint> {
        self.tracks.iter().flat_map(|t| t.points.iter())
    }
}

/// Continuous run of trackpoints within a lap
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub points: Vec<Trackpoint>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, point: Trackpoint) {
        self.points.push(point);
    }
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// One timestamped sample
#[derive(Debug, Clone, PartialEq)]
pub struct Trackpoint {
    pub time: DateTime<FixedOffset>,
    pub position: Option<Position>,
    /// Cumulative meters
    pub distance: Option<f64>,
    pub altitude: Option<f64>,
    pub cadence: Option<u16>,
    pub heart_rate: Option<u16>,
    /// Meters per second
    pub speed: Option<f64>,
    /// Watts
    pub power: Option<f64>,
}

impl Trackpoint {
    pub fn new(time: DateTime<FixedOffset>) -> Self {
        Self {
            time,
            position: None,
            distance: None,
            altitude: None,
            cadence: None,
            heart_rate: None,
            speed: None,
            power: None,
        }
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.position = Some(Position {
            latitude,
            longitude,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2015-03-14T09:15:03+01:00").unwrap()
    }

    #[test]
    fn test_sport_names() {
        assert_eq!("Rowing".parse::<Sport>().unwrap(), Sport::Rowing);
        assert_eq!(" biking ".parse::<Sport>().unwrap(), Sport::Biking);
        assert!("curling".parse::<Sport>().is_err());
        assert_eq!(Sport::Rowing.schema_name(), "Other");
        assert_eq!(Sport::Running.schema_name(), "Running");
        assert_eq!(Sport::default(), Sport::Other);
    }

    #[test]
    fn test_sport_deserializes_any_case() {
        for text in ["\"rowing\"", "\"Rowing\"", "\"ROWING\""] {
            assert_eq!(serde_json::from_str::<Sport>(text).unwrap(), Sport::Rowing);
        }
        assert!(serde_json::from_str::<Sport>("\"curling\"").is_err());
        assert_eq!(serde_json::to_string(&Sport::Biking).unwrap(), "\"biking\"");
    }

    #[test]
    fn test_version_parts() {
        let v = VersionParts::parse("2");
        assert_eq!((v.major.as_str(), v.minor.as_str()), ("2", "0"));
        assert!(v.build_major.is_none());

        let v = VersionParts::parse("3.1.7.42");
        assert_eq!(v.minor, "1");
        assert_eq!(v.build_major.as_deref(), Some("7"));
        assert_eq!(v.build_minor.as_deref(), Some("42"));
    }

    #[test]
    fn test_nodes_own_their_children() {
        let mut first = Lap::new(start());
        let second = Lap::new(start());
        first.add_track(Track::new());

        assert_eq!(first.tracks.len(), 1);
        assert!(second.tracks.is_empty());
    }

    #[test]
    fn test_point_count() {
        let mut track = Track::new();
        track.add_point(Trackpoint::new(start()));
        track.add_point(Trackpoint::new(start()).with_position(51.5, -0.12));

        let mut lap = Lap::new(start());
        lap.add_track(track);
        lap.add_track(Track::new());

        let mut activity = Activity::new(start(), Sport::Rowing);
        activity.add_lap(lap);

        let mut doc = Document::new();
        doc.add_activity(activity);

        assert_eq!(doc.point_count(), 2);
        assert_eq!(doc.activities[0].laps[0].points().count(), 2);
    }

    #[test]
    fn test_creator_is_empty() {
        assert!(Creator::default().is_empty());
        assert!(!Creator::named("DigitalRowing RowPro").is_empty());
        let creator = Creator {
            unit_id: Some("1234".to_string()),
            ..Default::default()
        };
        assert!(!creator.is_empty());
    }
}
