//! TCX encoding
//!
//! This module writes a [`Document`] as Training Center XML. The encoder is a
//! pure function of the document: lap statistics must already be aggregated,
//! and encoding the same document twice yields the same bytes.
//!
//! Optional elements are driven by static tables of
//! `(element, selector, wrapper)` so that their order never depends on
//! anything but the table.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::document::{Activity, Author, Creator, Document, Lap, Track, Trackpoint, VersionParts};
use crate::error::ConvertError;

/// Training Center Database namespace (default namespace)
pub const NS_TCX: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
pub const NS_USER_PROFILE: &str = "http://www.garmin.com/xmlschemas/UserProfile/v2";
pub const NS_ACTIVITY_EXTENSION: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
pub const NS_PROFILE_EXTENSION: &str = "http://www.garmin.com/xmlschemas/ProfileExtension/v1";
pub const NS_ACTIVITY_GOALS: &str = "http://www.garmin.com/xmlschemas/ActivityGoals/v1";
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const SCHEMA_LOCATION: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2 http://www.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd";

/// Prefix bound to the activity extension namespace
const EXT_PREFIX: &str = "ns3";

/// Value of an optional element, before text conversion
#[derive(Debug, Clone, Copy)]
enum Value {
    Float(f64),
    Count(u16),
    Time(DateTime<FixedOffset>),
}

impl Value {
    fn text(&self) -> String {
        match self {
            Value::Float(v) => format_number(*v),
            Value::Count(v) => v.to_string(),
            Value::Time(t) => format_time(t),
        }
    }
}

/// Optional element: tag, field selector and optional `Value` wrapper
struct Tag<T> {
    element: &'static str,
    select: fn(&T) -> Option<Value>,
    wrapper: Option<&'static str>,
}

const LAP_TAGS: [Tag<Lap>; 7] = [
    Tag { element: "TotalTimeSeconds", select: |l| l.total_time.map(Value::Float), wrapper: None },
    Tag { element: "DistanceMeters", select: |l| l.distance.map(Value::Float), wrapper: None },
    Tag { element: "MaximumSpeed", select: |l| l.max_speed.map(Value::Float), wrapper: None },
    Tag {
        element: "AverageHeartRateBpm",
        select: |l| l.avg_heart_rate.map(Value::Count),
        wrapper: Some("Value"),
    },
    Tag {
        element: "MaximumHeartRateBpm",
        select: |l| l.max_heart_rate.map(Value::Count),
        wrapper: Some("Value"),
    },
    Tag { element: "Cadence", select: |l| l.avg_cadence.map(Value::Count), wrapper: None },
    Tag { element: "Calories", select: |l| l.calories.map(Value::Float), wrapper: None },
];

const LAP_EXTENSION_TAGS: [Tag<Lap>; 4] = [
    Tag { element: "AvgSpeed", select: |l| l.avg_speed.map(Value::Float), wrapper: None },
    Tag { element: "AvgWatts", select: |l| l.avg_power.map(Value::Float), wrapper: None },
    Tag { element: "MaxWatts", select: |l| l.max_power.map(Value::Float), wrapper: None },
    Tag { element: "MaxBikeCadence", select: |l| l.max_cadence.map(Value::Count), wrapper: None },
];

const TRACKPOINT_TAGS: [Tag<Trackpoint>; 5] = [
    Tag { element: "Time", select: |p| Some(Value::Time(p.time)), wrapper: None },
    Tag { element: "DistanceMeters", select: |p| p.distance.map(Value::Float), wrapper: None },
    Tag { element: "AltitudeMeters", select: |p| p.altitude.map(Value::Float), wrapper: None },
    Tag { element: "Cadence", select: |p| p.cadence.map(Value::Count), wrapper: None },
    Tag {
        element: "HeartRateBpm",
        select: |p| p.heart_rate.map(Value::Count),
        wrapper: Some("Value"),
    },
];

const TRACKPOINT_EXTENSION_TAGS: [Tag<Trackpoint>; 2] = [
    Tag { element: "Speed", select: |p| p.speed.map(Value::Float), wrapper: None },
    Tag { element: "Watts", select: |p| p.power.map(Value::Float), wrapper: None },
];

/// Locale-independent number text: shortest decimal that round-trips
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

/// ISO 8601 timestamp in the offset it was recorded in
pub fn format_time(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// TCX encoder for producing Training Center XML
#[derive(Debug, Clone)]
pub struct TcxEncoder {
    pretty_print: bool,
}

impl Default for TcxEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TcxEncoder {
    /// Create an encoder that indents its output
    pub fn new() -> Self {
        Self { pretty_print: true }
    }

    /// Create an encoder that writes everything on one line
    pub fn compact() -> Self {
        Self {
            pretty_print: false,
        }
    }

    pub fn with_pretty_print(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    /// Encode a document into UTF-8 XML bytes
    pub fn encode(&self, document: &Document) -> Result<Vec<u8>, ConvertError> {
        let writer = if self.pretty_print {
            Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
        } else {
            Writer::new(Cursor::new(Vec::new()))
        };
        let mut out = XmlOut { writer };

        out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write_document(&mut out, document)?;

        Ok(out.writer.into_inner().into_inner())
    }

    /// Encode to a string
    pub fn encode_to_string(&self, document: &Document) -> Result<String, ConvertError> {
        let bytes = self.encode(document)?;
        String::from_utf8(bytes).map_err(|e| ConvertError::Xml(e.to_string()))
    }
}

fn write_document(out: &mut XmlOut, document: &Document) -> Result<(), ConvertError> {
    let mut root = BytesStart::new("TrainingCenterDatabase");
    root.push_attribute(("xmlns", NS_TCX));
    root.push_attribute(("xmlns:ns2", NS_USER_PROFILE));
    root.push_attribute(("xmlns:ns3", NS_ACTIVITY_EXTENSION));
    root.push_attribute(("xmlns:ns4", NS_PROFILE_EXTENSION));
    root.push_attribute(("xmlns:ns5", NS_ACTIVITY_GOALS));
    root.push_attribute(("xmlns:xsi", NS_XSI));
    root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    out.event(Event::Start(root))?;

    if document.activities.is_empty() {
        out.event(Event::Empty(BytesStart::new("Activities")))?;
    } else {
        out.start("Activities")?;
        for activity in &document.activities {
            write_activity(out, activity)?;
        }
        out.end("Activities")?;
    }

    if let Some(author) = &document.author {
        write_author(out, author)?;
    }

    out.end("TrainingCenterDatabase")
}

fn write_activity(out: &mut XmlOut, activity: &Activity) -> Result<(), ConvertError> {
    let mut element = BytesStart::new("Activity");
    element.push_attribute(("Sport", activity.sport.schema_name()));
    out.event(Event::Start(element))?;

    out.text_element("Id", &format_time(&activity.start_time))?;
    for lap in &activity.laps {
        write_lap(out, lap)?;
    }

    if let Some(creator) = activity.creator.as_ref().filter(|c| !c.is_empty()) {
        write_creator(out, creator)?;
    }

    out.end("Activity")
}

fn write_lap(out: &mut XmlOut, lap: &Lap) -> Result<(), ConvertError> {
    let mut element = BytesStart::new("Lap");
    element.push_attribute(("StartTime", format_time(&lap.start_time).as_str()));
    out.event(Event::Start(element))?;

    write_tags(out, lap, &LAP_TAGS)?;
    for track in &lap.tracks {
        write_track(out, track)?;
    }
    write_extensions(out, lap, "LX", &LAP_EXTENSION_TAGS)?;

    out.end("Lap")
}

fn write_track(out: &mut XmlOut, track: &Track) -> Result<(), ConvertError> {
    if track.points.is_empty() {
        return out.event(Event::Empty(BytesStart::new("Track")));
    }

    out.start("Track")?;
    for point in &track.points {
        write_trackpoint(out, point)?;
    }
    out.end("Track")
}

fn write_trackpoint(out: &mut XmlOut, point: &Trackpoint) -> Result<(), ConvertError> {
    out.start("Trackpoint")?;

    if let Some(position) = &point.position {
        out.start("Position")?;
        out.text_element("LatitudeDegrees", &format_number(position.latitude))?;
        out.text_element("LongitudeDegrees", &format_number(position.longitude))?;
        out.end("Position")?;
    }

    write_tags(out, point, &TRACKPOINT_TAGS)?;
    write_extensions(out, point, "TPX", &TRACKPOINT_EXTENSION_TAGS)?;

    out.end("Trackpoint")
}

fn write_creator(out: &mut XmlOut, creator: &Creator) -> Result<(), ConvertError> {
    let mut element = BytesStart::new("Creator");
    element.push_attribute(("xsi:type", "Device_t"));
    out.event(Event::Start(element))?;

    out.text_element("Name", creator.name.as_deref().unwrap_or_default())?;
    if let Some(unit_id) = &creator.unit_id {
        out.text_element("UnitId", unit_id)?;
    }
    if let Some(product_id) = &creator.product_id {
        out.text_element("ProductID", product_id)?;
    }
    if let Some(version) = &creator.version {
        write_version(out, version)?;
    }

    out.end("Creator")
}

fn write_author(out: &mut XmlOut, author: &Author) -> Result<(), ConvertError> {
    let mut element = BytesStart::new("Author");
    element.push_attribute(("xsi:type", "Application_t"));
    out.event(Event::Start(element))?;

    out.text_element("Name", &author.name)?;
    if let Some(version) = &author.version {
        out.start("Build")?;
        write_version(out, version)?;
        out.end("Build")?;
    }
    if let Some(lang) = &author.lang {
        out.text_element("LangID", lang)?;
    }
    if let Some(part_number) = &author.part_number {
        out.text_element("PartNumber", part_number)?;
    }

    out.end("Author")
}

fn write_version(out: &mut XmlOut, version: &str) -> Result<(), ConvertError> {
    let parts = VersionParts::parse(version);

    out.start("Version")?;
    out.text_element("VersionMajor", &parts.major)?;
    out.text_element("VersionMinor", &parts.minor)?;
    if let Some(build_major) = &parts.build_major {
        out.text_element("BuildMajor", build_major)?;
    }
    if let Some(build_minor) = &parts.build_minor {
        out.text_element("BuildMinor", build_minor)?;
    }
    out.end("Version")
}

fn write_tags<T>(out: &mut XmlOut, item: &T, tags: &[Tag<T>]) -> Result<(), ConvertError> {
    for tag in tags {
        let Some(value) = (tag.select)(item) else {
            continue;
        };
        match tag.wrapper {
            Some(wrapper) => {
                out.start(tag.element)?;
                out.text_element(wrapper, &value.text())?;
                out.end(tag.element)?;
            }
            None => out.text_element(tag.element, &value.text())?,
        }
    }
    Ok(())
}

/// `Extensions/ns3:<container>` block, skipped entirely when no tag has a value
fn write_extensions<T>(
    out: &mut XmlOut,
    item: &T,
    container: &str,
    tags: &[Tag<T>],
) -> Result<(), ConvertError> {
    let present: Vec<(&str, Value)> = tags
        .iter()
        .filter_map(|tag| (tag.select)(item).map(|value| (tag.element, value)))
        .collect();
    if present.is_empty() {
        return Ok(());
    }

    let container = format!("{EXT_PREFIX}:{container}");
    out.start("Extensions")?;
    out.start(&container)?;
    for (element, value) in present {
        out.text_element(&format!("{EXT_PREFIX}:{element}"), &value.text())?;
    }
    out.end(&container)?;
    out.end("Extensions")
}

/// Thin wrapper mapping writer failures into [`ConvertError`]
struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn event(&mut self, event: Event<'_>) -> Result<(), ConvertError> {
        self.writer
            .write_event(event)
            .map_err(|e| ConvertError::Xml(e.to_string()))
    }

    fn start(&mut self, name: &str) -> Result<(), ConvertError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<(), ConvertError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), ConvertError> {
        self.start(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }
}
