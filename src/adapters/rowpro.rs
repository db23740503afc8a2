//! DigitalRowing RowPro CSV adapter
//!
//! A RowPro export is CRLF-delimited text holding a summary section (header
//! line plus one record) followed by a sample section (header line plus one
//! record per line until a blank line). Anything outside those sections is
//! ignored.

use chrono::FixedOffset;
use tracing::{debug, warn};

use super::ExportAdapter;
use crate::error::{ConvertError, Diagnostic, Section};
use crate::schema::{
    Coerced, FieldCoercer, FieldValue, SampleField, SummaryField, SAMPLES_HEADER, SAMPLE_FIELDS,
    SUMMARY_FIELDS, SUMMARY_HEADER,
};
use crate::types::{ParsedSession, Sample, Session};

/// RowPro CSV export adapter
#[derive(Debug, Clone, Default)]
pub struct RowProAdapter {
    coercer: FieldCoercer,
}

impl RowProAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter that reads naive export timestamps in the given offset
    pub fn with_default_offset(offset: FixedOffset) -> Self {
        Self {
            coercer: FieldCoercer::new(offset),
        }
    }
}

impl ExportAdapter for RowProAdapter {
    fn parse(&self, raw: &str) -> Result<ParsedSession, ConvertError> {
        let lines = split_records(raw)?;
        let mut state = ParseState::default();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];
            let line_no = idx + 1;
            idx += 1;

            if line.is_empty() {
                continue;
            }

            if line.starts_with(SUMMARY_HEADER) {
                // The record is the line right after the header, whatever it holds
                if let Some(record) = lines.get(idx) {
                    idx += 1;
                    if state.summary_found {
                        state.report(Diagnostic::DuplicateSummary { line: line_no });
                    } else {
                        self.read_summary(record, line_no + 1, &mut state);
                        state.summary_found = true;
                    }
                }
                continue;
            }

            if line.starts_with(SAMPLES_HEADER) {
                while idx < lines.len() {
                    let record = lines[idx].trim();
                    let record_no = idx + 1;
                    idx += 1;

                    if record.is_empty() {
                        break;
                    }

                    state.samples_found = true;
                    if let Some(sample) = self.read_sample(record, record_no, &mut state) {
                        state.session.samples.push(sample);
                    }
                }
                // One session per export: nothing after the sample block is read
                break;
            }
        }

        Ok(state.finish())
    }
}

impl RowProAdapter {
    fn read_summary(&self, record: &str, line: usize, state: &mut ParseState) {
        let fields: Vec<&str> = record.split(',').collect();
        if fields.len() < SUMMARY_FIELDS.len() {
            state.report(Diagnostic::FieldCountMismatch {
                section: Section::Summary,
                found: fields.len(),
                expected: SUMMARY_FIELDS.len(),
                line,
            });
        }

        for (pos, spec) in SUMMARY_FIELDS.iter().enumerate() {
            let raw = fields.get(pos).copied();
            match self.coercer.coerce(spec.kind, raw) {
                Coerced::Absent => {}
                Coerced::Value(value) => assign_summary(&mut state.session, spec.key, value),
                Coerced::Invalid => state.report(Diagnostic::FieldConversion {
                    section: Section::Summary,
                    field: spec.name,
                    value: raw.unwrap_or_default().trim().to_string(),
                    line,
                }),
            }
        }
    }

    fn read_sample(&self, record: &str, line: usize, state: &mut ParseState) -> Option<Sample> {
        let fields: Vec<&str> = record.split(',').collect();
        if fields.len() < SAMPLE_FIELDS.len() {
            state.report(Diagnostic::FieldCountMismatch {
                section: Section::Samples,
                found: fields.len(),
                expected: SAMPLE_FIELDS.len(),
                line,
            });
        }

        let mut time = None;
        let mut distance = None;
        let mut sample = Sample::new(0.0, 0.0);

        for (pos, spec) in SAMPLE_FIELDS.iter().enumerate() {
            let raw = fields.get(pos).copied();
            let value = match self.coercer.coerce(spec.kind, raw) {
                Coerced::Absent => continue,
                Coerced::Value(value) => value,
                Coerced::Invalid => {
                    state.report(Diagnostic::FieldConversion {
                        section: Section::Samples,
                        field: spec.name,
                        value: raw.unwrap_or_default().trim().to_string(),
                        line,
                    });
                    continue;
                }
            };

            match spec.key {
                SampleField::Time => time = value.as_f64(),
                SampleField::Distance => distance = value.as_f64(),
                SampleField::Pace => sample.pace = value.as_f64(),
                SampleField::Watts => sample.watts = value.as_f64(),
                SampleField::Calories => sample.calories = value.as_f64(),
                SampleField::StrokeRate => sample.stroke_rate = value.as_count(),
                SampleField::HeartRate => sample.heart_rate = value.as_count(),
                SampleField::DutyCycle => sample.duty_cycle = value.as_f64(),
                SampleField::RowfileId => sample.rowfile_id = value.into_text(),
            }
        }

        match (time, distance) {
            (Some(offset_seconds), Some(distance_meters)) => {
                sample.offset_seconds = offset_seconds;
                sample.distance_meters = distance_meters;
                Some(sample)
            }
            _ => {
                state.report(Diagnostic::SampleDropped { line });
                None
            }
        }
    }
}

fn assign_summary(session: &mut Session, key: SummaryField, value: FieldValue) {
    match key {
        SummaryField::Date => session.start_time = value.as_timestamp(),
        SummaryField::TotalTime => session.total_time = value.as_f64(),
        SummaryField::TotalDistance => session.total_distance = value.as_f64(),
        SummaryField::AvgPace => session.avg_pace = value.as_f64(),
        SummaryField::Unit => session.unit = value.as_i64(),
        SummaryField::Origin => session.origin = value.as_i64(),
        SummaryField::TotalCalories => session.total_calories = value.as_f64(),
        SummaryField::DutyCycle => session.duty_cycle = value.as_f64(),
        SummaryField::SessionType => session.session_type = value.as_i64(),
        SummaryField::Format => session.format = value.into_text(),
        SummaryField::Slide => session.uses_slide = value.as_bool().unwrap_or(false),
        SummaryField::SessionId => session.session_id = value.as_f64(),
        SummaryField::RowfileId => session.rowfile_id = value.into_text(),
        SummaryField::AvgHeartRate => session.avg_heart_rate = value.as_count(),
    }
}

/// Split on CRLF, rejecting any bare LF
fn split_records(raw: &str) -> Result<Vec<&str>, ConvertError> {
    let mut lines = Vec::new();
    for (idx, line) in raw.split("\r\n").enumerate() {
        if line.contains('\n') {
            return Err(ConvertError::UnsupportedLineEnding { line: idx + 1 });
        }
        lines.push(line);
    }
    Ok(lines)
}

#[derive(Default)]
struct ParseState {
    session: Session,
    diagnostics: Vec<Diagnostic>,
    summary_found: bool,
    samples_found: bool,
}

impl ParseState {
    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn finish(mut self) -> ParsedSession {
        if !self.summary_found {
            self.report(Diagnostic::SummaryNotFound);
        }
        if !self.samples_found {
            self.report(Diagnostic::SamplesNotFound);
        }
        if self.session.start_time.is_none() && !self.session.samples.is_empty() {
            self.report(Diagnostic::MissingStartTime {
                samples: self.session.samples.len(),
            });
        }

        debug!(
            samples = self.session.samples.len(),
            diagnostics = self.diagnostics.len(),
            "parsed rowpro export"
        );

        ParsedSession {
            session: self.session,
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SUMMARY_HEADER_LINE: &str = "Date,TotalTime,TotalDistance,AvgPace,Unit,Origin,TotalCals,DutyCycle,Type,Format,Slide,SessionId,RowfileId,AvgHR";
    const SUMMARY_RECORD: &str =
        "2015-03-14T09:15:03+01:00,1800000,6000.5,0.24,0,1,350.5,0.42,2,standard,True,12345,rf-9,142";

    fn crlf(lines: &[&str]) -> String {
        lines.join("\r\n")
    }

    fn sample_export() -> String {
        crlf(&[
            "RowPro export",
            "",
            SUMMARY_HEADER_LINE,
            SUMMARY_RECORD,
            "",
            SAMPLES_HEADER,
            "0,0.0,0.24,150.5,0.0,24,120,0.4,rf-9",
            "1500,6.2,0.25,160.0,0.1,25,125,0.41,rf-9",
            "3000,12.5,0.24,155.0,0.2,24,130,0.42,rf-9",
            "",
            "trailing junk",
        ])
    }

    #[test]
    fn test_parse_full_export() {
        let parsed = RowProAdapter::new().parse(&sample_export()).unwrap();
        let session = &parsed.session;

        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

        let start = session.start_time.unwrap();
        assert_eq!((start.year(), start.month(), start.day()), (2015, 3, 14));
        assert_eq!(start.hour(), 9);
        assert_eq!(start.offset().local_minus_utc(), 3600);

        assert_eq!(session.total_time, Some(1800.0));
        assert_eq!(session.total_distance, Some(6000.5));
        assert_eq!(session.avg_pace, Some(0.24));
        assert_eq!(session.unit, Some(0));
        assert_eq!(session.origin, Some(1));
        assert_eq!(session.total_calories, Some(350.5));
        assert_eq!(session.duty_cycle, Some(0.42));
        assert_eq!(session.session_type, Some(2));
        assert_eq!(session.format.as_deref(), Some("standard"));
        assert!(session.uses_slide);
        assert_eq!(session.session_id, Some(12345.0));
        assert_eq!(session.rowfile_id.as_deref(), Some("rf-9"));
        assert_eq!(session.avg_heart_rate, Some(142));

        assert_eq!(session.samples.len(), 3);
        assert!(session.is_time_ordered());
    }

    #[test]
    fn test_sample_time_unit_conversion() {
        let parsed = RowProAdapter::new().parse(&sample_export()).unwrap();
        let sample = &parsed.session.samples[1];

        assert_eq!(sample.offset_seconds, 1.5);
        assert_eq!(sample.distance_meters, 6.2);
        assert_eq!(sample.pace, Some(0.25));
        assert_eq!(sample.watts, Some(160.0));
        assert_eq!(sample.calories, Some(0.1));
        assert_eq!(sample.stroke_rate, Some(25));
        assert_eq!(sample.heart_rate, Some(125));
        assert_eq!(sample.duty_cycle, Some(0.41));
        assert_eq!(sample.rowfile_id.as_deref(), Some("rf-9"));
    }

    #[test]
    fn test_short_summary_record() {
        let raw = crlf(&[
            SUMMARY_HEADER_LINE,
            "2015-03-14T09:15:03,1800000,6000.5",
            SAMPLES_HEADER,
            "0,0.0,0.24,150.5,0.0,24,120,0.4,rf-9",
        ]);
        let parsed = RowProAdapter::new().parse(&raw).unwrap();
        let session = &parsed.session;

        assert!(session.start_time.is_some());
        assert_eq!(session.total_time, Some(1800.0));
        assert_eq!(session.total_distance, Some(6000.5));
        assert_eq!(session.avg_pace, None);
        assert_eq!(session.total_calories, None);
        assert!(!session.uses_slide);
        assert_eq!(session.avg_heart_rate, None);

        assert_eq!(
            parsed.diagnostics,
            vec![Diagnostic::FieldCountMismatch {
                section: Section::Summary,
                found: 3,
                expected: 14,
                line: 2,
            }]
        );
    }

    #[test]
    fn test_bad_field_is_skipped_not_fatal() {
        let raw = crlf(&[
            SUMMARY_HEADER_LINE,
            "2015-03-14T09:15:03,1800000,far,0.24,0,1,350.5,0.42,2,standard,False,12345,rf-9,142",
            SAMPLES_HEADER,
            "0,0.0,0.24,lots,0.0,24,,0.4,rf-9",
        ]);
        let parsed = RowProAdapter::new().parse(&raw).unwrap();

        assert_eq!(parsed.session.total_distance, None);
        assert_eq!(parsed.session.avg_pace, Some(0.24));

        let sample = &parsed.session.samples[0];
        assert_eq!(sample.watts, None);
        assert_eq!(sample.heart_rate, None);
        assert_eq!(sample.stroke_rate, Some(24));

        assert_eq!(
            parsed.diagnostics,
            vec![
                Diagnostic::FieldConversion {
                    section: Section::Summary,
                    field: "total_distance",
                    value: "far".to_string(),
                    line: 2,
                },
                Diagnostic::FieldConversion {
                    section: Section::Samples,
                    field: "watts",
                    value: "lots".to_string(),
                    line: 4,
                },
            ]
        );
    }

    #[test]
    fn test_sample_without_time_is_dropped() {
        let raw = crlf(&[
            SUMMARY_HEADER_LINE,
            SUMMARY_RECORD,
            SAMPLES_HEADER,
            "soon,0.0,0.24,150.5,0.0,24,120,0.4,rf-9",
            "1000,4.1,0.24,150.5,0.0,24,120,0.4,rf-9",
        ]);
        let parsed = RowProAdapter::new().parse(&raw).unwrap();

        assert_eq!(parsed.session.samples.len(), 1);
        assert_eq!(parsed.session.samples[0].offset_seconds, 1.0);
        assert_eq!(parsed.diagnostics.len(), 2);
        assert_eq!(parsed.diagnostics[1], Diagnostic::SampleDropped { line: 4 });
    }

    #[test]
    fn test_out_of_range_sample_time_is_dropped() {
        let raw = crlf(&[
            SUMMARY_HEADER_LINE,
            SUMMARY_RECORD,
            SAMPLES_HEADER,
            "9000000000000000000,0.0,0.24,150.5,0.0,24,120,0.4,rf-9",
            "1000,4.1,0.24,150.5,0.0,24,120,0.4,rf-9",
        ]);
        let parsed = RowProAdapter::new().parse(&raw).unwrap();

        assert_eq!(parsed.session.samples.len(), 1);
        assert_eq!(
            parsed.diagnostics,
            vec![
                Diagnostic::FieldConversion {
                    section: Section::Samples,
                    field: "time",
                    value: "9000000000000000000".to_string(),
                    line: 4,
                },
                Diagnostic::SampleDropped { line: 4 },
            ]
        );
    }

    #[test]
    fn test_samples_without_summary() {
        let raw = crlf(&[
            SAMPLES_HEADER,
            "0,0.0,0.24,150.5,0.0,24,120,0.4,rf-9",
            "1500,6.2,0.25,160.0,0.1,25,125,0.41,rf-9",
        ]);
        let parsed = RowProAdapter::new().parse(&raw).unwrap();

        assert!(parsed.session.summary_is_empty());
        assert_eq!(parsed.session.samples.len(), 2);
        assert_eq!(
            parsed.diagnostics,
            vec![
                Diagnostic::SummaryNotFound,
                Diagnostic::MissingStartTime { samples: 2 },
            ]
        );
    }

    #[test]
    fn test_no_sections_found() {
        let parsed = RowProAdapter::new()
            .parse("nothing to see\r\nhere")
            .unwrap();

        assert_eq!(parsed.session, Session::default());
        assert_eq!(
            parsed.diagnostics,
            vec![Diagnostic::SummaryNotFound, Diagnostic::SamplesNotFound]
        );
    }

    #[test]
    fn test_empty_input() {
        let parsed = RowProAdapter::new().parse("").unwrap();
        assert!(parsed.session.samples.is_empty());
        assert_eq!(parsed.diagnostics.len(), 2);
    }

    #[test]
    fn test_bare_lf_rejected() {
        let raw = format!("{SUMMARY_HEADER_LINE}\r\n{SUMMARY_RECORD}\n{SAMPLES_HEADER}");
        let err = RowProAdapter::new().parse(&raw).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedLineEnding { line: 2 }));
    }

    #[test]
    fn test_duplicate_summary_keeps_first() {
        let raw = crlf(&[
            SUMMARY_HEADER_LINE,
            SUMMARY_RECORD,
            SUMMARY_HEADER_LINE,
            "2020-01-01T00:00:00Z,60000,100,0.2,0,0,5,0.4,1,x,False,1,rf-1,100",
            SAMPLES_HEADER,
            "0,0.0,0.24,150.5,0.0,24,120,0.4,rf-9",
        ]);
        let parsed = RowProAdapter::new().parse(&raw).unwrap();

        assert_eq!(parsed.session.total_time, Some(1800.0));
        assert_eq!(parsed.diagnostics, vec![Diagnostic::DuplicateSummary { line: 3 }]);
    }

    #[test]
    fn test_naive_date_takes_configured_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let raw = crlf(&[
            SUMMARY_HEADER_LINE,
            "2015-03-14 09:15:03,1800000,6000.5,0.24,0,1,350.5,0.42,2,standard,True,12345,rf-9,142",
        ]);
        let parsed = RowProAdapter::with_default_offset(offset).parse(&raw).unwrap();

        let start = parsed.session.start_time.unwrap();
        assert_eq!(start.offset().local_minus_utc(), 7200);
        assert_eq!(parsed.diagnostics, vec![Diagnostic::SamplesNotFound]);
    }
}
