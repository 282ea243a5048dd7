//! Calendar model on top of the `ical` reader.
//!
//! Only the pieces needed to place events on a timeline are kept: the
//! timing properties of each `VEVENT`, its summary and the recurrence
//! properties. Any structural damage rejects the whole payload.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use ical::{parser::ParserError, property::Property, IcalParser};

use crate::error::ParseError;

const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    Utc(DateTime<Utc>),
    Zoned(NaiveDateTime, Tz),
    Floating(NaiveDateTime),
    Date(NaiveDate),
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventEntry {
    pub uid: Option<String>,
    pub summary: String,
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub duration: Option<Duration>,
    pub rrule: Option<String>,
    pub rdates: Vec<EventTime>,
    pub exdates: Vec<EventTime>,
    pub recurrence_id: Option<EventTime>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calendar {
    pub events: Vec<EventEntry>,
}

pub fn parse(raw: &[u8]) -> Result<Calendar, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParseError::Encoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let opens_calendar = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !opens_calendar {
        return Err(ParseError::MissingCalendar);
    }

    let mut events = Vec::new();
    for calendar in IcalParser::new(text.as_bytes()) {
        let calendar = calendar.map_err(structural_error)?;
        for event in &calendar.events {
            events.push(build_event(&event.properties)?);
        }
    }

    Ok(Calendar { events })
}

fn structural_error(err: ParserError) -> ParseError {
    match err {
        ParserError::PropertyError(err) => ParseError::MalformedLine {
            reason: err.to_string(),
        },
        other => ParseError::Unbalanced {
            reason: other.to_string(),
        },
    }
}

fn value(property: &Property) -> &str {
    property.value.as_deref().unwrap_or_default()
}

fn param<'a>(property: &'a Property, key: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim_matches('"'))
}

fn is_date_valued(property: &Property) -> bool {
    param(property, "VALUE").is_some_and(|value| value.eq_ignore_ascii_case("DATE"))
}

fn build_event(properties: &[Property]) -> Result<EventEntry, ParseError> {
    let mut uid = None;
    let mut summary = String::new();
    let mut start = None;
    let mut end = None;
    let mut duration = None;
    let mut rrule = None;
    let mut rdates = Vec::new();
    let mut exdates = Vec::new();
    let mut recurrence_id = None;

    for property in properties {
        match property.name.to_ascii_uppercase().as_str() {
            "UID" => uid = Some(value(property).trim().to_string()),
            "SUMMARY" => summary = unescape_text(value(property)),
            "DTSTART" => start = Some(parse_time(property)?),
            "DTEND" => end = Some(parse_time(property)?),
            "DURATION" => duration = Some(parse_duration(value(property))?),
            "RRULE" => rrule = Some(value(property).trim().to_string()),
            "RDATE" => rdates.extend(parse_time_list(property)?),
            "EXDATE" => exdates.extend(parse_time_list(property)?),
            "RECURRENCE-ID" => recurrence_id = Some(parse_time(property)?),
            _ => {}
        }
    }

    let start = start.ok_or(ParseError::MissingProperty {
        property: "DTSTART",
    })?;

    Ok(EventEntry {
        uid,
        summary,
        start,
        end,
        duration,
        rrule,
        rdates,
        exdates,
        recurrence_id,
    })
}

fn parse_time(property: &Property) -> Result<EventTime, ParseError> {
    parse_time_value(
        value(property),
        param(property, "TZID"),
        is_date_valued(property),
    )
}

fn parse_time_list(property: &Property) -> Result<Vec<EventTime>, ParseError> {
    let is_period =
        param(property, "VALUE").is_some_and(|value| value.eq_ignore_ascii_case("PERIOD"));

    value(property)
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| {
            // A period contributes its start; its own end is not modelled.
            let item = if is_period {
                item.split('/').next().unwrap_or(item)
            } else {
                item
            };
            parse_time_value(item, param(property, "TZID"), is_date_valued(property))
        })
        .collect()
}

pub fn parse_time_value(
    value: &str,
    tzid: Option<&str>,
    date_valued: bool,
) -> Result<EventTime, ParseError> {
    let value = value.trim();
    let invalid = || ParseError::InvalidDateTime {
        value: value.to_string(),
    };

    if date_valued || (value.len() == 8 && !value.contains('T')) {
        return NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(EventTime::Date)
            .map_err(|_| invalid());
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, DATE_TIME_FORMAT).map_err(|_| invalid())?;
        return Ok(EventTime::Utc(naive.and_utc()));
    }

    let naive = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).map_err(|_| invalid())?;

    // Non-IANA identifiers (e.g. Windows zone names) fall back to floating time.
    match tzid.and_then(|id| id.trim_start_matches('/').parse::<Tz>().ok()) {
        Some(tz) => Ok(EventTime::Zoned(naive, tz)),
        None => Ok(EventTime::Floating(naive)),
    }
}

pub fn parse_duration(value: &str) -> Result<Duration, ParseError> {
    let text = value.trim();
    let invalid = || ParseError::InvalidDuration {
        value: text.to_string(),
    };

    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let rest = rest.strip_prefix('P').ok_or_else(invalid)?;

    let mut seconds: i64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_unit = false;

    for ch in rest.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            'T' if !in_time && digits.is_empty() => in_time = true,
            'W' | 'D' | 'H' | 'M' | 'S' => {
                let amount: i64 = digits.parse().map_err(|_| invalid())?;
                digits.clear();
                let unit = match (ch, in_time) {
                    ('W', false) => 604_800,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return Err(invalid()),
                };
                seconds = amount
                    .checked_mul(unit)
                    .and_then(|part| seconds.checked_add(part))
                    .ok_or_else(invalid)?;
                saw_unit = true;
            }
            _ => return Err(invalid()),
        }
    }

    if !digits.is_empty() || !saw_unit {
        return Err(invalid());
    }

    Duration::try_seconds(if negative { -seconds } else { seconds }).ok_or_else(invalid)
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> EventTime {
        EventTime::Utc(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn parses_single_event() {
        let raw = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:wake-1\r\n\
                   SUMMARY:Wake up\\, sleepyhead\r\n\
                   DTSTART:20260105T063000Z\r\n\
                   DTEND:20260105T064500Z\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";

        let calendar = parse(raw.as_bytes()).unwrap();

        assert_eq!(calendar.events.len(), 1);
        let event = &calendar.events[0];
        assert_eq!(event.uid.as_deref(), Some("wake-1"));
        assert_eq!(event.summary, "Wake up, sleepyhead");
        assert_eq!(event.start, utc(2026, 1, 5, 6, 30, 0));
        assert_eq!(event.end, Some(utc(2026, 1, 5, 6, 45, 0)));
        assert_eq!(event.rrule, None);
    }

    #[test]
    fn unfolds_continuation_lines_and_quoted_params() {
        let raw = "BEGIN:VCALENDAR\n\
                   BEGIN:VEVENT\n\
                   SUMMARY:Long su\n mmary\n\
                   DTSTART;TZID=\"Europe/Berlin\";X-NOTE=\"a:b;c\":20260105T070000\n\
                   DURATION:PT30M\n\
                   RRULE:FREQ=DAILY;\n COUNT=3\n\
                   END:VEVENT\n\
                   END:VCALENDAR\n";

        let event = parse(raw.as_bytes()).unwrap().events.remove(0);

        assert_eq!(event.summary, "Long summary");
        assert_eq!(
            event.start,
            EventTime::Zoned(naive(2026, 1, 5, 7, 0), chrono_tz::Europe::Berlin)
        );
        assert_eq!(event.duration, Some(Duration::minutes(30)));
        assert_eq!(event.rrule.as_deref(), Some("FREQ=DAILY;COUNT=3"));
    }

    #[test]
    fn nested_alarm_properties_do_not_leak_into_event() {
        let raw = "BEGIN:VCALENDAR\n\
                   BEGIN:VEVENT\n\
                   SUMMARY:Shake\n\
                   DTSTART;VALUE=DATE:20260105\n\
                   BEGIN:VALARM\n\
                   SUMMARY:Reminder\n\
                   TRIGGER:-PT15M\n\
                   END:VALARM\n\
                   END:VEVENT\n\
                   END:VCALENDAR\n";

        let event = parse(raw.as_bytes()).unwrap().events.remove(0);

        assert_eq!(event.summary, "Shake");
        assert_eq!(
            event.start,
            EventTime::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
        );
        assert!(event.start.is_date());
    }

    #[test]
    fn collects_exdates_rdates_and_recurrence_id() {
        let raw = "BEGIN:VCALENDAR\n\
                   BEGIN:VEVENT\n\
                   UID:r\n\
                   DTSTART:20260105T060000\n\
                   RRULE:FREQ=DAILY\n\
                   EXDATE:20260106T060000,20260107T060000\n\
                   RDATE;VALUE=PERIOD:20260110T090000Z/PT1H\n\
                   END:VEVENT\n\
                   BEGIN:VEVENT\n\
                   UID:r\n\
                   RECURRENCE-ID:20260108T060000\n\
                   DTSTART:20260108T080000\n\
                   END:VEVENT\n\
                   END:VCALENDAR\n";

        let calendar = parse(raw.as_bytes()).unwrap();

        assert_eq!(calendar.events.len(), 2);
        assert_eq!(
            calendar.events[0].exdates,
            vec![
                EventTime::Floating(naive(2026, 1, 6, 6, 0)),
                EventTime::Floating(naive(2026, 1, 7, 6, 0)),
            ]
        );
        assert_eq!(calendar.events[0].rdates, vec![utc(2026, 1, 10, 9, 0, 0)]);
        assert_eq!(
            calendar.events[1].recurrence_id,
            Some(EventTime::Floating(naive(2026, 1, 8, 6, 0)))
        );
    }

    #[test]
    fn unknown_tzid_falls_back_to_floating() {
        let time =
            parse_time_value("20260105T070000", Some("W. Europe Standard Time"), false).unwrap();
        assert_eq!(time, EventTime::Floating(naive(2026, 1, 5, 7, 0)));
    }

    #[test]
    fn empty_calendar_has_no_events() {
        let calendar = parse(b"BEGIN:VCALENDAR\nVERSION:2.0\nEND:VCALENDAR\n").unwrap();
        assert_eq!(calendar, Calendar::default());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert_eq!(parse(b""), Err(ParseError::MissingCalendar));
        assert_eq!(parse(&[0xff, 0xfe, 0x00]), Err(ParseError::Encoding));
        assert_eq!(
            parse(b"<!doctype html>\n<html></html>\n"),
            Err(ParseError::MissingCalendar)
        );
        assert_eq!(
            parse(b"BEGIN:VEVENT\nEND:VEVENT\n"),
            Err(ParseError::MissingCalendar)
        );
        assert!(matches!(
            parse(b"BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20260105T060000Z\nEND:VEVENT\n"),
            Err(ParseError::Unbalanced { .. })
        ));
        assert!(parse(
            b"BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20260105T060000Z\nEND:VCALENDAR\n"
        )
        .is_err());
        assert_eq!(
            parse(b"BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:x\nEND:VEVENT\nEND:VCALENDAR\n"),
            Err(ParseError::MissingProperty {
                property: "DTSTART"
            })
        );
        assert_eq!(
            parse(b"BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:tomorrow\nEND:VEVENT\nEND:VCALENDAR\n"),
            Err(ParseError::InvalidDateTime {
                value: "tomorrow".to_string()
            })
        );
    }

    #[test]
    fn line_without_value_separator_is_malformed() {
        let raw = b"BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20260105T060000Z\n\
                    this line has no separator\nEND:VEVENT\nEND:VCALENDAR\n";

        assert!(matches!(parse(raw), Err(ParseError::MalformedLine { .. })));
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("PT1H30M").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("P1W").unwrap(), Duration::days(7));
        assert_eq!(parse_duration("P1DT2S").unwrap(), Duration::seconds(86_402));
        assert_eq!(parse_duration("-PT15M").unwrap(), Duration::minutes(-15));
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("P1H").is_err());
        assert!(parse_duration("1H").is_err());
        assert!(parse_duration("PT5").is_err());
    }
}
