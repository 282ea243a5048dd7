//! Human-readable descriptions of upcoming and running alarms.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::occurrence::{Occurrence, OccurrenceSet};

pub fn describe(occurrence: &Occurrence, now: DateTime<Utc>) -> String {
    let start = occurrence.start.to_rfc3339_opts(SecondsFormat::Secs, true);
    let length = humanize(occurrence.duration());

    if occurrence.start < now {
        format!(
            "Alarm[{}] has been active since {start} | duration {length} | ends: {}",
            occurrence.summary,
            relative(occurrence.end - now),
        )
    } else {
        format!(
            "Alarm[{}] starts at {start} ({}) | duration {length}",
            occurrence.summary,
            relative(occurrence.start - now),
        )
    }
}

pub fn describe_all(occurrences: &OccurrenceSet, now: DateTime<Utc>) -> Vec<String> {
    occurrences
        .iter()
        .map(|occurrence| describe(occurrence, now))
        .collect()
}

fn relative(delta: Duration) -> String {
    if delta < Duration::zero() {
        format!("{} ago", humanize(-delta))
    } else {
        format!("in {}", humanize(delta))
    }
}

/// Spells a span out to the second, e.g. "1 day, 2 hours and 5 seconds".
/// Negative spans are shown by magnitude with a leading minus.
pub fn humanize(span: Duration) -> String {
    if span < Duration::zero() {
        return format!("-{}", humanize(-span));
    }

    let total = span.num_seconds();
    let units = [
        (total / 86_400, "day"),
        (total % 86_400 / 3_600, "hour"),
        (total % 3_600 / 60, "minute"),
        (total % 60, "second"),
    ];

    let parts: Vec<String> = units
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|&(count, unit)| {
            if count == 1 {
                format!("{count} {unit}")
            } else {
                format!("{count} {unit}s")
            }
        })
        .collect();

    match parts.split_last() {
        None => "0 seconds".to_string(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {last}", rest.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, hour, minute, 0).unwrap()
    }

    #[test]
    fn humanize_joins_non_zero_units() {
        assert_eq!(humanize(Duration::seconds(93_605)), "1 day, 2 hours and 5 seconds");
        assert_eq!(humanize(Duration::minutes(1)), "1 minute");
        assert_eq!(humanize(Duration::seconds(3_660)), "1 hour and 1 minute");
        assert_eq!(humanize(Duration::zero()), "0 seconds");
        assert_eq!(humanize(Duration::seconds(-90)), "-1 minute and 30 seconds");
    }

    #[test]
    fn upcoming_alarm_shows_start_and_countdown() {
        let occurrence = Occurrence {
            start: at(7, 0),
            end: at(7, 15),
            summary: "Wake".to_string(),
        };

        assert_eq!(
            describe(&occurrence, at(5, 30)),
            "Alarm[Wake] starts at 2026-01-05T07:00:00Z (in 1 hour and 30 minutes) | duration 15 minutes"
        );
    }

    #[test]
    fn running_alarm_shows_time_until_end() {
        let occurrence = Occurrence {
            start: at(7, 0),
            end: at(7, 15),
            summary: "Wake".to_string(),
        };

        assert_eq!(
            describe(&occurrence, at(7, 5)),
            "Alarm[Wake] has been active since 2026-01-05T07:00:00Z | duration 15 minutes | ends: in 10 minutes"
        );
    }
}
