//! Expansion of parsed calendar entries into concrete occurrences.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rrule::{RRule, Tz as RuleTz, Unvalidated};

use crate::{
    error::ParseError,
    ics::{Calendar, EventEntry, EventTime},
    occurrence::{Occurrence, OccurrenceSet, Window},
};

const MAX_INSTANCES_PER_ENTRY: u16 = u16::MAX;

/// Zone used for floating and all-day values when no zone is configured.
pub fn system_zone() -> RuleTz {
    RuleTz::Local(chrono::Local)
}

pub fn zone_from(timezone: Option<chrono_tz::Tz>) -> RuleTz {
    timezone.map(RuleTz::Tz).unwrap_or_else(system_zone)
}

pub fn expand(
    calendar: &Calendar,
    window: &Window,
    zone: &RuleTz,
) -> Result<OccurrenceSet, ParseError> {
    let mut overridden: HashSet<(&str, DateTime<Utc>)> = HashSet::new();
    for event in &calendar.events {
        if let (Some(uid), Some(recurrence_id)) = (event.uid.as_deref(), &event.recurrence_id) {
            overridden.insert((uid, localize(recurrence_id, zone)?.with_timezone(&Utc)));
        }
    }

    let mut occurrences = Vec::new();

    for event in &calendar.events {
        let start = localize(&event.start, zone)?;
        let length = event_length(event, &start, zone)?;

        // Modified instances stand on their own; the instance they replace is skipped below.
        if event.recurrence_id.is_some() {
            let occurrence = build_occurrence(event, &start, length);
            if window.admits(&occurrence) {
                occurrences.push(occurrence);
            }
            continue;
        }

        for instance in instance_starts(event, start, length, window, zone)? {
            let instance_utc = instance.with_timezone(&Utc);
            if event
                .uid
                .as_deref()
                .is_some_and(|uid| overridden.contains(&(uid, instance_utc)))
            {
                continue;
            }

            let occurrence = build_occurrence(event, &instance, length);
            if window.admits(&occurrence) {
                occurrences.push(occurrence);
            }
        }
    }

    Ok(OccurrenceSet::new(occurrences))
}

fn build_occurrence(event: &EventEntry, start: &DateTime<RuleTz>, length: Duration) -> Occurrence {
    let start = start.with_timezone(&Utc);
    Occurrence {
        start,
        end: start + length,
        summary: event.summary.clone(),
    }
}

fn instance_starts(
    event: &EventEntry,
    start: DateTime<RuleTz>,
    length: Duration,
    window: &Window,
    zone: &RuleTz,
) -> Result<Vec<DateTime<RuleTz>>, ParseError> {
    let rdates = event
        .rdates
        .iter()
        .map(|time| localize(time, zone))
        .collect::<Result<Vec<_>, _>>()?;
    let exdates = event
        .exdates
        .iter()
        .map(|time| localize(time, zone).map(|instant| instant.with_timezone(&Utc)))
        .collect::<Result<HashSet<_>, _>>()?;

    let Some(rule) = event.rrule.as_deref() else {
        let mut starts = vec![start];
        starts.extend(rdates);
        starts.retain(|instance| !exdates.contains(&instance.with_timezone(&Utc)));
        return Ok(starts);
    };

    let rule = rule
        .parse::<RRule<Unvalidated>>()
        .map_err(|err| ParseError::Recurrence {
            reason: err.to_string(),
        })?;
    let rule = anchor_until(rule, &start)?;
    let mut set = rule
        .build(start)
        .map_err(|err| ParseError::Recurrence {
            reason: err.to_string(),
        })?;
    for rdate in rdates {
        set = set.rdate(rdate);
    }

    // Widen the lower bound so instances that began before the window but
    // are still running are found.
    let lower = (window.start - length.max(Duration::zero())).with_timezone(zone);
    let upper = window.end.with_timezone(zone);
    let mut starts = set.after(lower).before(upper).all(MAX_INSTANCES_PER_ENTRY).dates;
    starts.retain(|instance| !exdates.contains(&instance.with_timezone(&Utc)));

    Ok(starts)
}

/// A date or floating `UNTIL` is read in the zone of `DTSTART` and pinned to
/// UTC, which is the only form accepted next to a zoned `DTSTART`.
fn anchor_until(
    rule: RRule<Unvalidated>,
    start: &DateTime<RuleTz>,
) -> Result<RRule<Unvalidated>, ParseError> {
    let start_zone = start.timezone();
    if matches!(start_zone, RuleTz::Local(_)) {
        return Ok(rule);
    }

    let Some(until) = rule.get_until() else {
        return Ok(rule);
    };
    if !matches!(until.timezone(), RuleTz::Local(_)) {
        return Ok(rule);
    }

    let local = until.naive_local();
    let anchored = from_local(&start_zone, local).ok_or_else(|| ParseError::Recurrence {
        reason: format!("UNTIL {local} falls into a daylight saving gap"),
    })?;
    Ok(rule.until(anchored.with_timezone(&RuleTz::Tz(chrono_tz::Tz::UTC))))
}

fn event_length(
    event: &EventEntry,
    start: &DateTime<RuleTz>,
    zone: &RuleTz,
) -> Result<Duration, ParseError> {
    if let Some(end) = &event.end {
        return Ok(localize(end, zone)?.signed_duration_since(start));
    }
    if let Some(duration) = event.duration {
        return Ok(duration);
    }
    if event.start.is_date() {
        return Ok(Duration::days(1));
    }
    Ok(Duration::zero())
}

pub fn localize(time: &EventTime, zone: &RuleTz) -> Result<DateTime<RuleTz>, ParseError> {
    let resolved = match *time {
        EventTime::Utc(instant) => Some(instant.with_timezone(&RuleTz::Tz(chrono_tz::Tz::UTC))),
        EventTime::Zoned(local, tz) => from_local(&RuleTz::Tz(tz), local),
        EventTime::Floating(local) => from_local(zone, local),
        EventTime::Date(day) => from_local(zone, day.and_time(NaiveTime::MIN)),
    };

    resolved.ok_or_else(|| ParseError::InvalidDateTime {
        value: format!("{time:?}"),
    })
}

/// Ambiguous local times take the earlier instant; local times inside a
/// DST gap move forward by an hour.
fn from_local(zone: &RuleTz, local: NaiveDateTime) -> Option<DateTime<RuleTz>> {
    zone.from_local_datetime(&local)
        .earliest()
        .or_else(|| zone.from_local_datetime(&(local + Duration::hours(1))).earliest())
}
