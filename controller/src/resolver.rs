use alarmclock_common::{
    ics, recurrence, AlarmTiming, Fingerprint, OccurrenceSet, Window,
};
use chrono::{DateTime, Utc};
use rrule::Tz as RuleTz;
use tracing::debug;

use crate::{clock::Clock, error::AlarmError, fetch::CalendarFetcher, shutdown::Shutdown};

/// Turns the remote calendar into the occurrence set for the next window.
#[derive(Debug)]
pub struct Resolver<F, C> {
    fetcher: F,
    url: String,
    clock: C,
    timing: AlarmTiming,
    zone: RuleTz,
}

impl<F, C> Resolver<F, C>
where
    F: CalendarFetcher,
    C: Clock,
{
    pub fn new(fetcher: F, url: String, clock: C, timing: AlarmTiming, zone: RuleTz) -> Self {
        Self {
            fetcher,
            url,
            clock,
            timing,
            zone,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timing(&self) -> &AlarmTiming {
        &self.timing
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// One fetch, parse and expansion pass. The result may be empty.
    pub async fn resolve_once(&self) -> Result<OccurrenceSet, AlarmError> {
        let window = Window::forward(self.clock.now(), self.timing.window_days);
        let source = self.fetcher.fetch(&self.url).await?;
        let calendar = ics::parse(&source.body)?;
        let occurrences = recurrence::expand(&calendar, &window, &self.zone)?;

        debug!(
            url = %source.url,
            status = source.status,
            entries = calendar.events.len(),
            occurrences = occurrences.len(),
            "calendar resolved"
        );
        Ok(occurrences)
    }

    /// Polls until the calendar yields at least one occurrence.
    pub async fn resolve(
        &self,
        shutdown: &Shutdown,
    ) -> Result<(OccurrenceSet, Fingerprint), AlarmError> {
        loop {
            let occurrences = self.resolve_once().await?;
            if !occurrences.is_empty() {
                let fingerprint = occurrences.fingerprint();
                return Ok((occurrences, fingerprint));
            }

            debug!(
                url = %self.url,
                retry_in_ms = self.timing.empty_poll_interval_ms,
                "calendar has no upcoming alarms"
            );
            shutdown.sleep(self.timing.empty_poll_interval()).await?;
        }
    }
}
