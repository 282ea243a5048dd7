use chrono::{DateTime, Utc};

use crate::{
    config::AlarmTiming,
    occurrence::{changed, Fingerprint, OccurrenceSet},
    types::AlarmState,
};

/// What the occupancy sensor reported for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// No sensor is wired; the shaker is never pulsed.
    Unmonitored,
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmAction {
    ShowSummary,
    /// Energize the relay for the given milliseconds, then de-energize.
    Pulse(u64),
    Delay(u64),
    /// Re-resolve the calendar and install the result.
    Refresh,
}

#[derive(Debug, Clone)]
pub struct AlarmEngine {
    pub timing: AlarmTiming,
    state: AlarmState,
    occurrences: OccurrenceSet,
    fingerprint: Fingerprint,
    last_refresh: DateTime<Utc>,
}

impl AlarmEngine {
    pub fn new(
        timing: AlarmTiming,
        occurrences: OccurrenceSet,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            timing,
            state: AlarmState::Idle,
            occurrences,
            fingerprint,
            last_refresh: now,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn occurrences(&self) -> &OccurrenceSet {
        &self.occurrences
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.last_refresh
    }

    /// Periodic refreshes only happen between alarms.
    pub fn refresh_due(&self, now: DateTime<Utc>) -> bool {
        if self.state != AlarmState::Idle {
            return false;
        }
        let elapsed_ms = (now - self.last_refresh).num_milliseconds();
        u64::try_from(elapsed_ms).is_ok_and(|elapsed| elapsed >= self.timing.refresh_interval_ms)
    }

    /// Replaces the occurrence set. Returns whether its fingerprint differs
    /// from the one it replaces.
    pub fn install(
        &mut self,
        occurrences: OccurrenceSet,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> bool {
        let is_changed = changed(&self.fingerprint, &fingerprint);
        self.occurrences = occurrences;
        self.fingerprint = fingerprint;
        self.last_refresh = now;
        is_changed
    }

    /// Presence is only consulted while an alarm is running.
    pub fn wants_presence(&self) -> bool {
        self.state == AlarmState::Active
    }

    pub fn tick(&mut self, now: DateTime<Utc>, presence: Presence) -> Vec<AlarmAction> {
        let mut actions = Vec::new();
        let active = self.occurrences.is_active_at(now);

        match (self.state, active) {
            (AlarmState::Idle, true) => {
                self.state = AlarmState::Active;
                actions.push(AlarmAction::ShowSummary);
            }
            (AlarmState::Idle, false) => {
                actions.push(AlarmAction::Delay(self.timing.tick_ms));
            }
            (AlarmState::Active, true) => match presence {
                Presence::Present => {
                    actions.push(AlarmAction::Pulse(self.timing.pulse_ms));
                    actions.push(AlarmAction::Delay(self.timing.pulse_pause_ms));
                }
                Presence::Absent | Presence::Unmonitored => {
                    actions.push(AlarmAction::Delay(self.timing.tick_ms));
                }
            },
            (AlarmState::Active, false) => {
                self.state = AlarmState::Idle;
                actions.push(AlarmAction::Refresh);
                actions.push(AlarmAction::ShowSummary);
                actions.push(AlarmAction::Delay(self.timing.tick_ms));
            }
        }

        actions
    }
}
