use std::time::Duration;

use alarmclock_common::{summary, AlarmAction, AlarmEngine, AlarmState, Presence};
use tracing::{debug, info};

use crate::{
    actuator::{self, Actuator},
    clock::Clock,
    error::AlarmError,
    fetch::CalendarFetcher,
    resolver::Resolver,
    shutdown::Shutdown,
};

/// Owns the alarm engine and the actuator, and runs one engine tick per step.
pub struct AlarmController<F, C, A> {
    resolver: Resolver<F, C>,
    engine: AlarmEngine,
    actuator: A,
    shutdown: Shutdown,
}

impl<F, C, A> AlarmController<F, C, A>
where
    F: CalendarFetcher,
    C: Clock,
    A: Actuator,
{
    /// Resolves the calendar once and shows the initial summary.
    pub async fn start(
        resolver: Resolver<F, C>,
        actuator: A,
        shutdown: Shutdown,
    ) -> Result<Self, AlarmError> {
        let (occurrences, fingerprint) = resolver.resolve(&shutdown).await?;
        info!(
            url = resolver.url(),
            occurrences = occurrences.len(),
            %fingerprint,
            "calendar loaded"
        );

        let engine = AlarmEngine::new(
            resolver.timing().clone(),
            occurrences,
            fingerprint,
            resolver.now(),
        );
        let controller = Self {
            resolver,
            engine,
            actuator,
            shutdown,
        };
        controller.show_summary();
        Ok(controller)
    }

    pub fn state(&self) -> AlarmState {
        self.engine.state()
    }

    #[cfg(test)]
    pub fn engine(&self) -> &AlarmEngine {
        &self.engine
    }

    #[cfg(test)]
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    #[cfg(test)]
    pub fn resolver(&self) -> &Resolver<F, C> {
        &self.resolver
    }

    /// Runs until shutdown or a fatal resolver error. The relay is always
    /// left de-energized.
    pub async fn run(mut self) -> Result<(), AlarmError> {
        let err = loop {
            if let Err(err) = self.step().await {
                break err;
            }
        };
        self.actuator.de_energize();
        debug!(energized = self.actuator.is_energized(), "relay released");

        match err {
            AlarmError::Interrupted => {
                info!(state = self.state().as_str(), "alarm loop stopped");
                Ok(())
            }
            err => Err(err),
        }
    }

    pub async fn step(&mut self) -> Result<(), AlarmError> {
        if self.engine.refresh_due(self.resolver.now()) {
            self.refresh(true).await?;
        }

        let presence = if self.engine.wants_presence() {
            actuator::presence(&self.actuator)
        } else {
            Presence::Unmonitored
        };

        let now = self.resolver.now();
        let previous = self.engine.state();
        let actions = self.engine.tick(now, presence);

        match (previous, self.engine.state()) {
            (AlarmState::Idle, AlarmState::Active) => {
                let title = self
                    .engine
                    .occurrences()
                    .active_at(now)
                    .map(|occurrence| occurrence.summary.as_str())
                    .unwrap_or_default();
                info!(title, "alarm started");
            }
            (AlarmState::Active, AlarmState::Idle) => info!("alarm ended"),
            _ => {}
        }

        self.execute(actions).await
    }

    async fn execute(&mut self, actions: Vec<AlarmAction>) -> Result<(), AlarmError> {
        for action in actions {
            match action {
                AlarmAction::ShowSummary => self.show_summary(),
                AlarmAction::Pulse(ms) => {
                    debug!(ms, "shaking");
                    actuator::pulse(&mut self.actuator, Duration::from_millis(ms), &self.shutdown)
                        .await?;
                }
                AlarmAction::Delay(ms) => {
                    self.shutdown.sleep(Duration::from_millis(ms)).await?;
                }
                AlarmAction::Refresh => self.refresh(false).await?,
            }
        }
        Ok(())
    }

    /// Installs a freshly resolved set. Periodic refreshes announce changes;
    /// the post-alarm refresh is followed by a summary anyway.
    async fn refresh(&mut self, announce_changes: bool) -> Result<(), AlarmError> {
        let (occurrences, fingerprint) = self.resolver.resolve(&self.shutdown).await?;
        let changed = self
            .engine
            .install(occurrences, fingerprint, self.resolver.now());
        debug!(%fingerprint, changed, "calendar refreshed");

        if changed && announce_changes {
            info!("calendar changed");
            self.show_summary();
        }
        Ok(())
    }

    fn show_summary(&self) {
        let now = self.resolver.now();
        for line in summary::describe_all(self.engine.occurrences(), now) {
            info!("{line}");
        }
    }
}
