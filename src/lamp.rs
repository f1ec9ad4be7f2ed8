//! The lamp context
//!
//! Owns the store, the persistence layer, the save scheduler and the deferred
//! command queue, and drives them from a single loop through [`Lamp::tick`].
//! Nothing here blocks or sleeps; time is always passed in.
//!
//! A flush spans three ticks:
//!
//! ```text
//! due -> commit settings -> commit effects -> clear busy + replay queue
//! ```
//!
//! Commands that arrive between those ticks are queued and replayed in order.

use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::button::{ButtonController, ButtonGesture};
use crate::command::{self, Outcome};
use crate::config::ConfigStore;
use crate::constants::timing;
use crate::effects::{Effect, EffectRegistry, RegistryError};
use crate::mqtt::{self, Topics};
use crate::persistence::{Domain, LoadOutcome, PersistError, Persistence, Storage};
use crate::platform::{self, Platform};
use crate::queue::{CommandOrigin, CommandQueue};
use crate::scheduler::SaveScheduler;
use crate::tasks::TaskQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LampOptions {
    /// Quiescence window before a flush
    pub save_interval: Duration,
    /// Coalescing delay for outbound state notifications
    pub notify_delay: Duration,
}

impl Default for LampOptions {
    fn default() -> Self {
        Self {
            save_interval: Duration::from_millis(timing::SAVE_INTERVAL_MS),
            notify_delay: Duration::from_millis(timing::NOTIFY_DELAY_MS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{domain} storage is unusable, restart requested: {source}")]
    RestartRequested {
        domain: Domain,
        #[source]
        source: PersistError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What happened to a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Applied,
    Ignored,
    /// Held until the in-flight flush completes
    Deferred,
    /// Malformed payload, discarded
    Dropped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LampStats {
    pub mutations: u64,
    pub deferred: u64,
    pub dropped: u64,
    pub flushes: u64,
    pub failed_commits: u64,
    pub notifications: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    PublishState,
    Heartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushStep {
    Settings,
    Effects,
    Replay,
}

pub struct Lamp<S, P> {
    store: ConfigStore,
    persistence: Persistence<S>,
    scheduler: SaveScheduler,
    queue: CommandQueue,
    tasks: TaskQueue<Task>,
    flush_step: Option<FlushStep>,
    button: ButtonController,
    platform: P,
    options: LampOptions,
    stats: LampStats,
}

impl<S: Storage, P: Platform> Lamp<S, P> {
    /// Load both domains and build the running context
    ///
    /// A missing store is initialized from defaults. A store that cannot be
    /// read or parsed is repaired from its primary copy, a restart is
    /// requested from the platform, and no lamp is returned.
    pub fn initialize(
        storage: S,
        mut platform: P,
        effects: Vec<Effect>,
        options: LampOptions,
        now: Instant,
    ) -> Result<Self, StartupError> {
        let registry = EffectRegistry::new(effects)?;
        let mut store = ConfigStore::new(platform::unique_id(platform.hardware_id()), registry);
        let persistence = Persistence::new(storage);

        let settings = persistence.load(Domain::Settings, &store.settings_document());
        if let Some(doc) = Self::loaded(Domain::Settings, settings, &mut platform)? {
            store.decode_settings(&doc);
        }
        let effects = persistence.load(Domain::Effects, &store.effects_document());
        if let Some(doc) = Self::loaded(Domain::Effects, effects, &mut platform)? {
            store.decode_effects(&doc);
        }
        store.restore_active_effect();

        info!(
            unique_id = %store.mqtt.unique_id,
            effect = %store.active_effect().name(),
            working = store.general.working_on,
            "Lamp initialized"
        );

        let mut lamp = Self {
            store,
            persistence,
            scheduler: SaveScheduler::new(options.save_interval),
            queue: CommandQueue::new(),
            tasks: TaskQueue::new(),
            flush_step: None,
            button: ButtonController::new(),
            platform,
            options,
            stats: LampStats::default(),
        };
        lamp.schedule_heartbeat(now);
        Ok(lamp)
    }

    fn loaded(
        domain: Domain,
        result: Result<LoadOutcome, PersistError>,
        platform: &mut P,
    ) -> Result<Option<serde_json::Value>, StartupError> {
        match result {
            Ok(LoadOutcome::Loaded(doc)) => Ok(Some(doc)),
            Ok(LoadOutcome::FirstBoot) => {
                info!(domain = %domain, "First boot, wrote defaults");
                Ok(None)
            }
            Err(source) => {
                error!(domain = %domain, error = %source, "Stored document unusable");
                platform.request_restart();
                Err(StartupError::RestartRequested { domain, source })
            }
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn storage(&self) -> &S {
        self.persistence.storage()
    }

    pub fn stats(&self) -> &LampStats {
        &self.stats
    }

    pub fn is_busy(&self) -> bool {
        self.scheduler.is_busy()
    }

    pub fn is_dirty(&self) -> bool {
        self.scheduler.is_dirty()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn topics(&self) -> Topics {
        Topics::new(&self.store.mqtt.unique_id)
    }

    // ==========================================================================
    // Inbound
    // ==========================================================================

    /// Apply a command now, or hold it if a flush is in flight
    pub fn submit(&mut self, origin: CommandOrigin, payload: &str, now: Instant) -> Submission {
        if self.scheduler.is_busy() {
            let sequence = self.queue.push(origin, payload);
            self.stats.deferred += 1;
            debug!(origin = %origin, sequence = sequence, "Busy, command deferred");
            return Submission::Deferred;
        }
        self.process(origin, payload, now)
    }

    fn process(&mut self, origin: CommandOrigin, payload: &str, now: Instant) -> Submission {
        match command::apply(&mut self.store, origin, payload) {
            Ok(Outcome::Applied) => {
                self.changed(now);
                Submission::Applied
            }
            Ok(Outcome::Ignored) => Submission::Ignored,
            Err(e) => {
                warn!(origin = %origin, error = %e, "Dropping command");
                self.stats.dropped += 1;
                Submission::Dropped
            }
        }
    }

    /// Returns true when the gesture changed the store
    pub fn handle_button(&mut self, gesture: ButtonGesture, now: Instant) -> bool {
        if !self.store.button.is_fitted() {
            debug!(gesture = %gesture, "No button fitted, ignoring");
            return false;
        }
        if self.scheduler.is_busy() {
            debug!(gesture = %gesture, "Busy, ignoring button");
            return false;
        }
        let changed = self.button.handle(&mut self.store, gesture);
        if changed {
            self.changed(now);
        }
        changed
    }

    fn changed(&mut self, now: Instant) {
        self.stats.mutations += 1;
        self.scheduler.mark_dirty(now);
        self.tasks.schedule(Task::PublishState, now + self.options.notify_delay);
    }

    // ==========================================================================
    // Loop
    // ==========================================================================

    pub fn tick(&mut self, now: Instant) {
        for task in self.tasks.poll(now) {
            match task {
                Task::PublishState => self.publish_state(),
                Task::Heartbeat => {
                    self.heartbeat();
                    self.schedule_heartbeat(now);
                }
            }
        }

        match self.flush_step {
            Some(step) => self.run_flush_step(step, now),
            None => {
                if self.scheduler.begin_flush(now) {
                    self.run_flush_step(FlushStep::Settings, now);
                }
            }
        }
    }

    /// Run any pending or in-flight flush to completion without waiting
    pub fn flush_pending(&mut self, now: Instant) {
        // A replayed command can dirty the store again; one more pass covers it
        for _ in 0..2 {
            if self.flush_step.is_none() && !self.scheduler.begin_flush_now() {
                return;
            }
            let mut step = self.flush_step.unwrap_or(FlushStep::Settings);
            loop {
                self.run_flush_step(step, now);
                match self.flush_step {
                    Some(next) => step = next,
                    None => break,
                }
            }
        }
    }

    fn run_flush_step(&mut self, step: FlushStep, now: Instant) {
        match step {
            FlushStep::Settings => {
                self.commit(Domain::Settings, now);
                self.flush_step = Some(FlushStep::Effects);
            }
            FlushStep::Effects => {
                self.commit(Domain::Effects, now);
                self.flush_step = Some(FlushStep::Replay);
            }
            FlushStep::Replay => {
                self.flush_step = None;
                self.scheduler.end_flush();
                self.stats.flushes += 1;
                for pending in self.queue.drain() {
                    debug!(origin = %pending.origin, sequence = pending.sequence, "Replaying deferred command");
                    self.process(pending.origin, &pending.payload, now);
                }
            }
        }
    }

    fn commit(&mut self, domain: Domain, now: Instant) {
        let result = match domain {
            Domain::Settings => self.persistence.commit(domain, &self.store.settings_document()),
            Domain::Effects => self.persistence.commit(domain, &self.store.effects_document()),
        };
        if let Err(e) = result {
            warn!(domain = %domain, error = %e, transient = e.is_transient(), "Commit failed, will retry");
            self.stats.failed_commits += 1;
            self.scheduler.mark_dirty(now);
        }
    }

    // ==========================================================================
    // Outbound
    // ==========================================================================

    /// Discovery, current state and availability, as sent on a fresh connection
    pub fn announce(&mut self) {
        let topics = self.topics();
        let discovery = mqtt::discovery_document(&self.store, &topics);
        self.platform.publish(&topics.config, &discovery);
        self.publish_state();
        self.platform
            .publish(&topics.available, &serde_json::Value::from("true"));
    }

    fn publish_state(&mut self) {
        let doc = self.store.state_document(&self.platform.network());
        let topics = self.topics();
        self.platform.publish(&topics.state, &doc);
        self.platform.push_web(&doc);
        self.stats.notifications += 1;
    }

    fn schedule_heartbeat(&mut self, now: Instant) {
        let interval = self.store.general.log_interval_ms;
        if interval > 0 {
            self.tasks
                .schedule(Task::Heartbeat, now + Duration::from_millis(u64::from(interval)));
        }
    }

    fn heartbeat(&self) {
        info!(
            working = self.store.general.working_on,
            effect = %self.store.active_effect().name(),
            dirty = self.scheduler.is_dirty(),
            busy = self.scheduler.is_busy(),
            queued = self.queue.len(),
            mutations = self.stats.mutations,
            flushes = self.stats.flushes,
            failed_commits = self.stats.failed_commits,
            "Heartbeat"
        );
    }
}
