use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::command::CommandKind;
use super::epoch::CycleEpoch;
use super::scheduler::{CycleFn, Scheduler, SchedulerStats};
use crate::domain::Mode;
use crate::error::{Result, VigilError};

/// Runs one decision cycle tagged with the epoch it was started under
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self, epoch: u64);
}

/// Hooks invoked when a mode becomes active or stops being active
#[async_trait]
pub trait ModeHook: Send + Sync {
    async fn on_enter(&self, _mode: Mode) {}
    async fn on_exit(&self, _mode: Mode) {}
}

/// Published after every successful transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeEvent {
    pub from: Mode,
    pub to: Mode,
    /// Epoch in force after the transition
    pub epoch: u64,
    pub at: DateTime<Utc>,
}

#[derive(Default, Clone)]
struct ModeProfile {
    commands: Vec<CommandKind>,
    hooks: Vec<Arc<dyn ModeHook>>,
}

/// Owns the active [`Mode`] and the auto-mode scheduler.
///
/// Transitions hold the state lock for their whole duration, so hooks,
/// scheduler start/stop and the epoch bump are never interleaved with
/// another transition.
pub struct ModeController {
    mode: Mutex<Mode>,
    /// Mirror of `mode`, readable while a transition holds the lock
    current: RwLock<Mode>,
    epoch: Arc<CycleEpoch>,
    scheduler: Scheduler,
    runner: Arc<dyn CycleRunner>,
    interval: Duration,
    profiles: HashMap<Mode, ModeProfile>,
    events: broadcast::Sender<ModeEvent>,
}

impl ModeController {
    pub fn new(epoch: Arc<CycleEpoch>, runner: Arc<dyn CycleRunner>, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        let mut profiles: HashMap<Mode, ModeProfile> = HashMap::new();
        profiles.insert(Mode::Idle, ModeProfile::default());
        profiles.insert(
            Mode::Chat,
            ModeProfile {
                commands: vec![
                    CommandKind::Market,
                    CommandKind::Analyze,
                    CommandKind::Post,
                    CommandKind::Resume,
                ],
                hooks: Vec::new(),
            },
        );
        profiles.insert(
            Mode::Auto,
            ModeProfile {
                commands: vec![CommandKind::Market, CommandKind::Analyze, CommandKind::Pause],
                hooks: Vec::new(),
            },
        );

        Self {
            mode: Mutex::new(Mode::Idle),
            current: RwLock::new(Mode::Idle),
            epoch,
            scheduler: Scheduler::new(),
            runner,
            interval,
            profiles,
            events,
        }
    }

    /// Register enter/exit hooks for `mode`
    pub fn with_hook(mut self, mode: Mode, hook: Arc<dyn ModeHook>) -> Self {
        self.profiles.entry(mode).or_default().hooks.push(hook);
        self
    }

    /// Replace the command set exposed in `mode`
    pub fn with_commands(mut self, mode: Mode, commands: Vec<CommandKind>) -> Self {
        self.profiles.entry(mode).or_default().commands = commands;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModeEvent> {
        self.events.subscribe()
    }

    pub async fn mode(&self) -> Mode {
        *self.current.read().await
    }

    pub async fn epoch(&self) -> u64 {
        self.epoch.current().await
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn commands(&self, mode: Mode) -> &[CommandKind] {
        self.profiles
            .get(&mode)
            .map(|p| p.commands.as_slice())
            .unwrap_or(&[])
    }

    /// Capability lookup against the active mode
    pub async fn supports(&self, command: CommandKind) -> bool {
        let mode = self.mode().await;
        self.commands(mode).contains(&command)
    }

    pub async fn enter_chat(&self) -> Result<ModeEvent> {
        self.transition(Mode::Chat).await
    }

    pub async fn enter_auto(&self) -> Result<ModeEvent> {
        self.transition(Mode::Auto).await
    }

    pub async fn stop(&self) -> Result<ModeEvent> {
        self.transition(Mode::Idle).await
    }

    async fn transition(&self, to: Mode) -> Result<ModeEvent> {
        let mut mode = self.mode.lock().await;
        let from = *mode;

        if !from.can_transition_to(to) {
            warn!(%from, %to, "Rejected mode transition");
            return Err(VigilError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.run_hooks(from, false).await;

        if from == Mode::Auto {
            self.scheduler.stop().await;
        }

        // Any move into or out of Auto, and every stop, invalidates in-flight cycles
        let epoch = if from == Mode::Auto || to == Mode::Auto || to == Mode::Idle {
            self.epoch.advance().await
        } else {
            self.epoch.current().await
        };

        *mode = to;
        *self.current.write().await = to;

        if to == Mode::Auto {
            let runner = self.runner.clone();
            let cycle_fn: CycleFn = Arc::new(move || {
                let runner = runner.clone();
                async move { runner.run_cycle(epoch).await }.boxed()
            });
            self.scheduler.start(self.interval, cycle_fn).await;
        }

        self.run_hooks(to, true).await;

        let event = ModeEvent {
            from,
            to,
            epoch,
            at: Utc::now(),
        };
        info!(%from, %to, epoch, "Mode transition");
        // No subscribers is fine
        let _ = self.events.send(event.clone());
        Ok(event)
    }

    async fn run_hooks(&self, mode: Mode, entering: bool) {
        let Some(profile) = self.profiles.get(&mode) else {
            return;
        };
        for hook in &profile.hooks {
            if entering {
                hook.on_enter(mode).await;
            } else {
                hook.on_exit(mode).await;
            }
        }
        debug!(%mode, entering, hooks = profile.hooks.len(), "Mode hooks ran");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CountingRunner {
        epochs: StdMutex<Vec<u64>>,
    }

    #[async_trait]
    impl CycleRunner for CountingRunner {
        async fn run_cycle(&self, epoch: u64) {
            self.epochs.lock().unwrap().push(epoch);
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        entered: AtomicU32,
        exited: AtomicU32,
    }

    #[async_trait]
    impl ModeHook for RecordingHook {
        async fn on_enter(&self, _mode: Mode) {
            self.entered.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_exit(&self, _mode: Mode) {
            self.exited.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn controller(runner: Arc<CountingRunner>) -> ModeController {
        ModeController::new(Arc::new(CycleEpoch::new()), runner, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn starts_idle_and_rejects_invalid_transitions() {
        let controller = controller(Arc::new(CountingRunner::default()));
        assert_eq!(controller.mode().await, Mode::Idle);

        controller.enter_chat().await.unwrap();
        let err = controller.enter_chat().await.unwrap_err();
        assert!(matches!(err, VigilError::InvalidStateTransition { .. }));
        assert_eq!(controller.mode().await, Mode::Chat);
    }

    #[tokio::test(start_paused = true)]
    async fn epoch_moves_on_every_auto_boundary() {
        let runner = Arc::new(CountingRunner::default());
        let controller = controller(runner.clone());

        let chat = controller.enter_chat().await.unwrap();
        assert_eq!(chat.epoch, 0);

        let auto = controller.enter_auto().await.unwrap();
        assert_eq!(auto.epoch, 1);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(runner.epochs.lock().unwrap().as_slice(), [1]);

        let paused = controller.enter_chat().await.unwrap();
        assert_eq!(paused.epoch, 2);

        let stopped = controller.stop().await.unwrap();
        assert_eq!(stopped.epoch, 3);
        assert_eq!(controller.mode().await, Mode::Idle);
    }

    #[tokio::test]
    async fn command_sets_follow_mode() {
        let controller = controller(Arc::new(CountingRunner::default()));
        assert!(!controller.supports(CommandKind::Market).await);

        controller.enter_chat().await.unwrap();
        assert!(controller.supports(CommandKind::Resume).await);
        assert!(!controller.supports(CommandKind::Pause).await);
    }

    #[tokio::test]
    async fn hooks_and_events_fire() {
        let hook = Arc::new(RecordingHook::default());
        let controller = controller(Arc::new(CountingRunner::default()))
            .with_hook(Mode::Chat, hook.clone());
        let mut events = controller.subscribe();

        controller.enter_chat().await.unwrap();
        controller.stop().await.unwrap();

        assert_eq!(hook.entered.load(Ordering::SeqCst), 1);
        assert_eq!(hook.exited.load(Ordering::SeqCst), 1);

        let first = events.recv().await.unwrap();
        assert_eq!((first.from, first.to), (Mode::Idle, Mode::Chat));
        let second = events.recv().await.unwrap();
        assert_eq!((second.from, second.to), (Mode::Chat, Mode::Idle));
    }
}
