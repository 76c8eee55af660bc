//! Autonomous agent loop
//!
//! - [`Agent`]: context object running fetch, decide, execute cycles
//! - [`ModeController`]: Idle / Chat / Auto state machine owning the scheduler
//! - [`Scheduler`]: non-overlapping periodic driver
//! - [`CycleEpoch`]: stale-cycle suppression across mode changes

pub mod command;
pub mod controller;
pub mod context;
pub mod epoch;
pub mod ledger;
pub mod router;
pub mod scheduler;

pub use command::{Command, CommandKind, CommandOutput};
pub use controller::{CycleRunner, ModeController, ModeEvent, ModeHook};
pub use context::{Agent, CycleOutcome};
pub use epoch::CycleEpoch;
pub use ledger::{CycleLedger, CycleRecord, CycleStats};
pub use router::CommandRouter;
pub use scheduler::{CycleFn, Scheduler, SchedulerStats};
