#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Soft PLC core (plant-agnostic).
//!
//! Two periodic tasks share a register surface and two bounded queues:
//!
//! - **Bridge** (`bridge::CommandTranslator`): turns external register writes
//!   into `Command`s and mirrors control-loop snapshots back into the
//!   registers.
//! - **Control loop** (`control::ControlLoop`): reads the plant, runs the
//!   regulator, publishes `OutputSnapshot`s and applies commands.
//!
//! All plant interaction goes through `softplc_traits::PlantLink`; the
//! regulator is any `softplc_traits::Regulator` (default: `pid::Pid`).
//!
//! ## Anti-feedback
//!
//! Only writes tagged `Origin::External` can produce a command. The bridge
//! mirrors with `Origin::Internal`, so its own writes never loop back.
//!
//! ## Units
//!
//! Registers carry engineering values multiplied by a fixed decimal factor
//! (`scaling::Scaling`). Plant registers are additionally scaled by the
//! plant's full-scale range.

pub mod bridge;
pub mod builder;
pub mod command;
pub mod config;
pub mod context;
pub mod control;
pub mod conversions;
pub mod error;
pub mod logger;
pub mod map;
pub mod mocks;
pub mod pid;
pub mod plant_error;
pub mod queue;
pub mod register;
pub mod scaling;
pub mod snapshot;
pub mod util;

pub use bridge::{CommandTranslator, TickReport};
pub use builder::{ControlLoopBuilder, Missing, Set};
pub use command::{Command, CommandKind};
pub use config::{BridgeCfg, ControlCfg, DEFAULT_TUNINGS, StabilityCfg};
pub use context::PlcContext;
pub use control::{ControlLoop, CycleStatus, Mode, RunState, RunSummary, StopReason};
pub use error::{BuildError, PlcError};
pub use logger::{CsvSnapshotLog, SnapshotSink};
pub use map::RegisterMap;
pub use pid::Pid;
pub use queue::{BoundedQueue, CommandQueue, DEFAULT_CAPACITY, Overflow, SnapshotQueue};
pub use register::{Bank, Origin, RegisterBanks, RegisterStore, WriteEvent};
pub use scaling::Scaling;
pub use snapshot::OutputSnapshot;
