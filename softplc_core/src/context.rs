//! Shared state handed to both periodic tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use softplc_traits::Tunings;

use crate::config::ControlCfg;
use crate::error::PlcError;
use crate::map::{co, hr};
use crate::queue::{CommandQueue, SnapshotQueue, snapshot_queue};
use crate::register::{Bank, Origin, RegisterStore};

/// Everything the bridge task and the control loop share: the register
/// store, the two queues and the shutdown flag. Cloning is cheap and every
/// clone refers to the same state.
#[derive(Debug, Clone)]
pub struct PlcContext {
    pub store: Arc<RegisterStore>,
    pub commands: CommandQueue,
    pub snapshots: SnapshotQueue,
    shutdown: Arc<AtomicBool>,
}

impl PlcContext {
    /// Queues and the write-notification feed share `capacity`.
    pub fn new(store: RegisterStore, capacity: usize) -> Self {
        Self {
            store: Arc::new(store),
            commands: CommandQueue::new(capacity),
            snapshots: snapshot_queue(capacity),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Standard register map and scaling.
    pub fn standard(capacity: usize) -> Self {
        Self::new(RegisterStore::standard(capacity), capacity)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Flag for handlers that only need to raise shutdown (e.g. ctrl-c).
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Seed the register surface so observers see the initial state before
    /// the first snapshot is mirrored.
    ///
    /// Gains are stored as positive magnitudes; `tunings` carries the
    /// regulator's (negative) sign.
    pub fn seed_registers(&self, control: &ControlCfg, tunings: Tunings) -> Result<(), PlcError> {
        let s = &self.store;
        let scaling = s.scaling();
        let seeds = [
            (hr::DEC_FACTOR, scaling.decimal_factor),
            (hr::K_P, scaling.to_register(-tunings.kp)),
            (hr::K_I, scaling.to_register(-tunings.ki)),
            (hr::K_D, scaling.to_register(-tunings.kd)),
            (hr::IN_VALVE, scaling.to_register(control.in_valve)),
            (hr::OUT_VALVE, scaling.to_register(control.out_valve)),
            (hr::SETPOINT, scaling.to_register(control.setpoint)),
        ];
        for (address, value) in seeds {
            s.write_one(Bank::Holding, address, value, Origin::Internal)?;
        }
        s.write_bit(Bank::Coil, co::AUTO_MODE, control.auto_mode, Origin::Internal)?;
        tracing::debug!(
            kp = tunings.kp,
            ki = tunings.ki,
            kd = tunings.kd,
            auto_mode = control.auto_mode,
            "register surface seeded"
        );
        Ok(())
    }

    /// Log overflow counters; called once at shutdown.
    pub fn log_drop_counters(&self) {
        tracing::info!(
            commands = self.commands.dropped(),
            snapshots = self.snapshots.dropped(),
            notifications = self.store.dropped_events(),
            "queue drop counters"
        );
    }
}
