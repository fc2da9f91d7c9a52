//! Bridge task: register writes in, control-loop state out.
//!
//! Every tick does bounded work: at most one write event is translated into
//! a [`Command`] and at most one snapshot (the newest) is mirrored back into
//! the register surface with [`Origin::Internal`].

use std::time::Duration;

use softplc_traits::clock::{Clock, MonotonicClock};

use crate::command::Command;
use crate::config::BridgeCfg;
use crate::context::PlcContext;
use crate::map::MirrorField;
use crate::register::{Origin, WriteEvent};
use crate::snapshot::OutputSnapshot;

/// What one bridge tick did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    /// Command forwarded to the control loop, if any.
    pub forwarded: Option<Command>,
    /// Snapshot mirrored into the register surface, if any.
    pub mirrored: Option<OutputSnapshot>,
}

pub struct CommandTranslator<C: Clock = MonotonicClock> {
    ctx: PlcContext,
    period: Duration,
    clock: C,
    ticks: u64,
}

impl<C: Clock> core::fmt::Debug for CommandTranslator<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandTranslator")
            .field("period", &self.period)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl CommandTranslator<MonotonicClock> {
    pub fn new(ctx: PlcContext, cfg: BridgeCfg) -> Self {
        Self::with_clock(ctx, cfg, MonotonicClock::new())
    }
}

impl<C: Clock> CommandTranslator<C> {
    pub fn with_clock(ctx: PlcContext, cfg: BridgeCfg, clock: C) -> Self {
        Self {
            ctx,
            period: cfg.tick.max(Duration::from_millis(1)),
            clock,
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One bounded bridge iteration.
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let forwarded = self.ctx.store.next_event().and_then(|ev| self.translate(ev));
        let mirrored = self.ctx.snapshots.pop_latest();
        if let Some(snap) = &mirrored {
            self.mirror(snap);
        }
        TickReport {
            forwarded,
            mirrored,
        }
    }

    /// Tick at the configured period until shutdown is requested.
    pub fn run(&mut self) {
        tracing::info!(period_ms = self.period.as_millis() as u64, "bridge started");
        while !self.ctx.is_shutdown() {
            let started = self.clock.now();
            self.tick();
            self.clock.pace(started, self.period);
        }
        tracing::info!(ticks = self.ticks, "bridge stopped");
    }

    fn translate(&self, ev: WriteEvent) -> Option<Command> {
        let store = &self.ctx.store;
        let Some(kind) = store.map().resolve(ev.bank, ev.address) else {
            tracing::warn!(bank = ev.bank.name(), address = ev.address, "no command mapped for address");
            return None;
        };
        let Some(cmd) = kind.decode(ev.value, &store.scaling()) else {
            tracing::trace!(address = ev.address, kind = ?kind, "button released");
            return None;
        };
        tracing::debug!(bank = ev.bank.name(), address = ev.address, raw = ev.value, command = ?cmd, "command resolved");
        // Queue-full is already counted and logged by the queue.
        self.ctx.commands.push(cmd).then_some(cmd)
    }

    fn mirror(&self, snap: &OutputSnapshot) {
        let store = &self.ctx.store;
        let scaling = store.scaling();
        for (field, bank, address) in store.map().mirrors() {
            let raw = match field {
                MirrorField::Level => scaling.to_register(snap.level),
                MirrorField::Outflow => scaling.to_register(snap.outflow),
                MirrorField::InValve => scaling.to_register(snap.in_valve),
                MirrorField::OutValve => scaling.to_register(snap.out_valve),
                MirrorField::Setpoint => scaling.to_register(snap.setpoint),
                MirrorField::AutoMode => u16::from(snap.auto_mode),
            };
            if let Err(e) = store.write_one(bank, address, raw, Origin::Internal) {
                tracing::warn!(error = %e, field = ?field, "mirror write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{co, hr};
    use crate::register::Bank;

    fn bridge() -> (PlcContext, CommandTranslator) {
        let ctx = PlcContext::standard(8);
        let b = CommandTranslator::new(ctx.clone(), BridgeCfg::default());
        (ctx, b)
    }

    #[test]
    fn forwards_one_command_per_tick() {
        let (ctx, mut b) = bridge();
        ctx.store.write_bit(Bank::Coil, co::START, true, Origin::External).unwrap();
        ctx.store
            .write_one(Bank::Holding, hr::SETPOINT, 400, Origin::External)
            .unwrap();

        assert_eq!(b.tick().forwarded, Some(Command::Start));
        assert_eq!(ctx.commands.len(), 1);
        assert_eq!(b.tick().forwarded, Some(Command::SetSetpoint(0.4)));
        assert_eq!(b.tick().forwarded, None);
    }

    #[test]
    fn gain_writes_are_negated() {
        let (ctx, mut b) = bridge();
        ctx.store.write_one(Bank::Holding, hr::K_I, 2000, Origin::External).unwrap();
        assert_eq!(b.tick().forwarded, Some(Command::SetKi(-2.0)));
    }

    #[test]
    fn button_release_forwards_nothing() {
        let (ctx, mut b) = bridge();
        ctx.store.write_bit(Bank::Coil, co::STOP, false, Origin::External).unwrap();
        assert_eq!(b.tick().forwarded, None);
        assert!(ctx.commands.is_empty());
    }

    #[test]
    fn mirrors_only_the_newest_snapshot_without_events() {
        let (ctx, mut b) = bridge();
        for level in [0.1, 0.2, 0.3] {
            ctx.snapshots.push(OutputSnapshot {
                level,
                out_valve: 0.7,
                auto_mode: true,
                ..Default::default()
            });
        }
        let report = b.tick();
        assert_eq!(report.mirrored.map(|s| s.level), Some(0.3));
        assert_eq!(ctx.store.read_one(Bank::Holding, hr::LEVEL), 300);
        assert_eq!(ctx.store.read_one(Bank::Holding, hr::OUT_VALVE), 700);
        assert!(ctx.store.read_bit(Bank::Coil, co::AUTO_MODE));
        assert_eq!(ctx.store.pending_events(), 0);
        assert_eq!(b.tick(), TickReport::default());
    }
}
