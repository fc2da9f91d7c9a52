//! Writes the bridge performs itself must never turn into commands.

use proptest::prelude::*;
use softplc_core::map::hr;
use softplc_core::{
    Bank, BridgeCfg, Command, CommandTranslator, Origin, OutputSnapshot, PlcContext,
};

fn bank_strategy() -> impl Strategy<Value = Bank> {
    prop_oneof![
        Just(Bank::DiscreteInput),
        Just(Bank::Coil),
        Just(Bank::Holding),
        Just(Bank::Input),
    ]
}

fn snapshot_strategy() -> impl Strategy<Value = OutputSnapshot> {
    (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, any::<bool>()).prop_map(
        |(level, in_valve, out_valve, setpoint, auto_mode)| OutputSnapshot {
            level,
            outflow: level / 2.0,
            in_valve,
            out_valve,
            setpoint,
            auto_mode,
            ..OutputSnapshot::default()
        },
    )
}

proptest! {
    #[test]
    fn internal_writes_never_emit_events(
        writes in prop::collection::vec((bank_strategy(), 0u16..120, any::<u16>(), 1usize..4), 1..200)
    ) {
        let ctx = PlcContext::standard(512);
        for (bank, address, value, len) in writes {
            let values = vec![value; len];
            ctx.store.write(bank, address, &values, Origin::Internal).unwrap();
        }
        prop_assert_eq!(ctx.store.pending_events(), 0);
    }

    #[test]
    fn mirrored_snapshots_never_produce_commands(
        snaps in prop::collection::vec(snapshot_strategy(), 1..60)
    ) {
        let ctx = PlcContext::standard(64);
        let mut bridge = CommandTranslator::new(ctx.clone(), BridgeCfg::default());
        for snap in snaps {
            ctx.snapshots.push(snap);
            let report = bridge.tick();
            prop_assert!(report.forwarded.is_none());
        }
        for _ in 0..4 {
            prop_assert!(bridge.tick().forwarded.is_none());
        }
        prop_assert!(ctx.commands.is_empty());
        prop_assert_eq!(ctx.store.pending_events(), 0);
    }

    #[test]
    fn external_events_match_mapped_single_writes(
        writes in prop::collection::vec((bank_strategy(), 0u16..120, 1u16..u16::MAX), 1..100)
    ) {
        let ctx = PlcContext::standard(256);
        let mut expected = 0usize;
        for (bank, address, value) in writes {
            ctx.store.write_one(bank, address, value, Origin::External).unwrap();
            if ctx.store.map().is_mapped(bank, address) {
                expected += 1;
            }
        }
        prop_assert_eq!(ctx.store.pending_events(), expected);
    }

    #[test]
    fn setpoint_survives_the_register_round_trip(v in 0.0f64..1.0) {
        let ctx = PlcContext::standard(8);
        let scaling = ctx.store.scaling();
        let mut bridge = CommandTranslator::new(ctx.clone(), BridgeCfg::default());
        ctx.store
            .write_one(Bank::Holding, hr::SETPOINT, scaling.to_register(v), Origin::External)
            .unwrap();
        let tol = 1.0 / f64::from(scaling.decimal_factor);
        match bridge.tick().forwarded {
            Some(Command::SetSetpoint(x)) => prop_assert!((x - v).abs() <= tol),
            other => prop_assert!(false, "expected SetSetpoint, got {:?}", other),
        }
        let back = scaling.from_register(ctx.store.read_one(Bank::Holding, hr::SETPOINT));
        prop_assert!((back - v).abs() <= tol);
    }
}
