#![allow(dead_code)]

use softplc_core::mocks::ScriptedPlant;
use softplc_core::{
    BridgeCfg, CommandTranslator, ControlCfg, ControlLoop, PlcContext, StabilityCfg,
};
use softplc_traits::PlantInputs;
use softplc_traits::clock::test_clock::TestClock;

/// Plant raw units for an engineering level at default scaling (factor 1000, range 10).
pub fn raw(v: f64) -> u16 {
    (v * 10_000.0).round() as u16
}

pub fn inputs(level: f64, timescale: u16) -> PlantInputs {
    PlantInputs {
        level: raw(level),
        outflow: raw(level / 2.0),
        setpoint: raw(0.5),
        timescale,
    }
}

pub struct Rig {
    pub ctx: PlcContext,
    pub plant: ScriptedPlant,
    pub clock: TestClock,
    pub control: ControlLoop,
    pub bridge: CommandTranslator<TestClock>,
}

pub fn rig(control: ControlCfg, stability: StabilityCfg, steady: PlantInputs) -> Rig {
    let ctx = PlcContext::standard(50);
    let plant = ScriptedPlant::steady(steady);
    let clock = TestClock::new();
    let control = ControlLoop::builder()
        .with_plant(plant.clone())
        .with_context(ctx.clone())
        .with_control(control)
        .with_stability(stability)
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("control loop build");
    let bridge = CommandTranslator::with_clock(ctx.clone(), BridgeCfg::default(), clock.clone());
    Rig {
        ctx,
        plant,
        clock,
        control,
        bridge,
    }
}
