use softplc_core::error::BuildError;
use softplc_core::mocks::ScriptedPlant;
use softplc_core::{ControlCfg, ControlLoop, PlcContext, RunState};
use rstest::rstest;

#[rstest]
fn builder_missing_plant_yields_typed_build_error() {
    let err = ControlLoop::builder()
        // missing with_plant()
        .with_context(PlcContext::standard(4))
        .try_build()
        .expect_err("should fail with MissingPlant");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingPlant) => {}
        other => panic!("expected MissingPlant, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_context_yields_typed_build_error() {
    let err = ControlLoop::builder()
        .with_plant(ScriptedPlant::default())
        .try_build()
        .expect_err("should fail with MissingContext");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingContext) => {}
        other => panic!("expected MissingContext, got: {other:?}"),
    }
}

#[rstest]
#[case(ControlCfg { setpoint: 1.2, ..ControlCfg::default() })]
#[case(ControlCfg { out_valve: -0.5, ..ControlCfg::default() })]
#[case(ControlCfg { period: std::time::Duration::ZERO, ..ControlCfg::default() })]
fn builder_rejects_invalid_control_config(#[case] control: ControlCfg) {
    let err = ControlLoop::builder()
        .with_plant(ScriptedPlant::default())
        .with_context(PlcContext::standard(4))
        .with_control(control)
        .build()
        .expect_err("invalid control config");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn built_loop_starts_stopped_until_begin() {
    let lp = ControlLoop::builder()
        .with_plant(ScriptedPlant::default())
        .with_context(PlcContext::standard(4))
        .build()
        .expect("build");
    assert_eq!(lp.state(), RunState::Stopped);
}
