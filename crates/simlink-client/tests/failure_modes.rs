//! Integration test: error classification and session poisoning.
//!
//! Validation errors must be rejected before anything is queued and leave
//! the session usable. Protocol errors (engine timeout, command overflow)
//! must poison it so every later call fails fast.

use std::sync::Arc;

use simlink_client::{Session, SessionError, TickPhase};
use simlink_core::ErrorClass;
use simlink_shm::{InProcessIpc, ShmNaming};
use simlink_test_utils::{connect, test_config, uav_definition, FillMode, MockEngine};

fn uav_session(tag: &str, main: bool) -> simlink_test_utils::Harness {
    let mut config = test_config(tag);
    config.agents.push(uav_definition("uav0").main(main));
    connect(config, FillMode::Zero).unwrap()
}

// ── Validation ───────────────────────────────────────────────────────

#[test]
fn wrong_action_length_never_reaches_the_queue() {
    let mut h = uav_session("actionlen", true);

    let err = h.session.act("uav0", vec![0.0; 3]).unwrap_err();
    assert!(matches!(
        err,
        SessionError::ActionShape {
            expected: 4,
            actual: 3,
            ..
        }
    ));
    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(h.session.queued_commands(), 0);

    assert!(h.session.step(vec![0.0; 5]).is_err());
    assert_eq!(h.session.queued_commands(), 0);
    assert!(!h.session.is_failed());

    h.session.step(vec![0.0; 4]).unwrap();
}

#[test]
fn non_finite_action_rejected() {
    let mut h = uav_session("nan", true);
    let err = h
        .session
        .act("uav0", vec![0.0, f32::NAN, 0.0, 0.0])
        .unwrap_err();
    assert!(matches!(err, SessionError::Command(_)));
    assert_eq!(h.session.queued_commands(), 0);
}

#[test]
fn step_requires_a_main_agent() {
    let mut h = uav_session("nomain", false);
    assert!(matches!(
        h.session.step(vec![0.0; 4]),
        Err(SessionError::NoMainAgent)
    ));
    h.session.set_main_agent("uav0").unwrap();
    h.session.step(vec![0.0; 4]).unwrap();
}

#[test]
fn unknown_names_are_validation_errors() {
    let mut h = uav_session("unknown", true);
    let err = h.session.teleport("ghost", Some([0.0; 3]), None).unwrap_err();
    assert!(matches!(err, SessionError::UnknownAgent { .. }));
    assert_eq!(err.class(), ErrorClass::Validation);

    let err = h.session.rotate_sensor("uav0", "Nope", [0.0; 3]).unwrap_err();
    assert!(matches!(err, SessionError::UnknownSensor { .. }));

    assert!(h.session.teleport("uav0", None, None).is_err());
    assert!(h.session.set_control_scheme("uav0", 9).is_err());
    assert!(!h.session.is_failed());
}

#[test]
fn duplicate_agent_rejected_without_side_effects() {
    let mut h = uav_session("dup", true);
    let regions = h.ipc.region_count();
    let err = h.session.add_agent(uav_definition("uav0")).unwrap_err();
    assert!(matches!(err, SessionError::DuplicateAgent { .. }));
    assert_eq!(h.ipc.region_count(), regions);
    assert_eq!(h.session.queued_commands(), 0);
}

// ── Phases ───────────────────────────────────────────────────────────

#[test]
fn sensors_unreadable_while_engine_steps() {
    let mut h = uav_session("phase", true);
    h.session.begin_tick().unwrap();
    assert_eq!(h.session.phase(), TickPhase::WaitingForEngine);

    let err = h.session.read_sensor("uav0", "LocationSensor").unwrap_err();
    assert!(matches!(err, SessionError::WrongPhase { .. }));
    assert!(matches!(
        h.session.set_sensor_enabled("uav0", "LocationSensor", false),
        Err(SessionError::WrongPhase { .. })
    ));
    assert!(matches!(
        h.session.begin_tick(),
        Err(SessionError::WrongPhase { .. })
    ));
    assert!(!h.session.is_failed());

    h.session.finish_tick().unwrap();
    h.session.read_sensor("uav0", "LocationSensor").unwrap();
}

// ── Poisoning ────────────────────────────────────────────────────────

#[test]
fn unresponsive_engine_poisons_session() {
    let mut h = uav_session("timeout", true);
    h.engine.set_responsive(false);

    let err = h.session.tick().unwrap_err();
    assert!(matches!(err, SessionError::EngineUnresponsive { .. }));
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(h.session.is_failed());
    assert_eq!(h.session.metrics().timeouts, 1);

    assert!(matches!(h.session.tick(), Err(SessionError::Failed)));
    assert!(matches!(h.session.reset(), Err(SessionError::Failed)));
    assert!(matches!(
        h.session.set_fog_density(0.1),
        Err(SessionError::Failed)
    ));
}

#[test]
fn silent_engine_fails_connect() {
    let config = test_config("silent");
    let ipc = InProcessIpc::new();
    let naming = ShmNaming::with_prefix(config.prefix.clone(), config.session_id.clone());
    let _engine = MockEngine::start_silent(Arc::new(ipc.clone()), naming).unwrap();

    let err = Session::connect(config, Arc::new(ipc.clone())).unwrap_err();
    assert!(matches!(err, SessionError::EngineUnresponsive { .. }));
    assert_eq!(ipc.region_count(), 0);
}

#[test]
fn missing_engine_fails_connect() {
    let err = Session::connect(test_config("absent"), Arc::new(InProcessIpc::new())).unwrap_err();
    assert!(matches!(err, SessionError::Shm(_)));
    assert_eq!(err.class(), ErrorClass::Resource);
}

#[test]
fn command_overflow_poisons_session() {
    let mut config = test_config("overflow");
    config.command_buffer_bytes = 64;
    let mut h = connect(config, FillMode::Zero).unwrap();
    let ticks = h.engine.ticks();

    for _ in 0..8 {
        h.session.set_fog_density(0.25).unwrap();
    }
    let err = h.session.tick().unwrap_err();
    assert!(matches!(
        err,
        SessionError::CommandOverflow { capacity: 64, .. }
    ));
    assert!(h.session.is_failed());
    assert!(h.engine.commands().is_empty());
    assert_eq!(h.engine.ticks(), ticks);
    assert!(matches!(h.session.tick(), Err(SessionError::Failed)));
}

#[test]
fn invalid_config_rejected_before_any_allocation() {
    let mut config = test_config("badcfg");
    config.command_buffer_bytes = 4;
    let ipc = InProcessIpc::new();
    let err = Session::connect(config, Arc::new(ipc.clone())).unwrap_err();
    assert!(matches!(err, SessionError::Config(_)));
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert_eq!(ipc.region_count(), 0);
}
