//! Integration test: a session driving the mock engine end to end.
//!
//! Covers connection and the initial reset, the agent creation commands,
//! sensor readback under arbitrary engine output, step reward reporting,
//! reset, zero-copy reads and teardown.

use simlink_client::{Scenario, SessionError, TickPhase};
use simlink_core::{ElementType, TickId};
use simlink_test_utils::{connect, sphere_definition, test_config, uav_definition, FillMode};

fn uav_session(tag: &str, fill: FillMode) -> simlink_test_utils::Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut config = test_config(tag);
    config.agents.push(uav_definition("uav0").main(true));
    connect(config, fill).unwrap()
}

// ── Connection ───────────────────────────────────────────────────────

#[test]
fn connect_runs_initial_reset_and_spawns_agents() {
    let h = uav_session("connect", FillMode::Zero);

    assert_eq!(h.engine.resets(), 1);
    // One settle tick plus the tick that returns the initial state.
    assert_eq!(h.engine.ticks(), 2);
    assert_eq!(h.session.current_tick(), TickId(2));
    assert_eq!(h.session.phase(), TickPhase::Ready);

    let opcodes: Vec<String> = h.engine.commands().into_iter().map(|c| c.opcode).collect();
    assert_eq!(opcodes, ["SpawnAgent", "AddSensor", "AddSensor"]);

    let spawn = &h.engine.commands_named("SpawnAgent")[0];
    assert_eq!(spawn.text(6), Some("uav0"));
    assert_eq!(spawn.text(7), Some("UAV"));
    assert_eq!(spawn.number(8), Some(1.0));

    let sensors: Vec<String> = h
        .engine
        .commands_named("AddSensor")
        .iter()
        .filter_map(|c| c.text(1).map(str::to_string))
        .collect();
    assert_eq!(sensors, ["LocationSensor", "DistanceTask"]);
}

#[test]
fn batches_are_well_formed_envelopes() {
    let h = uav_session("envelope", FillMode::Zero);
    let batches = h.engine.batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].starts_with("{\"commands\": ["));
    assert!(batches[0].ends_with("]}"));
}

// ── Sensor readback ──────────────────────────────────────────────────

#[test]
fn location_sensor_contract_holds_under_garbage() {
    let mut h = uav_session("garbage", FillMode::Garbage(7));
    h.session
        .teleport("uav0", Some([1.0, 2.0, 3.0]), None)
        .unwrap();
    let state = h.session.tick().unwrap();

    let location = state.sensor("uav0", "LocationSensor").unwrap();
    assert_eq!(location.shape.as_slice(), &[3]);
    assert_eq!(location.element(), ElementType::F32);
    assert_eq!(location.as_f32().unwrap(), &[1.0, 2.0, 3.0]);

    let task = state.sensor("uav0", "DistanceTask").unwrap();
    assert_eq!(task.shape.as_slice(), &[2]);
    assert_eq!(task.element(), ElementType::F32);
}

#[test]
fn camera_reading_has_configured_shape() {
    let mut config = test_config("camera");
    config.agents.push(sphere_definition("sphere0"));
    let mut h = connect(config, FillMode::Constant(200.0)).unwrap();

    let state = h.session.tick().unwrap();
    let frame = state.sensor("sphere0", "RGBCamera").unwrap();
    assert_eq!(frame.shape.as_slice(), &[4, 8, 4]);
    let bytes = frame.as_u8().unwrap();
    assert_eq!(bytes.len(), 4 * 8 * 4);
    assert!(bytes.iter().all(|b| *b == 200));
}

#[test]
fn disabled_sensor_is_latched_and_announced() {
    let mut h = uav_session("disable", FillMode::Constant(5.0));
    h.session
        .set_sensor_enabled("uav0", "DistanceTask", false)
        .unwrap();
    h.session.tick().unwrap();

    let enabled = h.engine.commands_named("SetSensorEnabled");
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].text(1), Some("DistanceTask"));
    assert_eq!(enabled[0].number(2), Some(0.0));
    assert!(!h
        .session
        .agents()
        .get("uav0")
        .unwrap()
        .sensor("DistanceTask")
        .unwrap()
        .is_enabled());
}

#[test]
fn zero_copy_mode_returns_empty_snapshots() {
    let mut config = test_config("zerocopy");
    config.copy_state = false;
    config.agents.push(uav_definition("uav0"));
    let mut h = connect(config, FillMode::Constant(1.5)).unwrap();

    let state = h.session.tick().unwrap();
    assert!(state.is_empty());
    assert_eq!(h.session.phase(), TickPhase::DataAvailable);

    let bytes = h.session.sensor_bytes("uav0", "DistanceTask").unwrap();
    assert_eq!(bytes.len(), 8);
    assert_eq!(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 1.5);
    assert!(matches!(
        h.session.sensor_bytes("uav0", "Nope"),
        Err(SessionError::UnknownSensor { .. })
    ));
}

// ── Step and reset ───────────────────────────────────────────────────

#[test]
fn step_reports_task_sensor() {
    let mut h = uav_session("step", FillMode::Zero);
    h.engine.set_task_signal(0.75, true);

    let outcome = h.session.step(vec![0.0, 0.0, 0.0, 9.8]).unwrap();
    assert_eq!(outcome.reward, Some(0.75));
    assert_eq!(outcome.terminal, Some(true));
    assert!(outcome.state.agent("uav0").is_some());

    let actions = h.engine.commands_named("AgentAction");
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].text(0), Some("uav0"));
    let thrust = actions[0].number(4).unwrap();
    assert!((thrust - 9.8).abs() < 1e-5);
}

#[test]
fn step_without_task_sensor_has_no_reward() {
    let mut config = test_config("noreward");
    config.agents.push(sphere_definition("sphere0").main(true));
    let mut h = connect(config, FillMode::Zero).unwrap();

    let outcome = h.session.step(vec![1.0]).unwrap();
    assert_eq!(outcome.reward, None);
    assert_eq!(outcome.terminal, None);
}

#[test]
fn reset_rebuilds_configured_agents_only() {
    let mut h = uav_session("reset", FillMode::Zero);
    h.session.add_agent(sphere_definition("extra")).unwrap();
    h.session.tick().unwrap();
    h.session
        .teleport("extra", Some([4.0, 0.0, 0.0]), None)
        .unwrap();
    h.session.set_fog_density(0.5).unwrap();

    let state = h.session.reset().unwrap();
    assert_eq!(h.engine.resets(), 2);
    assert_eq!(h.session.metrics().discarded_commands, 1);
    assert!(h.engine.commands_named("Teleport").is_empty());
    assert_eq!(h.engine.custom_commands("SetFogDensity").len(), 1);
    assert_eq!(h.engine.world_settings().fog_density, Some(0.5));

    let names: Vec<&str> = h.session.agents().names().collect();
    assert_eq!(names, ["uav0"]);
    assert!(state.agent("extra").is_none());
    assert!(state.agent("uav0").is_some());
    assert_eq!(h.engine.commands_named("SpawnAgent").len(), 3);
}

#[test]
fn scenario_agents_spawn_after_configured_ones() {
    let mut config = test_config("scenario");
    config.agents.push(uav_definition("uav0"));
    config.scenario = Some(
        Scenario::from_json(
            r#"{"world": "TestWorld", "main_agent": "sphere0", "agents": [
                {"agent_name": "sphere0", "agent_type": "SphereAgent",
                 "sensors": [{"sensor_type": "LocationSensor"}]}
            ]}"#,
        )
        .unwrap(),
    );
    let h = connect(config, FillMode::Zero).unwrap();

    let names: Vec<&str> = h.session.agents().names().collect();
    assert_eq!(names, ["uav0", "sphere0"]);
    assert_eq!(h.session.agents().main_agent().unwrap().name(), "sphere0");
}

// ── World commands ───────────────────────────────────────────────────

#[test]
fn world_commands_use_engine_opcodes() {
    let mut h = uav_session("world", FillMode::Zero);
    h.session.set_day_time(30).unwrap();
    h.session.start_day_cycle(10).unwrap();
    h.session.stop_day_cycle().unwrap();
    h.session.set_weather("rain").unwrap();
    h.session.set_ocean_state(3, 2, 90.0).unwrap();
    h.session.teleport_camera([1.0, 2.0, 3.0], [0.0; 3]).unwrap();
    h.session.draw_point([0.0; 3], [255, 0, 0], 10.0).unwrap();
    h.session
        .send_world_command("OpenDoor", vec![1.0], vec!["north".into()])
        .unwrap();
    let before = h.engine.commands().len();
    h.session.tick().unwrap();

    let sent = &h.engine.commands()[before..];
    let opcodes: Vec<&str> = sent.iter().map(|c| c.opcode.as_str()).collect();
    assert_eq!(
        opcodes,
        [
            "CustomCommand",
            "CustomCommand",
            "CustomCommand",
            "CustomCommand",
            "SetOceanState",
            "TeleportCamera",
            "DebugDraw",
            "CustomCommand",
        ]
    );
    let names: Vec<&str> = sent.iter().map(|c| c.name()).collect();
    assert_eq!(
        names,
        [
            "SetHour",
            "SetDayCycle",
            "SetDayCycle",
            "SetWeather",
            "SetOceanState",
            "TeleportCamera",
            "DebugDraw",
            "OpenDoor",
        ]
    );

    assert_eq!(sent[0].number(1), Some(6.0));
    assert_eq!((sent[1].number(1), sent[1].number(2)), (Some(1.0), Some(10.0)));
    assert_eq!((sent[2].number(1), sent[2].number(2)), (Some(0.0), Some(-1.0)));
    assert_eq!(sent[3].text(1), Some("rain"));

    let settings = h.engine.world_settings();
    assert_eq!(settings.hour, Some(6));
    assert_eq!(settings.day_cycle, None);
    assert_eq!(settings.weather.as_deref(), Some("rain"));
}

#[test]
fn invalid_world_parameters_are_rejected_locally() {
    let mut h = uav_session("badworld", FillMode::Zero);
    assert!(h.session.set_fog_density(1.5).is_err());
    assert!(h.session.set_weather("snow").is_err());
    assert_eq!(h.session.queued_commands(), 0);
    assert!(!h.session.is_failed());
}

// ── Teardown ─────────────────────────────────────────────────────────

#[test]
fn info_lists_agents_and_sensors() {
    let h = uav_session("info", FillMode::Zero);
    assert_eq!(
        h.session.info(),
        "Agents:\n\tName: uav0\n\tType: UAV\n\tSensors:\n\t\tLocationSensor\n\t\tDistanceTask\n"
    );
}

#[test]
fn teardown_releases_every_region() {
    let mut h = uav_session("teardown", FillMode::Zero);
    assert!(h.ipc.region_count() > 0);

    h.session.teardown();
    assert_eq!(h.ipc.region_count(), 0);
    assert!(h.session.is_closed());
    assert!(matches!(h.session.tick(), Err(SessionError::Closed)));

    h.session.teardown();
}
