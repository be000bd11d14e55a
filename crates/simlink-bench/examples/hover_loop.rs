//! Fly a UAV against the mock engine and print what comes back.
//!
//! Runs the full client loop without an engine binary: connect, step with
//! a hover action, reset, and read the task reward.
//!
//! ```sh
//! RUST_LOG=debug cargo run -p simlink-bench --example hover_loop
//! ```

use simlink_test_utils::{connect, test_config, uav_definition, FillMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = test_config("hover");
    config.agents.push(uav_definition("uav0").main(true));
    let mut h = connect(config, FillMode::Constant(0.5))?;
    println!("{}", h.session.info());

    h.engine.set_task_signal(1.0, false);
    for step in 0..5 {
        let outcome = h.session.step(vec![0.0, 0.0, 0.0, 9.8])?;
        let location = outcome
            .state
            .sensor("uav0", "LocationSensor")
            .and_then(|r| r.as_f32().map(<[f32]>::to_vec));
        println!(
            "step {step}: reward={:?} terminal={:?} location={:?}",
            outcome.reward, outcome.terminal, location
        );
    }

    h.session.teleport("uav0", Some([10.0, 0.0, 20.0]), None)?;
    h.session.tick()?;
    h.session.reset()?;

    let metrics = h.session.metrics();
    println!(
        "ticks={} commands={} resets={}",
        metrics.total_ticks,
        metrics.total_commands,
        h.engine.resets()
    );
    Ok(())
}
