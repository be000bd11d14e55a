//! Benchmark profiles for the simlink engine client.
//!
//! Provides deterministic command workloads for benchmarks and examples:
//!
//! - [`action_batch`]: one action per UAV, seeded
//! - [`mixed_batch`]: actions interleaved with teleports and world commands
//! - [`fleet`]: UAV definitions carrying a camera and a task sensor

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use simlink_client::AgentDefinition;
use simlink_core::{AgentKind, Command, WorldCommand};
use simlink_sensor::{SensorConfig, SensorDefinition};

fn unit(rng: &mut ChaCha8Rng) -> f32 {
    // 24 random mantissa bits mapped into [-1, 1).
    (rng.next_u32() >> 8) as f32 / (1u32 << 23) as f32 - 1.0
}

/// Name of the `i`th agent in [`fleet`].
pub fn agent_name(i: usize) -> String {
    format!("uav{i}")
}

/// `agents` UAV actions with seeded values in `[-1, 1)`.
pub fn action_batch(agents: usize, seed: u64) -> Vec<Command> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..agents)
        .filter_map(|i| {
            let action = (0..4).map(|_| unit(&mut rng)).collect();
            Command::agent_action(agent_name(i), action).ok()
        })
        .collect()
}

/// `n` commands cycling through action, teleport and world commands.
pub fn mixed_batch(n: usize, seed: u64) -> Vec<Command> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .filter_map(|i| {
            let agent = agent_name(i % 8);
            match i % 4 {
                0 => {
                    let action = (0..4).map(|_| unit(&mut rng)).collect();
                    Command::agent_action(agent, action).ok()
                }
                1 => {
                    let location = [unit(&mut rng), unit(&mut rng), 10.0];
                    Command::teleport(agent, Some(location), None).ok()
                }
                2 => WorldCommand::fog_density(unit(&mut rng).abs())
                    .ok()
                    .map(Command::from),
                _ => Some(Command::Custom {
                    name: "PulseBeacon".into(),
                    numbers: vec![f64::from(unit(&mut rng))],
                    strings: vec![agent],
                }),
            }
        })
        .collect()
}

/// `n` UAVs, each with a `width` x `height` camera and a distance task.
pub fn fleet(n: usize, width: i64, height: i64) -> Vec<AgentDefinition> {
    (0..n)
        .map(|i| {
            let name = agent_name(i);
            AgentDefinition::new(name.as_str(), AgentKind::Uav)
                .location([i as f32 * 2.0, 0.0, 5.0])
                .sensor(SensorDefinition::new(name.as_str(), "DistanceTask"))
                .sensor(
                    SensorDefinition::new(name.as_str(), "RGBCamera").config(
                        SensorConfig::new()
                            .with("CaptureWidth", width)
                            .with("CaptureHeight", height),
                    ),
                )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_batches_are_deterministic() {
        assert_eq!(action_batch(4, 42), action_batch(4, 42));
        assert_ne!(action_batch(4, 42), action_batch(4, 43));
        assert_eq!(action_batch(4, 42).len(), 4);
    }

    #[test]
    fn action_values_in_range() {
        for cmd in action_batch(16, 7) {
            let Command::AgentAction { action, .. } = cmd else {
                panic!("expected an action");
            };
            assert!(action.iter().all(|v| (-1.0..1.0).contains(v)));
        }
    }

    #[test]
    fn mixed_batch_has_requested_length() {
        assert_eq!(mixed_batch(100, 1).len(), 100);
    }

    #[test]
    fn fleet_names_are_unique() {
        let defs = fleet(3, 64, 48);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["uav0", "uav1", "uav2"]);
        assert_eq!(defs[0].sensors.len(), 2);
    }
}
