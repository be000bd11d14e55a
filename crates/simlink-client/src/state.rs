//! Copied per-tick state: every agent's sensor readings.

use indexmap::IndexMap;
use simlink_core::TickId;
use simlink_sensor::SensorReading;

/// One agent's readings, keyed by sensor name in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentState {
    readings: IndexMap<String, SensorReading>,
}

impl AgentState {
    pub(crate) fn insert(&mut self, sensor: String, reading: SensorReading) {
        self.readings.insert(sensor, reading);
    }

    /// Reading of one sensor.
    pub fn get(&self, sensor: &str) -> Option<&SensorReading> {
        self.readings.get(sensor)
    }

    /// `(sensor name, reading)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorReading)> {
        self.readings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether there are no readings.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Every agent's state after one tick, keyed by agent name in
/// registration order.
///
/// Snapshots are owned copies: they stay valid while the engine writes
/// the next tick's data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateSnapshot {
    tick: TickId,
    agents: IndexMap<String, AgentState>,
}

impl StateSnapshot {
    pub(crate) fn new(tick: TickId) -> Self {
        Self {
            tick,
            agents: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, agent: String, state: AgentState) {
        self.agents.insert(agent, state);
    }

    /// The tick this state was captured after.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// One agent's state.
    pub fn agent(&self, name: &str) -> Option<&AgentState> {
        self.agents.get(name)
    }

    /// Shorthand for `agent(agent)?.get(sensor)`.
    pub fn sensor(&self, agent: &str, sensor: &str) -> Option<&SensorReading> {
        self.agents.get(agent).and_then(|a| a.get(sensor))
    }

    /// `(agent name, state)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentState)> {
        self.agents.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is present.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlink_sensor::SensorData;

    fn reading(v: f32) -> SensorReading {
        SensorReading {
            shape: std::iter::once(1).collect(),
            data: SensorData::F32(vec![v]),
        }
    }

    #[test]
    fn lookups_follow_insertion_order() {
        let mut a = AgentState::default();
        a.insert("z".into(), reading(1.0));
        a.insert("a".into(), reading(2.0));
        let mut snap = StateSnapshot::new(TickId(4));
        snap.insert("uav0".into(), a);

        assert_eq!(snap.tick(), TickId(4));
        let names: Vec<_> = snap.agent("uav0").unwrap().iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["z", "a"]);
        assert_eq!(snap.sensor("uav0", "a").unwrap().as_f32(), Some(&[2.0][..]));
        assert!(snap.sensor("uav0", "missing").is_none());
        assert!(snap.sensor("ghost", "a").is_none());
    }
}
