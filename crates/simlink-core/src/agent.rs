//! The closed set of agent kinds and their action spaces.

use std::fmt;

/// One way of driving an agent: a name and the length of the action
/// vector it expects each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlScheme {
    /// Short human-readable description.
    pub name: &'static str,
    /// Required number of action values per tick.
    pub action_len: usize,
}

const UAV_SCHEMES: &[ControlScheme] = &[ControlScheme {
    name: "pitch/roll/yaw torque + thrust",
    action_len: 4,
}];

const SPHERE_SCHEMES: &[ControlScheme] = &[
    ControlScheme {
        name: "discrete move",
        action_len: 1,
    },
    ControlScheme {
        name: "forward speed + rotation",
        action_len: 2,
    },
];

const ANDROID_SCHEMES: &[ControlScheme] = &[
    ControlScheme {
        name: "joint torques",
        action_len: 94,
    },
    ControlScheme {
        name: "max-scaled joint torques",
        action_len: 94,
    },
];

const HAND_SCHEMES: &[ControlScheme] = &[
    ControlScheme {
        name: "joint torques",
        action_len: 23,
    },
    ControlScheme {
        name: "joint torques + floating base",
        action_len: 26,
    },
];

const NAV_SCHEMES: &[ControlScheme] = &[ControlScheme {
    name: "target location",
    action_len: 3,
}];

const TURTLE_SCHEMES: &[ControlScheme] = &[ControlScheme {
    name: "thrust + yaw",
    action_len: 2,
}];

const BOAT_SCHEMES: &[ControlScheme] = &[ControlScheme {
    name: "thrust + rudder",
    action_len: 2,
}];

/// Agent classes the engine knows how to spawn.
///
/// Closed: the engine binary ships a fixed set of agent blueprints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentKind {
    /// Quadcopter.
    Uav,
    /// Ground robot with a single sphere wheel.
    SphereRobot,
    /// Full humanoid.
    Android,
    /// Articulated hand.
    HandAgent,
    /// Navigation-mesh follower.
    NavAgent,
    /// Two-wheeled ground robot.
    TurtleAgent,
    /// Surface vessel.
    Boat,
}

impl AgentKind {
    /// Every kind, in declaration order.
    pub const ALL: [AgentKind; 7] = [
        Self::Uav,
        Self::SphereRobot,
        Self::Android,
        Self::HandAgent,
        Self::NavAgent,
        Self::TurtleAgent,
        Self::Boat,
    ];

    /// The type name the engine expects in `SpawnAgent`.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Uav => "UAV",
            Self::SphereRobot => "SphereRobot",
            Self::Android => "Android",
            Self::HandAgent => "HandAgent",
            Self::NavAgent => "NavAgent",
            Self::TurtleAgent => "TurtleAgent",
            Self::Boat => "BoatAgent",
        }
    }

    /// Resolve a wire name or one of the scenario-file aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "UAV" | "UavAgent" => Self::Uav,
            "SphereRobot" | "SphereAgent" => Self::SphereRobot,
            "Android" | "AndroidAgent" => Self::Android,
            "HandAgent" => Self::HandAgent,
            "NavAgent" => Self::NavAgent,
            "TurtleAgent" => Self::TurtleAgent,
            "BoatAgent" | "Boat" => Self::Boat,
            _ => return None,
        };
        Some(kind)
    }

    /// Available control schemes; index 0 is the engine default.
    pub fn control_schemes(self) -> &'static [ControlScheme] {
        match self {
            Self::Uav => UAV_SCHEMES,
            Self::SphereRobot => SPHERE_SCHEMES,
            Self::Android => ANDROID_SCHEMES,
            Self::HandAgent => HAND_SCHEMES,
            Self::NavAgent => NAV_SCHEMES,
            Self::TurtleAgent => TURTLE_SCHEMES,
            Self::Boat => BOAT_SCHEMES,
        }
    }

    /// Action vector length under `scheme`, or `None` if the scheme
    /// does not exist for this kind.
    pub fn action_len(self, scheme: usize) -> Option<usize> {
        self.control_schemes().get(scheme).map(|s| s.action_len)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_resolve_to_themselves() {
        for kind in AgentKind::ALL {
            assert_eq!(AgentKind::from_name(kind.wire_name()), Some(kind));
        }
    }

    #[test]
    fn scenario_aliases_resolve() {
        assert_eq!(AgentKind::from_name("UavAgent"), Some(AgentKind::Uav));
        assert_eq!(
            AgentKind::from_name("SphereAgent"),
            Some(AgentKind::SphereRobot)
        );
        assert_eq!(
            AgentKind::from_name("AndroidAgent"),
            Some(AgentKind::Android)
        );
        assert_eq!(AgentKind::from_name("Submarine"), None);
    }

    #[test]
    fn action_lengths_per_scheme() {
        assert_eq!(AgentKind::Uav.action_len(0), Some(4));
        assert_eq!(AgentKind::Uav.action_len(1), None);
        assert_eq!(AgentKind::SphereRobot.action_len(0), Some(1));
        assert_eq!(AgentKind::SphereRobot.action_len(1), Some(2));
        assert_eq!(AgentKind::Android.action_len(1), Some(94));
        assert_eq!(AgentKind::HandAgent.action_len(1), Some(26));
        assert_eq!(AgentKind::Boat.action_len(0), Some(2));
    }

    #[test]
    fn every_kind_has_a_default_scheme() {
        for kind in AgentKind::ALL {
            assert!(!kind.control_schemes().is_empty(), "{kind}");
        }
    }
}
