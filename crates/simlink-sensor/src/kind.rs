//! The built-in sensor kinds.

use std::fmt;

use simlink_core::{ElementType, Shape};
use smallvec::smallvec;

use crate::config::SensorConfig;
use crate::error::SensorError;

/// How a sensor type derives its buffer shape.
#[derive(Clone, Debug)]
pub enum ShapeRule {
    /// Same shape for every instance.
    Fixed(Shape),
    /// Shape computed from the instance's configuration block. The
    /// `&str` argument is the sensor name, for error messages.
    Configured(fn(&str, &SensorConfig) -> Result<Shape, SensorError>),
}

impl ShapeRule {
    /// Resolve the shape for one sensor instance.
    pub fn resolve(&self, sensor: &str, config: &SensorConfig) -> Result<Shape, SensorError> {
        match self {
            Self::Fixed(shape) => Ok(shape.clone()),
            Self::Configured(f) => f(sensor, config),
        }
    }
}

fn dimension(
    sensor: &str,
    config: &SensorConfig,
    key: &'static str,
    default: usize,
) -> Result<usize, SensorError> {
    match config.get(key) {
        None => Ok(default),
        Some(v) => v.as_dimension().ok_or_else(|| SensorError::InvalidConfig {
            sensor: sensor.to_string(),
            key,
            reason: format!("expected a positive integer, got {v}"),
        }),
    }
}

fn capture_shape(
    sensor: &str,
    config: &SensorConfig,
    default: usize,
) -> Result<Shape, SensorError> {
    let height = dimension(sensor, config, "CaptureHeight", default)?;
    let width = dimension(sensor, config, "CaptureWidth", default)?;
    Ok(smallvec![height, width, 4])
}

fn rgb_camera_shape(sensor: &str, config: &SensorConfig) -> Result<Shape, SensorError> {
    capture_shape(sensor, config, 256)
}

fn viewport_shape(sensor: &str, config: &SensorConfig) -> Result<Shape, SensorError> {
    capture_shape(sensor, config, 512)
}

/// Sensor types the engine binary implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Agent camera, `(CaptureHeight, CaptureWidth, 4)` BGRA bytes.
    RgbCamera,
    /// Spectator viewport capture, same layout as the camera.
    ViewportCapture,
    /// Reward for reaching a goal distance: `[reward, terminal]`.
    DistanceTask,
    /// Reward for reaching a location: `[reward, terminal]`.
    LocationTask,
    /// Reward for following a target: `[reward, terminal]`.
    FollowTask,
    /// Reward for avoiding a target: `[reward, terminal]`.
    AvoidTask,
    /// Forward/right/up unit vectors, `[3, 3]`.
    OrientationSensor,
    /// Acceleration and angular velocity, `[2, 3]`.
    ImuSensor,
    /// Android joint rotations, `[94]`.
    JointRotationSensor,
    /// Android bone positions as quaternion-like rows, `[67, 4]`.
    RelativeSkeletalPositionSensor,
    /// World location, `[3]`.
    LocationSensor,
    /// Roll/pitch/yaw, `[3]`.
    RotationSensor,
    /// Linear velocity, `[3]`.
    VelocitySensor,
    /// Android contact pressures, 48 points × (xyz + force), `[192]`.
    PressureSensor,
    /// Whether the agent is colliding, `[1]` bool.
    CollisionSensor,
}

impl SensorKind {
    /// Every built-in kind.
    pub const ALL: [SensorKind; 15] = [
        Self::RgbCamera,
        Self::ViewportCapture,
        Self::DistanceTask,
        Self::LocationTask,
        Self::FollowTask,
        Self::AvoidTask,
        Self::OrientationSensor,
        Self::ImuSensor,
        Self::JointRotationSensor,
        Self::RelativeSkeletalPositionSensor,
        Self::LocationSensor,
        Self::RotationSensor,
        Self::VelocitySensor,
        Self::PressureSensor,
        Self::CollisionSensor,
    ];

    /// The type tag used on the wire and in scenario files.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::RgbCamera => "RGBCamera",
            Self::ViewportCapture => "ViewportCapture",
            Self::DistanceTask => "DistanceTask",
            Self::LocationTask => "LocationTask",
            Self::FollowTask => "FollowTask",
            Self::AvoidTask => "AvoidTask",
            Self::OrientationSensor => "OrientationSensor",
            Self::ImuSensor => "IMUSensor",
            Self::JointRotationSensor => "JointRotationSensor",
            Self::RelativeSkeletalPositionSensor => "RelativeSkeletalPositionSensor",
            Self::LocationSensor => "LocationSensor",
            Self::RotationSensor => "RotationSensor",
            Self::VelocitySensor => "VelocitySensor",
            Self::PressureSensor => "PressureSensor",
            Self::CollisionSensor => "CollisionSensor",
        }
    }

    /// Resolve a type tag.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// Element type of the data buffer.
    pub fn element(self) -> ElementType {
        match self {
            Self::RgbCamera | Self::ViewportCapture => ElementType::U8,
            Self::CollisionSensor => ElementType::Bool,
            _ => ElementType::F32,
        }
    }

    /// Shape rule of the data buffer.
    pub fn shape_rule(self) -> ShapeRule {
        match self {
            Self::RgbCamera => ShapeRule::Configured(rgb_camera_shape),
            Self::ViewportCapture => ShapeRule::Configured(viewport_shape),
            Self::DistanceTask | Self::LocationTask | Self::FollowTask | Self::AvoidTask => {
                ShapeRule::Fixed(smallvec![2])
            }
            Self::OrientationSensor => ShapeRule::Fixed(smallvec![3, 3]),
            Self::ImuSensor => ShapeRule::Fixed(smallvec![2, 3]),
            Self::JointRotationSensor => ShapeRule::Fixed(smallvec![94]),
            Self::RelativeSkeletalPositionSensor => ShapeRule::Fixed(smallvec![67, 4]),
            Self::LocationSensor | Self::RotationSensor | Self::VelocitySensor => {
                ShapeRule::Fixed(smallvec![3])
            }
            Self::PressureSensor => ShapeRule::Fixed(smallvec![48 * (3 + 1)]),
            Self::CollisionSensor => ShapeRule::Fixed(smallvec![1]),
        }
    }

    /// Whether this kind reports `[reward, terminal]` for its agent.
    pub fn is_task(self) -> bool {
        matches!(
            self,
            Self::DistanceTask | Self::LocationTask | Self::FollowTask | Self::AvoidTask
        )
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for kind in SensorKind::ALL {
            assert_eq!(SensorKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(SensorKind::from_type_name("Lidar"), None);
    }

    #[test]
    fn camera_defaults() {
        let cfg = SensorConfig::new();
        let shape = SensorKind::RgbCamera.shape_rule().resolve("cam", &cfg).unwrap();
        assert_eq!(shape.as_slice(), &[256, 256, 4]);
        let shape = SensorKind::ViewportCapture
            .shape_rule()
            .resolve("vp", &cfg)
            .unwrap();
        assert_eq!(shape.as_slice(), &[512, 512, 4]);
    }

    #[test]
    fn camera_resolution_from_config() {
        let cfg = SensorConfig::new()
            .with("CaptureWidth", 640)
            .with("CaptureHeight", 480);
        let shape = SensorKind::RgbCamera.shape_rule().resolve("cam", &cfg).unwrap();
        assert_eq!(shape.as_slice(), &[480, 640, 4]);
    }

    #[test]
    fn bad_capture_value_rejected() {
        let cfg = SensorConfig::new().with("CaptureWidth", "wide");
        let err = SensorKind::RgbCamera
            .shape_rule()
            .resolve("cam", &cfg)
            .unwrap_err();
        assert!(matches!(
            err,
            SensorError::InvalidConfig {
                key: "CaptureWidth",
                ..
            }
        ));
    }

    #[test]
    fn task_sensors_are_reward_pairs() {
        for kind in SensorKind::ALL.into_iter().filter(|k| k.is_task()) {
            assert_eq!(kind.element(), ElementType::F32);
            let shape = kind.shape_rule().resolve("t", &SensorConfig::new()).unwrap();
            assert_eq!(shape.as_slice(), &[2]);
        }
    }

    #[test]
    fn pressure_sensor_size() {
        let shape = SensorKind::PressureSensor
            .shape_rule()
            .resolve("p", &SensorConfig::new())
            .unwrap();
        assert_eq!(shape.as_slice(), &[192]);
    }
}
