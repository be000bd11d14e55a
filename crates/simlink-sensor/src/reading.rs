//! Typed copies of sensor data.

use simlink_core::{ElementType, Shape};

/// Flat, row-major sensor values of one element type.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorData {
    /// Bool elements.
    Bool(Vec<bool>),
    /// Unsigned bytes.
    U8(Vec<u8>),
    /// Signed bytes.
    I8(Vec<i8>),
    /// 32-bit floats.
    F32(Vec<f32>),
}

impl SensorData {
    /// Element type of the values.
    pub fn element(&self) -> ElementType {
        match self {
            Self::Bool(_) => ElementType::Bool,
            Self::U8(_) => ElementType::U8,
            Self::I8(_) => ElementType::I8,
            Self::F32(_) => ElementType::F32,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One sensor's reading after a tick: shape plus a copy of the data.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    /// Declared shape of the sensor buffer.
    pub shape: Shape,
    /// The values.
    pub data: SensorData,
}

impl SensorReading {
    /// Float values, if this is a float sensor.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            SensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Byte values, if this is an image sensor.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.data {
            SensorData::U8(v) => Some(v),
            _ => None,
        }
    }

    /// Bool values, if this is a flag sensor.
    pub fn as_bool(&self) -> Option<&[bool]> {
        match &self.data {
            SensorData::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Element type of the reading.
    pub fn element(&self) -> ElementType {
        self.data.element()
    }
}
