//! Element types, the [`Element`] trait, and [`BufferSpec`].
//!
//! A shared buffer is a flat byte region interpreted as a dense,
//! row-major array of one element type. Both processes run on the same
//! host, so elements are stored in native byte order.

use std::fmt;

use crate::error::ShapeError;
use crate::id::Shape;

/// Classification of a buffer's element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// One byte per element; any non-zero byte reads as `true`.
    Bool,
    /// Unsigned byte (image channels).
    U8,
    /// Signed byte (raw command bytes).
    I8,
    /// 32-bit IEEE float.
    F32,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 => 1,
            Self::F32 => 4,
        }
    }

    /// Short lowercase name, used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::F32 => "f32",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust scalar that can live in a shared buffer.
///
/// Decoding never fails: the engine process may write arbitrary bytes,
/// and the type/shape contract must hold even then.
pub trait Element: Copy + Default + 'static {
    /// The element type tag this Rust type corresponds to.
    const ELEMENT_TYPE: ElementType;

    /// Decode one element from exactly `ELEMENT_TYPE.size_bytes()` bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Encode one element into exactly `ELEMENT_TYPE.size_bytes()` bytes.
    fn encode(self, out: &mut [u8]);
}

impl Element for bool {
    const ELEMENT_TYPE: ElementType = ElementType::Bool;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn encode(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}

impl Element for u8 {
    const ELEMENT_TYPE: ElementType = ElementType::U8;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn encode(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl Element for i8 {
    const ELEMENT_TYPE: ElementType = ElementType::I8;

    fn decode(bytes: &[u8]) -> Self {
        i8::from_ne_bytes([bytes[0]])
    }

    fn encode(self, out: &mut [u8]) {
        out[0] = self.to_ne_bytes()[0];
    }
}

impl Element for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::F32;

    fn decode(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn encode(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_ne_bytes());
    }
}

/// Immutable shape and element type of a shared buffer.
///
/// Fixed at allocation. Buffers are never resized or retyped, so a spec
/// is the complete description of how to interpret the bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferSpec {
    shape: Shape,
    element: ElementType,
}

impl BufferSpec {
    /// Create a spec, rejecting empty shapes and zero-sized dimensions.
    pub fn new(shape: impl Into<Shape>, element: ElementType) -> Result<Self, ShapeError> {
        let shape = shape.into();
        if shape.is_empty() {
            return Err(ShapeError::Empty);
        }
        if let Some(axis) = shape.iter().position(|&d| d == 0) {
            return Err(ShapeError::ZeroDimension { axis });
        }
        shape
            .iter()
            .try_fold(element.size_bytes(), |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| ShapeError::Overflow {
                shape: shape.to_vec(),
            })?;
        Ok(Self { shape, element })
    }

    /// Dimensions, outermost first.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Element type.
    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Total number of elements (product of dimensions).
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Total size in bytes.
    pub fn byte_len(&self) -> usize {
        self.element_count() * self.element.size_bytes()
    }
}

impl fmt::Display for BufferSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.shape.as_slice(), self.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smallvec::smallvec;

    #[test]
    fn camera_spec_byte_len() {
        let spec = BufferSpec::new(smallvec![480, 640, 4], ElementType::U8).unwrap();
        assert_eq!(spec.element_count(), 480 * 640 * 4);
        assert_eq!(spec.byte_len(), 480 * 640 * 4);
    }

    #[test]
    fn f32_spec_accounts_for_width() {
        let spec = BufferSpec::new(smallvec![3, 3], ElementType::F32).unwrap();
        assert_eq!(spec.element_count(), 9);
        assert_eq!(spec.byte_len(), 36);
    }

    #[test]
    fn empty_shape_rejected() {
        assert_eq!(
            BufferSpec::new(Shape::new(), ElementType::F32),
            Err(ShapeError::Empty)
        );
    }

    #[test]
    fn zero_dimension_rejected() {
        assert_eq!(
            BufferSpec::new(smallvec![4, 0, 2], ElementType::U8),
            Err(ShapeError::ZeroDimension { axis: 1 })
        );
    }

    #[test]
    fn overflowing_shape_rejected() {
        let err = BufferSpec::new(smallvec![usize::MAX, 2], ElementType::F32).unwrap_err();
        assert!(matches!(err, ShapeError::Overflow { .. }));
    }

    #[test]
    fn bool_decodes_any_nonzero_as_true() {
        assert!(!bool::decode(&[0]));
        assert!(bool::decode(&[1]));
        assert!(bool::decode(&[0xA5]));
    }

    proptest! {
        #[test]
        fn f32_encode_decode_preserves_bits(v in any::<f32>()) {
            let mut buf = [0u8; 4];
            v.encode(&mut buf);
            prop_assert_eq!(f32::decode(&buf).to_bits(), v.to_bits());
        }
    }
}
