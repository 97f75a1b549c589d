//! Typed stream buffers for the flowgraph hot path.
//!
//! `StreamBuffer` holds one block of items for a single port. Each node slot
//! owns one buffer per port; buffers are cleared and refilled every tick,
//! so after the first few ticks no allocation happens on the hot path.

use crate::pipeline::port::ItemType;
use crate::types::Complex32;

/// One block of items on a port.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamBuffer {
    Complex(Vec<Complex32>),
    Float(Vec<f32>),
    Byte(Vec<u8>),
}

impl StreamBuffer {
    /// Create an empty buffer for `item`.
    pub fn new(item: ItemType) -> Self {
        match item {
            ItemType::Complex => StreamBuffer::Complex(Vec::new()),
            ItemType::Float => StreamBuffer::Float(Vec::new()),
            ItemType::Byte => StreamBuffer::Byte(Vec::new()),
        }
    }

    /// Item type carried by this buffer.
    pub fn item_type(&self) -> ItemType {
        match self {
            StreamBuffer::Complex(_) => ItemType::Complex,
            StreamBuffer::Float(_) => ItemType::Float,
            StreamBuffer::Byte(_) => ItemType::Byte,
        }
    }

    /// Clear for reuse (keeps capacity).
    #[inline]
    pub fn clear(&mut self) {
        match self {
            StreamBuffer::Complex(v) => v.clear(),
            StreamBuffer::Float(v) => v.clear(),
            StreamBuffer::Byte(v) => v.clear(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            StreamBuffer::Complex(v) => v.len(),
            StreamBuffer::Float(v) => v.len(),
            StreamBuffer::Byte(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the content of `src`. Returns `false` on an item type mismatch.
    pub fn append_from(&mut self, src: &StreamBuffer) -> bool {
        match (self, src) {
            (StreamBuffer::Complex(dst), StreamBuffer::Complex(s)) => dst.extend_from_slice(s),
            (StreamBuffer::Float(dst), StreamBuffer::Float(s)) => dst.extend_from_slice(s),
            (StreamBuffer::Byte(dst), StreamBuffer::Byte(s)) => dst.extend_from_slice(s),
            _ => return false,
        }
        true
    }

    pub fn as_complex(&self) -> Option<&[Complex32]> {
        match self {
            StreamBuffer::Complex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f32]> {
        match self {
            StreamBuffer::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StreamBuffer::Byte(v) => Some(v),
            _ => None,
        }
    }

    pub fn complex_mut(&mut self) -> Option<&mut Vec<Complex32>> {
        match self {
            StreamBuffer::Complex(v) => Some(v),
            _ => None,
        }
    }

    pub fn float_mut(&mut self) -> Option<&mut Vec<f32>> {
        match self {
            StreamBuffer::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            StreamBuffer::Byte(v) => Some(v),
            _ => None,
        }
    }
}

/// Configuration values that can be sent to nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(v) => Some(v),
            _ => None,
        }
    }
}
