//! Port descriptors for the node system.
//!
//! Each node declares its ports (inputs/outputs) via `PortDescriptor` arrays.
//! The flowgraph uses these to validate edge connections and to size the
//! per-port stream buffers.

/// The item type flowing through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// Complex baseband samples
    Complex,
    /// Real-valued samples (audio, power, readings)
    Float,
    /// Bytes (symbols, bits, frame data)
    Byte,
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for a node's port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub direction: PortDirection,
    pub item: ItemType,
}

impl PortDescriptor {
    pub const fn input(name: &'static str, item: ItemType) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            item,
        }
    }

    pub const fn output(name: &'static str, item: ItemType) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            item,
        }
    }
}

/// The `index`-th port of `direction` in `ports`.
pub fn nth_port(
    ports: &[PortDescriptor],
    direction: PortDirection,
    index: u16,
) -> Option<&PortDescriptor> {
    ports
        .iter()
        .filter(|p| p.direction == direction)
        .nth(index as usize)
}

/// Number of ports of `direction` in `ports`.
pub fn count_ports(ports: &[PortDescriptor], direction: PortDirection) -> usize {
    ports.iter().filter(|p| p.direction == direction).count()
}
