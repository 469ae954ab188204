//! Node identity: the id an actuator reports under.
//!
//! Several nodes can share one host path; each report is prefixed with
//! the node id.  The id rotates round-robin over an inclusive range and
//! only changes when [`NodeId::advance`] is called; the protocol layer
//! never touches it.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId {
    current: u8,
    min: u8,
    max: u8,
}

impl NodeId {
    /// Start at `min`.  An inverted range collapses to `min..=min`.
    pub fn new(min: u8, max: u8) -> Self {
        Self {
            current: min,
            min,
            max: max.max(min),
        }
    }

    pub fn get(&self) -> u8 {
        self.current
    }

    /// Move to the next id, wrapping from `max` back to `min`.
    pub fn advance(&mut self) -> u8 {
        self.current = if self.current >= self.max {
            self.min
        } else {
            self.current + 1
        };
        self.current
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new(0, 4)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.current)
    }
}
