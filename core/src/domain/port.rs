//! Port number domain model and the common development ports list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Port
// ============================================================================

/// A validated TCP port number in `1..=65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Validate a raw port number.
    pub fn new(value: u16) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidInput(
                "port must be between 1 and 65535, got 0".to_string(),
            ));
        }
        Ok(Self(value))
    }

    const fn known(value: u16) -> Self {
        assert!(value != 0);
        Self(value)
    }

    /// The raw port number.
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl TryFrom<u16> for Port {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        Port::new(value)
    }
}

impl TryFrom<i64> for Port {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        let raw = u16::try_from(value).map_err(|_| {
            Error::InvalidInput(format!("port must be between 1 and 65535, got {}", value))
        })?;
        Port::new(raw)
    }
}

impl FromStr for Port {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| Error::InvalidInput(format!("'{}' is not a port number", trimmed)))?;
        Port::try_from(value)
    }
}

// ============================================================================
// Common ports
// ============================================================================

/// Ports conventionally used by development servers, in display order.
pub const COMMON_PORTS: [Port; 7] = [
    Port::known(4200),
    Port::known(4201),
    Port::known(3000),
    Port::known(3001),
    Port::known(5173),
    Port::known(5000),
    Port::known(8080),
];

/// The static list of common development ports. Performs no I/O.
pub fn common_ports() -> &'static [Port] {
    &COMMON_PORTS
}
