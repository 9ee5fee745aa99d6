//! Mesh networking role model.
//!
//! The node participates in a Thread mesh; the stack reports role
//! changes through the adapter, and the role drives the LED indicator
//! and the publish path (a detached node has no route to a gateway).

/// Device role within the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

impl Role {
    /// Map the stack's raw role code.  Unknown codes read as detached,
    /// the safest interpretation.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Disabled,
            2 => Self::Child,
            3 => Self::Router,
            4 => Self::Leader,
            _ => Self::Detached,
        }
    }

    /// Whether this role has mesh connectivity.
    pub fn attached(self) -> bool {
        matches!(self, Self::Child | Self::Router | Self::Leader)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Disabled => "disabled",
            Self::Detached => "detached",
            Self::Child => "child",
            Self::Router => "router",
            Self::Leader => "leader",
        };
        write!(f, "{name}")
    }
}
