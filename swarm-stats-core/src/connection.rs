use anyhow::anyhow;
use std::{fmt, str};

/// The identifier of a connection, as seen by one swarm.
///
/// Both ends of a link see the same underlying stream through two
/// different connection objects, each with its own [`ConnectionId`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

/// Which end of a connection initiated it.
///
/// A swarm that joined a topic as a client dials the peers announcing that
/// topic as servers. The same swarm may hold connections in both roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Client,
    Server,
}

impl ConnectionId {
    pub const ZERO: Self = ConnectionId::new(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use = "function does not modify the current value"]
    pub fn next(self) -> Self {
        Self::new(self.0 + 1)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl str::FromStr for ConnectionId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|error| anyhow!("{error}"))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}
