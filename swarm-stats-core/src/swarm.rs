//! The interface a peer-to-peer swarm offers to be observed.
//!
//! The swarm owns its connections. This crate never opens, closes or mutates
//! them: it is told when they open and close ([`ConnectionObserver`]) and
//! it reads their transport counters on demand ([`Swarm::with_live_transports`]).

use crate::{
    connection::{ConnectionId, Role},
    transport::TransportStats,
};
use std::sync::Arc;

/// Receives the connection lifecycle notifications of a [`Swarm`].
///
/// Notifications are delivered synchronously by the swarm. An observer must
/// not call back into the swarm that is notifying it.
pub trait ConnectionObserver: Send + Sync {
    /// A new connection is now part of the live set.
    fn connection_opened(&self, connection: ConnectionId);

    /// A connection left the live set. `transport` is its final reading, or
    /// `None` if the connection never got a transport handle.
    fn connection_closed(&self, connection: ConnectionId, transport: Option<&TransportStats>);
}

/// A swarm whose connections and counters can be observed.
///
/// # Consistency contract
///
/// An implementation must remove a connection from its live set and notify
/// [`ConnectionObserver::connection_closed`] within the same critical
/// section, and [`Swarm::with_live_transports`] must hold that critical
/// section for the duration of its closure. A reader running inside the
/// closure then sees every connection either live or already closed, never
/// both and never neither.
pub trait Swarm: Send + Sync {
    /// Register an observer.
    ///
    /// `connection_opened` is replayed for every connection already live so
    /// that the observer tracks them too.
    fn subscribe(&self, observer: Arc<dyn ConnectionObserver>);

    /// Run `f` over the transport handles of the live connections.
    ///
    /// A connection without a transport handle yields `None`.
    fn with_live_transports<R>(
        &self,
        f: impl FnOnce(&mut dyn Iterator<Item = Option<&TransportStats>>) -> R,
    ) -> R;

    /// Number of distinct peers the swarm is connected to.
    fn peer_count(&self) -> usize;

    fn connects(&self) -> ConnectStats;

    /// Number of times the swarm refreshed the peers of its topics.
    fn updates(&self) -> u64;

    fn dht(&self) -> DhtStats;

    fn dht_sockets(&self) -> DhtSockets;

    /// Counters of the UDX instance shared by every stream and socket of the
    /// swarm.
    fn udx(&self) -> TransportStats;
}

/// Connection counters of one [`Role`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleStats {
    pub opened: u64,
    pub closed: u64,
    pub attempted: u64,
}

/// Connection counters maintained by the swarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectStats {
    pub client: RoleStats,
    pub server: RoleStats,
}

/// Hole punches, by the strategy that succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PunchStats {
    pub consistent: u64,
    pub random: u64,
    pub open: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// queries currently in flight
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DhtStats {
    pub punches: PunchStats,
    pub queries: QueryStats,
}

/// The two sockets a DHT node talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketSide {
    Client,
    Server,
}

/// Transport readings of the DHT sockets; a socket that is not bound is
/// `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DhtSockets {
    pub client: Option<TransportStats>,
    pub server: Option<TransportStats>,
}

impl ConnectStats {
    pub fn role(&self, role: Role) -> &RoleStats {
        match role {
            Role::Client => &self.client,
            Role::Server => &self.server,
        }
    }

    pub fn role_mut(&mut self, role: Role) -> &mut RoleStats {
        match role {
            Role::Client => &mut self.client,
            Role::Server => &mut self.server,
        }
    }
}

impl DhtSockets {
    pub fn socket(&self, side: SocketSide) -> Option<&TransportStats> {
        match side {
            SocketSide::Client => self.client.as_ref(),
            SocketSide::Server => self.server.as_ref(),
        }
    }
}
