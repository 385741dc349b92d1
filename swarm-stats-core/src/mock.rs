//! A minimal [`Swarm`] whose live set is driven by hand.

use crate::{
    connection::ConnectionId,
    swarm::{ConnectionObserver, ConnectStats, DhtSockets, DhtStats, Swarm},
    transport::TransportStats,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Default)]
pub(crate) struct MockSwarm(Mutex<State>);

#[derive(Default)]
struct State {
    id: ConnectionId,
    live: BTreeMap<ConnectionId, Option<TransportStats>>,
    observers: Vec<Arc<dyn ConnectionObserver>>,
    peers: usize,
    connects: ConnectStats,
    updates: u64,
    dht: DhtStats,
    dht_sockets: DhtSockets,
    udx: TransportStats,
}

impl MockSwarm {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    pub(crate) fn open(&self, transport: Option<TransportStats>) -> ConnectionId {
        let mut state = self.state();
        state.id = state.id.next();
        let id = state.id;
        state.live.insert(id, transport);
        for observer in &state.observers {
            observer.connection_opened(id);
        }
        id
    }

    pub(crate) fn update(&self, id: ConnectionId, f: impl FnOnce(&mut TransportStats)) {
        if let Some(Some(transport)) = self.state().live.get_mut(&id) {
            f(transport)
        }
    }

    /// drop the transport handle of a live connection, as a stream being
    /// torn down would
    pub(crate) fn detach_transport(&self, id: ConnectionId) {
        if let Some(transport) = self.state().live.get_mut(&id) {
            *transport = None;
        }
    }

    pub(crate) fn close(&self, id: ConnectionId) {
        let mut state = self.state();
        if let Some(transport) = state.live.remove(&id) {
            for observer in &state.observers {
                observer.connection_closed(id, transport.as_ref());
            }
        }
    }

    pub(crate) fn with_counters(&self, f: impl FnOnce(&mut ConnectStats, &mut DhtStats, &mut usize)) {
        let mut state = self.state();
        let State {
            connects,
            dht,
            peers,
            ..
        } = &mut *state;
        f(connects, dht, peers)
    }

    pub(crate) fn set_updates(&self, updates: u64) {
        self.state().updates = updates;
    }

    pub(crate) fn set_io(&self, dht_sockets: DhtSockets, udx: TransportStats) {
        let mut state = self.state();
        state.dht_sockets = dht_sockets;
        state.udx = udx;
    }
}

impl Swarm for MockSwarm {
    fn subscribe(&self, observer: Arc<dyn ConnectionObserver>) {
        let mut state = self.state();
        for id in state.live.keys() {
            observer.connection_opened(*id);
        }
        state.observers.push(observer);
    }

    fn with_live_transports<R>(
        &self,
        f: impl FnOnce(&mut dyn Iterator<Item = Option<&TransportStats>>) -> R,
    ) -> R {
        let state = self.state();
        f(&mut state.live.values().map(Option::as_ref))
    }

    fn peer_count(&self) -> usize {
        self.state().peers
    }

    fn connects(&self) -> ConnectStats {
        self.state().connects
    }

    fn updates(&self) -> u64 {
        self.state().updates
    }

    fn dht(&self) -> DhtStats {
        self.state().dht
    }

    fn dht_sockets(&self) -> DhtSockets {
        self.state().dht_sockets
    }

    fn udx(&self) -> TransportStats {
        self.state().udx
    }
}
