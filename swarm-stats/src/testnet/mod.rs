/*!
An in-memory, deterministic swarm testnet.

Every [`Session`] is one swarm: it joins [`Topic`]s, gets connected to the
other sessions of the same topics on [`Testnet::flush`], sends traffic over
its streams and is eventually destroyed. Sessions implement [`Swarm`] so a
[`Reporter`](swarm_stats_core::Reporter) can observe them exactly as it
would a swarm on a real network.

Nothing happens in the background. Remote closes and the aggregate close
counters are queued as tasks and run one [`Testnet::tick`] at a time, so a
test can observe every intermediate state:

```
use swarm_stats::testnet::{JoinOptions, SessionOptions, Testnet, Topic};
use swarm_stats::Swarm;

let testnet = Testnet::new();
let server = testnet.session(SessionOptions::default());
let client = testnet.session(SessionOptions::default());

let topic = Topic::from([7; 32]);
server.join(topic, JoinOptions::server()).unwrap();
client.join(topic, JoinOptions::client()).unwrap();
assert_eq!(testnet.flush(), 1);

client.destroy().unwrap();

// the server end closes on the next tick, its close is counted on the one after
testnet.tick();
assert_eq!(server.peer_count(), 0);
assert_eq!(server.connects().server.closed, 0);
testnet.tick();
assert_eq!(server.connects().server.closed, 1);
```
*/

mod id;
mod loss;
mod stream;

pub use self::{
    id::PeerId,
    loss::{LossModel, LossModelError},
};
use self::stream::{Stream, Traffic};
use crate::defaults::{
    DEFAULT_DHT_MESSAGE_SIZE, DEFAULT_INITIAL_CONGESTION_WINDOW, DEFAULT_MAX_CONGESTION_WINDOW,
    DEFAULT_MTU, DEFAULT_SEED,
};
use anyhow::{Result, ensure};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use swarm_stats_core::{
    ConnectStats, ConnectionId, ConnectionObserver, DhtSockets, DhtStats, PunchStats, Role,
    SocketSide, Swarm, TransportField, TransportStats,
};
use thiserror::Error;
use tracing::debug;

/// The 32 bytes key of a topic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Topic([u8; 32]);

/// How a session takes part in a topic.
///
/// Servers announce themselves, clients dial the announced servers. A
/// session can be both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    pub server: bool,
    pub client: bool,
}

/// How a session is reachable from the rest of the testnet.
///
/// Dialing a session that is not [`Nat::Public`] requires a hole punch,
/// counted on both ends under the strategy of the dialed session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Nat {
    #[default]
    Public,
    Open,
    Consistent,
    Random,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub nat: Nat,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TestnetError {
    /// The session was never created in this testnet.
    #[error("Peer ({0}) Not Found")]
    UnknownPeer(PeerId),
    /// The session was destroyed.
    #[error("Peer ({0}) was destroyed")]
    Destroyed(PeerId),
    /// The two sessions have no stream between them, call
    /// [`Testnet::flush`] after both joined a common topic.
    #[error("Peers ({from}) and ({to}) are not connected")]
    NotConnected { from: PeerId, to: PeerId },
}

/// Settings of a [`Testnet`], see [`Testnet::builder`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub(crate) seed: u64,
    pub(crate) loss: LossModel,
    pub(crate) mtu: u64,
    pub(crate) initial_congestion_window: u64,
    pub(crate) max_congestion_window: u64,
    pub(crate) dht_message_size: u64,
}

pub struct TestnetBuilder {
    config: Config,
}

/// The testnet. Cloning it gives another handle to the same testnet.
#[derive(Clone)]
pub struct Testnet {
    shared: Arc<Mutex<Shared>>,
}

/// A swarm running in a [`Testnet`].
pub struct Session {
    id: PeerId,
    shared: Arc<Mutex<Shared>>,
}

struct Shared {
    config: Config,
    rng: ChaChaRng,
    peers: BTreeMap<PeerId, Peer>,
    /// joined sessions of every topic, in join order
    topics: BTreeMap<Topic, Vec<(PeerId, JoinOptions)>>,
    tasks: VecDeque<Task>,
    next_peer: PeerId,
    next_connection: ConnectionId,
}

struct Peer {
    options: SessionOptions,
    destroyed: bool,
    streams: BTreeMap<ConnectionId, Stream>,
    observers: Vec<Arc<dyn ConnectionObserver>>,
    connects: ConnectStats,
    dht: DhtStats,
    client_socket: TransportStats,
    /// bound the first time the session joins a topic as a server
    server_socket: Option<TransportStats>,
    udx: TransportStats,
    /// flushes that refreshed the peers of at least one joined topic
    updates: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    /// close the remote end of a stream whose local end closed
    RemoteClose {
        peer: PeerId,
        connection: ConnectionId,
    },
    /// count a close in the aggregate connection counters
    CountClose { peer: PeerId, role: Role },
}

impl From<[u8; 32]> for Topic {
    fn from(key: [u8; 32]) -> Self {
        Self(key)
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

impl JoinOptions {
    pub const fn server() -> Self {
        Self {
            server: true,
            client: false,
        }
    }

    pub const fn client() -> Self {
        Self {
            server: false,
            client: true,
        }
    }
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            server: true,
            client: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            loss: LossModel::NONE,
            mtu: DEFAULT_MTU,
            initial_congestion_window: DEFAULT_INITIAL_CONGESTION_WINDOW,
            max_congestion_window: DEFAULT_MAX_CONGESTION_WINDOW,
            dht_message_size: DEFAULT_DHT_MESSAGE_SIZE,
        }
    }
}

impl TestnetBuilder {
    /// Seed of the generator that decides which packets are lost.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// How the packets of every stream get lost, no loss by default.
    pub fn set_loss_model(mut self, loss: LossModel) -> Self {
        self.config.loss = loss;
        self
    }

    pub fn set_mtu(mut self, mtu: u64) -> Self {
        self.config.mtu = mtu;
        self
    }

    pub fn set_initial_congestion_window(mut self, window: u64) -> Self {
        self.config.initial_congestion_window = window;
        self
    }

    pub fn set_max_congestion_window(mut self, window: u64) -> Self {
        self.config.max_congestion_window = window;
        self
    }

    /// Size of every DHT request and response, in bytes.
    pub fn set_dht_message_size(mut self, size: u64) -> Self {
        self.config.dht_message_size = size;
        self
    }

    /// # Errors
    ///
    /// Fails if the MTU is zero or if the congestion windows are not
    /// `mtu <= initial <= max`.
    pub fn build(self) -> Result<Testnet> {
        let Self { config } = self;

        ensure!(config.mtu > 0, "MTU must not be zero");
        ensure!(
            config.initial_congestion_window >= config.mtu,
            "Initial congestion window ({}) is smaller than the MTU ({})",
            config.initial_congestion_window,
            config.mtu,
        );
        ensure!(
            config.max_congestion_window >= config.initial_congestion_window,
            "Maximum congestion window ({}) is smaller than the initial one ({})",
            config.max_congestion_window,
            config.initial_congestion_window,
        );

        Ok(Testnet::with_config(config))
    }
}

/// Lock the testnet state.
///
/// A panicking observer poisons the lock; the state is still consistent
/// since observers are notified after every mutation of a step.
fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Testnet {
    /// A testnet with the [defaults](crate::defaults).
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Self {
        let shared = Shared {
            rng: ChaChaRng::seed_from_u64(config.seed),
            config,
            peers: BTreeMap::new(),
            topics: BTreeMap::new(),
            tasks: VecDeque::new(),
            next_peer: PeerId::ZERO,
            next_connection: ConnectionId::ZERO,
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
        }
    }

    pub fn builder() -> TestnetBuilder {
        TestnetBuilder {
            config: Config::default(),
        }
    }

    /// Create a new session. It starts with a bound DHT client socket and
    /// no connection.
    pub fn session(&self, options: SessionOptions) -> Session {
        let mut shared = lock(&self.shared);
        let id = shared.next_peer.next();
        shared.next_peer = id;
        shared.peers.insert(id, Peer::new(options));

        debug!(peer = %id, nat = ?options.nat, "new session");

        Session {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Complete the pending DHT queries and connect every client of every
    /// topic to every server of the same topic.
    ///
    /// Every session that joined a topic counts one update.
    ///
    /// Two sessions get at most one connection between them, whatever
    /// the number of topics they share. Returns the number of new
    /// connections.
    pub fn flush(&self) -> usize {
        let mut shared = lock(&self.shared);

        let mut pairs: Vec<(PeerId, PeerId)> = Vec::new();
        for joins in shared.topics.values() {
            let clients = joins.iter().filter(|(_, join)| join.client);
            for (client, _) in clients {
                let servers = joins.iter().filter(|(_, join)| join.server);
                for (server, _) in servers {
                    let known = pairs.iter().any(|&(a, b)| {
                        (a, b) == (*client, *server) || (b, a) == (*client, *server)
                    });
                    if client != server && !known {
                        pairs.push((*client, *server));
                    }
                }
            }
        }

        let joined: BTreeSet<PeerId> = shared
            .topics
            .values()
            .flat_map(|joins| joins.iter().map(|(peer, _)| *peer))
            .collect();
        for (id, peer) in shared.peers.iter_mut() {
            peer.dht.queries.active = 0;
            if joined.contains(id) && !peer.destroyed {
                peer.updates += 1;
            }
        }

        pairs
            .into_iter()
            .filter(|&(client, server)| shared.connect(client, server))
            .count()
    }

    /// Run the tasks that are pending when the tick starts.
    ///
    /// Tasks queued while running them wait for the next tick. Returns the
    /// number of tasks run.
    pub fn tick(&self) -> usize {
        let mut shared = lock(&self.shared);

        let pending = shared.tasks.len();
        for _ in 0..pending {
            let Some(task) = shared.tasks.pop_front() else {
                break;
            };
            shared.run(task);
        }
        pending
    }

    /// Tick until no task is pending. Returns the number of ticks.
    pub fn settle(&self) -> usize {
        let mut ticks = 0;
        while self.tick() > 0 {
            ticks += 1;
        }
        ticks
    }

    pub fn pending_tasks(&self) -> usize {
        lock(&self.shared).tasks.len()
    }
}

impl Default for Testnet {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn next_connection(&mut self) -> ConnectionId {
        self.next_connection = self.next_connection.next();
        self.next_connection
    }

    /// Open a connection from `client` to `server`, unless they are already
    /// connected or one of them is gone.
    fn connect(&mut self, client: PeerId, server: PeerId) -> bool {
        let Some(server_nat) = self
            .peers
            .get(&server)
            .filter(|peer| !peer.destroyed)
            .map(|peer| peer.options.nat)
        else {
            return false;
        };
        match self.peers.get(&client) {
            Some(peer) if !peer.destroyed && !peer.is_connected_to(server) => {}
            _ => return false,
        }

        let client_connection = self.next_connection();
        let server_connection = self.next_connection();
        let Self { config, peers, .. } = self;

        if let Some(peer) = peers.get_mut(&client) {
            peer.connects.client.attempted += 1;
            record_punch(&mut peer.dht.punches, server_nat);
            let stream = Stream::new(server, server_connection, Role::Client, config);
            peer.open(client_connection, stream);
        }
        if let Some(peer) = peers.get_mut(&server) {
            record_punch(&mut peer.dht.punches, server_nat);
            let stream = Stream::new(client, client_connection, Role::Server, config);
            peer.open(server_connection, stream);
        }

        debug!(
            %client,
            %server,
            %client_connection,
            %server_connection,
            "connected"
        );
        true
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::RemoteClose { peer, connection } => {
                let Some(stream) = self
                    .peers
                    .get_mut(&peer)
                    .and_then(|remote| remote.close(connection))
                else {
                    return;
                };
                debug!(%peer, %connection, role = %stream.role, "remote end closed");
                self.tasks.push_back(Task::CountClose {
                    peer,
                    role: stream.role,
                });
            }
            Task::CountClose { peer, role } => {
                if let Some(peer) = self.peers.get_mut(&peer) {
                    peer.connects.role_mut(role).closed += 1;
                }
            }
        }
    }
}

fn record_punch(punches: &mut PunchStats, nat: Nat) {
    match nat {
        Nat::Public => {}
        Nat::Open => punches.open += 1,
        Nat::Consistent => punches.consistent += 1,
        Nat::Random => punches.random += 1,
    }
}

fn live_peer(peers: &mut BTreeMap<PeerId, Peer>, id: PeerId) -> Result<&mut Peer, TestnetError> {
    match peers.get_mut(&id) {
        None => Err(TestnetError::UnknownPeer(id)),
        Some(peer) if peer.destroyed => Err(TestnetError::Destroyed(id)),
        Some(peer) => Ok(peer),
    }
}

impl Peer {
    fn new(options: SessionOptions) -> Self {
        Self {
            options,
            destroyed: false,
            streams: BTreeMap::new(),
            observers: Vec::new(),
            connects: ConnectStats::default(),
            dht: DhtStats::default(),
            client_socket: TransportStats::ZERO,
            server_socket: None,
            udx: TransportStats::ZERO,
            updates: 0,
        }
    }

    fn is_connected_to(&self, remote: PeerId) -> bool {
        self.streams.values().any(|stream| stream.remote == remote)
    }

    /// One request and its response over a DHT socket.
    fn dht_exchange(&mut self, side: SocketSide, size: u64) {
        let socket = match side {
            SocketSide::Client => &mut self.client_socket,
            SocketSide::Server => self.server_socket.get_or_insert(TransportStats::ZERO),
        };
        for transport in [socket, &mut self.udx] {
            transport.add(TransportField::BytesTransmitted, size);
            transport.add(TransportField::PacketsTransmitted, 1);
            transport.add(TransportField::BytesReceived, size);
            transport.add(TransportField::PacketsReceived, 1);
        }
    }

    fn open(&mut self, connection: ConnectionId, stream: Stream) {
        self.connects.role_mut(stream.role).opened += 1;
        self.streams.insert(connection, stream);
        for observer in &self.observers {
            observer.connection_opened(connection);
        }
    }

    /// Remove the stream and notify the observers with its last counters.
    fn close(&mut self, connection: ConnectionId) -> Option<Stream> {
        let stream = self.streams.remove(&connection)?;
        for observer in &self.observers {
            observer.connection_closed(connection, Some(&stream.transport));
        }
        Some(stream)
    }
}

impl Session {
    pub fn id(&self) -> PeerId {
        self.id
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    fn read<T: Default>(&self, f: impl FnOnce(&Peer) -> T) -> T {
        self.shared()
            .peers
            .get(&self.id)
            .map(f)
            .unwrap_or_default()
    }

    /// Join `topic`. The lookup is a DHT query, pending until the next
    /// [`Testnet::flush`]. Joining again replaces the options.
    pub fn join(&self, topic: Topic, options: JoinOptions) -> Result<(), TestnetError> {
        let mut shared = self.shared();
        let size = shared.config.dht_message_size;

        let peer = live_peer(&mut shared.peers, self.id)?;
        peer.dht.queries.total += 1;
        peer.dht.queries.active += 1;
        peer.dht_exchange(SocketSide::Client, size);
        if options.server {
            peer.dht_exchange(SocketSide::Server, size);
        }

        let joins = shared.topics.entry(topic).or_default();
        match joins.iter_mut().find(|(peer, _)| *peer == self.id) {
            Some(join) => join.1 = options,
            None => joins.push((self.id, options)),
        }

        debug!(
            peer = %self.id,
            ?topic,
            server = options.server,
            client = options.client,
            "joined"
        );
        Ok(())
    }

    /// Leave `topic`. Connections already open stay open.
    pub fn leave(&self, topic: Topic) -> Result<(), TestnetError> {
        let mut shared = self.shared();
        live_peer(&mut shared.peers, self.id)?;
        if let Some(joins) = shared.topics.get_mut(&topic) {
            joins.retain(|(peer, _)| *peer != self.id);
        }
        Ok(())
    }

    /// Send `bytes` to `to` over the stream between the two sessions.
    pub fn send(&self, to: PeerId, bytes: u64) -> Result<(), TestnetError> {
        let mut shared = self.shared();
        let Shared {
            config, rng, peers, ..
        } = &mut *shared;

        live_peer(peers, to)?;
        let sender = live_peer(peers, self.id)?;
        let Some(stream) = sender.streams.values_mut().find(|stream| stream.remote == to) else {
            return Err(TestnetError::NotConnected { from: self.id, to });
        };
        let remote_connection = stream.remote_connection;
        let transmission = stream.transmit(bytes, config, rng);
        sender.udx.add(TransportField::BytesTransmitted, transmission.wire.bytes);
        sender.udx.add(TransportField::PacketsTransmitted, transmission.wire.packets);

        let receiver = live_peer(peers, to)?;
        if let Some(stream) = receiver.streams.get_mut(&remote_connection) {
            stream.receive(transmission.delivered);
        }
        let Traffic { bytes, packets } = transmission.delivered;
        receiver.udx.add(TransportField::BytesReceived, bytes);
        receiver.udx.add(TransportField::PacketsReceived, packets);

        Ok(())
    }

    /// Destroy the session: leave every topic and close every connection.
    ///
    /// The local ends close now, the remote ends on the next tick. Returns
    /// the number of connections closed.
    pub fn destroy(&self) -> Result<usize, TestnetError> {
        let mut shared = self.shared();

        let peer = live_peer(&mut shared.peers, self.id)?;
        peer.destroyed = true;
        peer.dht.queries.active = 0;

        let connections: Vec<ConnectionId> = peer.streams.keys().copied().collect();
        let mut tasks = Vec::with_capacity(2 * connections.len());
        for connection in connections {
            if let Some(stream) = peer.close(connection) {
                tasks.push(Task::CountClose {
                    peer: self.id,
                    role: stream.role,
                });
                tasks.push(Task::RemoteClose {
                    peer: stream.remote,
                    connection: stream.remote_connection,
                });
            }
        }
        let closed = tasks.len() / 2;

        shared.tasks.extend(tasks);
        for joins in shared.topics.values_mut() {
            joins.retain(|(peer, _)| *peer != self.id);
        }

        debug!(peer = %self.id, closed, "destroyed");
        Ok(closed)
    }
}

impl Swarm for Session {
    fn subscribe(&self, observer: Arc<dyn ConnectionObserver>) {
        let mut shared = self.shared();
        if let Some(peer) = shared.peers.get_mut(&self.id) {
            for connection in peer.streams.keys() {
                observer.connection_opened(*connection);
            }
            peer.observers.push(observer);
        }
    }

    fn with_live_transports<R>(
        &self,
        f: impl FnOnce(&mut dyn Iterator<Item = Option<&TransportStats>>) -> R,
    ) -> R {
        let shared = self.shared();
        match shared.peers.get(&self.id) {
            Some(peer) => f(&mut peer.streams.values().map(|stream| Some(&stream.transport))),
            None => f(&mut std::iter::empty::<Option<&TransportStats>>()),
        }
    }

    fn peer_count(&self) -> usize {
        self.read(|peer| {
            peer.streams
                .values()
                .map(|stream| stream.remote)
                .collect::<BTreeSet<_>>()
                .len()
        })
    }

    fn connects(&self) -> ConnectStats {
        self.read(|peer| peer.connects)
    }

    fn dht(&self) -> DhtStats {
        self.read(|peer| peer.dht)
    }

    fn dht_sockets(&self) -> DhtSockets {
        self.read(|peer| DhtSockets {
            client: Some(peer.client_socket),
            server: peer.server_socket,
        })
    }

    fn udx(&self) -> TransportStats {
        self.read(|peer| peer.udx)
    }

    fn updates(&self) -> u64 {
        self.read(|peer| peer.updates)
    }
}

impl fmt::Debug for Testnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = lock(&self.shared);
        f.debug_struct("Testnet")
            .field("config", &shared.config)
            .field("peers", &shared.peers.len())
            .field("pending_tasks", &shared.tasks.len())
            .finish()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}
