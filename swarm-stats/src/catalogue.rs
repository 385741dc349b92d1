//! Every gauge this crate can publish.
//!
//! The names are the wire contract with whoever scrapes the registry;
//! changing one is a breaking change.

use swarm_stats_core::{Reading, SocketSide, SwarmCounter, TransportField};

/// A published gauge: its name, its help text and how its value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub reading: Reading,
}

const fn swarm(name: &'static str, help: &'static str, counter: SwarmCounter) -> GaugeDescriptor {
    GaugeDescriptor {
        name,
        help,
        reading: Reading::Swarm(counter),
    }
}

const fn cumulative(
    name: &'static str,
    help: &'static str,
    field: TransportField,
) -> GaugeDescriptor {
    GaugeDescriptor {
        name,
        help,
        reading: Reading::Cumulative(field),
    }
}

const fn socket(
    name: &'static str,
    help: &'static str,
    side: SocketSide,
    field: TransportField,
) -> GaugeDescriptor {
    swarm(name, help, SwarmCounter::DhtSocket { side, field })
}

const fn udx(name: &'static str, help: &'static str, field: TransportField) -> GaugeDescriptor {
    swarm(name, help, SwarmCounter::Udx(field))
}

/// Peers, connection counts, hole punches and DHT queries.
pub const SWARM: &[GaugeDescriptor] = &[
    swarm(
        "peer_count",
        "Number of peers this swarm is connected to",
        SwarmCounter::PeerCount,
    ),
    swarm(
        "client_connections_opened",
        "Total number of client connections opened by the swarm",
        SwarmCounter::ClientOpened,
    ),
    swarm(
        "client_connections_closed",
        "Total number of client connections closed by the swarm",
        SwarmCounter::ClientClosed,
    ),
    swarm(
        "client_connections_attempted",
        "Total number of client connections attempted by the swarm",
        SwarmCounter::ClientAttempted,
    ),
    swarm(
        "server_connections_opened",
        "Total number of server connections opened by the swarm",
        SwarmCounter::ServerOpened,
    ),
    swarm(
        "server_connections_closed",
        "Total number of server connections closed by the swarm",
        SwarmCounter::ServerClosed,
    ),
    swarm(
        "punches_consistent",
        "Total number of consistent hole punches performed by the DHT",
        SwarmCounter::PunchesConsistent,
    ),
    swarm(
        "punches_random",
        "Total number of random hole punches performed by the DHT",
        SwarmCounter::PunchesRandom,
    ),
    swarm(
        "punches_open",
        "Total number of open hole punches performed by the DHT",
        SwarmCounter::PunchesOpen,
    ),
    swarm(
        "queries_active",
        "Number of currently active DHT queries",
        SwarmCounter::QueriesActive,
    ),
    swarm(
        "queries_total",
        "Total number of DHT queries",
        SwarmCounter::QueriesTotal,
    ),
];

/// Traffic over the swarm's streams, live and closed, and stream averages.
pub const STREAMS: &[GaugeDescriptor] = &[
    cumulative(
        "bytes_transmitted_total",
        "Total bytes transmitted over the swarm's streams, closed streams included",
        TransportField::BytesTransmitted,
    ),
    cumulative(
        "bytes_received_total",
        "Total bytes received over the swarm's streams, closed streams included",
        TransportField::BytesReceived,
    ),
    cumulative(
        "packets_transmitted_total",
        "Total packets transmitted over the swarm's streams, closed streams included",
        TransportField::PacketsTransmitted,
    ),
    cumulative(
        "packets_received_total",
        "Total packets received over the swarm's streams, closed streams included",
        TransportField::PacketsReceived,
    ),
    GaugeDescriptor {
        name: "avg_congestion_window",
        help: "Average congestion window of the open streams (NaN without any)",
        reading: Reading::Average(TransportField::CongestionWindow),
    },
    GaugeDescriptor {
        name: "avg_mtu",
        help: "Average MTU of the open streams (NaN without any)",
        reading: Reading::Average(TransportField::Mtu),
    },
];

/// Loss recovery counters of the swarm's streams, live and closed.
pub const STREAM_RECOVERY: &[GaugeDescriptor] = &[
    cumulative(
        "retransmits_total",
        "Total packets retransmitted over the swarm's streams",
        TransportField::Retransmits,
    ),
    cumulative(
        "fast_recoveries_total",
        "Total fast recoveries over the swarm's streams",
        TransportField::FastRecoveries,
    ),
    cumulative(
        "rto_count_total",
        "Total retransmission timeouts over the swarm's streams",
        TransportField::RtoCount,
    ),
];

/// Counters of the DHT client and server sockets.
pub const DHT_SOCKETS: &[GaugeDescriptor] = &[
    socket(
        "dht_client_socket_bytes_transmitted",
        "Bytes transmitted by the DHT client socket",
        SocketSide::Client,
        TransportField::BytesTransmitted,
    ),
    socket(
        "dht_client_socket_packets_transmitted",
        "Packets transmitted by the DHT client socket",
        SocketSide::Client,
        TransportField::PacketsTransmitted,
    ),
    socket(
        "dht_client_socket_bytes_received",
        "Bytes received by the DHT client socket",
        SocketSide::Client,
        TransportField::BytesReceived,
    ),
    socket(
        "dht_client_socket_packets_received",
        "Packets received by the DHT client socket",
        SocketSide::Client,
        TransportField::PacketsReceived,
    ),
    socket(
        "dht_server_socket_bytes_transmitted",
        "Bytes transmitted by the DHT server socket",
        SocketSide::Server,
        TransportField::BytesTransmitted,
    ),
    socket(
        "dht_server_socket_packets_transmitted",
        "Packets transmitted by the DHT server socket",
        SocketSide::Server,
        TransportField::PacketsTransmitted,
    ),
    socket(
        "dht_server_socket_bytes_received",
        "Bytes received by the DHT server socket",
        SocketSide::Server,
        TransportField::BytesReceived,
    ),
    socket(
        "dht_server_socket_packets_received",
        "Packets received by the DHT server socket",
        SocketSide::Server,
        TransportField::PacketsReceived,
    ),
];

/// Counters of the UDX instance, which carries both streams and sockets.
pub const UDX: &[GaugeDescriptor] = &[
    udx(
        "udx_bytes_transmitted_total",
        "Total bytes transmitted by the UDX instance",
        TransportField::BytesTransmitted,
    ),
    udx(
        "udx_packets_transmitted_total",
        "Total packets transmitted by the UDX instance",
        TransportField::PacketsTransmitted,
    ),
    udx(
        "udx_bytes_received_total",
        "Total bytes received by the UDX instance",
        TransportField::BytesReceived,
    ),
    udx(
        "udx_packets_received_total",
        "Total packets received by the UDX instance",
        TransportField::PacketsReceived,
    ),
];
