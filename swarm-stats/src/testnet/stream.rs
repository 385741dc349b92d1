use super::{Config, PeerId, loss::LossState};
use crate::defaults::MAX_TRANSMIT_ATTEMPTS;
use rand_core::Rng;
use swarm_stats_core::{ConnectionId, Role, TransportField, TransportStats};

/// One end of a connection between two testnet peers.
#[derive(Debug)]
pub(super) struct Stream {
    pub(super) remote: PeerId,
    /// the connection of the other end, in the remote peer
    pub(super) remote_connection: ConnectionId,
    pub(super) role: Role,
    pub(super) transport: TransportStats,
    loss: LossState,
}

/// Bytes and packets, as counted on one side of a stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Traffic {
    pub(super) bytes: u64,
    pub(super) packets: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Transmission {
    /// everything put on the wire, retransmissions included
    pub(super) wire: Traffic,
    /// what reached the other end
    pub(super) delivered: Traffic,
}

impl Stream {
    pub(super) fn new(
        remote: PeerId,
        remote_connection: ConnectionId,
        role: Role,
        config: &Config,
    ) -> Self {
        let transport = TransportStats::ZERO
            .with(TransportField::CongestionWindow, config.initial_congestion_window)
            .with(TransportField::Mtu, config.mtu);
        Self {
            remote,
            remote_connection,
            role,
            transport,
            loss: LossState::default(),
        }
    }

    fn congestion_window(&self) -> u64 {
        self.transport
            .get(TransportField::CongestionWindow)
            .unwrap_or(0)
    }

    /// Send `bytes` to the remote end, one MTU-sized packet at a time.
    ///
    /// A lost packet is sent again, up to [`MAX_TRANSMIT_ATTEMPTS`] times.
    /// The first retransmission of a packet is a fast recovery, every
    /// further one follows a retransmission timeout, so `retransmits` is
    /// always `fast_recoveries + rto_count`. See [`next_window`] for the
    /// congestion window.
    pub(super) fn transmit<R>(&mut self, bytes: u64, config: &Config, rng: &mut R) -> Transmission
    where
        R: Rng,
    {
        let mut transmission = Transmission::default();
        let mut window = self.congestion_window();
        let mut remaining = bytes;

        while remaining > 0 {
            let size = remaining.min(config.mtu);
            remaining -= size;

            let mut attempts = 1;
            while attempts < MAX_TRANSMIT_ATTEMPTS && self.loss.drops(&config.loss, rng) {
                attempts += 1;
            }
            let attempts = u64::from(attempts);
            let lost = attempts - 1;
            let wire_bytes = size.saturating_mul(attempts);

            self.transport.add(TransportField::BytesTransmitted, wire_bytes);
            self.transport.add(TransportField::PacketsTransmitted, attempts);
            transmission.wire.add(wire_bytes, attempts);

            if lost > 0 {
                self.transport.add(TransportField::Retransmits, lost);
                self.transport.add(TransportField::FastRecoveries, 1);
                self.transport.add(TransportField::RtoCount, lost - 1);
            }
            window = next_window(window, lost, config);

            transmission.delivered.add(size, 1);
        }

        self.transport.set(TransportField::CongestionWindow, window);
        transmission
    }

    pub(super) fn receive(&mut self, traffic: Traffic) {
        self.transport.add(TransportField::BytesReceived, traffic.bytes);
        self.transport.add(TransportField::PacketsReceived, traffic.packets);
    }
}

impl Traffic {
    fn add(&mut self, bytes: u64, packets: u64) {
        self.bytes = self.bytes.saturating_add(bytes);
        self.packets = self.packets.saturating_add(packets);
    }
}

/// Congestion window after a packet that was lost `lost` times.
///
/// A clean delivery grows the window by one MTU up to the configured
/// maximum, a fast recovery halves it and a retransmission timeout
/// collapses it. It never goes below one MTU.
fn next_window(window: u64, lost: u64, config: &Config) -> u64 {
    match lost {
        0 => window
            .saturating_add(config.mtu)
            .min(config.max_congestion_window),
        1 => (window / 2).max(config.mtu),
        _ => config.mtu,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::LossModel;
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    fn stream() -> Stream {
        Stream::new(PeerId::new(2), ConnectionId::new(2), Role::Client, &Config::default())
    }

    #[test]
    fn splits_into_mtu_sized_packets() {
        let config = Config::default();
        let mut rng = ChaChaRng::seed_from_u64(0);
        let mut stream = stream();

        let transmission = stream.transmit(2 * config.mtu + 1, &config, &mut rng);

        assert_eq!(transmission.wire, transmission.delivered);
        assert_eq!(transmission.delivered.packets, 3);
        assert_eq!(transmission.delivered.bytes, 2 * config.mtu + 1);
        assert_eq!(stream.transport.packets_transmitted, Some(3));
        assert_eq!(stream.transport.retransmits, Some(0));
    }

    #[test]
    fn empty_message_sends_nothing() {
        let config = Config::default();
        let mut rng = ChaChaRng::seed_from_u64(0);
        let mut stream = stream();

        assert_eq!(stream.transmit(0, &config, &mut rng), Transmission::default());
        assert_eq!(
            stream.transport.congestion_window,
            Some(config.initial_congestion_window)
        );
    }

    #[test]
    fn window_grows_until_the_maximum() {
        let config = Config::default();
        let mut rng = ChaChaRng::seed_from_u64(0);
        let mut stream = stream();

        stream.transmit(4 * config.mtu, &config, &mut rng);
        assert_eq!(
            stream.transport.congestion_window,
            Some(config.initial_congestion_window + 4 * config.mtu)
        );

        stream.transmit(100 * config.max_congestion_window, &config, &mut rng);
        assert_eq!(
            stream.transport.congestion_window,
            Some(config.max_congestion_window)
        );
    }

    #[test]
    fn total_loss_retransmits_every_packet() {
        let config = Config {
            loss: LossModel::independent(1.0).unwrap(),
            ..Config::default()
        };
        let mut rng = ChaChaRng::seed_from_u64(0);
        let mut stream = stream();

        let transmission = stream.transmit(config.mtu, &config, &mut rng);
        let attempts = u64::from(MAX_TRANSMIT_ATTEMPTS);

        assert_eq!(transmission.wire.packets, attempts);
        assert_eq!(transmission.delivered.packets, 1);
        assert_eq!(stream.transport.retransmits, Some(attempts - 1));
        assert_eq!(stream.transport.fast_recoveries, Some(1));
        assert_eq!(stream.transport.rto_count, Some(attempts - 2));
        // a timeout collapses the window in one go
        assert_eq!(stream.transport.congestion_window, Some(config.mtu));
    }

    #[test]
    fn recoveries_account_for_every_retransmit() {
        let config = Config {
            loss: LossModel::bursty(0.2, 3.0).unwrap(),
            ..Config::default()
        };
        let mut rng = ChaChaRng::seed_from_u64(5);
        let mut stream = stream();

        let transmission = stream.transmit(500 * config.mtu, &config, &mut rng);
        let transport = stream.transport;
        let retransmits = transport.retransmits.unwrap();

        assert!(transport.fast_recoveries.unwrap() > 0);
        assert!(transport.rto_count.unwrap() > 0);
        assert_eq!(
            retransmits,
            transport.fast_recoveries.unwrap() + transport.rto_count.unwrap()
        );
        assert_eq!(transmission.wire.packets, 500 + retransmits);
        assert_eq!(transport.packets_transmitted, Some(500 + retransmits));
    }

    #[test]
    fn window_reacts_to_losses() {
        let config = Config::default();
        let initial = config.initial_congestion_window;

        assert_eq!(next_window(initial, 0, &config), initial + config.mtu);
        assert_eq!(next_window(initial, 1, &config), initial / 2);
        assert_eq!(next_window(initial, 2, &config), config.mtu);

        let mut window = initial;
        for _ in 0..10 {
            window = next_window(window, 1, &config);
        }
        assert_eq!(window, config.mtu);
    }

    #[test]
    fn huge_packets_saturate() {
        let config = Config {
            loss: LossModel::independent(1.0).unwrap(),
            mtu: u64::MAX,
            initial_congestion_window: u64::MAX,
            max_congestion_window: u64::MAX,
            ..Config::default()
        };
        let mut rng = ChaChaRng::seed_from_u64(0);
        let mut stream = stream();

        let transmission = stream.transmit(u64::MAX, &config, &mut rng);

        assert_eq!(transmission.wire.bytes, u64::MAX);
        assert_eq!(transmission.delivered.bytes, u64::MAX);
        assert_eq!(stream.transport.bytes_transmitted, Some(u64::MAX));
        assert_eq!(stream.transport.congestion_window, Some(u64::MAX));
    }

    #[test]
    fn receive_counts_delivered_traffic() {
        let mut stream = stream();
        stream.receive(Traffic {
            bytes: 3_000,
            packets: 3,
        });
        assert_eq!(stream.transport.bytes_received, Some(3_000));
        assert_eq!(stream.transport.packets_received, Some(3));
    }
}
