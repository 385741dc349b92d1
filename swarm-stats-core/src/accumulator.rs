use crate::{
    connection::ConnectionId,
    swarm::{ConnectionObserver, Swarm},
    totals::RunningTotals,
    transport::{TransportField, TransportSample, TransportStats, UnknownField},
};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// Folds the final transport counters of every closing connection into
/// [`RunningTotals`], exactly once per connection.
///
/// One [`Accumulator`] is created per observed swarm, usually through
/// [`Accumulator::attach`], and lives as long as the swarm is monitored.
/// Its totals are never reset.
///
/// # Example
///
/// ```
/// use swarm_stats_core::{Accumulator, ConnectionId, TransportField, TransportStats};
///
/// let accumulator = Accumulator::new();
/// let connection = ConnectionId::new(1);
///
/// accumulator.connection_opened(connection);
/// let last = TransportStats::default().with(TransportField::BytesTransmitted, 512);
/// accumulator.connection_closed(connection, Some(&last));
///
/// assert_eq!(accumulator.running_total(TransportField::BytesTransmitted), 512);
/// ```
#[derive(Debug, Default)]
pub struct Accumulator {
    totals: RunningTotals,

    /// connections opened and not closed yet
    tracked: Mutex<HashSet<ConnectionId>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            totals: RunningTotals::new(),
            tracked: Mutex::new(HashSet::new()),
        }
    }

    /// Create an [`Accumulator`] and subscribe it to the `swarm`'s
    /// connection lifecycle.
    pub fn attach<S>(swarm: &S) -> Arc<Self>
    where
        S: Swarm + ?Sized,
    {
        let accumulator = Arc::new(Self::new());
        swarm.subscribe(Arc::clone(&accumulator) as Arc<dyn ConnectionObserver>);
        accumulator
    }

    fn tracked(&self) -> MutexGuard<'_, HashSet<ConnectionId>> {
        // the set stays consistent even if a holder panicked: every update
        // is a single insert or remove
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking `connection`.
    ///
    /// Returns `false` if the connection was already tracked, in which case
    /// nothing changes.
    pub fn connection_opened(&self, connection: ConnectionId) -> bool {
        let inserted = self.tracked().insert(connection);
        if inserted {
            debug!(%connection, "tracking connection");
        }
        inserted
    }

    /// Fold the final counters of `connection` into the running totals.
    ///
    /// Missing counters, or a missing handle, contribute `0`. A connection
    /// that is not tracked (never opened, or already closed) is ignored and
    /// `false` is returned.
    pub fn connection_closed(
        &self,
        connection: ConnectionId,
        transport: Option<&TransportStats>,
    ) -> bool {
        if !self.tracked().remove(&connection) {
            warn!(%connection, "close of an untracked connection ignored");
            return false;
        }

        let sample = TransportSample::project(transport);
        self.totals.fold(&sample);

        debug!(
            %connection,
            instrumented = transport.is_some(),
            bytes_transmitted = sample.get(TransportField::BytesTransmitted),
            bytes_received = sample.get(TransportField::BytesReceived),
            "folded closed connection"
        );
        true
    }

    /// Total of `field` over every closed connection; `0` until a
    /// connection reporting it closes.
    #[inline]
    pub fn running_total(&self, field: TransportField) -> u64 {
        self.totals.get(field)
    }

    /// Like [`Self::running_total`], with the field given by its name.
    ///
    /// ```
    /// # use swarm_stats_core::Accumulator;
    /// let accumulator = Accumulator::new();
    /// assert_eq!(accumulator.running_total_by_name("bytes_received").unwrap(), 0);
    /// assert!(accumulator.running_total_by_name("bytesReceived").is_err());
    /// ```
    pub fn running_total_by_name(&self, name: &str) -> Result<u64, UnknownField> {
        let field: TransportField = name.parse()?;
        Ok(self.running_total(field))
    }

    pub fn totals(&self) -> TransportSample {
        self.totals.snapshot()
    }

    /// number of connections opened and not closed yet
    pub fn tracked_connections(&self) -> usize {
        self.tracked().len()
    }
}

impl ConnectionObserver for Accumulator {
    fn connection_opened(&self, connection: ConnectionId) {
        Accumulator::connection_opened(self, connection);
    }

    fn connection_closed(&self, connection: ConnectionId, transport: Option<&TransportStats>) {
        Accumulator::connection_closed(self, connection, transport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSwarm;

    fn bytes(transmitted: u64, received: u64) -> TransportStats {
        TransportStats::default()
            .with(TransportField::BytesTransmitted, transmitted)
            .with(TransportField::BytesReceived, received)
    }

    #[test]
    fn unknown_field_reads_as_zero_until_observed() {
        let accumulator = Accumulator::new();
        for field in TransportField::ALL {
            assert_eq!(accumulator.running_total(field), 0);
        }
    }

    #[test]
    fn closed_connection_is_folded_once() {
        let accumulator = Accumulator::new();
        let id = ConnectionId::new(7);

        assert!(accumulator.connection_opened(id));
        assert!(accumulator.connection_closed(id, Some(&bytes(100, 40))));
        // a second close for the same connection must not count again
        assert!(!accumulator.connection_closed(id, Some(&bytes(100, 40))));

        assert_eq!(accumulator.running_total(TransportField::BytesTransmitted), 100);
        assert_eq!(accumulator.running_total(TransportField::BytesReceived), 40);
    }

    #[test]
    fn opening_twice_does_not_double_subscribe() {
        let accumulator = Accumulator::new();
        let id = ConnectionId::new(1);

        assert!(accumulator.connection_opened(id));
        assert!(!accumulator.connection_opened(id));
        assert_eq!(accumulator.tracked_connections(), 1);

        accumulator.connection_closed(id, Some(&bytes(10, 0)));
        accumulator.connection_closed(id, Some(&bytes(10, 0)));

        assert_eq!(accumulator.running_total(TransportField::BytesTransmitted), 10);
        assert_eq!(accumulator.tracked_connections(), 0);
    }

    #[test]
    fn untracked_close_is_ignored() {
        let accumulator = Accumulator::new();

        assert!(!accumulator.connection_closed(ConnectionId::new(3), Some(&bytes(1, 1))));
        assert_eq!(accumulator.totals(), TransportSample::ZERO);
    }

    #[test]
    fn missing_handle_contributes_zero() {
        let accumulator = Accumulator::new();
        let id = ConnectionId::new(1);

        accumulator.connection_opened(id);
        assert!(accumulator.connection_closed(id, None));

        assert_eq!(accumulator.totals(), TransportSample::ZERO);
        assert_eq!(accumulator.tracked_connections(), 0);
    }

    #[test]
    fn partial_handle_keeps_present_fields() {
        let accumulator = Accumulator::new();
        let id = ConnectionId::new(1);
        let partial = TransportStats {
            packets_received: Some(9),
            ..TransportStats::default()
        };

        accumulator.connection_opened(id);
        accumulator.connection_closed(id, Some(&partial));

        assert_eq!(accumulator.running_total(TransportField::PacketsReceived), 9);
        assert_eq!(accumulator.running_total(TransportField::PacketsTransmitted), 0);
    }

    #[test]
    fn by_name() {
        let accumulator = Accumulator::new();
        let id = ConnectionId::new(1);
        accumulator.connection_opened(id);
        accumulator.connection_closed(id, Some(&bytes(5, 6)));

        assert_eq!(accumulator.running_total_by_name("bytes_received"), Ok(6));
        assert_eq!(
            accumulator.running_total_by_name("nope"),
            Err(UnknownField("nope".to_owned()))
        );
    }

    #[test]
    fn attach_tracks_connections_already_live() {
        let swarm = MockSwarm::new();
        let early = swarm.open(Some(bytes(30, 0)));

        let accumulator = Accumulator::attach(&swarm);
        assert_eq!(accumulator.tracked_connections(), 1);

        let late = swarm.open(Some(bytes(0, 0)));
        swarm.update(late, |stats| stats.add(TransportField::BytesTransmitted, 12));
        swarm.close(early);
        swarm.close(late);

        assert_eq!(accumulator.running_total(TransportField::BytesTransmitted), 42);
        assert_eq!(accumulator.tracked_connections(), 0);
    }
}
