use crate::{
    accumulator::Accumulator,
    swarm::{SocketSide, Swarm},
    transport::{TransportField, TransportSample},
};
use std::{fmt, sync::Arc};
use tracing::trace;

/// A counter maintained by the swarm itself and published as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwarmCounter {
    PeerCount,
    ClientOpened,
    ClientClosed,
    ClientAttempted,
    ServerOpened,
    ServerClosed,
    PunchesConsistent,
    PunchesRandom,
    PunchesOpen,
    QueriesActive,
    QueriesTotal,
    Updates,
    /// a counter of one of the DHT sockets; `0` while the socket is unbound
    DhtSocket {
        side: SocketSide,
        field: TransportField,
    },
    /// a counter of the UDX instance shared by the swarm
    Udx(TransportField),
}

/// What a published value is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading {
    /// See [`Reporter::cumulative`].
    Cumulative(TransportField),
    /// See [`Reporter::average`].
    Average(TransportField),
    /// See [`Reporter::instantaneous`].
    Swarm(SwarmCounter),
}

/// A value computed by [`Reporter::read`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GaugeValue {
    Int(u64),
    /// may be `NaN`, see [`Reporter::average`]
    Float(f64),
}

/// Computes the published values of a swarm on demand.
///
/// Nothing is cached: every call reads the live connections, the
/// [`Accumulator`] and the swarm's own counters afresh.
pub struct Reporter<S> {
    swarm: Arc<S>,
    accumulator: Arc<Accumulator>,
}

impl<S> Reporter<S>
where
    S: Swarm,
{
    /// `accumulator` must be subscribed to `swarm`, see
    /// [`Accumulator::attach`].
    pub fn new(swarm: Arc<S>, accumulator: Arc<Accumulator>) -> Self {
        Self { swarm, accumulator }
    }

    /// Create the [`Accumulator`] of `swarm` and a [`Reporter`] reading
    /// from both.
    pub fn attach(swarm: Arc<S>) -> Self {
        let accumulator = Accumulator::attach(swarm.as_ref());
        Self::new(swarm, accumulator)
    }

    pub fn swarm(&self) -> &S {
        &self.swarm
    }

    pub fn accumulator(&self) -> &Arc<Accumulator> {
        &self.accumulator
    }

    /// Value of `field` summed over every connection the swarm ever had:
    /// the live ones with their current counters, the closed ones with
    /// their final counters.
    ///
    /// The running total is read while the swarm holds its live set, so a
    /// connection closing concurrently is counted once, on one side or the
    /// other.
    pub fn cumulative(&self, field: TransportField) -> u64 {
        let (live, total) = self.swarm.with_live_transports(|transports| {
            let live = transports
                .map(|transport| TransportSample::project(transport).get(field))
                .fold(0u64, u64::saturating_add);
            (live, self.accumulator.running_total(field))
        });

        trace!(%field, live, closed = total, "cumulative");
        live.saturating_add(total)
    }

    /// [`Self::cumulative`] of every field, from a single pass over the
    /// live set.
    pub fn cumulative_sample(&self) -> TransportSample {
        self.swarm.with_live_transports(|transports| {
            transports
                .map(TransportSample::project)
                .fold(self.accumulator.totals(), TransportSample::saturating_add)
        })
    }

    /// Mean of `field` over the live connections that have a transport
    /// handle.
    ///
    /// Returns `NaN` when no live connection has a handle. Callers publishing
    /// the value pass it on unchanged.
    pub fn average(&self, field: TransportField) -> f64 {
        let (sum, count) = self.swarm.with_live_transports(|transports| {
            transports
                .flatten()
                .fold((0u64, 0u64), |(sum, count), transport| {
                    (
                        sum.saturating_add(transport.get(field).unwrap_or(0)),
                        count + 1,
                    )
                })
        });

        if count == 0 {
            f64::NAN
        } else {
            sum as f64 / count as f64
        }
    }

    /// Current value of a counter the swarm maintains itself.
    pub fn instantaneous(&self, counter: SwarmCounter) -> u64 {
        match counter {
            SwarmCounter::PeerCount => self.swarm.peer_count() as u64,
            SwarmCounter::ClientOpened => self.swarm.connects().client.opened,
            SwarmCounter::ClientClosed => self.swarm.connects().client.closed,
            SwarmCounter::ClientAttempted => self.swarm.connects().client.attempted,
            SwarmCounter::ServerOpened => self.swarm.connects().server.opened,
            SwarmCounter::ServerClosed => self.swarm.connects().server.closed,
            SwarmCounter::PunchesConsistent => self.swarm.dht().punches.consistent,
            SwarmCounter::PunchesRandom => self.swarm.dht().punches.random,
            SwarmCounter::PunchesOpen => self.swarm.dht().punches.open,
            SwarmCounter::QueriesActive => self.swarm.dht().queries.active,
            SwarmCounter::QueriesTotal => self.swarm.dht().queries.total,
            SwarmCounter::Updates => self.swarm.updates(),
            SwarmCounter::DhtSocket { side, field } => {
                TransportSample::project(self.swarm.dht_sockets().socket(side)).get(field)
            }
            SwarmCounter::Udx(field) => TransportSample::project(Some(&self.swarm.udx())).get(field),
        }
    }

    pub fn read(&self, reading: Reading) -> GaugeValue {
        match reading {
            Reading::Cumulative(field) => GaugeValue::Int(self.cumulative(field)),
            Reading::Average(field) => GaugeValue::Float(self.average(field)),
            Reading::Swarm(counter) => GaugeValue::Int(self.instantaneous(counter)),
        }
    }
}

impl<S> Clone for Reporter<S> {
    fn clone(&self) -> Self {
        Self {
            swarm: Arc::clone(&self.swarm),
            accumulator: Arc::clone(&self.accumulator),
        }
    }
}

impl<S> fmt::Debug for Reporter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("accumulator", &self.accumulator)
            .finish_non_exhaustive()
    }
}

impl GaugeValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}
