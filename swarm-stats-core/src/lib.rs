/*!
# Swarm transport statistics

The transport counters of a peer-to-peer stream vanish with the stream.
This crate keeps them: an [`Accumulator`] folds the final counters of every
closing connection into running totals and a [`Reporter`] adds those totals
to the counters of the connections still open, so the published values
survive connection churn and never go down.

```
use std::sync::Arc;
use swarm_stats_core::{Reporter, Swarm, TransportField};

fn bytes_sent<S: Swarm>(swarm: Arc<S>) -> u64 {
    let reporter = Reporter::attach(swarm);
    reporter.cumulative(TransportField::BytesTransmitted)
}
```

The swarm itself is abstracted by the [`Swarm`] trait.
*/

mod accumulator;
mod connection;
mod reporter;
pub mod swarm;
mod totals;
mod transport;

#[cfg(test)]
mod mock;

pub use self::{
    accumulator::Accumulator,
    connection::{ConnectionId, Role},
    reporter::{GaugeValue, Reading, Reporter, SwarmCounter},
    swarm::{
        ConnectStats, ConnectionObserver, DhtSockets, DhtStats, PunchStats, QueryStats,
        RoleStats, SocketSide, Swarm,
    },
    totals::RunningTotals,
    transport::{TransportField, TransportSample, TransportStats, UnknownField},
};
