/*!
# Swarm statistics for Prometheus

Publishes the statistics of a peer-to-peer swarm as Prometheus gauges.
Stream counters are cumulative: the counters of closed connections are
kept by an [`Accumulator`] and added to those of the open ones, so
`bytes_transmitted_total` and friends never go down when peers leave.

```
use std::sync::Arc;
use prometheus_client::registry::Registry;
use swarm_stats::{register_all, MetricsConfig, Reporter};
use swarm_stats::testnet::{SessionOptions, Testnet};

let testnet = Testnet::new();
let swarm = Arc::new(testnet.session(SessionOptions::default()));

let mut registry = Registry::default();
register_all(&Reporter::attach(swarm), &mut registry, &MetricsConfig::default());
```

The gauges are listed in the [`catalogue`]. Any swarm implementing
[`Swarm`] can be observed; the [`testnet`] provides an in-memory one.
*/

pub mod catalogue;
pub mod defaults;
mod registry;
pub mod testnet;

pub use self::{
    catalogue::GaugeDescriptor,
    registry::{MetricsConfig, register_all},
};
pub use swarm_stats_core::{
    Accumulator, ConnectionId, ConnectionObserver, GaugeValue, Reading, Reporter, Role, Swarm,
    SwarmCounter, TransportField, TransportStats,
};
