use crate::catalogue::{self, GaugeDescriptor};
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::gauge::ConstGauge,
    registry::Registry,
};
use std::fmt;
use swarm_stats_core::{GaugeValue, Reporter, Swarm};
use tracing::debug;

/// Which gauges [`register_all`] publishes, and under which prefix.
///
/// The [`Default`] publishes every gauge of the [`catalogue`] without a
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// registered in a sub-registry with this prefix (`<prefix>_<name>`)
    pub prefix: Option<String>,
    /// retransmit, fast recovery and RTO totals
    pub stream_recovery: bool,
    /// counters of the DHT client and server sockets
    pub dht_sockets: bool,
    /// counters of the UDX instance
    pub udx: bool,
}

/// A gauge whose value is read from the [`Reporter`] each time the
/// registry is encoded.
struct LazyGauge<S> {
    descriptor: GaugeDescriptor,
    reporter: Reporter<S>,
}

impl MetricsConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The gauges this configuration publishes, in registration order.
    pub fn descriptors(&self) -> Vec<GaugeDescriptor> {
        let mut descriptors = [catalogue::SWARM, catalogue::STREAMS].concat();
        if self.stream_recovery {
            descriptors.extend_from_slice(catalogue::STREAM_RECOVERY);
        }
        if self.dht_sockets {
            descriptors.extend_from_slice(catalogue::DHT_SOCKETS);
        }
        if self.udx {
            descriptors.extend_from_slice(catalogue::UDX);
        }
        descriptors
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            stream_recovery: true,
            dht_sockets: true,
            udx: true,
        }
    }
}

/// Register one gauge per descriptor of `config` in `registry`.
///
/// Values are computed when the registry is encoded, never cached. Calling
/// this twice for the same registry and prefix publishes every name twice,
/// which scrapers reject: register once per process.
///
/// ```
/// # use std::sync::Arc;
/// # use prometheus_client::registry::Registry;
/// # use swarm_stats::{register_all, MetricsConfig, Reporter, testnet::Testnet};
/// let testnet = Testnet::new();
/// let session = Arc::new(testnet.session(Default::default()));
///
/// let mut registry = Registry::default();
/// let config = MetricsConfig::default().with_prefix("hyperswarm");
/// register_all(&Reporter::attach(session), &mut registry, &config);
///
/// let mut text = String::new();
/// prometheus_client::encoding::text::encode(&mut text, &registry).unwrap();
/// assert!(text.contains("hyperswarm_peer_count 0"));
/// ```
pub fn register_all<S>(reporter: &Reporter<S>, registry: &mut Registry, config: &MetricsConfig)
where
    S: Swarm + 'static,
{
    let registry = match &config.prefix {
        Some(prefix) => registry.sub_registry_with_prefix(prefix),
        None => registry,
    };

    let descriptors = config.descriptors();
    debug!(gauges = descriptors.len(), prefix = ?config.prefix, "registering swarm gauges");

    for descriptor in descriptors {
        registry.register_collector(Box::new(LazyGauge {
            descriptor,
            reporter: reporter.clone(),
        }));
    }
}

impl<S> Collector for LazyGauge<S>
where
    S: Swarm + 'static,
{
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        match self.reporter.read(self.descriptor.reading) {
            GaugeValue::Int(value) => {
                let value = i64::try_from(value).unwrap_or(i64::MAX);
                encode_gauge(&mut encoder, &self.descriptor, ConstGauge::new(value))
            }
            GaugeValue::Float(value) => {
                encode_gauge(&mut encoder, &self.descriptor, ConstGauge::new(value))
            }
        }
    }
}

fn encode_gauge<M>(
    encoder: &mut DescriptorEncoder,
    descriptor: &GaugeDescriptor,
    gauge: M,
) -> Result<(), fmt::Error>
where
    M: EncodeMetric,
{
    let metric_encoder = encoder.encode_descriptor(
        descriptor.name,
        descriptor.help,
        None,
        gauge.metric_type(),
    )?;
    gauge.encode(metric_encoder)
}

impl<S> fmt::Debug for LazyGauge<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyGauge")
            .field("name", &self.descriptor.name)
            .field("reading", &self.descriptor.reading)
            .finish()
    }
}
