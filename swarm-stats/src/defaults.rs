//! Default settings of the [`Testnet`](crate::testnet::Testnet).

/// Default seed of the testnet's random number generator.
pub const DEFAULT_SEED: u64 = 0;

/// Default maximum transmission unit of a stream, in bytes.
///
/// This is the payload size of every packet but the last of a message.
pub const DEFAULT_MTU: u64 = 1_200;

/// Default congestion window of a new stream, in bytes.
///
/// ```
/// # use swarm_stats::defaults::*;
/// assert_eq!(DEFAULT_INITIAL_CONGESTION_WINDOW, 10 * DEFAULT_MTU);
/// ```
pub const DEFAULT_INITIAL_CONGESTION_WINDOW: u64 = 10 * DEFAULT_MTU;

/// Default upper bound of a stream's congestion window, in bytes.
pub const DEFAULT_MAX_CONGESTION_WINDOW: u64 = 1_024 * 1_024;

/// Default size of a DHT request or response, in bytes.
pub const DEFAULT_DHT_MESSAGE_SIZE: u64 = 128;

/// Number of times a packet is sent before the stream gives up on it.
///
/// A packet that is lost on every attempt still counts as delivered: the
/// testnet does not model broken streams.
pub const MAX_TRANSMIT_ATTEMPTS: u32 = 8;
