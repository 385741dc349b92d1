//! Transport counters of a single stream.
//!
//! A transport handle is read as a [`TransportStats`], where any counter may
//! be missing. [`TransportSample::project`] turns that reading (or the lack of
//! a handle altogether) into a fully populated [`TransportSample`], missing
//! values counting as `0`.

use std::{fmt, str::FromStr};
use thiserror::Error;

/// Name of one counter exposed by a transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportField {
    BytesTransmitted,
    BytesReceived,
    PacketsTransmitted,
    PacketsReceived,
    Retransmits,
    FastRecoveries,
    RtoCount,
    CongestionWindow,
    Mtu,
}

/// Error returned when parsing a [`TransportField`] from a name it does
/// not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown transport field ({0})")]
pub struct UnknownField(pub String);

/// Raw reading of a transport handle.
///
/// Handles are allowed to expose only a subset of the counters; a `None`
/// field is simply not reported by the handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub bytes_transmitted: Option<u64>,
    pub bytes_received: Option<u64>,
    pub packets_transmitted: Option<u64>,
    pub packets_received: Option<u64>,
    pub retransmits: Option<u64>,
    pub fast_recoveries: Option<u64>,
    pub rto_count: Option<u64>,
    pub congestion_window: Option<u64>,
    pub mtu: Option<u64>,
}

/// Immutable, zero-defaulted view of a transport handle's counters at one
/// instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TransportSample([u64; TransportField::COUNT]);

impl TransportField {
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::BytesTransmitted,
        Self::BytesReceived,
        Self::PacketsTransmitted,
        Self::PacketsReceived,
        Self::Retransmits,
        Self::FastRecoveries,
        Self::RtoCount,
        Self::CongestionWindow,
        Self::Mtu,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::BytesTransmitted => "bytes_transmitted",
            Self::BytesReceived => "bytes_received",
            Self::PacketsTransmitted => "packets_transmitted",
            Self::PacketsReceived => "packets_received",
            Self::Retransmits => "retransmits",
            Self::FastRecoveries => "fast_recoveries",
            Self::RtoCount => "rto_count",
            Self::CongestionWindow => "congestion_window",
            Self::Mtu => "mtu",
        }
    }
}

impl fmt::Display for TransportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransportField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownField(s.to_owned()))
    }
}

impl TransportStats {
    /// A reading where every counter is present and set to `0`.
    pub const ZERO: Self = Self {
        bytes_transmitted: Some(0),
        bytes_received: Some(0),
        packets_transmitted: Some(0),
        packets_received: Some(0),
        retransmits: Some(0),
        fast_recoveries: Some(0),
        rto_count: Some(0),
        congestion_window: Some(0),
        mtu: Some(0),
    };

    fn slot(&mut self, field: TransportField) -> &mut Option<u64> {
        match field {
            TransportField::BytesTransmitted => &mut self.bytes_transmitted,
            TransportField::BytesReceived => &mut self.bytes_received,
            TransportField::PacketsTransmitted => &mut self.packets_transmitted,
            TransportField::PacketsReceived => &mut self.packets_received,
            TransportField::Retransmits => &mut self.retransmits,
            TransportField::FastRecoveries => &mut self.fast_recoveries,
            TransportField::RtoCount => &mut self.rto_count,
            TransportField::CongestionWindow => &mut self.congestion_window,
            TransportField::Mtu => &mut self.mtu,
        }
    }

    pub fn get(&self, field: TransportField) -> Option<u64> {
        match field {
            TransportField::BytesTransmitted => self.bytes_transmitted,
            TransportField::BytesReceived => self.bytes_received,
            TransportField::PacketsTransmitted => self.packets_transmitted,
            TransportField::PacketsReceived => self.packets_received,
            TransportField::Retransmits => self.retransmits,
            TransportField::FastRecoveries => self.fast_recoveries,
            TransportField::RtoCount => self.rto_count,
            TransportField::CongestionWindow => self.congestion_window,
            TransportField::Mtu => self.mtu,
        }
    }

    pub fn set(&mut self, field: TransportField, value: u64) {
        *self.slot(field) = Some(value);
    }

    /// Builder-style [`Self::set`].
    ///
    /// ```
    /// # use swarm_stats_core::{TransportField, TransportStats};
    /// let stats = TransportStats::default().with(TransportField::Mtu, 1_200);
    /// assert_eq!(stats.get(TransportField::Mtu), Some(1_200));
    /// assert_eq!(stats.get(TransportField::BytesReceived), None);
    /// ```
    #[must_use = "function does not modify the current value"]
    pub fn with(mut self, field: TransportField, value: u64) -> Self {
        self.set(field, value);
        self
    }

    /// Increase a counter, treating a missing counter as `0`.
    ///
    /// The counter saturates at `u64::MAX`.
    pub fn add(&mut self, field: TransportField, value: u64) {
        let slot = self.slot(field);
        *slot = Some(slot.unwrap_or(0).saturating_add(value));
    }
}

impl TransportSample {
    pub const ZERO: Self = Self([0; TransportField::COUNT]);

    /// Project an optional transport reading into a sample.
    ///
    /// An absent handle and absent counters both contribute `0`; this
    /// function never fails.
    ///
    /// ```
    /// # use swarm_stats_core::{TransportField, TransportSample, TransportStats};
    /// assert_eq!(TransportSample::project(None), TransportSample::ZERO);
    ///
    /// let partial = TransportStats::default().with(TransportField::BytesReceived, 42);
    /// let sample = TransportSample::project(Some(&partial));
    /// assert_eq!(sample.get(TransportField::BytesReceived), 42);
    /// assert_eq!(sample.get(TransportField::BytesTransmitted), 0);
    /// ```
    pub fn project(transport: Option<&TransportStats>) -> Self {
        match transport {
            Some(transport) => Self::from_fn(|field| transport.get(field).unwrap_or(0)),
            None => Self::ZERO,
        }
    }

    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(TransportField) -> u64,
    {
        Self(TransportField::ALL.map(&mut f))
    }

    #[inline]
    pub fn get(&self, field: TransportField) -> u64 {
        self.0[field.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TransportField, u64)> + '_ {
        TransportField::ALL
            .into_iter()
            .map(|field| (field, self.get(field)))
    }

    /// Field-wise saturating sum of two samples.
    #[must_use = "function does not modify the current value"]
    pub fn saturating_add(self, other: Self) -> Self {
        Self::from_fn(|field| self.get(field).saturating_add(other.get(field)))
    }
}

impl From<&TransportStats> for TransportSample {
    fn from(value: &TransportStats) -> Self {
        Self::project(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip() {
        for field in TransportField::ALL {
            assert_eq!(field.name().parse::<TransportField>(), Ok(field));
        }
    }

    #[test]
    fn field_indices_follow_all() {
        for (index, field) in TransportField::ALL.into_iter().enumerate() {
            assert_eq!(field.index(), index);
        }
    }

    #[test]
    fn unknown_field() {
        assert_eq!(
            "bytesTransmitted".parse::<TransportField>(),
            Err(UnknownField("bytesTransmitted".to_owned()))
        );
    }

    #[test]
    fn missing_handle_is_zero() {
        let sample = TransportSample::project(None);
        assert!(sample.iter().all(|(_, value)| value == 0));
    }

    #[test]
    fn missing_field_does_not_hide_the_others() {
        let stats = TransportStats {
            bytes_transmitted: Some(100),
            packets_transmitted: None,
            mtu: Some(1_200),
            ..TransportStats::default()
        };
        let sample = TransportSample::from(&stats);

        assert_eq!(sample.get(TransportField::BytesTransmitted), 100);
        assert_eq!(sample.get(TransportField::PacketsTransmitted), 0);
        assert_eq!(sample.get(TransportField::Mtu), 1_200);
    }

    #[test]
    fn add_treats_missing_as_zero() {
        let mut stats = TransportStats::default();
        stats.add(TransportField::Retransmits, 3);
        stats.add(TransportField::Retransmits, 4);
        assert_eq!(stats.retransmits, Some(7));

        stats.set(TransportField::BytesReceived, u64::MAX);
        stats.add(TransportField::BytesReceived, 1);
        assert_eq!(stats.bytes_received, Some(u64::MAX));
    }

    #[test]
    fn samples_add_field_wise() {
        let a = TransportSample::from_fn(|field| field.index() as u64);
        let b = TransportSample::from_fn(|_| 10);
        let sum = a.saturating_add(b);

        for field in TransportField::ALL {
            assert_eq!(sum.get(field), field.index() as u64 + 10);
        }
    }
}
