use rand_core::Rng;
use thiserror::Error;

/// How the transmissions of a testnet stream get lost.
///
/// Every stream draws its losses from the testnet's seeded generator, so a
/// run with the same seed loses the same packets. With bursty loss a
/// stream alternates between a good state, where nothing is lost, and a
/// bad state, where everything is: a packet caught in a burst is lost
/// again on retransmission and ends in retransmission timeouts, while
/// independent loss mostly costs a single fast recovery.
///
/// ```
/// use swarm_stats::testnet::LossModel;
///
/// let lossy = LossModel::bursty(0.02, 4.0).unwrap();
/// assert_eq!(lossy.rate(), 0.02);
/// assert!(LossModel::independent(1.5).is_err());
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LossModel(Kind);

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Kind {
    #[default]
    None,
    Independent {
        rate: f64,
    },
    Bursty {
        /// probability to enter a burst after a delivered transmission
        enter: f64,
        /// probability to leave a burst after a lost transmission
        leave: f64,
        rate: f64,
    },
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum LossModelError {
    #[error("loss rate {0} is out of range")]
    Rate(f64),
    #[error("mean burst must be at least one packet, got {0}")]
    BurstLength(f64),
}

/// Loss state of one stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct LossState {
    in_burst: bool,
}

impl LossModel {
    pub const NONE: Self = Self(Kind::None);

    /// Every transmission is lost with probability `rate`, in `[0, 1]`.
    pub fn independent(rate: f64) -> Result<Self, LossModelError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(LossModelError::Rate(rate));
        }
        Ok(Self(Kind::Independent { rate }))
    }

    /// Transmissions are lost in bursts of `mean_burst` transmissions on
    /// average, `rate` of them in the long run.
    ///
    /// `rate` is in `[0, 1)`. If it cannot be reached with bursts that short,
    /// a burst starts after every delivered transmission.
    pub fn bursty(rate: f64, mean_burst: f64) -> Result<Self, LossModelError> {
        if !(0.0..1.0).contains(&rate) {
            return Err(LossModelError::Rate(rate));
        }
        if !(mean_burst >= 1.0 && mean_burst.is_finite()) {
            return Err(LossModelError::BurstLength(mean_burst));
        }
        let leave = 1.0 / mean_burst;
        let enter = (rate * leave / (1.0 - rate)).min(1.0);
        Ok(Self(Kind::Bursty { enter, leave, rate }))
    }

    /// the long run fraction of lost transmissions
    pub fn rate(&self) -> f64 {
        match self.0 {
            Kind::None => 0.0,
            Kind::Independent { rate } | Kind::Bursty { rate, .. } => rate,
        }
    }
}

impl LossState {
    pub(super) fn drops<R>(&mut self, model: &LossModel, rng: &mut R) -> bool
    where
        R: Rng,
    {
        match model.0 {
            Kind::None => false,
            Kind::Independent { rate } => chance(rng, rate),
            Kind::Bursty { enter, leave, .. } => {
                self.in_burst = if self.in_burst {
                    !chance(rng, leave)
                } else {
                    chance(rng, enter)
                };
                self.in_burst
            }
        }
    }
}

/// `true` with the given probability, from the top 53 bits of one draw
fn chance<R: Rng>(rng: &mut R, probability: f64) -> bool {
    let unit = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
    unit < probability
}
