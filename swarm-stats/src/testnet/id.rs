use std::fmt;

/// The identifier of a session in the [`Testnet`](super::Testnet).
///
/// Sessions are numbered from 1 in creation order, so ids sort the way the
/// sessions were created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// never handed out, the id before the first session
    pub const ZERO: Self = PeerId::new(0);

    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use = "function does not modify the current value"]
    pub(crate) fn next(self) -> Self {
        Self::new(self.0 + 1)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
