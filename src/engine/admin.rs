//! Capability token guarding privileged exchange configuration.

use uuid::Uuid;

/// Proof of administrative authority over one [`super::Exchange`].
///
/// Exactly one capability is minted when an exchange is constructed. It is
/// neither `Clone` nor constructible outside this crate, and it only
/// authorises changes on the exchange that minted it.
#[derive(Debug)]
pub struct AdminCapability {
    exchange_id: Uuid,
}

impl AdminCapability {
    pub(crate) const fn mint(exchange_id: Uuid) -> Self {
        Self { exchange_id }
    }

    /// Returns `true` if this capability was minted by `exchange_id`.
    #[must_use]
    pub fn authorises(&self, exchange_id: Uuid) -> bool {
        self.exchange_id == exchange_id
    }
}
