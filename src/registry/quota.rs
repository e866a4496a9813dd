//! Per-owner and global map quotas.

use crate::error::{MapError, Result};
use crate::types::{MapId, OwnerId};

/// Quota limits, counted in map IDs (tiles). A limit of 0 means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaLimits {
    /// Maximum number of map IDs a single owner may hold.
    pub player: u32,
    /// Maximum number of map IDs on the whole server.
    pub global: u32,
}

impl QuotaLimits {
    pub fn new(player: u32, global: u32) -> Self {
        Self { player, global }
    }

    /// Check whether `requested` more IDs fit.
    ///
    /// `owned` and `total` must already include outstanding reservations.
    /// The owner limit is checked first.
    pub fn check(&self, requested: usize, owned: usize, total: usize) -> Result<()> {
        if self.player > 0 && owned + requested > self.player as usize {
            return Err(MapError::OwnerQuota { limit: self.player });
        }
        if self.global > 0 && total + requested > self.global as usize {
            return Err(MapError::GlobalQuota { limit: self.global });
        }
        Ok(())
    }
}

/// IDs handed out by [`super::MapRegistry::reserve`] that are not yet
/// attached to a registered map.
///
/// Outstanding reservations count against the quotas, so two requests that
/// pass the check one after the other cannot both overshoot a limit. A
/// reservation must end in either `commit` or `release`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    pub(super) token: u64,
    pub(super) owner: OwnerId,
    pub(super) ids: Vec<MapId>,
}

impl Reservation {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn ids(&self) -> &[MapId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
