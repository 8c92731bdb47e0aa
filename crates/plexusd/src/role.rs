//! Process roles inside an SMP group.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role of one server process, fixed for the lifetime of the process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProcessRole {
    /// The only process; executes every request locally.
    Standalone,
    /// Executes writes and replicates them to every follower.
    Leader,
    /// Relays client writes to the leader and applies replicated copies.
    Follower,
}

impl ProcessRole {
    /// Derives the role of the process at `index` in a group of `size`.
    ///
    /// A group of one runs standalone; otherwise the first process leads.
    #[must_use]
    pub const fn for_member(index: usize, size: usize) -> Self {
        if size <= 1 {
            Self::Standalone
        } else if index == 0 {
            Self::Leader
        } else {
            Self::Follower
        }
    }
}
