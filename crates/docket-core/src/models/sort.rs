//! Document list ordering

use serde::{Deserialize, Serialize};

use super::DocumentRecord;

/// Ordering applied to the cached document list before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentSort {
    /// Newest `created_at` first
    #[default]
    Recent,
    /// Oldest `created_at` first
    Oldest,
    /// Title A to Z
    TitleAsc,
    /// Title Z to A
    TitleDesc,
}

impl DocumentSort {
    /// Cycle to the next ordering, wrapping back to `Recent`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Recent => Self::Oldest,
            Self::Oldest => Self::TitleAsc,
            Self::TitleAsc => Self::TitleDesc,
            Self::TitleDesc => Self::Recent,
        }
    }

    /// Sort records in place.
    pub fn apply(self, records: &mut [DocumentRecord]) {
        match self {
            Self::Recent => records.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            Self::Oldest => records.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            Self::TitleAsc => records.sort_by_cached_key(|record| record.title.to_lowercase()),
            Self::TitleDesc => {
                records.sort_by_cached_key(|record| record.title.to_lowercase());
                records.reverse();
            }
        }
    }
}
