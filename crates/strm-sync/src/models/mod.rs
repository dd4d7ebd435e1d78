use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

pub mod catalog;
pub mod remote;
pub mod sync_run;

pub use catalog::*;
pub use remote::*;
pub use sync_run::*;

/// Content domain. Each domain owns its own cache tables and output root.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ContentDomain {
    Movie,
    Series,
    Live,
}

impl ContentDomain {
    pub const ALL: [ContentDomain; 3] = [Self::Movie, Self::Series, Self::Live];

    /// Parse the value stored in the `domain` column, falling back to movies for
    /// unknown values.
    pub fn from_db(value: &str) -> Self {
        value.parse().unwrap_or(Self::Movie)
    }
}

/// What a caller asks to synchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTarget {
    Domain(ContentDomain),
    All,
}

impl SyncTarget {
    /// Domains covered by this target, restricted to the enabled set and in canonical order.
    pub fn domains(&self, enabled: &[ContentDomain]) -> Vec<ContentDomain> {
        match self {
            SyncTarget::Domain(domain) => vec![*domain],
            SyncTarget::All => ContentDomain::ALL
                .into_iter()
                .filter(|d| enabled.contains(d))
                .collect(),
        }
    }
}

impl From<ContentDomain> for SyncTarget {
    fn from(domain: ContentDomain) -> Self {
        SyncTarget::Domain(domain)
    }
}
