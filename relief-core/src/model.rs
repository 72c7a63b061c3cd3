use disaster_registry::{OfficialUpdate, Resource, SocialMediaPost};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three per-disaster collections that are scoped to the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailKind {
    SocialMedia,
    Resources,
    OfficialUpdates,
}

impl DetailKind {
    pub const ALL: [DetailKind; 3] = [
        DetailKind::SocialMedia,
        DetailKind::Resources,
        DetailKind::OfficialUpdates,
    ];

    /// URL segment naming the collection, e.g. `social-media`.
    pub fn slug(self) -> &'static str {
        match self {
            Self::SocialMedia => "social-media",
            Self::Resources => "resources",
            Self::OfficialUpdates => "official-updates",
        }
    }

    /// Path segments of the collection's route. The id is one opaque segment.
    pub fn segments(self, disaster_id: &str) -> [&str; 4] {
        match self {
            Self::SocialMedia => ["api", "social-media", disaster_id, "social-media"],
            Self::Resources => ["api", "resources", disaster_id, "resources"],
            Self::OfficialUpdates => ["api", "updates", disaster_id, "official-updates"],
        }
    }
}

impl fmt::Display for DetailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SocialMedia => "social media",
            Self::Resources => "resources",
            Self::OfficialUpdates => "official updates",
        })
    }
}

impl FromStr for DetailKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| format!("unknown detail collection '{s}'"))
    }
}

/// A complete, server-materialized detail collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetailSnapshot {
    SocialMedia(Vec<SocialMediaPost>),
    Resources(Vec<Resource>),
    OfficialUpdates(Vec<OfficialUpdate>),
}

impl DetailSnapshot {
    pub fn kind(&self) -> DetailKind {
        match self {
            Self::SocialMedia(_) => DetailKind::SocialMedia,
            Self::Resources(_) => DetailKind::Resources,
            Self::OfficialUpdates(_) => DetailKind::OfficialUpdates,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::SocialMedia(v) => v.len(),
            Self::Resources(v) => v.len(),
            Self::OfficialUpdates(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
