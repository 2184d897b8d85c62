//! Listing entry and its stable identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::url::{extract_entry_id, strip_query};

/// One listing observed on a feed page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Display/reference image URL (may be empty)
    #[serde(default)]
    pub image: String,

    /// Absolute URL to the listing
    pub link: String,
}

impl Entry {
    pub fn new(image: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            link: link.into(),
        }
    }

    /// Stable identifier derived from the link, if it has one.
    pub fn id(&self) -> Option<EntryId> {
        extract_entry_id(&self.link)
    }

    /// One-line rendering used in notifications.
    pub fn display_line(&self) -> String {
        strip_query(&self.link)
    }
}

/// Identifier extracted from an entry link's path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
