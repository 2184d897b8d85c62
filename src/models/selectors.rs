// src/models/selectors.rs

//! CSS selectors for scraping a listing page.

use serde::{Deserialize, Serialize};

/// CSS selectors and markers for extracting entries from a listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each listing card
    #[serde(default = "defaults::item_selector")]
    pub item_selector: String,

    /// Selector for the link element within a card (the card itself if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selector: Option<String>,

    /// HTML attribute holding the link
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Selector for the image element within a card
    #[serde(default = "defaults::image_selector")]
    pub image_selector: String,

    /// HTML attribute holding the image URL
    #[serde(default = "defaults::image_attr")]
    pub image_attr: String,

    /// Selector for the "next page" link, if the site has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_selector: Option<String>,

    /// Case-insensitive page substrings that indicate a bot-detection wall
    #[serde(default = "defaults::blocked_markers")]
    pub blocked_markers: Vec<String>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item_selector: defaults::item_selector(),
            link_selector: None,
            link_attr: defaults::link_attr(),
            image_selector: defaults::image_selector(),
            image_attr: defaults::image_attr(),
            next_selector: Some("a[rel=next]".to_string()),
            blocked_markers: defaults::blocked_markers(),
        }
    }
}

mod defaults {
    pub fn item_selector() -> String {
        "a[href*='/item/']".into()
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn image_selector() -> String {
        "img".into()
    }
    pub fn image_attr() -> String {
        "src".into()
    }
    pub fn blocked_markers() -> Vec<String> {
        vec![
            "captcha".into(),
            "are you a robot".into(),
            "unusual traffic".into(),
            "access denied".into(),
        ]
    }
}
