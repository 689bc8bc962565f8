//! Output records and the policy for fields missing from a catalog item.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;

/// Values substituted for missing catalog fields. Both query paths build
/// their output through [`Recommendation::from_item`], so this is the only
/// place defaults are decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDefaults {
    pub title: &'static str,
    pub genres: &'static str,
    pub themes: &'static str,
    pub image_url: &'static str,
    pub kind: &'static str,
    /// Outside the 0-10 rating scale, so it can't be mistaken for a real score
    pub score: f64,
    /// 0 means unknown
    pub year: i32,
}

pub const DEFAULTS: FieldDefaults = FieldDefaults {
    title: "noname title",
    genres: "",
    themes: "",
    image_url: "",
    kind: "",
    score: 52.0,
    year: 0,
};

/// A ranked neighbor returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    /// Cosine similarity to the query, in [-1.0, 1.0]
    pub similarity: f32,
    pub genres: String,
    pub themes: String,
    pub score: f64,
    pub year: i32,
    pub image_url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Recommendation {
    pub fn from_item(item: &CatalogItem, similarity: f32) -> Self {
        let text = |value: &Option<String>, default: &str| {
            value.clone().unwrap_or_else(|| default.to_string())
        };

        let title = if item.title.trim().is_empty() {
            DEFAULTS.title.to_string()
        } else {
            item.title.clone()
        };

        Self {
            title,
            similarity,
            genres: text(&item.genres, DEFAULTS.genres),
            themes: text(&item.themes, DEFAULTS.themes),
            score: item.score.unwrap_or(DEFAULTS.score),
            year: item.year.unwrap_or(DEFAULTS.year),
            image_url: text(&item.image_url, DEFAULTS.image_url),
            kind: text(&item.kind, DEFAULTS.kind),
        }
    }
}
