use serde::Serialize;

use crate::settings::{Language, Settings, DEFAULT_RADIUS};
use crate::storage::Place;

/// Default number of places requested by a geosearch
pub const DEFAULT_NEARBY_LIMIT: u32 = 20;

/// Parameters of a geosearch besides the coordinates.
///
/// Built from the user's [`Settings`] instead of reading them from global
/// state, so every call states which radius and language it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearbyQuery {
    /// Search radius in meters
    pub radius: u32,
    pub limit: u32,
    pub language: Language,
}

impl Default for NearbyQuery {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            limit: DEFAULT_NEARBY_LIMIT,
            language: Language::En,
        }
    }
}

impl NearbyQuery {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            radius: settings.radius,
            language: settings.language,
            ..Self::default()
        }
    }

    pub fn with_limit(self, limit: u32) -> Self {
        Self { limit, ..self }
    }
}

/// One geosearch hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPlace {
    /// Remote page id
    pub id: i64,
    pub title: String,
    pub lat: f64,
    pub lon: f64,
    /// Meters from the queried coordinates
    pub distance: f64,
}

/// Full detail record for one place.
///
/// Every field is always present in the shape; optional upstream fields that
/// were missing are `None`, and a missing extract is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub extract: String,
    pub image: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    /// Canonical article link
    pub url: Option<String>,
}

impl Summary {
    /// Text to hand to speech synthesis: the extract when there is one,
    /// otherwise the title followed by the description.
    pub fn speech_text(&self) -> String {
        let extract = self.extract.trim();
        if !extract.is_empty() {
            return extract.to_string();
        }
        match self.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                format!("{}. {}", self.title, description)
            }
            _ => self.title.clone(),
        }
    }

    /// The persistable part of the summary. The description is not stored.
    pub fn to_place(&self) -> Place {
        Place {
            page_id: self.id,
            title: self.title.clone(),
            image: self.image.clone(),
            url: self.url.clone(),
            extract: Some(self.extract.clone()).filter(|e| !e.is_empty()),
            saved_at: None,
        }
    }
}

impl From<Place> for Summary {
    /// Rebuild a summary from a downloaded place for offline rendering.
    fn from(place: Place) -> Self {
        Self {
            id: place.page_id,
            title: place.title,
            description: None,
            extract: place.extract.unwrap_or_default(),
            image: place.image,
            image_width: None,
            image_height: None,
            url: place.url,
        }
    }
}
