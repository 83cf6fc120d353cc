//! User preferences: search radius and display language.
//!
//! Stored as one JSON blob under [`SETTINGS_KEY`] in the database's
//! key-value table. Reads are fail-soft (anything unreadable yields the
//! defaults and is logged), writes are fail-loud.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Database, DatabaseError};

/// Key of the settings blob in the key-value table
pub const SETTINGS_KEY: &str = "geotalk_settings";

pub const MIN_RADIUS: u32 = 1_000;
pub const MAX_RADIUS: u32 = 10_000;
pub const DEFAULT_RADIUS: u32 = MIN_RADIUS;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Search radius {0} m is outside 1000..=10000 m")]
    RadiusOutOfRange(u32),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to store settings: {0}")]
    Storage(#[from] DatabaseError),
}

#[derive(Debug, Error)]
#[error("Unsupported language '{0}' (expected en, fr or fi)")]
pub struct UnknownLanguage(String);

// ============================================================================
// Language
// ============================================================================

/// Content language, also the subdomain of the encyclopedia endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    Fi,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Fr, Language::Fi];

    /// Two-letter code substituted into endpoint hosts
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Fi => "fi",
        }
    }

    /// Name of the language in that language
    pub fn native_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fr => "Français",
            Language::Fi => "Suomi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Fields missing from a stored blob take their default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Search radius in meters
    pub radius: u32,
    pub language: Language,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            language: Language::En,
        }
    }
}

impl Settings {
    /// Build settings, rejecting a radius outside the supported range.
    pub fn new(radius: u32, language: Language) -> Result<Self, SettingsError> {
        if !(MIN_RADIUS..=MAX_RADIUS).contains(&radius) {
            return Err(SettingsError::RadiusOutOfRange(radius));
        }
        Ok(Self { radius, language })
    }

    fn clamped(self) -> Self {
        Self {
            radius: self.radius.clamp(MIN_RADIUS, MAX_RADIUS),
            ..self
        }
    }
}

// ============================================================================
// SettingsStore
// ============================================================================

#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
}

impl SettingsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stored settings, or the defaults when nothing usable is stored.
    ///
    /// Never fails: a storage error or an unparseable blob is logged and the
    /// defaults are returned. A stored radius outside the supported range is
    /// clamped.
    pub async fn load(&self) -> Settings {
        let raw = match self.db.get_preference(SETTINGS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("No stored settings, using defaults");
                return Settings::default();
            }
            Err(e) => {
                tracing::error!(error = %e, "Error loading settings, using defaults");
                return Settings::default();
            }
        };

        match serde_json::from_str::<Settings>(&raw) {
            Ok(stored) => {
                let settings = stored.clamped();
                if settings != stored {
                    tracing::warn!(
                        stored = stored.radius,
                        clamped = settings.radius,
                        "Stored radius out of range, clamping"
                    );
                }
                settings
            }
            Err(e) => {
                tracing::error!(error = %e, "Stored settings are corrupted, using defaults");
                Settings::default()
            }
        }
    }

    /// Persist `settings`, replacing whatever was stored.
    ///
    /// # Errors
    ///
    /// `RadiusOutOfRange` for an unsupported radius, `Storage` when the
    /// write fails. Errors are logged and returned to the caller.
    pub async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        Settings::new(settings.radius, settings.language)?;
        let raw = serde_json::to_string(settings)?;

        if let Err(e) = self.db.set_preference(SETTINGS_KEY, &raw).await {
            tracing::error!(error = %e, "Error saving settings");
            return Err(e.into());
        }

        tracing::info!(radius = settings.radius, language = %settings.language, "Settings saved");
        Ok(())
    }

    /// Forget the stored settings so the next [`load`](Self::load) returns
    /// the defaults. Returns whether anything was stored.
    pub async fn reset(&self) -> Result<bool, SettingsError> {
        let removed = self.db.delete_preference(SETTINGS_KEY).await?;
        tracing::info!(removed, "Settings reset");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    async fn test_store() -> SettingsStore {
        SettingsStore::new(Database::open(":memory:").await.unwrap())
    }

    #[test]
    fn test_language_codes() {
        assert_eq!("fr".parse::<Language>().unwrap(), Language::Fr);
        assert_eq!(" FI ".parse::<Language>().unwrap(), Language::Fi);
        assert!("de".parse::<Language>().is_err());
        assert_eq!(Language::En.to_string(), "en");
        assert_eq!(Language::Fr.native_name(), "Français");
    }

    #[test]
    fn test_wire_format() {
        let settings = Settings::new(5000, Language::Fr).unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"radius":5000,"language":"fr"}"#);
    }

    #[test]
    fn test_radius_bounds() {
        assert!(Settings::new(MIN_RADIUS, Language::En).is_ok());
        assert!(Settings::new(MAX_RADIUS, Language::En).is_ok());
        assert!(matches!(
            Settings::new(999, Language::En),
            Err(SettingsError::RadiusOutOfRange(999))
        ));
        assert!(Settings::new(10_001, Language::En).is_err());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = test_store().await;
        let settings = Settings::new(5000, Language::Fr).unwrap();

        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await, settings);
    }

    #[tokio::test]
    async fn test_load_defaults_when_empty() {
        let store = test_store().await;
        assert_eq!(
            store.load().await,
            Settings {
                radius: 1000,
                language: Language::En
            }
        );
    }

    #[tokio::test]
    async fn test_corrupted_blob_falls_back() {
        let store = test_store().await;
        store.db.set_preference(SETTINGS_KEY, "{not json").await.unwrap();
        assert_eq!(store.load().await, Settings::default());

        store
            .db
            .set_preference(SETTINGS_KEY, r#"{"radius":2000,"language":"de"}"#)
            .await
            .unwrap();
        assert_eq!(store.load().await, Settings::default());
    }

    #[tokio::test]
    async fn test_partial_blob_keeps_stored_fields() {
        let store = test_store().await;
        store
            .db
            .set_preference(SETTINGS_KEY, r#"{"radius":5000}"#)
            .await
            .unwrap();
        assert_eq!(
            store.load().await,
            Settings {
                radius: 5000,
                language: Language::En
            }
        );

        store
            .db
            .set_preference(SETTINGS_KEY, r#"{"language":"fi"}"#)
            .await
            .unwrap();
        assert_eq!(
            store.load().await,
            Settings {
                radius: DEFAULT_RADIUS,
                language: Language::Fi
            }
        );
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let store = test_store().await;
        store
            .save(&Settings::new(8000, Language::Fr).unwrap())
            .await
            .unwrap();

        assert!(store.reset().await.unwrap());
        assert_eq!(store.load().await, Settings::default());
        assert!(!store.reset().await.unwrap());
    }

    #[tokio::test]
    async fn test_out_of_range_radius_clamped_on_load() {
        let store = test_store().await;
        store
            .db
            .set_preference(SETTINGS_KEY, r#"{"radius":50000,"language":"fi"}"#)
            .await
            .unwrap();

        let settings = store.load().await;
        assert_eq!(settings.radius, MAX_RADIUS);
        assert_eq!(settings.language, Language::Fi);
    }

    #[tokio::test]
    async fn test_save_rejects_out_of_range() {
        let store = test_store().await;
        let result = store
            .save(&Settings {
                radius: 200,
                language: Language::En,
            })
            .await;

        assert!(matches!(result, Err(SettingsError::RadiusOutOfRange(200))));
        assert_eq!(store.load().await, Settings::default());
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_on_save_only() {
        let store = test_store().await;
        sqlx::query("DROP TABLE user_preferences")
            .execute(&store.db.pool)
            .await
            .unwrap();

        let result = store.save(&Settings::default()).await;
        assert!(matches!(result, Err(SettingsError::Storage(_))));
        assert_eq!(store.load().await, Settings::default());
    }

    proptest! {
        #[test]
        fn test_new_accepts_exactly_the_bounded_range(radius in 0u32..20_000) {
            let in_range = (MIN_RADIUS..=MAX_RADIUS).contains(&radius);
            prop_assert_eq!(Settings::new(radius, Language::En).is_ok(), in_range);
        }

        #[test]
        fn test_clamped_stays_in_range(radius in any::<u32>()) {
            let settings = Settings { radius, language: Language::Fi }.clamped();
            prop_assert!((MIN_RADIUS..=MAX_RADIUS).contains(&settings.radius));
            prop_assert_eq!(settings.language, Language::Fi);
        }
    }
}
