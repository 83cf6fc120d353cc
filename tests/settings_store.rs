//! Integration tests for persisted user settings.

use geotalk::settings::{Language, Settings, SettingsStore};
use geotalk::storage::Database;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_defaults_on_fresh_database() {
    let db = Database::open(":memory:").await.unwrap();
    let settings = SettingsStore::new(db).load().await;

    assert_eq!(settings.radius, 1000);
    assert_eq!(settings.language, Language::En);
}

#[tokio::test]
async fn test_save_then_load() {
    let db = Database::open(":memory:").await.unwrap();
    let store = SettingsStore::new(db);

    let wanted = Settings::new(5000, Language::Fr).unwrap();
    store.save(&wanted).await.unwrap();

    assert_eq!(store.load().await, wanted);
}

#[tokio::test]
async fn test_settings_survive_reopen() {
    let dir = std::env::temp_dir().join(format!("geotalk-settings-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("geotalk.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::open(path).await.unwrap();
        SettingsStore::new(db)
            .save(&Settings::new(2500, Language::Fi).unwrap())
            .await
            .unwrap();
    }

    let db = Database::open(path).await.unwrap();
    let settings = SettingsStore::new(db).load().await;
    assert_eq!(settings.radius, 2500);
    assert_eq!(settings.language, Language::Fi);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_later_save_wins() {
    let db = Database::open(":memory:").await.unwrap();
    let store = SettingsStore::new(db);

    store
        .save(&Settings::new(3000, Language::Fr).unwrap())
        .await
        .unwrap();
    store
        .save(&Settings::new(10_000, Language::En).unwrap())
        .await
        .unwrap();

    let settings = store.load().await;
    assert_eq!(settings.radius, 10_000);
    assert_eq!(settings.language, Language::En);
}
