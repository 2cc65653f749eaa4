// tests/subscribers_store.rs
//
// File-backed subscriber store: layout, defaults, admin flows.

use std::fs;

use listing_sentinel::model::Category;
use listing_sentinel::subscribers::store::{JsonConfigStore, SubscriberStore};
use listing_sentinel::subscribers::{Range, RangeAttr, SubscriberConfig};

async fn open_store(dir: &std::path::Path) -> JsonConfigStore {
    JsonConfigStore::open(dir.join("bot.json"), dir.join("subscribers"))
        .await
        .unwrap()
}

#[tokio::test]
async fn open_creates_empty_settings() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    assert!(dir.path().join("bot.json").exists());
    assert!(store.list_subscriber_ids().await.unwrap().is_empty());
    assert!(!store.is_bot_admin(1).await.unwrap());
}

#[tokio::test]
async fn missing_config_reads_as_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let cfg = store.get(555).await.unwrap();
    assert_eq!(cfg, SubscriberConfig::default());
    assert!(!cfg.online);
}

#[tokio::test]
async fn register_update_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    store.register(-1001).await.unwrap();
    store.register(-1001).await.unwrap();
    assert_eq!(store.list_subscriber_ids().await.unwrap(), vec![-1001]);

    store
        .update(-1001, |c| {
            c.set_online(true);
            c.add_admin(42);
            c.set_range(RangeAttr::Price, Some(3000.0), Some(1500.0));
            c.add_locations(["Wola", " Ochota "]);
            c.set_category_mode(Some(Category::Flat));
        })
        .await
        .unwrap();

    // a second store over the same files sees the saved state
    let again = open_store(dir.path()).await;
    let cfg = again.get(-1001).await.unwrap();
    assert!(cfg.online);
    assert!(cfg.is_admin(42));
    assert_eq!(cfg.filters.price, Range::between(1500.0, 3000.0));
    assert!(cfg.filters.locations.contains("Ochota"));
    assert_eq!(cfg.filters.category, Some(Category::Flat));

    let raw = fs::read_to_string(dir.path().join("subscribers").join("-1001.json")).unwrap();
    assert!(raw.contains("\"online\": true"));
}

#[tokio::test]
async fn partial_config_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    fs::write(
        dir.path().join("subscribers").join("7.json"),
        r#"{"online": true, "filters": {"size": {"min": 25}}}"#,
    )
    .unwrap();

    let cfg = store.get(7).await.unwrap();
    assert!(cfg.online);
    assert_eq!(cfg.filters.size, Range::new(Some(25.0), None));
    assert_eq!(cfg.filters.price, Range::unbounded());
    assert!(cfg.admins.is_empty());
}

#[tokio::test]
async fn subscriber_is_dropped_once_orphaned() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    store.register(10).await.unwrap();
    store.update(10, |c| {
        c.add_admin(1);
    })
    .await
    .unwrap();
    assert!(!store.unregister_if_orphaned(10).await.unwrap());

    store.update(10, |c| {
        c.remove_admin(1);
    })
    .await
    .unwrap();
    assert!(store.unregister_if_orphaned(10).await.unwrap());
    assert!(store.list_subscriber_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn bot_admins_come_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("bot.json"),
        r#"{"bot_admins": [11, 12], "chat_ids": [5]}"#,
    )
    .unwrap();
    let store = open_store(dir.path()).await;

    assert!(store.is_bot_admin(12).await.unwrap());
    assert!(!store.is_bot_admin(5).await.unwrap());
    assert_eq!(store.settings().await.unwrap().chat_ids, vec![5]);

    store.update(5, |c| c.reset_range(RangeAttr::Rooms)).await.unwrap();
    assert_eq!(
        store.get(5).await.unwrap().range(RangeAttr::Rooms),
        &Range::unbounded()
    );
}
