//! Behaviour every `ContentStore` adapter must share. Each check expects an
//! empty store and panics on the first deviation.

use chrono::{Duration, Utc};
use domains::{
    AdsConfig, Chapter, ChapterBody, ChapterKey, ContentStore, Page, User, Work, WorkKind,
    WorkPatch,
};
use serde_json::json;

fn work(id: i64, title: &str, kind: WorkKind) -> Work {
    serde_json::from_value(json!({
        "id": id,
        "title": title,
        "type": kind.as_str(),
        "cover": format!("{id}.png"),
    }))
    .expect("valid work")
}

fn chapter(title: &str, id: &str) -> Chapter {
    Chapter {
        key: ChapterKey::new(title, id),
        body: ChapterBody {
            title: format!("Chapter {id}"),
            pages: vec![Page::Path(format!("{id}/1.png"))],
            content: None,
        },
    }
}

pub async fn works_are_keyed_per_collection(store: &dyn ContentStore) {
    store.insert_work(work(2, "B", WorkKind::Manga)).await.unwrap();
    store.insert_work(work(1, "A", WorkKind::Manga)).await.unwrap();
    store.insert_work(work(3, "C", WorkKind::Novel)).await.unwrap();

    let err = store.insert_work(work(1, "again", WorkKind::Manga)).await.unwrap_err();
    assert!(err.is_duplicate_key());

    let ids: Vec<_> = store
        .list_works(WorkKind::Manga)
        .await
        .unwrap()
        .into_iter()
        .map(|work| work.id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(store.max_work_id(WorkKind::Manga).await.unwrap(), Some(2));
    assert_eq!(store.max_work_id(WorkKind::Novel).await.unwrap(), Some(3));
    assert_eq!(store.count_works(WorkKind::Novel).await.unwrap(), 1);
    assert_eq!(store.find_work(WorkKind::Novel, 1).await.unwrap(), None);
}

pub async fn one_id_space_spans_both_kinds(store: &dyn ContentStore) {
    store.insert_work(work(1, "Manga", WorkKind::Manga)).await.unwrap();
    let err = store.insert_work(work(1, "Novel", WorkKind::Novel)).await.unwrap_err();
    assert!(err.is_duplicate_key());
    assert_eq!(store.count_works(WorkKind::Novel).await.unwrap(), 0);

    // only the owning kind can delete, and deleting frees the id
    assert!(!store.delete_work(WorkKind::Novel, 1).await.unwrap());
    assert!(store.delete_work(WorkKind::Manga, 1).await.unwrap());
    assert!(!store.delete_work(WorkKind::Manga, 1).await.unwrap());
    store.insert_work(work(1, "Novel", WorkKind::Novel)).await.unwrap();
    assert_eq!(store.find_work(WorkKind::Novel, 1).await.unwrap().unwrap().title, "Novel");
}

pub async fn updates_merge_into_the_stored_work(store: &dyn ContentStore) {
    store.insert_work(work(4, "Before", WorkKind::Manga)).await.unwrap();

    let patch = WorkPatch::try_from(json!({"title": "After", "author": "Someone"})).unwrap();
    assert!(store.update_work(WorkKind::Manga, 4, &patch).await.unwrap());
    assert!(!store.update_work(WorkKind::Novel, 4, &patch).await.unwrap());
    assert!(store.set_chapters_count(WorkKind::Manga, 4, 7).await.unwrap());
    assert!(!store.set_chapters_count(WorkKind::Manga, 5, 7).await.unwrap());

    let stored = store.find_work(WorkKind::Manga, 4).await.unwrap().unwrap();
    assert_eq!(stored.title, "After");
    assert_eq!(stored.chapters_count, 7);
    assert_eq!(stored.extra["author"], "Someone");
    assert_eq!(stored.extra["cover"], "4.png");
}

pub async fn chapters_are_unique_per_title_and_id(store: &dyn ContentStore) {
    store.insert_chapter(chapter("one-piece", "1")).await.unwrap();
    store.insert_chapter(chapter("one-piece", "2")).await.unwrap();
    store.insert_chapter(chapter("bleach", "1")).await.unwrap();
    assert!(store
        .insert_chapter(chapter("one-piece", "1"))
        .await
        .unwrap_err()
        .is_duplicate_key());

    assert_eq!(store.count_chapters("one-piece").await.unwrap(), 2);
    assert_eq!(store.count_all_chapters().await.unwrap(), 3);

    let key = ChapterKey::new("one-piece", "2");
    let body = ChapterBody {
        title: "Replaced".into(),
        content: Some("text".into()),
        ..ChapterBody::default()
    };
    assert!(store.replace_chapter(&key, body.clone()).await.unwrap());
    assert!(!store
        .replace_chapter(&ChapterKey::new("one-piece", "9"), body.clone())
        .await
        .unwrap());
    assert_eq!(store.find_chapter(&key).await.unwrap().unwrap().body, body);

    let listed = store.list_chapters("one-piece").await.unwrap();
    assert_eq!(listed[0], chapter("one-piece", "1"));

    assert!(store.delete_chapter(&key).await.unwrap());
    assert!(!store.delete_chapter(&key).await.unwrap());
    assert_eq!(store.list_chapters("one-piece").await.unwrap().len(), 1);
}

pub async fn users_are_touched_and_removed(store: &dyn ContentStore) {
    let guest = User::guest(None, Utc::now());
    store.insert_user(guest.clone()).await.unwrap();
    assert!(store.insert_user(guest.clone()).await.unwrap_err().is_duplicate_key());

    let later = Utc::now() + Duration::minutes(5);
    assert!(store.touch_user(&guest.id, later).await.unwrap());
    assert!(!store.touch_user("nobody", later).await.unwrap());
    let listed = store.list_users().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].last_seen, Some(later));
    assert_eq!(store.count_users().await.unwrap(), 1);

    assert!(store.delete_user(&guest.id).await.unwrap());
    assert!(!store.delete_user(&guest.id).await.unwrap());
}

pub async fn ads_config_is_a_singleton(store: &dyn ContentStore) {
    assert_eq!(store.load_ads_config().await.unwrap(), None);

    let first = AdsConfig {
        enabled: false,
        ..AdsConfig::default()
    };
    store.save_ads_config(first).await.unwrap();

    let mut second = AdsConfig::default();
    second.ad_frequency.insert("TAB_SWITCH".into(), 0.9);
    store.save_ads_config(second.clone()).await.unwrap();
    assert_eq!(store.load_ads_config().await.unwrap(), Some(second));
}
