//! The store contract against a throwaway PostgreSQL container. Needs a
//! running Docker daemon.

use domains::{ContentStore, Work, WorkKind};
use integration_tests::contracts;
use serde_json::json;
use storage_adapters::PgStore;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

/// Keep the container alive for as long as the store is used.
struct PgFixture {
    store: PgStore,
    url: String,
    _container: ContainerAsync<Postgres>,
}

async fn fixture() -> PgFixture {
    let container = Postgres::default().start().await.expect("start postgres");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("mapped postgres port");
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
    let store = PgStore::connect(&url, 4).await.expect("connect and create schema");
    PgFixture {
        store,
        url,
        _container: container,
    }
}

#[tokio::test]
async fn works_are_keyed_per_collection() {
    let pg = fixture().await;
    contracts::works_are_keyed_per_collection(&pg.store).await;
}

#[tokio::test]
async fn one_id_space_spans_both_kinds() {
    let pg = fixture().await;
    contracts::one_id_space_spans_both_kinds(&pg.store).await;
}

#[tokio::test]
async fn updates_merge_into_the_stored_work() {
    let pg = fixture().await;
    contracts::updates_merge_into_the_stored_work(&pg.store).await;
}

#[tokio::test]
async fn chapters_are_unique_per_title_and_id() {
    let pg = fixture().await;
    contracts::chapters_are_unique_per_title_and_id(&pg.store).await;
}

#[tokio::test]
async fn users_are_touched_and_removed() {
    let pg = fixture().await;
    contracts::users_are_touched_and_removed(&pg.store).await;
}

#[tokio::test]
async fn ads_config_is_a_singleton() {
    let pg = fixture().await;
    contracts::ads_config_is_a_singleton(&pg.store).await;
}

#[tokio::test]
async fn schema_setup_is_repeatable_and_backfills_work_ids() {
    let pg = fixture().await;
    let kept: Work = serde_json::from_value(json!({"id": 8, "title": "Kept", "type": "novel"})).unwrap();
    pg.store.insert_work(kept).await.unwrap();

    // a second connect re-runs the schema statements over existing rows
    let again = PgStore::connect(&pg.url, 2).await.unwrap();
    assert_eq!(again.count_works(WorkKind::Novel).await.unwrap(), 1);

    let clash: Work = serde_json::from_value(json!({"id": 8, "title": "Clash", "type": "manga"})).unwrap();
    assert!(again.insert_work(clash).await.unwrap_err().is_duplicate_key());
}
