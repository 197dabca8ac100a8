use axum::http::StatusCode;
use integration_tests::TestApp;
use serde_json::json;

async fn app_with_work(title: &str) -> TestApp {
    let app = TestApp::new();
    let (status, _) = app.post("/api/manga", json!({"title": title, "type": "manga"})).await;
    assert_eq!(status, StatusCode::OK);
    app
}

async fn chapters_count(app: &TestApp, id: i64) -> u64 {
    let (_, work) = app.get(&format!("/api/manga/{id}")).await;
    work["chapters_count"].as_u64().unwrap()
}

#[tokio::test]
async fn chapter_lifecycle_keeps_the_count_in_step() {
    let app = app_with_work("My Manga").await;

    let (status, body) = app
        .post(
            "/api/manga/1/chapters",
            json!({"chapterId": "1", "title": "Ch1", "pages": ["p1.png"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    assert_eq!(chapters_count(&app, 1).await, 1);

    let (status, chapters) = app.get("/api/manga/1/chapters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        chapters,
        json!({"1": {"title": "Ch1", "pages": ["p1.png"], "content": null}})
    );

    // stored under the normalized title
    let (status, chapter) = app.get("/direct-chapter/my-manga/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chapter["title"], "Ch1");

    let (status, _) = app.delete("/api/manga/1/chapters/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chapters_count(&app, 1).await, 0);

    let (status, body) = app.delete("/api/manga/1/chapters/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("my-manga/1"));
}

#[tokio::test]
async fn re_upsert_replaces_without_recounting() {
    let app = app_with_work("Night Shift").await;
    app.post("/api/manga/1/chapters", json!({"chapterId": 1, "title": "Draft", "content": "..."}))
        .await;
    app.post("/api/manga/1/chapters", json!({"chapterId": "1", "title": "Final", "content": "text"}))
        .await;
    app.post("/api/manga/1/chapters", json!({"chapterId": "2", "title": "Second"}))
        .await;

    assert_eq!(chapters_count(&app, 1).await, 2);
    let (_, chapter) = app.get("/direct-chapter/night-shift/1").await;
    assert_eq!(chapter, json!({"title": "Final", "pages": [], "content": "text"}));
}

#[tokio::test]
async fn chapter_requests_are_validated() {
    let app = app_with_work("Checked").await;

    let (status, _) = app
        .post("/api/manga/9/chapters", json!({"chapterId": "1", "title": "Lost"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post("/api/manga/1/chapters", json!({"title": "No id"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/manga/1/chapters", json!({"chapterId": "", "title": "Blank"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/manga/9/chapters").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(chapters_count(&app, 1).await, 0);
}

#[tokio::test]
async fn untitled_chapters_are_keyed_verbatim() {
    let app = app_with_work("Loose").await;

    let (status, _) = app.post("/api/manga/1/chapters", json!({"chapterId": "1"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post("/api/manga/1/chapters", json!({"chapterId": " 1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chapters_count(&app, 1).await, 2);

    let (_, chapters) = app.get("/api/manga/1/chapters").await;
    assert_eq!(chapters["1"]["title"], "");
    assert_eq!(chapters[" 1"]["title"], "");
}

#[tokio::test]
async fn reader_serves_chapters_whether_or_not_the_ad_was_watched() {
    let app = app_with_work("Gated").await;
    app.post("/api/manga/1/chapters", json!({"chapterId": "3", "title": "Three"}))
        .await;

    let (status, chapter) = app.get("/chapter/gated/3?user=reader-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chapter["title"], "Three");

    let (status, _) = app.get("/chapter/gated/3").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/chapter/gated/4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Chapter not found with ID gated/4"}));
}

#[tokio::test]
async fn reader_rejections_are_json_errors() {
    let app = app_with_work("Gated").await;

    let (status, body) = app.get("/chapter/gated/3?user=a&user=b").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("validation error"));

    let (status, body) = app.get("/direct-chapter/gated/%FF").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.delete("/api/users/%FF").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn chapters_outlive_their_work() {
    let app = app_with_work("Phoenix").await;
    app.post("/api/manga/1/chapters", json!({"chapterId": "1", "title": "Rise"}))
        .await;
    app.delete("/api/manga/1").await;

    let (status, _) = app.get("/direct-chapter/phoenix/1").await;
    assert_eq!(status, StatusCode::OK);

    // a new work with the same title picks the chapter back up
    let (_, created) = app.post("/api/manga", json!({"title": "Phoenix", "type": "novel"})).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(chapters_count(&app, id).await, 1);
}
