use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{TimeZone, Utc};
use sarkari_portal::{
    AppConfig, AppState, InMemoryBackend, create_router,
    models::{PostInput, PostStatus, Principal, RecruitmentPost, RecruitmentPostType, UserRole},
    service::PRINCIPAL_HEADER,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;

const ADMIN: &str = "admin-principal";

// --- Setup ---

async fn app() -> (Router, InMemoryBackend) {
    let backend = InMemoryBackend::new();
    backend.grant_role(Principal::new(ADMIN), UserRole::Admin).await;
    let state = AppState::new(Arc::new(backend.clone()), AppConfig::default());
    (create_router(state), backend)
}

fn notice(id: u64, post_type: RecruitmentPostType, year: i32, tags: &[&str]) -> RecruitmentPost {
    let created = Utc.with_ymd_and_hms(year, 6, 1, 8, 0, 0).unwrap();
    let input = PostInput {
        post_type,
        title: format!("Notice {}", id),
        organization: "Staff Selection Commission".into(),
        exam_post_name: "CGL".into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    };
    RecruitmentPost {
        status: PostStatus::Published,
        ..RecruitmentPost::from_input(id, input, created)
    }
}

fn get(uri: &str, principal: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(principal) = principal {
        builder = builder.header(PRINCIPAL_HEADER, principal);
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, principal: Option<&str>, payload: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(principal) = principal {
        builder = builder.header(PRINCIPAL_HEADER, principal);
    }
    builder
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn ids(posts: &Value) -> Vec<u64> {
    posts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect()
}

// --- Public Routes ---

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app().await;
    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_home_shows_twelve_newest() {
    let (app, backend) = app().await;
    for id in 0..14 {
        backend
            .seed_post(notice(id, RecruitmentPostType::Result, 2010 + id as i32, &[]))
            .await;
    }

    let response = app.oneshot(get("/api/home", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
    let feed = ids(&body["posts"]);
    assert_eq!(feed.len(), 12);
    assert_eq!(feed[0], 13);
}

#[tokio::test]
async fn test_category_listing_with_facets() {
    let (app, backend) = app().await;
    backend.seed_post(notice(1, RecruitmentPostType::Result, 2023, &["SSC"])).await;
    backend.seed_post(notice(2, RecruitmentPostType::Result, 2024, &["UPSC", "SSC"])).await;
    backend.seed_post(notice(3, RecruitmentPostType::AdmitCard, 2022, &["RRB"])).await;

    let response = app
        .clone()
        .oneshot(get("/api/category/result?year=2023", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(ids(&body["posts"]), vec![1]);
    assert_eq!(body["facets"]["years"], json!(["2024", "2023"]));
    assert_eq!(body["facets"]["tags"], json!(["SSC", "UPSC"]));
    assert_eq!(body["categoryEmpty"], false);

    let response = app.oneshot(get("/api/category/answerKey", None)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["categoryEmpty"], true);
    assert_eq!(body["posts"], json!([]));
}

#[tokio::test]
async fn test_category_redirects_to_canonical_query() {
    let (app, _) = app().await;
    let response = app
        .oneshot(get("/api/category/result?sort=newest&tag=&organization=SSC", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/api/category/result?organization=SSC"
    );
}

#[tokio::test]
async fn test_unknown_category_is_not_found() {
    let (app, _) = app().await;
    let response = app.oneshot(get("/api/category/jobs", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_requires_query_text() {
    let (app, backend) = app().await;
    backend.seed_post(notice(1, RecruitmentPostType::Result, 2023, &["SSC"])).await;

    let response = app.clone().oneshot(get("/api/search", None)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["posts"], Value::Null);

    let response = app.clone().oneshot(get("/api/search?q=ssc", None)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(ids(&body["posts"]), vec![1]);

    let response = app.oneshot(get("/api/search?q=railway", None)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["posts"], json!([]));
}

#[tokio::test]
async fn test_post_detail_hides_drafts_from_public() {
    let (app, backend) = app().await;
    backend.seed_post(notice(1, RecruitmentPostType::Result, 2023, &[])).await;
    backend
        .seed_post(RecruitmentPost {
            status: PostStatus::Draft,
            ..notice(2, RecruitmentPostType::Result, 2023, &[])
        })
        .await;

    let response = app.clone().oneshot(get("/api/posts/1", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["post"]["title"], "Notice 1");

    let response = app.clone().oneshot(get("/api/posts/2", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/api/posts/2", Some(ADMIN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_navigate_returns_canonical_href() {
    let (app, _) = app().await;
    let payload = json!({
        "path": "/search",
        "query": "q=cgl&tag=SSC&year=",
        "update": { "tag": "", "sort": "updated" }
    });

    let response = app
        .oneshot(send_json("POST", "/api/listing/navigate", None, &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["href"], "/search?q=cgl&sort=updated");
    assert_eq!(body["location"]["search"], "cgl");
}

// --- Caller Routes ---

#[tokio::test]
async fn test_profile_save_and_read_back() {
    let (app, _) = app().await;

    let response = app
        .clone()
        .oneshot(get("/api/me/profile", Some("candidate")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, Value::Null);

    let response = app
        .clone()
        .oneshot(send_json("PUT", "/api/me/profile", Some("candidate"), &json!({ "name": "Asha" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(get("/api/me/profile", Some("candidate")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["name"], "Asha");

    let response = app
        .oneshot(send_json("PUT", "/api/me/profile", Some("candidate"), &json!({ "name": " " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_anonymous_profile_save_is_rejected_upstream() {
    let (app, _) = app().await;
    let response = app
        .oneshot(send_json("PUT", "/api/me/profile", None, &json!({ "name": "Asha" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_role_reported_per_caller() {
    let (app, _) = app().await;

    let response = app.clone().oneshot(get("/api/me/role", Some(ADMIN))).await.unwrap();
    assert_eq!(body_json(response).await, json!("admin"));

    let response = app.clone().oneshot(get("/api/me/role", Some("candidate"))).await.unwrap();
    assert_eq!(body_json(response).await, json!("user"));

    let response = app.oneshot(get("/api/me/role", None)).await.unwrap();
    assert_eq!(body_json(response).await, json!("guest"));
}

// --- Admin Lifecycle ---

#[tokio::test]
async fn test_admin_post_lifecycle() {
    let (app, _) = app().await;
    let payload = json!({
        "postType": "recruitmentForm",
        "title": "CGL 2024 Notification",
        "organization": "Staff Selection Commission",
        "examPostName": "Combined Graduate Level",
        "tags": [" SSC ", "SSC", ""]
    });

    // Create: starts as a draft, tags normalized.
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/admin/posts", Some(ADMIN), &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_u64().unwrap();

    let response = app.clone().oneshot(get("/api/admin/posts", Some(ADMIN))).await.unwrap();
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["draftCount"], 1);
    assert_eq!(dashboard["publishedCount"], 0);
    assert_eq!(dashboard["posts"][0]["tags"], json!(["SSC"]));

    let response = app.clone().oneshot(get("/api/home", None)).await.unwrap();
    assert_eq!(body_json(response).await["posts"], json!([]));

    // Publish: now visible publicly.
    let response = app
        .clone()
        .oneshot(send_json("POST", &format!("/api/admin/posts/{}/publish", id), Some(ADMIN), &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Visitors see the publish on their next read, not only the admin who made it.
    let response = app.clone().oneshot(get("/api/home", None)).await.unwrap();
    assert_eq!(ids(&body_json(response).await["posts"]), vec![id]);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/posts/{}", id), None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["post"]["title"], "CGL 2024 Notification");

    // Edit: the editor view starts from the stored fields.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/admin/posts/{}", id), Some(ADMIN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut draft = body_json(response).await["draft"].clone();
    draft["title"] = json!("CGL 2024 Notification (revised)");

    let response = app
        .clone()
        .oneshot(send_json("PUT", &format!("/api/admin/posts/{}", id), Some(ADMIN), &draft))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/posts/{}", id), None))
        .await
        .unwrap();
    let detail = body_json(response).await;
    assert_eq!(detail["post"]["title"], "CGL 2024 Notification (revised)");
    assert_eq!(detail["post"]["status"], "published");

    // Unpublish, then delete.
    let response = app
        .clone()
        .oneshot(send_json("POST", &format!("/api/admin/posts/{}/unpublish", id), Some(ADMIN), &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/posts/{}", id))
                .header(PRINCIPAL_HEADER, ADMIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(get("/api/home", None)).await.unwrap();
    assert_eq!(body_json(response).await["posts"], json!([]));

    let response = app
        .oneshot(get(&format!("/api/admin/posts/{}", id), Some(ADMIN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_create_with_blank_title_is_unprocessable() {
    let (app, backend) = app().await;
    let payload = json!({
        "postType": "result",
        "title": "  ",
        "organization": "UPSC",
        "examPostName": "CSE"
    });

    let response = app
        .oneshot(send_json("POST", "/api/admin/posts", Some(ADMIN), &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "required field `title` is empty");
    assert_eq!(backend.call_count("createPost").await, 0);
}

#[tokio::test]
async fn test_admin_assigns_role() {
    let (app, _) = app().await;
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/admin/roles",
            Some(ADMIN),
            &json!({ "user": "editor", "role": "admin" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/api/admin/posts", Some("editor"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_demoted_admin_loses_access_on_next_request() {
    let (app, _) = app().await;
    let assign = |role: &str| {
        send_json(
            "POST",
            "/api/admin/roles",
            Some(ADMIN),
            &json!({ "user": "editor", "role": role }),
        )
    };

    let response = app.clone().oneshot(assign("admin")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.clone().oneshot(get("/api/admin/posts", Some("editor"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.clone().oneshot(get("/api/me/role", Some("editor"))).await.unwrap();
    assert_eq!(body_json(response).await, json!("admin"));

    let response = app.clone().oneshot(assign("user")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(get("/api/admin/posts", Some("editor"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.oneshot(get("/api/me/role", Some("editor"))).await.unwrap();
    assert_eq!(body_json(response).await, json!("user"));
}

#[tokio::test]
async fn test_unknown_query_keys_redirect_without_them() {
    let (app, _) = app().await;
    let response = app
        .oneshot(get("/api/category/result?utm_source=mail&tag=SSC", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/api/category/result?tag=SSC"
    );
}
