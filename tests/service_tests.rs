use chrono::{TimeZone, Utc};
use sarkari_portal::{
    HttpConnector, PortalError,
    models::{PostInput, Principal, RecruitmentPostType, UserRole},
    service::{HttpRemoteService, PRINCIPAL_HEADER, RemoteService, ServiceConnector},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

fn actor(server: &MockServer, principal: Option<&str>) -> HttpRemoteService {
    HttpRemoteService::new(
        reqwest::Client::new(),
        &server.uri(),
        principal.map(Principal::new),
    )
}

#[tokio::test]
async fn test_published_posts_decoded_from_wire_format() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc/getPublishedPosts"))
        .and(header(PRINCIPAL_HEADER, "aaaaa-aa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 7,
            "status": "published",
            "postType": "admitCard",
            "title": "CGL Admit Card",
            "organization": "Staff Selection Commission",
            "examPostName": "CGL",
            "eligibility": "",
            "applicationFee": "",
            "ageLimit": "",
            "vacancyDetails": "",
            "importantDates": [{ "key": "Exam", "value": "2024-02-01" }],
            "officialLinks": [],
            "tags": ["SSC"],
            "createdAt": 1_704_877_200_000_000_000i64,
            "updatedAt": 1_704_877_200_000_000_000i64
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let posts = actor(&mock_server, Some("aaaaa-aa"))
        .get_published_posts()
        .await
        .expect("call should succeed");

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, 7);
    assert_eq!(posts[0].post_type, RecruitmentPostType::AdmitCard);
    assert_eq!(posts[0].important_dates[0].key, "Exam");
    assert_eq!(
        posts[0].created_at,
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_update_sends_id_with_fields() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc/updatePost"))
        .and(body_json(json!({
            "id": 7,
            "postType": "result",
            "title": "CGL Result",
            "organization": "SSC",
            "examPostName": "CGL",
            "importantDates": [],
            "eligibility": "",
            "applicationFee": "",
            "ageLimit": "",
            "vacancyDetails": "",
            "officialLinks": [],
            "tags": []
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let input = PostInput {
        post_type: RecruitmentPostType::Result,
        title: "CGL Result".into(),
        organization: "SSC".into(),
        exam_post_name: "CGL".into(),
        ..Default::default()
    };
    actor(&mock_server, Some("admin"))
        .update_post(7, input)
        .await
        .expect("update should succeed");
}

#[tokio::test]
async fn test_rejected_call_carries_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc/assignCallerUserRole"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Unauthorized: only admins"))
        .mount(&mock_server)
        .await;

    let result = actor(&mock_server, None)
        .assign_caller_user_role(&Principal::new("someone"), UserRole::Admin)
        .await;

    match result {
        Err(PortalError::RequestFailed(message)) => assert!(message.contains("only admins")),
        other => panic!("expected RequestFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_request_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc/isCallerAdmin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let result = actor(&mock_server, None).is_caller_admin().await;
    assert!(matches!(result, Err(PortalError::RequestFailed(_))));
}

#[tokio::test]
async fn test_refused_connection_is_transport_unavailable() {
    // Nothing listens on the discard port.
    let connector = HttpConnector::new("http://127.0.0.1:9");
    let service = connector.connect(None).await.expect("connect is lazy");

    let result = service.get_published_posts().await;
    assert_eq!(result, Err(PortalError::TransportUnavailable));
}
