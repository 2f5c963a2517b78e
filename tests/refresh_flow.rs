//! Integration tests for token refresh against a mock backend

use netadmin_client::error::PERMISSION_DENIED_MESSAGE;
use netadmin_client::{AdminClient, AuthTokens, ClientError, Navigator};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH: &str = "/v1/auth_management/refresh_token";
const SSIDS: &str = "/v1/ssid_management/list";

#[derive(Default)]
struct RecordingNavigator {
    alerts: Mutex<Vec<String>>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn alerts(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn redirect(&self, location: &str) {
        self.redirects.lock().unwrap().push(location.to_string());
    }
}

fn client(server: &MockServer, nav: &Arc<RecordingNavigator>) -> AdminClient {
    let client = AdminClient::builder()
        .base_url(server.uri())
        .navigator(nav.clone())
        .build()
        .unwrap();
    client.establish_session(&AuthTokens::new("old-access", "old-refresh"));
    client
}

fn envelope_ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": data }))
}

fn expired() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": -3, "message": "token expired" }))
}

async fn mount_successful_refresh(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(body_json(json!({ "refreshToken": "old-refresh" })))
        .respond_with(
            envelope_ok(json!({ "accessToken": "new-access", "refreshToken": "new-refresh" }))
                .set_delay(delay),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_data_endpoint(server: &MockServer, stale: ResponseTemplate, replays: u64) {
    Mock::given(method("GET"))
        .and(path(SSIDS))
        .and(header("authorization", "Bearer old-access"))
        .respond_with(stale)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(SSIDS))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(envelope_ok(json!([{ "ssid": "guest" }])))
        .expect(replays)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_expired_requests_share_one_refresh() {
    let server = MockServer::start().await;
    mount_successful_refresh(&server, Duration::from_millis(200)).await;
    mount_data_endpoint(&server, expired(), 3).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let (a, b, c) = tokio::join!(client.get(SSIDS), client.get(SSIDS), client.get(SSIDS));
    for result in [a, b, c] {
        let resp = result.unwrap();
        assert_eq!(resp.code, 0);
        assert_eq!(resp.data.unwrap()[0]["ssid"], "guest");
    }

    let tokens = client.tokens().tokens().unwrap();
    assert_eq!(tokens.access_token, "Bearer new-access");
    assert_eq!(tokens.refresh_token, "new-refresh");
    assert!(!client.is_refreshing());
    assert_eq!(nav.alerts(), 0);
    assert!(nav.redirects().is_empty());
}

#[tokio::test]
async fn test_http_401_behaves_like_embedded_code() {
    let server = MockServer::start().await;
    mount_successful_refresh(&server, Duration::from_millis(200)).await;
    mount_data_endpoint(&server, ResponseTemplate::new(401), 3).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let (a, b, c) = tokio::join!(client.get(SSIDS), client.get(SSIDS), client.get(SSIDS));
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(nav.alerts(), 0);
}

#[tokio::test]
async fn test_spawned_requests_share_one_refresh() {
    let server = MockServer::start().await;
    mount_successful_refresh(&server, Duration::from_millis(300)).await;
    mount_data_endpoint(&server, expired(), 8).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get(SSIDS).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().code, 0);
    }
}

#[tokio::test]
async fn test_retried_request_is_not_retried_again() {
    let server = MockServer::start().await;
    mount_successful_refresh(&server, Duration::ZERO).await;

    Mock::given(method("GET"))
        .and(path(SSIDS))
        .respond_with(expired())
        .expect(2)
        .mount(&server)
        .await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let err = client.get(SSIDS).await.unwrap_err();
    assert!(matches!(err, ClientError::PermissionDenied));
    // the refresh itself worked, so the session survives
    assert_eq!(
        client.tokens().access_token().as_deref(),
        Some("Bearer new-access")
    );
}

#[tokio::test]
async fn test_failed_refresh_rejects_everyone_and_redirects_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 1, "message": "refresh token expired" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_data_endpoint(&server, expired(), 0).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);
    client.tokens().set_user(json!({ "name": "operator" }));

    let (a, b, c) = tokio::join!(client.get(SSIDS), client.get(SSIDS), client.get(SSIDS));
    for result in [a, b, c] {
        let err = result.unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied));
        assert_eq!(err.to_body().error, PERMISSION_DENIED_MESSAGE);
    }

    assert!(client.tokens().access_token().is_none());
    assert!(client.tokens().refresh_token().is_none());
    assert!(client.tokens().user().is_none());
    assert_eq!(nav.alerts(), 1);
    assert_eq!(nav.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_missing_refresh_token_ends_session_without_refresh_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SSIDS))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = AdminClient::builder()
        .base_url(server.uri())
        .navigator(nav.clone())
        .build()
        .unwrap();
    client.tokens().set_access_token("only-access");

    let err = client.get(SSIDS).await.unwrap_err();
    assert!(matches!(err, ClientError::PermissionDenied));
    assert_eq!(nav.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_refresh_call_rejected_as_unauthorized_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    mount_data_endpoint(&server, expired(), 0).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let err = client.get(SSIDS).await.unwrap_err();
    assert!(matches!(err, ClientError::PermissionDenied));
    assert!(!client.tokens().has_session());
    assert_eq!(nav.alerts(), 1);
    assert_eq!(nav.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_cancelled_queued_request_does_not_block_refresh() {
    let server = MockServer::start().await;
    mount_successful_refresh(&server, Duration::from_millis(300)).await;
    mount_data_endpoint(&server, expired(), 1).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let leader = tokio::spawn({
        let client = client.clone();
        async move { client.get(SSIDS).await }
    });
    // let the first request reach the refresh before queueing another
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.is_refreshing());

    let queued = tokio::time::timeout(Duration::from_millis(50), client.get(SSIDS)).await;
    assert!(queued.is_err(), "queued request should still be waiting");

    assert_eq!(leader.await.unwrap().unwrap().code, 0);
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn test_debounced_alert_rearms_after_navigation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SSIDS))
        .respond_with(expired())
        .mount(&server)
        .await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = AdminClient::builder()
        .base_url(server.uri())
        .navigator(nav.clone())
        .redirect_cooldown(Duration::from_millis(100))
        .build()
        .unwrap();

    client.establish_session(&AuthTokens::new("a", "r"));
    assert!(client.get(SSIDS).await.is_err());
    // session is gone, so these fail without a refresh token
    assert!(client.get(SSIDS).await.is_err());
    assert_eq!(nav.alerts(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(client.get(SSIDS).await.is_err());
    assert_eq!(nav.alerts(), 1);

    client.on_history_navigation();
    assert!(client.get(SSIDS).await.is_err());
    assert_eq!(nav.alerts(), 2);
    assert_eq!(nav.redirects().len(), 2);
}

#[tokio::test]
async fn test_new_login_rearms_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1 })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SSIDS))
        .respond_with(expired())
        .mount(&server)
        .await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = AdminClient::builder()
        .base_url(server.uri())
        .navigator(nav.clone())
        .redirect_cooldown(Duration::from_millis(100))
        .build()
        .unwrap();

    client.establish_session(&AuthTokens::new("a1", "r1"));
    assert!(matches!(client.get(SSIDS).await, Err(ClientError::PermissionDenied)));
    assert_eq!(nav.redirects().len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    client.establish_session(&AuthTokens::new("a2", "r2"));
    assert!(matches!(client.get(SSIDS).await, Err(ClientError::PermissionDenied)));

    assert_eq!(nav.alerts(), 2);
    assert_eq!(nav.redirects(), vec!["/login".to_string(), "/login".to_string()]);
}

#[tokio::test]
async fn test_queued_request_takes_over_when_leader_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            envelope_ok(json!({ "accessToken": "new-access", "refreshToken": "new-refresh" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_data_endpoint(&server, expired(), 1).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let leader = tokio::spawn({
        let client = client.clone();
        async move { client.get(SSIDS).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.is_refreshing());

    let follower = tokio::spawn({
        let client = client.clone();
        async move { client.get(SSIDS).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    // the follower leads its own refresh and is replayed with the new token
    let resp = follower.await.unwrap().unwrap();
    assert_eq!(resp.code, 0);
    assert_eq!(
        client.tokens().access_token().as_deref(),
        Some("Bearer new-access")
    );
    assert!(!client.is_refreshing());
    assert_eq!(nav.alerts(), 0);
}

#[tokio::test]
async fn test_refresh_now_stores_rotated_tokens() {
    let server = MockServer::start().await;
    mount_successful_refresh(&server, Duration::ZERO).await;

    let nav = Arc::new(RecordingNavigator::default());
    let client = client(&server, &nav);

    let token = client.refresh_now().await.unwrap();
    assert_eq!(token, "Bearer new-access");
    assert_eq!(client.tokens().refresh_token().as_deref(), Some("new-refresh"));
}
