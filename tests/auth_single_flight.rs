//! Token cache behaviour under concurrency, and the password sign-in wire format.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autoflow::auth::{AuthTokenProvider, PasswordSignIn, TokenSource};
use autoflow::error::AuthError;

/// Takes a while to sign in and counts how often it is asked to.
struct SlowSource {
    calls: AtomicUsize,
    fail: bool,
}

impl SlowSource {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for SlowSource {
    async fn sign_in(&self) -> Result<String, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(200)).await;
        if self.fail {
            return Err(AuthError::SignIn {
                status: 401,
                body: "bad credentials".into(),
            });
        }
        Ok(format!("token-{n}"))
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_sign_in() {
    let source = SlowSource::new(false);
    let provider = Arc::new(AuthTokenProvider::new(source.clone()));

    let tokens = join_all((0..8).map(|_| {
        let provider = Arc::clone(&provider);
        async move { provider.get_token().await }
    }))
    .await;

    assert_eq!(source.calls(), 1);
    for token in tokens {
        assert_eq!(token.unwrap(), "token-1");
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_on_spawned_tasks_share_one_sign_in() {
    let source = SlowSource::new(false);
    let provider = Arc::new(AuthTokenProvider::new(source.clone()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { provider.get_token().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "token-1");
    }
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn expiry_triggers_exactly_one_refresh() {
    let source = SlowSource::new(false);
    let provider = Arc::new(AuthTokenProvider::with_validity(
        source.clone(),
        Duration::from_secs(60),
    ));

    provider.get_token().await.unwrap();
    tokio::time::advance(Duration::from_secs(120)).await;

    let (a, b) = tokio::join!(provider.get_token(), provider.get_token());
    assert_eq!(a.unwrap(), "token-2");
    assert_eq!(b.unwrap(), "token-2");
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_sign_in_is_not_cached() {
    let source = SlowSource::new(true);
    let provider = AuthTokenProvider::new(source.clone());

    assert!(matches!(
        provider.get_token().await,
        Err(AuthError::SignIn { status: 401, .. })
    ));
    assert!(provider.get_token().await.is_err());
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_failed_sign_in() {
    let source = SlowSource::new(true);
    let provider = Arc::new(AuthTokenProvider::new(source.clone()));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { provider.get_token().await })
        })
        .collect();
    for handle in handles {
        assert!(matches!(
            handle.await.unwrap(),
            Err(AuthError::SignIn { status: 401, .. })
        ));
    }
    assert_eq!(source.calls(), 1);

    // A later, separate call tries again.
    assert!(provider.get_token().await.is_err());
    assert_eq!(source.calls(), 2);
}

// =============================================================================
// Password sign-in over HTTP
// =============================================================================

fn sign_in(server: &MockServer) -> PasswordSignIn {
    PasswordSignIn::new(
        reqwest::Client::new(),
        format!("{}/", server.uri()),
        "ops@example.com",
        "hunter2",
    )
}

#[tokio::test]
async fn sign_in_posts_credentials_and_reads_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authentication/sign-in"))
        .and(body_json(json!({ "email": "ops@example.com", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt-abc",
            "projectId": "p1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(sign_in(&server).sign_in().await.unwrap(), "jwt-abc");
}

#[tokio::test]
async fn other_token_field_names_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authentication/sign-in"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "jwt-abc" })))
        .mount(&server)
        .await;

    assert!(matches!(
        sign_in(&server).sign_in().await,
        Err(AuthError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn empty_token_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authentication/sign-in"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "" })))
        .mount(&server)
        .await;

    assert!(matches!(
        sign_in(&server).sign_in().await,
        Err(AuthError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn rejected_credentials_keep_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/authentication/sign-in"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .mount(&server)
        .await;

    match sign_in(&server).sign_in().await {
        Err(AuthError::SignIn { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid credentials");
        }
        other => panic!("expected sign-in failure, got {other:?}"),
    }
}
