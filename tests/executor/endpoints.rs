use super::{config, harness};
use points_resilience_executor::{
    Credential, CredentialError, CreditRequest, MintingCredentials, NetworkEndpoint,
    StaticCredentials, TransactionRef,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn endpoint_receives_the_reference_and_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/credits"))
        .and(header("Authorization", "Bearer static-key"))
        .and(header("Idempotency-Key", "order-881"))
        .and(body_partial_json(serde_json::json!({
            "customer_id": "c1",
            "business_id": "b1",
            "points": 30,
            "reason": "purchase",
            "transaction_ref": "order-881",
            "metadata": {"channel": "pos"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(false, |b| {
        b.endpoint(NetworkEndpoint::new("backup", format!("{}/v1/credits", server.uri())))
            .credentials(Arc::new(StaticCredentials::new("static-key")))
    })
    .await;

    let request = CreditRequest::new("c1", "b1", 30)
        .reason("purchase")
        .metadata("channel", "pos")
        .transaction_ref(TransactionRef::new("order-881"));
    let result = h.executor.execute(request).await.unwrap();

    assert!(result.is_applied());
    assert_eq!(result.strategy_used, "backup");
    assert_eq!(result.identifiers.transaction_ref.as_str(), "order-881");
    // a non-JSON acknowledgement carries no identifiers
    assert_eq!(result.identifiers.transaction_id, None);
    h.shutdown();
}

#[tokio::test]
async fn refused_credential_is_reminted_for_the_next_endpoint() {
    let first = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&first)
        .await;
    let second = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&second)
        .await;

    let mints = Arc::new(AtomicUsize::new(0));
    let m = Arc::clone(&mints);
    let credentials = MintingCredentials::new(move || {
        let n = m.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(Credential::new(format!("token-{n}"))) }
    });

    let h = harness(false, |b| {
        b.endpoint(NetworkEndpoint::new("edge-a", first.uri()))
            .endpoint(NetworkEndpoint::new("edge-b", second.uri()))
            .credentials(Arc::new(credentials))
    })
    .await;

    let result = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 1))
        .await
        .unwrap();

    assert_eq!(result.strategy_used, "edge-b");
    assert_eq!(mints.load(Ordering::SeqCst), 2);
    h.shutdown();
}

#[tokio::test]
async fn mint_failure_skips_the_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(false, |b| {
        b.endpoint(NetworkEndpoint::new("edge", server.uri()))
            .credentials(Arc::new(MintingCredentials::new(|| async {
                Err(CredentialError::Mint("identity provider down".into()))
            })))
    })
    .await;

    let result = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 1))
        .await
        .unwrap();

    assert!(result.offline);
    let error = result.diagnostics[1].error.as_deref().unwrap();
    assert!(error.contains("identity provider down"), "{error}");
    h.shutdown();
}

#[tokio::test]
async fn slow_endpoint_times_out_and_falls_through() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&slow)
        .await;
    let fast = MockServer::start().await;
    let body = serde_json::json!({"transaction_id": "t-1"});
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&fast)
        .await;

    let h = harness(false, |b| {
        b.config(config().endpoint_timeout(Duration::from_secs(30)).build())
            .endpoint(NetworkEndpoint::new("slow", slow.uri()).timeout(Duration::from_millis(200)))
            .endpoint(NetworkEndpoint::new("fast", fast.uri()))
            .credentials(Arc::new(StaticCredentials::new("key")))
    })
    .await;

    let result = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 1))
        .await
        .unwrap();

    assert_eq!(result.strategy_used, "fast");
    assert_eq!(result.identifiers.transaction_id.as_deref(), Some("t-1"));
    let timed_out = result.diagnostics[1].error.as_deref().unwrap();
    assert!(timed_out.contains("timed out"), "{timed_out}");
    assert!(result.diagnostics[1].elapsed < Duration::from_secs(3));
    h.shutdown();
}

#[tokio::test]
async fn unreachable_endpoints_end_in_the_queue() {
    let h = harness(false, |b| {
        b.endpoint(NetworkEndpoint::new("edge-a", "http://127.0.0.1:9/credit"))
            .endpoint(NetworkEndpoint::new("edge-b", "http://127.0.0.1:9/credit"))
            .credentials(Arc::new(StaticCredentials::new("key")))
    })
    .await;

    let result = h
        .executor
        .execute(CreditRequest::new("c1", "b1", 3))
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.offline);
    assert_eq!(result.strategy_used, "offline");
    assert_eq!(result.diagnostics.len(), 4);
    assert!(result.diagnostics[..3].iter().all(|a| !a.succeeded()));
    assert_eq!(h.executor.queue().pending_count().await.unwrap(), 1);
    h.shutdown();
}
