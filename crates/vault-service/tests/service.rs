//! Integration tests driving `VaultRpc`'s generated trait methods directly
//! against a real store, auth service, and notification registry.

use std::sync::Arc;
use std::time::Duration;

use tonic::Request;

use vault_auth::AuthService;
use vault_notify::Registry;
use vault_proto::nedo_vault_server::NedoVault;
use vault_proto::{secret, AddSecretRequest, AuthRequest, DeleteSecretRequest, Empty, GetSecretRequest, LogPass, Secret, Text};
use vault_service::VaultRpc;
use vault_store::VaultStore;

fn rpc() -> VaultRpc {
    let store = Arc::new(VaultStore::temporary(&[9u8; 32]).unwrap());
    let auth = Arc::new(AuthService::new(b"test-signing-key".to_vec(), Duration::from_secs(3600), store.clone()));
    let registry = Arc::new(Registry::new());
    VaultRpc::new(auth, store, registry, Duration::from_millis(50))
}

fn authed<T>(body: T, token: &str) -> Request<T> {
    let mut req = Request::new(body);
    req.metadata_mut().insert("token", token.parse().unwrap());
    req
}

async fn login(rpc: &VaultRpc, username: &str, password: &str) -> String {
    let resp = rpc
        .authorize(Request::new(AuthRequest { username: username.into(), password: password.into() }))
        .await
        .unwrap();
    resp.into_inner().token
}

#[tokio::test]
async fn first_login_creates_account_and_issues_a_usable_token() {
    let rpc = rpc();
    let token = login(&rpc, "alice", "hunter2").await;
    assert!(!token.is_empty());

    let resp = rpc
        .list_secrets_meta(authed(Empty {}, &token))
        .await
        .unwrap();
    assert!(resp.into_inner().meta.is_empty());
}

#[tokio::test]
async fn unauthenticated_calls_are_rejected() {
    let rpc = rpc();
    let err = rpc
        .list_secrets_meta(Request::new(Empty {}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
}

#[tokio::test]
async fn add_then_get_then_delete_round_trips() {
    let rpc = rpc();
    let token = login(&rpc, "alice", "hunter2").await;

    let secret = Secret { payload: Some(secret::Payload::LogPass(LogPass { login: "svc".into(), password: "p4ss".into() })) };
    rpc.add_secret(authed(
        AddSecretRequest { key: b"k1".to_vec(), name: b"label".to_vec(), secret_type: 0, secret: Some(secret.clone()) },
        &token,
    ))
    .await
    .unwrap();

    let got = rpc
        .get_secret(authed(GetSecretRequest { key: b"k1".to_vec() }, &token))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(got.secret, Some(secret));
    assert_eq!(got.meta.unwrap().key, b"k1");

    rpc.delete_secret(authed(DeleteSecretRequest { key: b"k1".to_vec() }, &token))
        .await
        .unwrap();

    let err = rpc
        .get_secret(authed(GetSecretRequest { key: b"k1".to_vec() }, &token))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::NotFound);
}

#[tokio::test]
async fn cross_user_isolation_in_list_and_get() {
    let rpc = rpc();
    let alice_token = login(&rpc, "alice", "pw").await;
    let bob_token = login(&rpc, "bob", "pw").await;

    rpc.add_secret(authed(
        AddSecretRequest {
            key: b"shared-name".to_vec(),
            name: vec![],
            secret_type: 1,
            secret: Some(Secret { payload: Some(secret::Payload::Text(Text { data: "alice's".into() })) }),
        },
        &alice_token,
    ))
    .await
    .unwrap();

    let bob_list = rpc
        .list_secrets_meta(authed(Empty {}, &bob_token))
        .await
        .unwrap()
        .into_inner();
    assert!(bob_list.meta.is_empty());

    let err = rpc
        .get_secret(authed(GetSecretRequest { key: b"shared-name".to_vec() }, &bob_token))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::NotFound);
}

#[tokio::test]
async fn streaming_subscriber_receives_initial_snapshot_then_update_on_mutation() {
    use futures::StreamExt;

    let rpc = rpc();
    let token = login(&rpc, "alice", "pw").await;

    let stream = rpc
        .list_secrets_meta_stream(authed(Empty {}, &token))
        .await
        .unwrap()
        .into_inner();
    tokio::pin!(stream);

    let first = stream.next().await.unwrap().unwrap();
    assert!(first.meta.is_empty());

    rpc.add_secret(authed(
        AddSecretRequest {
            key: b"k1".to_vec(),
            name: vec![],
            secret_type: 1,
            secret: Some(Secret { payload: Some(secret::Payload::Text(Text { data: "x".into() })) }),
        },
        &token,
    ))
    .await
    .unwrap();

    let updated = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream should produce a frame after mutation")
        .unwrap()
        .unwrap();
    assert_eq!(updated.meta.len(), 1);
    assert_eq!(updated.meta[0].key, b"k1");
}

#[tokio::test]
async fn invalid_token_is_rejected_with_unauthenticated() {
    let rpc = rpc();
    let err = rpc
        .list_secrets_meta(authed(Empty {}, "not-a-real-token"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
}
