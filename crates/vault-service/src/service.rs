//! The `NedoVault` gRPC service implementation.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use vault_auth::AuthService;
use vault_notify::Registry;
use vault_store::VaultStore;

use vault_proto::nedo_vault_server::NedoVault;
use vault_proto::{
    AddSecretRequest, AuthRequest, AuthResponse, DeleteSecretRequest, Empty, GetSecretRequest,
    GetSecretResponse, ListSecretsMetaResponse,
};

use crate::auth::authenticate;
use crate::conv::{decode_key, decode_name, meta_to_proto, secret_from_proto, secret_to_proto};

/// Default refresh-tick period for a live `ListSecretsMetaStream`
/// subscriber: a liveness backstop bounding staleness if a publish is ever
/// missed, not a correctness requirement (publishes are best-effort).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(4);

/// Output stream type for `ListSecretsMetaStream`.
pub type ListSecretsMetaStreamReply =
    Pin<Box<dyn futures::Stream<Item = Result<ListSecretsMetaResponse, Status>> + Send + 'static>>;

/// The vault's gRPC service: holds the pieces every handler needs and
/// implements the generated [`NedoVault`] trait over them.
pub struct VaultRpc {
    auth: Arc<AuthService>,
    store: Arc<VaultStore>,
    registry: Arc<Registry>,
    refresh_interval: Duration,
}

impl VaultRpc {
    /// Build a new service from its three collaborators, refreshing live
    /// streams every `refresh_interval`.
    pub fn new(
        auth: Arc<AuthService>,
        store: Arc<VaultStore>,
        registry: Arc<Registry>,
        refresh_interval: Duration,
    ) -> Self {
        Self { auth, store, registry, refresh_interval }
    }

    fn list_meta_response(&self, username: &str) -> Result<ListSecretsMetaResponse, Status> {
        let metas = self
            .store
            .list_secrets_meta(username)
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(ListSecretsMetaResponse { meta: metas.iter().map(meta_to_proto).collect() })
    }
}

/// Drops the stream's subscription slot when the handler task ends, on
/// every exit path: normal completion, send failure, or panic.
struct SubscriptionGuard {
    registry: Arc<Registry>,
    username: String,
    handle: vault_notify::SubscriptionHandle,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.username, self.handle);
    }
}

#[tonic::async_trait]
impl NedoVault for VaultRpc {
    async fn authorize(
        &self,
        request: Request<AuthRequest>,
    ) -> Result<Response<AuthResponse>, Status> {
        let req = request.into_inner();
        let username = decode_key(&req.username)?;
        let password = String::from_utf8(req.password)
            .map_err(|_| Status::invalid_argument("password must be valid UTF-8"))?;

        let token = self.auth.authorize(&username, &password).await.map_err(|e| match e {
            vault_auth::AuthError::InvalidCredentials => {
                Status::unauthenticated("invalid credentials")
            }
            other => {
                tracing::error!(error = %other, "authorize failed");
                Status::internal("authorization failed")
            }
        })?;

        Ok(Response::new(AuthResponse { token }))
    }

    async fn add_secret(
        &self,
        request: Request<AddSecretRequest>,
    ) -> Result<Response<Empty>, Status> {
        let username = authenticate(&self.auth, &request)?;
        let req = request.into_inner();
        let key = decode_key(&req.key)?;
        let name = decode_name(&req.name);
        let secret = secret_from_proto(req.secret.ok_or_else(|| {
            Status::invalid_argument("secret payload is required")
        })?)?;

        self.store
            .add_secret(&username, &key, &secret, name)
            .map_err(|e| Status::internal(e.to_string()))?;

        self.registry.publish(&username);

        Ok(Response::new(Empty {}))
    }

    async fn delete_secret(
        &self,
        request: Request<DeleteSecretRequest>,
    ) -> Result<Response<Empty>, Status> {
        let username = authenticate(&self.auth, &request)?;
        let req = request.into_inner();
        let key = decode_key(&req.key)?;

        self.store
            .delete_secret(&username, &key)
            .map_err(|e| Status::internal(e.to_string()))?;

        self.registry.publish(&username);

        Ok(Response::new(Empty {}))
    }

    async fn get_secret(
        &self,
        request: Request<GetSecretRequest>,
    ) -> Result<Response<GetSecretResponse>, Status> {
        let username = authenticate(&self.auth, &request)?;
        let req = request.into_inner();
        let key = decode_key(&req.key)?;

        let (secret, meta) = self.store.get_secret(&username, &key).map_err(|e| match e {
            vault_store::StoreError::NotFound => Status::not_found("no such secret"),
            other => Status::internal(other.to_string()),
        })?;

        Ok(Response::new(GetSecretResponse {
            secret: Some(secret_to_proto(&secret)),
            meta: Some(meta_to_proto(&meta)),
        }))
    }

    async fn list_secrets_meta(
        &self,
        request: Request<Empty>,
    ) -> Result<Response<ListSecretsMetaResponse>, Status> {
        let username = authenticate(&self.auth, &request)?;
        Ok(Response::new(self.list_meta_response(&username)?))
    }

    type ListSecretsMetaStreamStream = ListSecretsMetaStreamReply;

    async fn list_secrets_meta_stream(
        &self,
        request: Request<Empty>,
    ) -> Result<Response<Self::ListSecretsMetaStreamStream>, Status> {
        let username = authenticate(&self.auth, &request)?;

        let (handle, mut wake_rx) = self.registry.subscribe(&username);
        let guard = SubscriptionGuard { registry: self.registry.clone(), username: username.clone(), handle };

        let (tx, rx) = mpsc::channel(1);
        let store = self.store.clone();
        let refresh_interval = self.refresh_interval;

        tokio::spawn(async move {
            let _guard = guard;

            let send_snapshot = |u: &str| -> Result<ListSecretsMetaResponse, Status> {
                let metas = store
                    .list_secrets_meta(u)
                    .map_err(|e| Status::internal(e.to_string()))?;
                Ok(ListSecretsMetaResponse { meta: metas.iter().map(meta_to_proto).collect() })
            };

            if tx.send(send_snapshot(&username)).await.is_err() {
                return;
            }

            let mut refresh = tokio::time::interval(refresh_interval);
            refresh.reset();

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        return;
                    }
                    woken = wake_rx.recv() => {
                        if woken.is_none() {
                            return;
                        }
                        if tx.send(send_snapshot(&username)).await.is_err() {
                            return;
                        }
                        refresh.reset();
                    }
                    _ = refresh.tick() => {
                        if tx.send(send_snapshot(&username)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        let stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream) as Self::ListSecretsMetaStreamStream))
    }
}
