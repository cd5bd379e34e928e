#![forbid(unsafe_code)]

//! **vault-service** – The `NedoVault` gRPC handler layer: wires
//! [`vault_auth`], [`vault_store`] and [`vault_notify`] behind the
//! generated [`vault_proto`] service trait.
//!
//! Authentication is a plain helper function ([`auth::authenticate`]) that
//! every handler but `Authorize` calls explicitly, rather than a
//! `tonic::Interceptor` or `tower::Layer` — neither of those run with
//! visibility into which method was dispatched, which is needed to exempt
//! `Authorize` from the gate.

mod auth;
mod conv;
mod service;

pub use service::{ListSecretsMetaStreamReply, VaultRpc, DEFAULT_REFRESH_INTERVAL};
