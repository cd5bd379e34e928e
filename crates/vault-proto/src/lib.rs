//! **vault-proto** – Generated gRPC message types and the `NedoVault`
//! service trait, compiled from `proto/vault.proto` by `tonic-build`.

#![allow(clippy::all)]

tonic::include_proto!("vault");
