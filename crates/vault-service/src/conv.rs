//! Conversions between the domain model ([`vault_types`]) and the generated
//! wire types ([`vault_proto`]).

use tonic::Status;

use vault_proto::secret::Payload;
use vault_types::{Secret, SecretMeta, SecretType};

/// Convert a domain [`Secret`] into its wire representation.
pub fn secret_to_proto(secret: &Secret) -> vault_proto::Secret {
    let payload = match secret {
        Secret::LogPass { login, password } => Payload::LogPass(vault_proto::LogPass {
            login: login.clone(),
            password: password.clone(),
        }),
        Secret::Text { data } => Payload::Text(vault_proto::Text { data: data.clone() }),
    };
    vault_proto::Secret { payload: Some(payload) }
}

/// Parse a wire [`vault_proto::Secret`] into the domain type.
///
/// The closed sum type is enforced here: a message with neither oneof
/// variant set is rejected rather than silently defaulted.
pub fn secret_from_proto(proto: vault_proto::Secret) -> Result<Secret, Status> {
    match proto.payload {
        Some(Payload::LogPass(lp)) => Ok(Secret::LogPass { login: lp.login, password: lp.password }),
        Some(Payload::Text(t)) => Ok(Secret::Text { data: t.data }),
        None => Err(Status::invalid_argument("secret payload is empty")),
    }
}

fn secret_type_to_proto(t: SecretType) -> vault_proto::SecretType {
    match t {
        SecretType::LogPass => vault_proto::SecretType::Logpass,
        SecretType::Text => vault_proto::SecretType::Text,
    }
}

/// Convert domain [`SecretMeta`] into its wire representation.
pub fn meta_to_proto(meta: &SecretMeta) -> vault_proto::SecretMeta {
    vault_proto::SecretMeta {
        key: meta.key.clone().into_bytes(),
        name: meta.name.clone().unwrap_or_default().into_bytes(),
        timestamp: Some(prost_types::Timestamp { seconds: meta.timestamp, nanos: 0 }),
        r#type: secret_type_to_proto(meta.secret_type) as i32,
    }
}

/// Decode a request key/name byte field into a UTF-8 string, rejecting
/// empty keys up front (`InvalidArgument`, per SPEC_FULL.md §4.4).
pub fn decode_key(bytes: &[u8]) -> Result<String, Status> {
    if bytes.is_empty() {
        return Err(Status::invalid_argument("key must not be empty"));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Status::invalid_argument("key must be valid UTF-8"))
}

/// Decode an optional display-name byte field (empty means "no name").
pub fn decode_name(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        String::from_utf8(bytes.to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_round_trips_through_proto() {
        let secret = Secret::LogPass { login: "u".into(), password: "p".into() };
        let proto = secret_to_proto(&secret);
        assert_eq!(secret_from_proto(proto).unwrap(), secret);
    }

    #[test]
    fn empty_oneof_is_rejected() {
        let proto = vault_proto::Secret { payload: None };
        assert!(secret_from_proto(proto).is_err());
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(decode_key(b"").is_err());
    }
}
