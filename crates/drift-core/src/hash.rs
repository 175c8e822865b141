use sha2::{Digest, Sha256};

/// Fingerprint `sha`: lowercase hex SHA-256 of the payload's canonical JSON.
pub fn payload_sha(data: &serde_json::Value) -> String {
    hex::encode(Sha256::digest(crate::canon::canonical_json_bytes(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_payload_has_a_stable_hash() {
        // sha256("null")
        assert_eq!(
            payload_sha(&serde_json::Value::Null),
            "74234e98afe7498fb5daf1f36ac2d78acc339464f950703b8c019892f982b90b"
        );
    }

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"artifact": "spring-boot-starter-web", "group": "org.springframework.boot"});
        let b = json!({"group": "org.springframework.boot", "artifact": "spring-boot-starter-web"});
        assert_eq!(payload_sha(&a), payload_sha(&b));
    }

    #[test]
    fn values_do_matter() {
        let a = payload_sha(&json!({"version": "3.4.5"}));
        let b = payload_sha(&json!({"version": "3.5.0"}));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
