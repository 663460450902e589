// Request signing for webhooks and callbacks

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the payload signature on outbound POSTs
pub const SIGNATURE_HEADER: &str = "X-GoFlow-Signature";

/// `sha256=<lowercase-hex(HMAC-SHA256(secret, body))>`
pub fn sign_sha256(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_rfc4231_test_case_2() {
        let signature = sign_sha256("Jefe", b"what do ya want for nothing?");
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let body = br#"{"job_id":1,"status":"completed"}"#;
        assert_ne!(sign_sha256("s3cr3t", body), sign_sha256("other", body));
    }
}
