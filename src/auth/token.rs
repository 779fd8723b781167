//! Compact HS256 tokens: `base64url(header).base64url(payload).base64url(mac)`.
//!
//! Signing injects `iat`/`exp` (epoch seconds) into the caller's payload.
//! Verification accepts HS256 only, compares the MAC in constant time and
//! applies no expiry leeway.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome<T> {
    pub valid: bool,
    pub expired: bool,
    pub payload: Option<T>,
}

impl<T> VerifyOutcome<T> {
    fn invalid() -> Self {
        Self {
            valid: false,
            expired: false,
            payload: None,
        }
    }

    fn expired() -> Self {
        Self {
            valid: false,
            expired: true,
            payload: None,
        }
    }

    /// The payload when the token is valid.
    pub fn into_payload(self) -> Option<T> {
        if self.valid {
            self.payload
        } else {
            None
        }
    }
}

/// Signing and verification keys derived from one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign `payload` (which must serialize to a JSON object) for `ttl_seconds`.
    /// A negative TTL produces a token that is already expired; one that would
    /// put `exp` before the epoch or past `i64::MAX` is an error.
    pub fn sign<P: Serialize>(&self, payload: &P, ttl_seconds: i64) -> anyhow::Result<String> {
        let Value::Object(mut claims) = serde_json::to_value(payload)? else {
            anyhow::bail!("token payload must be a JSON object");
        };
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        // exp must stay a non-negative epoch second to be readable on verify
        let exp = iat
            .checked_add(ttl_seconds)
            .filter(|exp| *exp >= 0)
            .ok_or_else(|| anyhow::anyhow!("token ttl out of range: {ttl_seconds}s"))?;
        claims.insert("iat".into(), iat.into());
        claims.insert("exp".into(), exp.into());

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(ttl_seconds, "token signed");
        Ok(token)
    }

    /// Check signature, then expiry. Never fails; bad input is just invalid.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> VerifyOutcome<T> {
        if token.is_empty() {
            return VerifyOutcome::invalid();
        }
        match decode::<T>(token, &self.decoding, &self.validation) {
            Ok(data) => VerifyOutcome {
                valid: true,
                expired: false,
                payload: Some(data.claims),
            },
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => VerifyOutcome::expired(),
            Err(e) => {
                debug!(error = %e, "token rejected");
                VerifyOutcome::invalid()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64UrlUnpadded, Encoding};
    use serde::Deserialize;
    use serde_json::json;

    const SECRET: &str = "codec-test-secret";

    #[test]
    fn round_trip_returns_payload_plus_iat_and_exp() {
        let codec = TokenCodec::new(SECRET);
        let payload = json!({ "sub": "user-1", "email": "a@b.io", "roles": ["poster"], "n": 3 });
        let token = codec.sign(&payload, 600).expect("sign");
        assert_eq!(token.split('.').count(), 3);

        let out = codec.verify::<Value>(&token);
        assert!(out.valid);
        assert!(!out.expired);
        let got = out.payload.expect("payload");

        let iat = got["iat"].as_i64().expect("iat");
        let exp = got["exp"].as_i64().expect("exp");
        assert_eq!(exp - iat, 600);
        let mut expected = payload.clone();
        expected["iat"] = json!(iat);
        expected["exp"] = json!(exp);
        assert_eq!(got, expected);
    }

    #[test]
    fn header_is_fixed_hs256_jwt() {
        let token = TokenCodec::new(SECRET).sign(&json!({}), 60).unwrap();
        let header = token.split('.').next().unwrap();
        let decoded = Base64UrlUnpadded::decode_vec(header).unwrap();
        let header: Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn tampered_signature_is_invalid_not_expired() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.sign(&json!({ "sub": "x" }), 600).unwrap();
        let (head, sig) = token.rsplit_once('.').unwrap();
        let flipped = if sig.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{head}.{flipped}{}", &sig[1..]);

        let out = codec.verify::<Value>(&tampered);
        assert_eq!(out, VerifyOutcome::invalid());
    }

    #[test]
    fn tampered_signature_on_expired_token_is_still_plain_invalid() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.sign(&json!({ "sub": "x" }), -1).unwrap();
        let tampered = format!("{}x", token);
        let out = codec.verify::<Value>(&tampered);
        assert!(!out.valid);
        assert!(!out.expired);
    }

    #[test]
    fn negative_ttl_is_expired() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.sign(&json!({ "sub": "x" }), -1).unwrap();
        let out = codec.verify::<Value>(&token);
        assert_eq!(out, VerifyOutcome::expired());
        assert_eq!(out.into_payload(), None);
    }

    #[test]
    fn out_of_range_ttl_is_refused() {
        let codec = TokenCodec::new(SECRET);
        for ttl in [i64::MAX, i64::MIN, -OffsetDateTime::now_utc().unix_timestamp() - 10] {
            let err = codec.sign(&json!({ "sub": "x" }), ttl).unwrap_err();
            assert!(err.to_string().contains("out of range"), "ttl {ttl}: {err}");
        }
        let long_lived = codec.sign(&json!({ "sub": "x" }), 60 * 60 * 24 * 365 * 50).unwrap();
        assert!(codec.verify::<Value>(&long_lived).valid);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = TokenCodec::new(SECRET).sign(&json!({ "sub": "x" }), 60).unwrap();
        let out = TokenCodec::new("other-secret").verify::<Value>(&token);
        assert_eq!(out, VerifyOutcome::invalid());
    }

    #[test]
    fn too_few_segments_and_empty_token_are_invalid() {
        let codec = TokenCodec::new(SECRET);
        assert_eq!(codec.verify::<Value>(""), VerifyOutcome::invalid());
        assert_eq!(codec.verify::<Value>("abc.def"), VerifyOutcome::invalid());
        assert_eq!(codec.verify::<Value>("not-a-token"), VerifyOutcome::invalid());
    }

    #[test]
    fn correctly_signed_garbage_payload_is_invalid() {
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = Base64UrlUnpadded::encode_string(b"{not json");
        let message = format!("{header}.{payload}");
        let signature = jsonwebtoken::crypto::sign(
            message.as_bytes(),
            &EncodingKey::from_secret(SECRET.as_bytes()),
            Algorithm::HS256,
        )
        .unwrap();
        let token = format!("{message}.{signature}");

        let out = TokenCodec::new(SECRET).verify::<Value>(&token);
        assert_eq!(out, VerifyOutcome::invalid());
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let claims = json!({ "sub": "x", "exp": OffsetDateTime::now_utc().unix_timestamp() + 60 });
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(TokenCodec::new(SECRET).verify::<Value>(&token), VerifyOutcome::invalid());
    }

    #[test]
    fn payload_that_does_not_fit_the_type_is_invalid() {
        #[derive(Debug, Deserialize)]
        struct NeedsEmail {
            #[allow(dead_code)]
            email: String,
        }
        let codec = TokenCodec::new(SECRET);
        let token = codec.sign(&json!({ "sub": "x" }), 60).unwrap();
        let out = codec.verify::<NeedsEmail>(&token);
        assert!(!out.valid);
        assert!(out.payload.is_none());
    }

    #[test]
    fn non_object_payload_cannot_be_signed() {
        let err = TokenCodec::new(SECRET).sign(&json!([1, 2]), 60).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }
}
