use std::{collections::HashSet, sync::Arc, time::Duration};

use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
use serde_json::json;
use token_gate::{Algorithm, ClaimSet, ClaimValue, SigningSecret, TokenEngine, VerifyError};

const SECRET: &str = "this is a really bad secret";

fn engine_with(secret: &str, algorithm: Algorithm) -> TokenEngine {
    TokenEngine::new(
        &SigningSecret::from(secret),
        algorithm,
        Duration::from_secs(60 * 60),
    )
    .unwrap()
}

fn engine() -> TokenEngine {
    engine_with(SECRET, Algorithm::HS512)
}

fn alice() -> ClaimSet {
    ClaimSet::new()
        .with("username", "alice")
        .with("accountNumber", "42")
}

fn replace_char(s: &str, index: usize) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}

#[test]
fn freshly_issued_token_verifies() {
    let engine = engine();
    let token = engine.issue(alice()).unwrap();

    assert_eq!(token.split('.').count(), 3);
    assert!(engine.verify(&token));

    let claims = engine.decode_verified(&token).unwrap();
    assert_eq!(engine.algorithm(), Algorithm::HS512);
    assert_eq!(claims.exp - claims.iat, engine.ttl().as_secs());
    assert_eq!(claims.extra, alice());
    assert_eq!(claims.extra.len(), 2);
    assert_eq!(
        claims
            .extra
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>(),
        ["accountNumber", "username"]
    );
}

#[test]
fn token_signed_with_other_secret_is_rejected() {
    let token = engine_with("first secret", Algorithm::HS512)
        .issue(alice())
        .unwrap();
    let other = engine_with("second secret", Algorithm::HS512);

    assert!(!other.verify(&token));
    assert_eq!(
        other.decode_verified(&token),
        Err(VerifyError::SignatureInvalid)
    );
}

#[test]
fn expired_token_is_rejected_despite_valid_signature() {
    let engine = engine();
    let now = get_current_timestamp();
    let token = engine.issue_at(alice(), now - 2 * 60 * 60).unwrap();

    assert!(!engine.verify(&token));
    assert_eq!(engine.decode_verified(&token), Err(VerifyError::Expired));
}

#[test]
fn token_expires_exactly_at_exp() {
    let engine = engine();
    let token = engine.issue_at(alice(), 1_000).unwrap();

    assert!(engine.decode_verified_at(&token, 4_599).is_ok());
    assert_eq!(
        engine.decode_verified_at(&token, 4_600),
        Err(VerifyError::Expired)
    );
}

#[test]
fn zero_lifetime_token_is_never_valid() {
    let engine = TokenEngine::new(
        &SigningSecret::from(SECRET),
        Algorithm::HS256,
        Duration::ZERO,
    )
    .unwrap();
    let token = engine.issue(alice()).unwrap();

    assert_eq!(engine.decode_verified(&token), Err(VerifyError::Expired));
}

#[test]
fn any_payload_mutation_breaks_the_signature() {
    let engine = engine();
    let token = engine.issue(alice()).unwrap();
    let parts: Vec<&str> = token.split('.').collect();

    for index in [0, parts[1].len() / 2, parts[1].len() - 1] {
        let payload = replace_char(parts[1], index);
        let tampered = format!("{}.{}.{}", parts[0], payload, parts[2]);

        assert!(!engine.verify(&tampered), "mutation at {} accepted", index);
        assert_eq!(
            engine.decode_verified(&tampered),
            Err(VerifyError::SignatureInvalid)
        );
    }
}

#[test]
fn malformed_tokens_are_rejected_without_panicking() {
    let engine = engine();

    for token in ["", "not-a-token", "a.b", "a.b.c.d", "!!!.???.***"] {
        assert!(!engine.verify(token), "{:?} accepted", token);
        assert!(engine.decode_verified(token).is_err());
    }
}

#[test]
fn token_for_another_algorithm_is_rejected() {
    let token = engine_with(SECRET, Algorithm::HS256).issue(alice()).unwrap();

    assert_eq!(
        engine().decode_verified(&token),
        Err(VerifyError::UnsupportedAlgorithm)
    );
}

#[test]
fn unsigned_token_is_rejected() {
    let engine = engine();
    let token = engine.issue(alice()).unwrap();
    let parts: Vec<&str> = token.split('.').collect();

    // {"alg":"none","typ":"JWT"}
    let forged = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{}.", parts[1]);

    assert!(!engine.verify(&forged));
}

#[test]
fn signed_token_without_timestamps_is_malformed() {
    let engine = engine();
    let token = encode(
        &Header::new(Algorithm::HS512),
        &json!({ "username": "alice", "exp": get_current_timestamp() + 60 }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert_eq!(engine.decode_verified(&token), Err(VerifyError::Malformed));
}

#[test]
fn foreign_claim_types_survive_decoding() {
    let engine = engine();
    let now = get_current_timestamp();
    let token = encode(
        &Header::new(Algorithm::HS512),
        &json!({
            "iat": now,
            "exp": now + 60,
            "username": "alice",
            "admin": true,
            "ratio": 0.5,
        }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let claims = engine.decode_verified(&token).unwrap();
    assert_eq!(claims.get("admin"), Some(ClaimValue::Other(json!(true))));
    assert_eq!(claims.get("ratio"), Some(ClaimValue::Float(0.5)));
}

#[test]
fn extract_claim_reads_verified_claims() {
    let engine = engine();
    let token = engine.issue(alice()).unwrap();

    assert_eq!(
        engine.extract_claim(&token, "username"),
        Some(ClaimValue::from("alice"))
    );
    assert_eq!(
        engine.extract_claim(&token, "accountNumber"),
        Some(ClaimValue::from("42"))
    );
    assert_eq!(engine.extract_claim(&token, "nonexistent"), None);
    assert!(engine
        .extract_claim(&token, "exp")
        .and_then(|v| v.as_i64())
        .is_some());
}

#[test]
fn timestamps_answer_to_long_names() {
    let engine = engine();
    let token = engine.issue_at(alice(), 10_000).unwrap();
    let claims = engine.decode_verified_at(&token, 10_001).unwrap();

    assert_eq!(claims.get("issuedAt"), Some(ClaimValue::Integer(10_000)));
    assert_eq!(claims.get("expiresAt"), Some(ClaimValue::Integer(13_600)));

    let token = engine.issue(alice()).unwrap();
    assert_eq!(
        engine.extract_claim(&token, "issuedAt"),
        engine.extract_claim(&token, "iat")
    );
    assert_eq!(
        engine.extract_claim(&token, "expiresAt"),
        engine.extract_claim(&token, "exp")
    );
}

#[test]
fn extract_claim_refuses_unverified_tokens() {
    let engine = engine();
    let token = engine.issue(alice()).unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    let tampered = format!("{}.{}.{}", parts[0], replace_char(parts[1], 3), parts[2]);

    assert_eq!(engine.extract_claim(&tampered, "username"), None);
    assert_eq!(engine.extract_claim("garbage", "username"), None);
}

#[test]
fn caller_cannot_choose_reserved_timestamps() {
    let engine = engine();
    let claims = alice()
        .with("iat", 1_i64)
        .with("exp", 2_i64)
        .with("issuedAt", 3_i64)
        .with("expiresAt", 4_i64);

    let token = engine.issue_at(claims, 10_000).unwrap();
    let decoded = engine.decode_verified_at(&token, 10_001).unwrap();

    assert_eq!(decoded.iat, 10_000);
    assert_eq!(decoded.exp, 13_600);
    assert_eq!(decoded.extra, alice());
    assert!(!ClaimSet::new().with("iat", 1_i64).is_empty());
}

#[test]
fn same_claims_at_different_instants_give_different_signatures() {
    let engine = engine();
    let first = engine.issue_at(alice(), 1_000).unwrap();
    let second = engine.issue_at(alice(), 1_001).unwrap();

    let signature = |t: &str| t.rsplit('.').next().unwrap().to_string();
    assert_ne!(signature(&first), signature(&second));
}

#[test]
fn engine_rejects_empty_secret_and_non_hmac_algorithms() {
    assert!(TokenEngine::new(
        &SigningSecret::from(""),
        Algorithm::HS256,
        Duration::from_secs(60)
    )
    .is_err());
    assert!(TokenEngine::new(
        &SigningSecret::from(SECRET),
        Algorithm::RS256,
        Duration::from_secs(60)
    )
    .is_err());
}

#[test]
fn secret_is_not_printed() {
    let secret = SigningSecret::from(SECRET);
    assert!(!format!("{:?}", secret).contains(SECRET));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issuance_does_not_mix_claims() {
    let engine = Arc::new(engine());

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let username = format!("user-{}", i);
                let token = engine
                    .issue(ClaimSet::new().with("username", username.as_str()))
                    .unwrap();
                (username, token)
            })
        })
        .collect();

    let mut tokens = HashSet::new();
    for handle in handles {
        let (username, token) = handle.await.unwrap();
        assert_eq!(
            engine.extract_claim(&token, "username"),
            Some(ClaimValue::Text(username))
        );
        tokens.insert(token);
    }

    assert_eq!(tokens.len(), 64);
}
