use std::{error::Error, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use tracing::{debug, error};
use warp::http::{header::AUTHORIZATION, HeaderMap};

use crate::{
    case_insensitive_string_ext::CaseInsensitiveStringExt,
    error::{AuthError, VerifyError},
    types::{
        ClaimSet, ClaimValue, Claims, Username, VerifiedIdentity, ACCOUNT_NUMBER, EXPIRES_AT,
        EXPIRES_AT_ALIAS, ISSUED_AT, ISSUED_AT_ALIAS, USERNAME,
    },
};

#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Check a username/password pair. On success, return the application claims to embed
    /// in the issued token; return `Ok(None)` when the pair does not match.
    async fn check_credentials(
        &self,
        username: &Username,
        password: &str,
    ) -> Result<Option<ClaimSet>, Box<dyn Error + Send + Sync>>;
}

/// Stand-in for a real identity provider: a single fixed username/password pair.
#[derive(Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
    account_number: String,
}

impl StaticCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            account_number: account_number.into(),
        }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn check_credentials(
        &self,
        username: &Username,
        password: &str,
    ) -> Result<Option<ClaimSet>, Box<dyn Error + Send + Sync>> {
        if username.0 != self.username || password != self.password {
            return Ok(None);
        }

        Ok(Some(
            ClaimSet::new()
                .with(USERNAME, username.0.as_str())
                .with(ACCOUNT_NUMBER, self.account_number.as_str()),
        ))
    }
}

/// Symmetric key material shared by issuance and verification.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SigningSecret {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for SigningSecret {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.write_str("SigningSecret(..)")
    }
}

pub(crate) fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

/// Issues and verifies HMAC-signed compact tokens.
///
/// Holds no mutable state, so one instance can be shared across any number of tasks.
pub struct TokenEngine {
    algorithm: Algorithm,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEngine")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenEngine {
    pub fn new(
        secret: &SigningSecret,
        algorithm: Algorithm,
        ttl: Duration,
    ) -> Result<Self, AuthError> {
        if !is_hmac(algorithm) {
            return Err(AuthError::UnsupportedAlgorithm(algorithm));
        }
        if secret.is_empty() {
            error!("refusing to build token engine with an empty signing secret");
            return Err(AuthError::SigningFailure { source: None });
        }

        // Expiry is checked against our own clock reading, not by jsonwebtoken.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            algorithm,
            ttl,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, claims: ClaimSet) -> Result<String, AuthError> {
        self.issue_at(claims, get_current_timestamp())
    }

    /// Sign `claims` as if issued at `now` (seconds since epoch).
    ///
    /// Caller-supplied `iat`/`exp` (or `issuedAt`/`expiresAt`) entries are discarded.
    pub fn issue_at(&self, mut claims: ClaimSet, now: u64) -> Result<String, AuthError> {
        for reserved in [ISSUED_AT, EXPIRES_AT, ISSUED_AT_ALIAS, EXPIRES_AT_ALIAS] {
            claims.remove(reserved);
        }

        let claims = Claims {
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
            extra: claims,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign token");
            AuthError::SigningFailure { source: Some(e) }
        })
    }

    pub fn decode_verified(&self, token: &str) -> Result<Claims, VerifyError> {
        self.decode_verified_at(token, get_current_timestamp())
    }

    /// Check structure, algorithm and signature, then require `exp > now`.
    /// Claims are only handed out once all of those pass.
    pub fn decode_verified_at(&self, token: &str, now: u64) -> Result<Claims, VerifyError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            let reason = VerifyError::from(e);
            debug!(%reason, "token rejected");
            reason
        })?;

        if data.claims.exp <= now {
            debug!(exp = data.claims.exp, now, "token rejected: expired");
            return Err(VerifyError::Expired);
        }

        Ok(data.claims)
    }

    pub fn verify(&self, token: &str) -> bool {
        self.decode_verified(token).is_ok()
    }

    /// Look up one claim of a token, verifying the token first.
    ///
    /// The reserved timestamps answer to both `iat`/`exp` and `issuedAt`/`expiresAt`.
    pub fn extract_claim(&self, token: &str, name: &str) -> Option<ClaimValue> {
        self.decode_verified(token).ok()?.get(name)
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    /// The secret used to sign auth tokens.
    /// If the secret changes, every outstanding token stops verifying.
    pub token_secret: SigningSecret,
    /// How long auth tokens should remain valid for. After this interval, the client will have to re-login.
    pub token_lifetime: Duration,
    /// HMAC algorithm used for signing and the only one accepted when verifying.
    pub token_algorithm: Algorithm,
    pub credentials: Arc<dyn CredentialStore>,
}

pub(crate) struct AuthInternal {
    pub(crate) engine: TokenEngine,
    pub(crate) credentials: Arc<dyn CredentialStore>,
}

impl AuthInternal {
    pub(crate) async fn login(
        &self,
        username: &Username,
        password: &str,
    ) -> Result<String, AuthError> {
        let claims = self
            .credentials
            .check_credentials(username, password)
            .await?
            .ok_or(AuthError::CredentialMismatch)?;

        self.engine.issue(claims)
    }

    pub(crate) fn authenticate(&self, headers: &HeaderMap) -> Option<VerifiedIdentity> {
        let Some(header) = headers.get(AUTHORIZATION) else {
            debug!("no authorization header");
            return None;
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix_ignore_ascii_case("bearer "));
        let Some(token) = token else {
            debug!("authorization header is not a bearer token");
            return None;
        };

        let claims = self.engine.decode_verified(token.trim()).ok()?;
        let identity = VerifiedIdentity::from_claims(claims);
        if identity.is_none() {
            debug!("verified token carries no username claim");
        }
        identity
    }
}

#[derive(Clone)]
pub struct Auth {
    pub(crate) internal: Arc<AuthInternal>,
}

impl Auth {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let engine = TokenEngine::new(
            &config.token_secret,
            config.token_algorithm,
            config.token_lifetime,
        )?;

        Ok(Self {
            internal: Arc::new(AuthInternal {
                engine,
                credentials: config.credentials,
            }),
        })
    }

    pub fn engine(&self) -> &TokenEngine {
        &self.internal.engine
    }

    /// Resolve the caller's identity from request headers.
    ///
    /// Never fails: a missing, foreign or invalid token simply yields `None`, and the
    /// handler decides whether that is acceptable (see [`crate::require_identity`]).
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<VerifiedIdentity> {
        self.internal.authenticate(headers)
    }

    pub async fn login(&self, username: &Username, password: &str) -> Result<String, AuthError> {
        self.internal.login(username, password).await
    }
}
