use jsonwebtoken::Algorithm;
use warp::reject::Reject;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("username or password incorrect")]
    CredentialMismatch,
    #[error("no valid bearer token presented")]
    Unauthenticated,
    #[error("failed to sign token")]
    SigningFailure {
        #[source]
        source: Option<jsonwebtoken::errors::Error>,
    },
    #[error("{0:?} is not an HMAC signing algorithm")]
    UnsupportedAlgorithm(Algorithm),
    #[error("error during credential check")]
    CredentialStoreError {
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Reject for AuthError {}

/// Why a token was not accepted.
///
/// Callers that only care about accept/reject use [`crate::TokenEngine::verify`];
/// callers that want to tell "expired" apart from "forged" match on this.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token is malformed")]
    Malformed,
    #[error("token algorithm is not accepted")]
    UnsupportedAlgorithm,
    #[error("token signature does not match")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => VerifyError::SignatureInvalid,
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                VerifyError::UnsupportedAlgorithm
            }
            _ => VerifyError::Malformed,
        }
    }
}
