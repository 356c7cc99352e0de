use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const ISSUED_AT: &str = "iat";
pub const EXPIRES_AT: &str = "exp";
/// Long-form names accepted by [`Claims::get`] for the reserved timestamps.
pub const ISSUED_AT_ALIAS: &str = "issuedAt";
pub const EXPIRES_AT_ALIAS: &str = "expiresAt";
pub const USERNAME: &str = "username";
pub const ACCOUNT_NUMBER: &str = "accountNumber";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[repr(transparent)]
pub struct Username(pub String);

/// A single claim value. Timestamps travel as integers (unix seconds).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Text(String),
    Integer(i64),
    Float(f64),
    /// Anything else a foreign issuer put in the payload.
    Other(serde_json::Value),
}

impl ClaimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ClaimValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self {
        ClaimValue::Text(s.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(s: String) -> Self {
        ClaimValue::Text(s)
    }
}

impl From<i64> for ClaimValue {
    fn from(n: i64) -> Self {
        ClaimValue::Integer(n)
    }
}

impl From<f64> for ClaimValue {
    fn from(n: f64) -> Self {
        ClaimValue::Float(n)
    }
}

/// Application claims, keyed by claim name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, ClaimValue>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ClaimValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ClaimValue> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.0.iter()
    }
}

/// The signed payload: reserved timestamps plus the application claims.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    /// Issued-at (seconds since epoch)
    pub iat: u64,
    /// Expiry (seconds since epoch)
    pub exp: u64,
    #[serde(flatten)]
    pub extra: ClaimSet,
}

impl Claims {
    pub fn get(&self, name: &str) -> Option<ClaimValue> {
        match name {
            ISSUED_AT | ISSUED_AT_ALIAS => {
                i64::try_from(self.iat).ok().map(ClaimValue::Integer)
            }
            EXPIRES_AT | EXPIRES_AT_ALIAS => {
                i64::try_from(self.exp).ok().map(ClaimValue::Integer)
            }
            _ => self.extra.get(name).cloned(),
        }
    }
}

/// Identity recovered from a verified token, scoped to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub username: Username,
    pub account_number: Option<String>,
    pub claims: Claims,
}

impl VerifiedIdentity {
    /// Returns `None` when the claims carry no textual `username`.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let username = claims.extra.get(USERNAME)?.as_str()?.to_string();
        let account_number = claims
            .extra
            .get(ACCOUNT_NUMBER)
            .and_then(ClaimValue::as_str)
            .map(str::to_string);

        Some(Self {
            username: Username(username),
            account_number,
            claims,
        })
    }
}
