//! The "TRUST" Layer - Bearer Credential Verification
//!
//! Every ingestion path requires a bearer credential issued by a root
//! authority. Credentials are Biscuit tokens carrying three facts:
//! `subject(...)`, `role(...)`, and `expires_at(unix seconds)`.
//!
//! Verification checks the root signature, the presence of all claim facts,
//! and expiry, and returns the raw claims. Role gating happens at the
//! service edge via `require_ingest_role`.

use biscuit_auth::{macros::*, Biscuit, KeyPair, PublicKey};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Insufficient role: {0}")]
    InsufficientRole(String),

    #[error("Biscuit error: {0}")]
    BiscuitError(String),
}

/// Roles accepted on ingestion paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sensor,
    Operator,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sensor => "sensor",
            Role::Operator => "operator",
            Role::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "sensor" => Some(Role::Sensor),
            "operator" => Some(Role::Operator),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims extracted from a verified credential.
///
/// `role` is kept raw: unknown roles verify fine but are rejected at the
/// ingestion gate with `InsufficientRole`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub subject: String,
    pub role: String,
}

impl Claims {
    /// Actor string for audit records, e.g. "operator:ops@demo.local".
    pub fn actor(&self) -> String {
        format!("{}:{}", self.role, self.subject)
    }
}

/// Requires the claims' role to be one of the ingestion roles.
pub fn require_ingest_role(claims: &Claims) -> Result<Role, AuthError> {
    Role::parse(&claims.role).ok_or_else(|| AuthError::InsufficientRole(claims.role.clone()))
}

fn unix_seconds(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

// ============================================================================
// AUTHORITY (ISSUANCE)
// ============================================================================

/// Issues bearer credentials. Holds the root keypair; deploy-side this lives
/// with the operator dashboard, test-side with the harness.
pub struct IdentityAuthority {
    root: KeyPair,
}

impl IdentityAuthority {
    pub fn new(root: KeyPair) -> Self {
        Self { root }
    }

    /// Public half of the root key, for constructing verifiers.
    pub fn public_key(&self) -> PublicKey {
        self.root.public()
    }

    /// Issue a credential for `subject` with the given role and lifetime.
    pub fn issue_token(
        &self,
        subject: &str,
        role: Role,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<Vec<u8>, AuthError> {
        let role = role.as_str();
        let expires_at = unix_seconds(now) + ttl.as_secs() as i64;

        let biscuit = biscuit!(
            r#"
            subject({subject});
            role({role});
            expires_at({expires_at});
        "#
        )
        .build(&self.root)
        .map_err(|e| AuthError::BiscuitError(format!("{:?}", e)))?;

        biscuit
            .to_vec()
            .map_err(|e| AuthError::BiscuitError(format!("{:?}", e)))
    }
}

// ============================================================================
// VERIFIER
// ============================================================================

/// Verifies bearer credentials against the root public key.
pub struct IdentityVerifier {
    root_public_key: PublicKey,
}

impl IdentityVerifier {
    pub fn new(root_public_key: PublicKey) -> Self {
        Self { root_public_key }
    }

    /// Verify a credential and extract its claims.
    ///
    /// Checks, in order:
    /// 1. Credential present
    /// 2. Signature chain valid for the root key
    /// 3. Claim facts present (datalog policy + queries)
    /// 4. Not expired at `now`
    pub fn verify(&self, token_bytes: &[u8], now: SystemTime) -> Result<Claims, AuthError> {
        if token_bytes.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let biscuit = Biscuit::from(token_bytes, self.root_public_key)
            .map_err(|e| AuthError::InvalidToken(format!("{:?}", e)))?;

        let mut authorizer = biscuit
            .authorizer()
            .map_err(|e| AuthError::BiscuitError(format!("{:?}", e)))?;

        authorizer
            .add_policy("allow if subject($s), role($r), expires_at($e)")
            .map_err(|e| AuthError::BiscuitError(format!("{:?}", e)))?;

        authorizer
            .authorize()
            .map_err(|e| AuthError::InvalidToken(format!("{:?}", e)))?;

        let subjects: Vec<(String,)> = authorizer
            .query(rule!("data($s) <- subject($s)"))
            .map_err(|e| AuthError::BiscuitError(format!("{:?}", e)))?;
        let roles: Vec<(String,)> = authorizer
            .query(rule!("data($r) <- role($r)"))
            .map_err(|e| AuthError::BiscuitError(format!("{:?}", e)))?;
        let expiries: Vec<(i64,)> = authorizer
            .query(rule!("data($e) <- expires_at($e)"))
            .map_err(|e| AuthError::BiscuitError(format!("{:?}", e)))?;

        let subject = subjects
            .first()
            .ok_or_else(|| AuthError::InvalidToken("missing subject claim".into()))?
            .0
            .clone();
        let role = roles
            .first()
            .ok_or_else(|| AuthError::InvalidToken("missing role claim".into()))?
            .0
            .clone();
        let expires_at = expiries
            .first()
            .ok_or_else(|| AuthError::InvalidToken("missing expires_at claim".into()))?
            .0;

        if expires_at <= unix_seconds(now) {
            return Err(AuthError::TokenExpired);
        }

        Ok(Claims { subject, role })
    }
}

// ============================================================================
// TESTS
// ============================================================================
