//! Signed, expiring identity tokens (HS256 JWTs).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, CoreResult};

/// Issuer stamped into every token and required on verification.
pub const ISSUER: &str = "chatgate";

/// Validity window of an issued token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 3600);

/// The attributes asserted by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// A freshly signed token together with its expiry (Unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Process-wide HMAC key. Never empty.
#[derive(Clone)]
pub struct SigningSecret(Arc<[u8]>);

impl SigningSecret {
    pub fn new(bytes: impl AsRef<[u8]>) -> CoreResult<Self> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(CoreError::SecretUnavailable(
                "signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self(Arc::from(bytes)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret(<{} bytes>)", self.0.len())
    }
}

/// Issues and verifies tokens against a single [`SigningSecret`].
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(secret: &SigningSecret, ttl: Duration) -> Self {
        Self::with_clock(secret, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &SigningSecret, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a new claim set for `subject`, valid from now for the configured TTL.
    pub fn issue(&self, subject: &str) -> CoreResult<IssuedToken> {
        let now = self.clock.now();
        let exp = now
            .checked_add(self.ttl.as_secs())
            .ok_or_else(|| CoreError::Signing("token expiry overflows u64 seconds".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            iss: ISSUER.to_string(),
            iat: now,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Checks the signature, issuer and expiry of `token` and returns its claims.
    ///
    /// Expiry is judged against this authority's clock with no leeway; a
    /// token is valid while `now < exp`.
    pub fn verify(&self, token: &str) -> CoreResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["sub", "iss", "exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => CoreError::InvalidSignature,
                ErrorKind::ExpiredSignature => CoreError::TokenExpired,
                _ => CoreError::MalformedToken(e.to_string()),
            }
        })?;

        if self.clock.now() >= data.claims.exp {
            return Err(CoreError::TokenExpired);
        }

        Ok(data.claims)
    }
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
