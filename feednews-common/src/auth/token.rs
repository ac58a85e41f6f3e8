use crate::{
    model::{
        Id,
        user::{Email, UserMarker},
    },
    util::PositiveDuration,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::{Debug, Formatter},
    num::ParseIntError,
};
use thiserror::Error;
use time::OffsetDateTime;

const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token could not be signed or verified: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Token subject is not a user id: {0}")]
    InvalidSubject(ParseIntError),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct TokenClaims {
    pub subject: Id<UserMarker>,
    pub email: String,
    pub issued_at: i64,
    pub expires_at: Option<i64>,
}

/// Signs and verifies HS256 bearer tokens with one process-wide secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Option<PositiveDuration>,
}

impl TokenCodec {
    /// Tokens carry an `exp` claim only if `lifetime` is set.
    #[must_use]
    pub fn new(secret: &[u8], lifetime: Option<PositiveDuration>) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.required_spec_claims = HashSet::from(["sub".to_owned()]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    pub fn sign(&self, subject: Id<UserMarker>, email: &Email) -> Result<String, TokenError> {
        self.sign_at(subject, email, OffsetDateTime::now_utc())
    }

    pub fn sign_at(
        &self,
        subject: Id<UserMarker>,
        email: &Email,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            email: email.get().to_owned(),
            iat: issued_at.unix_timestamp(),
            exp: self
                .lifetime
                .map(|lifetime| (issued_at + lifetime.get()).unix_timestamp()),
        };

        Ok(encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)?)
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        Ok(TokenClaims {
            subject: claims.sub.parse().map_err(TokenError::InvalidSubject)?,
            email: claims.email,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

impl Debug for TokenCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"[redacted]")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        auth::token::{TokenCodec, TokenError},
        model::{Id, user::Email},
        util::PositiveDuration,
    };
    use time::{Duration, OffsetDateTime};

    fn email() -> Email {
        Email::new("a@b.com".to_owned()).unwrap()
    }

    #[test]
    fn verified_claims_match_signed_subject() {
        let codec = TokenCodec::new(b"secret", None);
        let subject = Id::from(42_u64);

        let token = codec.sign(subject, &email()).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.subject, subject);
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.expires_at, None);
    }

    #[test]
    fn verification_is_repeatable() {
        let codec = TokenCodec::new(b"secret", None);
        let token = codec.sign(Id::from(7_u64), &email()).unwrap();

        assert_eq!(codec.verify(&token).unwrap(), codec.verify(&token).unwrap());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let codec = TokenCodec::new(b"secret", None);
        let forger = TokenCodec::new(b"not the secret", None);
        let token = forger.sign(Id::from(7_u64), &email()).unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Jwt(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = TokenCodec::new(b"secret", None);

        assert!(codec.verify("").is_err());
        assert!(codec.verify("abc.def.ghi").is_err());
    }

    #[test]
    fn lifetime_sets_and_enforces_expiry() {
        let lifetime = PositiveDuration::from_seconds(60).unwrap();
        let codec = TokenCodec::new(b"secret", Some(lifetime));

        let fresh = codec.sign(Id::from(7_u64), &email()).unwrap();
        let claims = codec.verify(&fresh).unwrap();
        assert_eq!(claims.expires_at, Some(claims.issued_at + 60));

        let stale = codec
            .sign_at(
                Id::from(7_u64),
                &email(),
                OffsetDateTime::now_utc() - Duration::hours(1),
            )
            .unwrap();
        assert!(codec.verify(&stale).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let codec = TokenCodec::new(b"hunter2", None);

        assert!(!format!("{codec:?}").contains("hunter2"));
    }
}
