use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_SALT_LEN: usize = 16;
pub const PASSWORD_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

pub const SESSION_TOKEN_CORE_LEN: usize = 24;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The password is too short")]
pub struct WeakPasswordError;

/// A raw password, validated for minimum length only. Never logged.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Result<Self, WeakPasswordError> {
        if password.chars().count() < PASSWORD_MIN_LEN {
            Err(WeakPasswordError)
        } else {
            Ok(Password(password))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(argon2::Error);

/// Salted argon2 digest of a password.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash {
    salt: [u8; PASSWORD_SALT_LEN],
    hash: Box<[u8; PASSWORD_HASH_LEN]>,
}

impl PasswordHash {
    pub fn derive(password: &Password) -> Result<Self, PasswordHashError> {
        let salt = rand::random();
        Self::derive_with_salt(password, salt)
    }

    fn derive_with_salt(
        password: &Password,
        salt: [u8; PASSWORD_SALT_LEN],
    ) -> Result<Self, PasswordHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; PASSWORD_HASH_LEN]);
        argon2
            .hash_password_into(password.get().as_bytes(), &salt, &mut *hash)
            .map_err(PasswordHashError)?;

        Ok(Self { salt, hash })
    }

    pub fn verify(&self, password: &Password) -> Result<bool, PasswordHashError> {
        let rederived = Self::derive_with_salt(password, self.salt)?;
        Ok(rederived.hash == self.hash)
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("salt", &"[redacted]")
            .field("hash", &"[redacted]")
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SessionTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
}

/// A bearer session token: the user id plus random core material.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; SESSION_TOKEN_CORE_LEN],
}

impl SessionToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        let core = rand::random();

        Self { user_id, core }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}")
    }
}

impl FromStr for SessionToken {
    type Err = SessionTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user_id_part, core_part) = s.split_once(':').ok_or(Self::Err::NotEnoughParts)?;

        let user_id = u64::from_str(user_id_part)
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;

        Ok(Self { user_id, core })
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .finish()
    }
}

/// An issued session, kept by the auth service.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Session {
    pub user: Id<UserMarker>,
    pub created_at: UtcDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: UtcDateTime) -> bool {
        self.expires_after
            .is_some_and(|expires_after| self.created_at + expires_after.get() < now)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            auth::{Password, PasswordHash, Session, SessionToken},
        },
        util::PositiveDuration,
    };
    use std::str::FromStr;
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn password_minimum_length() {
        assert!(Password::new("12345".to_owned()).is_err());
        assert!(Password::new("123456".to_owned()).is_ok());
    }

    #[test]
    fn hash_verifies_matching_password_only() {
        let password = Password::new("hunter222".to_owned()).unwrap();
        let other = Password::new("hunter333".to_owned()).unwrap();

        let hash = PasswordHash::derive(&password).unwrap();
        assert!(hash.verify(&password).unwrap());
        assert!(!hash.verify(&other).unwrap());
    }

    #[test]
    fn token_round_trips_through_string_form() {
        let token = SessionToken::generate_random(Id::from(42u64));
        let parsed = SessionToken::from_str(&token.as_token_str()).unwrap();

        assert_eq!(parsed, token);
    }

    #[test]
    fn token_rejects_garbage() {
        assert!(SessionToken::from_str("no-separator").is_err());
        assert!(SessionToken::from_str("abc:AAAA").is_err());
        assert!(SessionToken::from_str("42:!!!").is_err());
    }

    #[test]
    fn session_expiry() {
        let session = Session {
            user: Id::from(1u64),
            created_at: utc_datetime!(2025-06-01 12:00),
            expires_after: Some(PositiveDuration::new_unchecked(Duration::hours(1))),
        };

        assert!(!session.is_expired(utc_datetime!(2025-06-01 12:30)));
        assert!(session.is_expired(utc_datetime!(2025-06-01 13:01)));

        let unlimited = Session {
            expires_after: None,
            ..session
        };
        assert!(!unlimited.is_expired(utc_datetime!(2030-01-01 00:00)));
    }
}
