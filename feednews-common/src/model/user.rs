use crate::{auth::password::PasswordHash, model::Id};
use thiserror::Error;
use time::OffsetDateTime;
use validator::ValidateEmail;

pub const USER_NAME_MIN_LEN: usize = 5;
pub const DEFAULT_USER_STATUS: &str = "I am new!";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub email: Email,
    pub name: UserName,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A user together with its stored password hash, as needed to check a login.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub email: Email,
    pub name: UserName,
    pub password_hash: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailError(String);

impl Email {
    pub fn new(email: String) -> Result<Self, InvalidEmailError> {
        if email.validate_email() {
            Ok(Self(email))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user name is invalid: {0}")]
pub struct InvalidUserNameError(String);

impl UserName {
    pub fn new(name: String) -> Result<Self, InvalidUserNameError> {
        if name.chars().count() >= USER_NAME_MIN_LEN {
            Ok(Self(name))
        } else {
            Err(InvalidUserNameError(name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{Email, UserName};

    #[test]
    fn email_format() {
        assert!(Email::new("a@b.com".to_owned()).is_ok());
        assert!(Email::new("alice.smith@example.org".to_owned()).is_ok());

        assert!(Email::new(String::new()).is_err());
        assert!(Email::new("alice".to_owned()).is_err());
        assert!(Email::new("alice@".to_owned()).is_err());
        assert!(Email::new("@example.org".to_owned()).is_err());
    }

    #[test]
    fn user_name_length() {
        assert!(UserName::new("Alice".to_owned()).is_ok());
        assert!(UserName::new("Zoë Ö".to_owned()).is_ok());

        assert!(UserName::new("Al".to_owned()).is_err());
        assert!(UserName::new("Zoë".to_owned()).is_err());
    }
}
