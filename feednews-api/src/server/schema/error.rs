use crate::server::{INTERNAL_ERROR_MESSAGE, auth::NotAuthenticated};
use axum::http::StatusCode;
use feednews_common::auth::{password::PasswordHashError, token::TokenError};
use feednews_db::store::DbError;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub const INVALID_EMAIL: &str = "Invalid Email!";
pub const NAME_TOO_SHORT: &str = "Name is too short!";
pub const USER_EXISTS: &str = "User already exists!";
pub const USER_NOT_FOUND: &str = "User not found!";
pub const INVALID_USER: &str = "Invalid user.";
pub const POST_NOT_FOUND: &str = "Post not found!";

/// One rejected input field.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Failure of a GraphQL operation, carrying the status reported to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// `errors` is never empty, `message` is the first entry's message.
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
    #[error(transparent)]
    NotAuthenticated(#[from] NotAuthenticated),
    #[error("{0}")]
    Authentication(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Database request failed: {0}")]
    Database(#[from] DbError),
    #[error("Password could not be processed: {0}")]
    Password(#[from] PasswordHashError),
    #[error("Token could not be issued: {0}")]
    Token(#[from] TokenError),
    #[error("Timestamp could not be formatted: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl ApiError {
    pub fn invalid(field: &str, message: &str) -> Self {
        Self::Validation {
            message: message.to_owned(),
            errors: vec![FieldError {
                field: field.to_owned(),
                message: message.to_owned(),
            }],
        }
    }

    /// Collects every failed field, ordered like `field_order`. Fields not named there
    /// come last.
    pub fn from_validation(errors: &ValidationErrors, field_order: &[&str]) -> Self {
        let mut field_errors: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                let field = field.to_string();
                errors.iter().map(move |error| FieldError {
                    field: field.clone(),
                    message: error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string),
                })
            })
            .collect();

        field_errors.sort_by_cached_key(|error| {
            let position = field_order
                .iter()
                .position(|field| *field == error.field)
                .unwrap_or(field_order.len());
            (position, error.clone())
        });

        let message = field_errors
            .first()
            .map_or_else(|| "Invalid input.".to_owned(), |error| error.message.clone());

        Self::Validation {
            message,
            errors: field_errors,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotAuthenticated(_) | ApiError::Authentication(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_)
            | ApiError::Password(_)
            | ApiError::Token(_)
            | ApiError::Timestamp(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Internal failures are not described.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            INTERNAL_ERROR_MESSAGE.to_owned()
        } else {
            self.to_string()
        }
    }

    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            ApiError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::schema::error::{ApiError, FieldError};
    use axum::http::StatusCode;
    use feednews_db::store::DbError;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Invalid Email!"))]
        email: String,
        #[validate(length(min = 5, message = "Name is too short!"))]
        name: String,
        #[validate(length(min = 5, message = "Password is too short!"))]
        password: String,
    }

    #[test]
    fn validation_errors_follow_field_order() {
        let signup = Signup {
            email: "nope".to_owned(),
            name: "Alice".to_owned(),
            password: "abc".to_owned(),
        };
        let errors = signup.validate().unwrap_err();

        let error = ApiError::from_validation(&errors, &["password", "email", "name"]);
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.public_message(), "Password is too short!");
        assert_eq!(
            error.field_errors().unwrap(),
            [
                FieldError {
                    field: "password".to_owned(),
                    message: "Password is too short!".to_owned(),
                },
                FieldError {
                    field: "email".to_owned(),
                    message: "Invalid Email!".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn internal_details_stay_private() {
        let error = ApiError::from(DbError::EmailTaken);

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "An error occurred.");
        assert_eq!(error.field_errors(), None);

        let error = ApiError::NotFound("Post not found!");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.public_message(), "Post not found!");
    }
}
