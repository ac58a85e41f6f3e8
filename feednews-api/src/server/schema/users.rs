use crate::server::schema::{
    error::{ApiError, INVALID_EMAIL, NAME_TOO_SHORT, USER_EXISTS, USER_NOT_FOUND},
    store,
    types::{AuthData, UserInput, UserObject},
    viewer,
};
use async_graphql::{Context, ID, Object};
use feednews_common::{
    auth::{password::PasswordHash, token::TokenCodec},
    model::user::{CreateUser, Email, UserName},
};
use feednews_db::store::DbError;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// Exchanges credentials for a bearer token.
    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<AuthData> {
        Ok(login(ctx, email, password).await?)
    }

    /// The user the request is authenticated as.
    async fn get_user_data(&self, ctx: &Context<'_>) -> async_graphql::Result<UserObject> {
        Ok(get_user_data(ctx).await?)
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    async fn register_user(
        &self,
        ctx: &Context<'_>,
        user_input: UserInput,
    ) -> async_graphql::Result<UserObject> {
        Ok(register_user(ctx, user_input).await?)
    }
}

async fn register_user(ctx: &Context<'_>, input: UserInput) -> Result<UserObject, ApiError> {
    input
        .validate()
        .map_err(|errors| ApiError::from_validation(&errors, &UserInput::FIELD_ORDER))?;

    let email = Email::new(input.email).map_err(|_| ApiError::invalid("email", INVALID_EMAIL))?;
    let name = UserName::new(input.name).map_err(|_| ApiError::invalid("name", NAME_TOO_SHORT))?;
    let password_hash = PasswordHash::generate(&input.password)?;

    let user = store(ctx)
        .create_user(&CreateUser {
            email,
            name,
            password_hash,
        })
        .await
        .map_err(|err| match err {
            DbError::EmailTaken => ApiError::invalid("email", USER_EXISTS),
            err => err.into(),
        })?;

    info!(user_id = %user.id, "Registered user");
    Ok(UserObject(user))
}

async fn login(ctx: &Context<'_>, email: String, password: String) -> Result<AuthData, ApiError> {
    match (email.is_empty(), password.is_empty()) {
        (true, true) => return Err(ApiError::Authentication("Empty fields!")),
        (true, false) | (false, true) => {
            return Err(ApiError::Authentication("One of the fields is empty!"));
        }
        (false, false) => {}
    }

    let email = Email::new(email).map_err(|_| ApiError::Authentication(INVALID_EMAIL))?;
    let credentials = store(ctx)
        .fetch_credentials(&email)
        .await?
        .ok_or(ApiError::Authentication(USER_NOT_FOUND))?;

    if !credentials.password_hash.verify(&password)? {
        return Err(ApiError::Authentication("Password is incorrect!"));
    }

    let user = credentials.user;
    let token = ctx
        .data_unchecked::<Arc<TokenCodec>>()
        .sign(user.id, &user.email)?;

    info!(user_id = %user.id, "User logged in");
    Ok(AuthData {
        token,
        user_id: ID(user.id.to_string()),
    })
}

async fn get_user_data(ctx: &Context<'_>) -> Result<UserObject, ApiError> {
    let user_id = viewer(ctx).require()?;

    let user = store(ctx)
        .fetch_user(user_id)
        .await?
        .ok_or(ApiError::NotFound(USER_NOT_FOUND))?;

    Ok(UserObject(user))
}
