use feednews_common::{
    auth::password::PasswordHash,
    model::{
        Id, ModelValidationError,
        post::Post,
        user::{Email, User, UserCredentials, UserName},
    },
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A post joined with its creator; creator columns carry a `user_` prefix.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub user_email: String,
    pub user_name: String,
    pub user_status: String,
    pub user_created_at: OffsetDateTime,
    pub user_updated_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for UserCredentials {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: Id::from_db(value.user_snowflake),
                email: Email::new(value.email)?,
                name: UserName::new(value.name)?,
                status: value.status,
                created_at: value.created_at,
                updated_at: value.updated_at,
            },
            password_hash: PasswordHash::from_phc(value.password_hash),
        })
    }
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        UserCredentials::try_from(value).map(|credentials| credentials.user)
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            title: value.title,
            content: value.content,
            image_url: value.image_url,
            creator: User {
                id: Id::from_db(value.user_snowflake),
                email: Email::new(value.user_email)?,
                name: UserName::new(value.user_name)?,
                status: value.user_status,
                created_at: value.user_created_at,
                updated_at: value.user_updated_at,
            },
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}
