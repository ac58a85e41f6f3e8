use async_trait::async_trait;
use feednews_common::{
    model::{
        FeednewsSnowflake, FeednewsSnowflakeGenerator, Id, ModelValidationError,
        post::{CreatePost, Post, PostMarker, PostPage},
        user::{CreateUser, Email, User, UserCredentials, UserMarker},
    },
    snowflake::{ProcessId, SnowflakeTimestampError, WorkerId},
};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use time::OffsetDateTime;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

pub type SharedStore = Arc<dyn Store>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimestampError),
    #[error("A user with this email address already exists")]
    EmailTaken,
    #[error("User with id {0} does not exist")]
    UnknownUser(Id<UserMarker>),
    #[error("Generated id {0} is already taken")]
    IdCollision(u64),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence for users and their posts.
///
/// A user's posts are listed oldest first, the global listing newest first. Deleting a
/// post also removes it from its creator's posts.
#[async_trait]
pub trait Store: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<UserCredentials>>;

    /// Fails with [`DbError::EmailTaken`] if the email is already registered.
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn fetch_posts(&self, page: PostPage) -> Result<Vec<Post>>;

    async fn count_posts(&self) -> Result<u64>;

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>>;

    /// Fails with [`DbError::UnknownUser`] if the creator does not exist.
    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    /// Returns whether a post was actually removed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;
}

#[derive(Debug)]
pub(crate) struct IdGenerator(Mutex<FeednewsSnowflakeGenerator>);

impl IdGenerator {
    pub(crate) fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self(Mutex::new(FeednewsSnowflakeGenerator::new(
            worker_id, process_id,
        )))
    }

    pub(crate) fn generate_at(&self, time: OffsetDateTime) -> Result<FeednewsSnowflake> {
        let mut generator = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        Ok(generator.generate_at(time)?)
    }
}
