use crate::server::schema::{error::ApiError, store};
use async_graphql::{Context, ID, InputObject, Object, SimpleObject};
use feednews_common::model::{post::Post, user::User};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use validator::Validate;

fn timestamp(time: OffsetDateTime) -> Result<String, ApiError> {
    Ok(time.format(&Rfc3339)?)
}

/// Public view of a user. The password hash never leaves the store layer.
pub struct UserObject(pub User);

#[Object(name = "User")]
impl UserObject {
    #[graphql(name = "_id")]
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn name(&self) -> &str {
        self.0.name.get()
    }

    async fn email(&self) -> &str {
        self.0.email.get()
    }

    async fn status(&self) -> &str {
        &self.0.status
    }

    async fn created_at(&self) -> async_graphql::Result<String> {
        Ok(timestamp(self.0.created_at)?)
    }

    async fn updated_at(&self) -> async_graphql::Result<String> {
        Ok(timestamp(self.0.updated_at)?)
    }

    /// Oldest first.
    async fn posts(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<PostObject>> {
        let posts = store(ctx)
            .fetch_user_posts(self.0.id)
            .await
            .map_err(ApiError::from)?;

        Ok(posts.into_iter().map(PostObject).collect())
    }
}

pub struct PostObject(pub Post);

#[Object(name = "Post")]
impl PostObject {
    #[graphql(name = "_id")]
    async fn id(&self) -> ID {
        ID(self.0.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn content(&self) -> &str {
        &self.0.content
    }

    async fn image_url(&self) -> &str {
        &self.0.image_url
    }

    async fn creator(&self) -> UserObject {
        UserObject(self.0.creator.clone())
    }

    async fn created_at(&self) -> async_graphql::Result<String> {
        Ok(timestamp(self.0.created_at)?)
    }

    async fn updated_at(&self) -> async_graphql::Result<String> {
        Ok(timestamp(self.0.updated_at)?)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, SimpleObject)]
pub struct AuthData {
    pub token: String,
    pub user_id: ID,
}

#[derive(SimpleObject)]
pub struct PostData {
    /// Newest first.
    pub posts: Vec<PostObject>,
    /// Number of stored posts, regardless of the requested page.
    pub total_posts: i32,
}

#[derive(Clone, InputObject, Validate)]
#[graphql(name = "UserInputData")]
pub struct UserInput {
    #[validate(email(message = "Invalid Email!"))]
    pub email: String,
    #[validate(length(min = 5, message = "Name is too short!"))]
    pub name: String,
    #[validate(length(min = 5, message = "Password is too short!"))]
    pub password: String,
}

impl UserInput {
    pub const FIELD_ORDER: [&'static str; 3] = ["email", "name", "password"];
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, InputObject, Validate)]
#[graphql(name = "PostInputData")]
pub struct PostInput {
    #[validate(length(min = 5, message = "Title is invalid."))]
    pub title: String,
    #[validate(length(min = 5, message = "Content is invalid."))]
    pub content: String,
    pub image_url: String,
}

impl PostInput {
    pub const FIELD_ORDER: [&'static str; 2] = ["title", "content"];
}
