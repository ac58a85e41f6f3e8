use crate::server::{
    images::ImageStore,
    schema::{
        Pagination,
        error::{ApiError, INVALID_USER, POST_NOT_FOUND},
        store,
        types::{PostData, PostInput, PostObject},
        viewer,
    },
};
use async_graphql::{Context, ID, Object};
use feednews_common::model::{
    Id,
    post::{CreatePost, PostMarker, PostPage},
};
use feednews_db::store::DbError;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

#[derive(Default)]
pub struct PostQuery;

#[Object]
impl PostQuery {
    /// All posts, newest first. With `page`, only that page of the listing.
    async fn get_posts(
        &self,
        ctx: &Context<'_>,
        page: Option<i32>,
    ) -> async_graphql::Result<PostData> {
        Ok(get_posts(ctx, page).await?)
    }

    async fn get_post(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<PostObject> {
        Ok(get_post(ctx, &id).await?)
    }
}

#[derive(Default)]
pub struct PostMutation;

#[Object]
impl PostMutation {
    async fn create_post(
        &self,
        ctx: &Context<'_>,
        post_input: PostInput,
    ) -> async_graphql::Result<PostObject> {
        Ok(create_post(ctx, post_input).await?)
    }

    /// Only the creator may delete a post. Its image is removed too.
    async fn delete_post(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        Ok(delete_post(ctx, &id).await?)
    }
}

fn parse_post_id(id: &ID) -> Result<Id<PostMarker>, ApiError> {
    id.parse().map_err(|_| ApiError::invalid("id", "Invalid post id."))
}

async fn create_post(ctx: &Context<'_>, input: PostInput) -> Result<PostObject, ApiError> {
    let user_id = viewer(ctx).require()?;
    input
        .validate()
        .map_err(|errors| ApiError::from_validation(&errors, &PostInput::FIELD_ORDER))?;

    let store = store(ctx);
    let creator = store
        .fetch_user(user_id)
        .await?
        .ok_or(ApiError::Authentication(INVALID_USER))?;

    let post = store
        .create_post(&CreatePost {
            creator: creator.id,
            title: input.title,
            content: input.content,
            image_url: input.image_url,
        })
        .await
        .map_err(|err| match err {
            DbError::UnknownUser(_) => ApiError::Authentication(INVALID_USER),
            err => err.into(),
        })?;

    info!(post_id = %post.id, user_id = %creator.id, "Created post");
    Ok(PostObject(post))
}

async fn get_posts(ctx: &Context<'_>, page: Option<i32>) -> Result<PostData, ApiError> {
    viewer(ctx).require()?;

    let page = match page {
        None => PostPage::All,
        Some(page) => {
            let page = u64::try_from(page)
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(|| ApiError::invalid("page", "Page must be at least 1."))?;
            PostPage::numbered(page, ctx.data_unchecked::<Pagination>().posts_per_page)
        }
    };

    let store = store(ctx);
    let total_posts = store.count_posts().await?;
    if total_posts == 0 {
        return Err(ApiError::NotFound("There is no post to be listed!"));
    }
    let posts = store.fetch_posts(page).await?;

    Ok(PostData {
        posts: posts.into_iter().map(PostObject).collect(),
        total_posts: i32::try_from(total_posts).unwrap_or(i32::MAX),
    })
}

async fn get_post(ctx: &Context<'_>, id: &ID) -> Result<PostObject, ApiError> {
    viewer(ctx).require()?;
    let post_id = parse_post_id(id)?;

    store(ctx)
        .fetch_post(post_id)
        .await?
        .map(PostObject)
        .ok_or(ApiError::NotFound(POST_NOT_FOUND))
}

async fn delete_post(ctx: &Context<'_>, id: &ID) -> Result<bool, ApiError> {
    let user_id = viewer(ctx).require()?;
    let post_id = parse_post_id(id)?;

    let store = store(ctx);
    let post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ApiError::NotFound(POST_NOT_FOUND))?;
    if post.creator.id != user_id {
        return Err(ApiError::Forbidden("Not authorized to delete this post!"));
    }

    if !store.delete_post(post_id).await? {
        // Deleted concurrently
        return Err(ApiError::NotFound(POST_NOT_FOUND));
    }
    ctx.data_unchecked::<Arc<ImageStore>>()
        .discard(&post.image_url)
        .await;

    info!(%post_id, %user_id, "Deleted post");
    Ok(true)
}
