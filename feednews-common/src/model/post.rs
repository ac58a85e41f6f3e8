use crate::model::{
    Id,
    user::{User, UserMarker},
};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub creator: User,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub creator: Id<UserMarker>,
    pub title: String,
    pub content: String,
    pub image_url: String,
}

/// One page of the newest-first post listing.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum PostPage {
    #[default]
    All,
    Slice { offset: u64, limit: u64 },
}

impl PostPage {
    /// The `page`-th page (counting from 1) of `per_page` posts.
    #[must_use]
    pub fn numbered(page: u64, per_page: u64) -> Self {
        Self::Slice {
            offset: page.saturating_sub(1).saturating_mul(per_page),
            limit: per_page,
        }
    }
}
