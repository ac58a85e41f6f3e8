use crate::store::{DbError, IdGenerator, Result, Store};
use async_trait::async_trait;
use feednews_common::{
    model::{
        Id,
        post::{CreatePost, Post, PostMarker, PostPage},
        user::{CreateUser, DEFAULT_USER_STATUS, Email, User, UserCredentials, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::{
    cmp::Reverse,
    collections::{BTreeMap, btree_map::Entry},
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct UserRow {
    credentials: UserCredentials,
    posts: Vec<Id<PostMarker>>,
}

#[derive(Clone, Debug)]
struct PostRow {
    id: Id<PostMarker>,
    creator: Id<UserMarker>,
    title: String,
    content: String,
    image_url: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id<UserMarker>, UserRow>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
}

/// Refuses to replace a row when the generator hands out an id twice.
fn insert_new<K, V>(map: &mut BTreeMap<K, V>, key: K, value: V) -> Result<()>
where
    K: Ord + Copy + Into<u64>,
{
    match map.entry(key) {
        Entry::Occupied(_) => Err(DbError::IdCollision(key.into())),
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        }
    }
}

impl Tables {
    fn resolve(&self, row: &PostRow) -> Option<Post> {
        let creator = self.users.get(&row.creator)?;

        Some(Post {
            id: row.id,
            title: row.title.clone(),
            content: row.content.clone(),
            image_url: row.image_url.clone(),
            creator: creator.credentials.user.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// [`Store`] that keeps everything in process memory. Nothing survives a restart.
#[derive(Debug)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    ids: IdGenerator,
}

impl MemoryStore {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            tables: Mutex::default(),
            ids: IdGenerator::new(worker_id, process_id),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(WorkerId::default(), ProcessId::default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let tables = self.tables();

        Ok(tables
            .users
            .get(&user_id)
            .map(|row| row.credentials.user.clone()))
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<UserCredentials>> {
        let tables = self.tables();

        Ok(tables
            .users
            .values()
            .find(|row| &row.credentials.user.email == email)
            .map(|row| row.credentials.clone()))
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables();

        if tables
            .users
            .values()
            .any(|row| row.credentials.user.email == user.email)
        {
            return Err(DbError::EmailTaken);
        }

        let created = User {
            id: self.ids.generate_at(now)?.into(),
            email: user.email.clone(),
            name: user.name.clone(),
            status: DEFAULT_USER_STATUS.to_owned(),
            created_at: now,
            updated_at: now,
        };

        insert_new(
            &mut tables.users,
            created.id,
            UserRow {
                credentials: UserCredentials {
                    user: created.clone(),
                    password_hash: user.password_hash.clone(),
                },
                posts: Vec::new(),
            },
        )?;

        Ok(created)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables();

        Ok(tables
            .posts
            .get(&post_id)
            .and_then(|row| tables.resolve(row)))
    }

    async fn fetch_posts(&self, page: PostPage) -> Result<Vec<Post>> {
        let tables = self.tables();

        let mut rows: Vec<&PostRow> = tables.posts.values().collect();
        rows.sort_by_key(|row| Reverse((row.created_at, row.id)));

        let (offset, limit) = match page {
            PostPage::All => (0, usize::MAX),
            PostPage::Slice { offset, limit } => (
                usize::try_from(offset).unwrap_or(usize::MAX),
                usize::try_from(limit).unwrap_or(usize::MAX),
            ),
        };

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|row| tables.resolve(row))
            .collect())
    }

    async fn count_posts(&self) -> Result<u64> {
        Ok(self.tables().posts.len() as u64)
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let tables = self.tables();

        let Some(user) = tables.users.get(&user_id) else {
            return Ok(Vec::new());
        };

        Ok(user
            .posts
            .iter()
            .filter_map(|post_id| tables.posts.get(post_id))
            .filter_map(|row| tables.resolve(row))
            .collect())
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables();

        if !tables.users.contains_key(&post.creator) {
            return Err(DbError::UnknownUser(post.creator));
        }

        let row = PostRow {
            id: self.ids.generate_at(now)?.into(),
            creator: post.creator,
            title: post.title.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            created_at: now,
            updated_at: now,
        };

        let created = tables
            .resolve(&row)
            .ok_or(DbError::UnknownUser(post.creator))?;
        let post_id = row.id;
        insert_new(&mut tables.posts, post_id, row)?;
        if let Some(creator) = tables.users.get_mut(&post.creator) {
            creator.posts.push(post_id);
        }

        Ok(created)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables();

        let Some(row) = tables.posts.remove(&post_id) else {
            return Ok(false);
        };
        if let Some(creator) = tables.users.get_mut(&row.creator) {
            creator.posts.retain(|id| *id != post_id);
        }

        Ok(true)
    }
}
