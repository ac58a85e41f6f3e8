use crate::{
    record::{FullPostRecord, UserRecord},
    store::{DbError, IdGenerator, Result, Store},
};
use async_trait::async_trait;
use feednews_common::{
    model::{
        Id,
        post::{CreatePost, Post, PostMarker, PostPage},
        user::{CreateUser, DEFAULT_USER_STATUS, Email, User, UserCredentials, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use time::OffsetDateTime;

const USERS_EMAIL_CONSTRAINT: &str = "users_email_unique";

const POST_COLUMNS: &str = "
    posts.post_snowflake,
    posts.title,
    posts.content,
    posts.image_url,
    posts.created_at,
    posts.updated_at,
    users.user_snowflake,
    users.email AS user_email,
    users.name AS user_name,
    users.status AS user_status,
    users.created_at AS user_created_at,
    users.updated_at AS user_updated_at
";

/// [`Store`] backed by PostgreSQL.
#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    ids: IdGenerator,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            pool,
            ids: IdGenerator::new(worker_id, process_id),
        }
    }

    pub async fn connect(
        database_url: &str,
        worker_id: WorkerId,
        process_id: ProcessId,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(database_url).await?;

        Ok(Self::new(pool, worker_id, process_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;

        Ok(())
    }
}

#[async_trait]
impl Store for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.email,
                users.name,
                users.password_hash,
                users.status,
                users.created_at,
                users.updated_at
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.email,
                users.name,
                users.password_hash,
                users.status,
                users.created_at,
                users.updated_at
            FROM
                users.users
            WHERE
                users.email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(UserCredentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let now = OffsetDateTime::now_utc();
        let user_id: Id<UserMarker> = self.ids.generate_at(now)?.into();

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users
                (user_snowflake, email, name, password_hash, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING
                users.user_snowflake,
                users.email,
                users.name,
                users.password_hash,
                users.status,
                users.created_at,
                users.updated_at
            ",
        )
        .bind(user_id.to_db())
        .bind(user.email.get())
        .bind(user.name.get())
        .bind(user.password_hash.as_phc())
        .bind(DEFAULT_USER_STATUS)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            let email_taken = matches!(
                &err,
                sqlx::Error::Database(db_err) if db_err.constraint() == Some(USERS_EMAIL_CONSTRAINT)
            );
            if email_taken {
                DbError::EmailTaken
            } else {
                DbError::Sqlx(err)
            }
        })?;

        Ok(User::try_from(record)?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!(
            "
            SELECT {POST_COLUMNS}
            FROM
                posts.posts
                JOIN users.users ON users.user_snowflake = posts.user_snowflake
            WHERE
                posts.post_snowflake = $1
            "
        );

        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_posts(&self, page: PostPage) -> Result<Vec<Post>> {
        let (offset, limit) = match page {
            PostPage::All => (0, None),
            PostPage::Slice { offset, limit } => (offset, Some(limit)),
        };

        let sql = format!(
            "
            SELECT {POST_COLUMNS}
            FROM
                posts.posts
                JOIN users.users ON users.user_snowflake = posts.user_snowflake
            ORDER BY
                posts.created_at DESC,
                posts.post_snowflake DESC
            LIMIT $1
            OFFSET $2
            "
        );

        let records = query_as::<_, FullPostRecord>(&sql)
            .bind(limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX)))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn count_posts(&self) -> Result<u64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM posts.posts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let sql = format!(
            "
            SELECT {POST_COLUMNS}
            FROM
                posts.posts
                JOIN users.users ON users.user_snowflake = posts.user_snowflake
            WHERE
                posts.user_snowflake = $1
            ORDER BY
                posts.created_at,
                posts.post_snowflake
            "
        );

        let records = query_as::<_, FullPostRecord>(&sql)
            .bind(user_id.to_db())
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let now = OffsetDateTime::now_utc();
        let post_id: Id<PostMarker> = self.ids.generate_at(now)?.into();

        let record = query_as::<_, FullPostRecord>(
            "
            WITH inserted AS (
                INSERT INTO posts.posts
                    (post_snowflake, user_snowflake, title, content, image_url, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                RETURNING *
            )
            SELECT
                inserted.post_snowflake,
                inserted.title,
                inserted.content,
                inserted.image_url,
                inserted.created_at,
                inserted.updated_at,
                users.user_snowflake,
                users.email AS user_email,
                users.name AS user_name,
                users.status AS user_status,
                users.created_at AS user_created_at,
                users.updated_at AS user_updated_at
            FROM
                inserted
                JOIN users.users ON users.user_snowflake = inserted.user_snowflake
            ",
        )
        .bind(post_id.to_db())
        .bind(post.creator.to_db())
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            let unknown_creator = matches!(
                &err,
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation()
            );
            if unknown_creator {
                DbError::UnknownUser(post.creator)
            } else {
                DbError::Sqlx(err)
            }
        })?;

        Ok(Post::try_from(record)?)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query(
            "
            DELETE FROM posts.posts
            WHERE posts.post_snowflake = $1
            ",
        )
        .bind(post_id.to_db())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
