use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{ListQuery, NewUser, User, UserPatch};
use crate::{
    error::AppError,
    response::{Page, PageMeta},
};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// An active user already owns this email. Raised by the store's
    /// unique index, which is the real guarantee under concurrent writes.
    #[error("User with email {0} already exists")]
    DuplicateEmail(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::DuplicateEmail(email) => {
                AppError::Conflict(format!("User with email {email} already exists"))
            }
            RepoError::Other(e) => AppError::Internal(e),
        }
    }
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, RepoError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    /// Case-insensitive; the returned record carries the password hash.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    /// Returns `None` when no active user has this id.
    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, RepoError>;
    /// Soft delete. Returns `false` when no active user has this id.
    async fn remove(&self, id: Uuid) -> Result<bool, RepoError>;
    async fn find_all(&self, query: &ListQuery) -> Result<Page<User>, RepoError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, gender, age, bio, photo, \
                            created_at, updated_at, deleted_at";

/// Wraps `needle` as an ILIKE substring pattern with wildcards escaped.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn map_write_err(e: sqlx::Error, email: &str, what: &'static str) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepoError::DuplicateEmail(email.to_string());
        }
    }
    RepoError::Other(anyhow::Error::new(e).context(what))
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.role)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_write_err(e, &new.email, "insert user"))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE lower(email) = lower($1) AND deleted_at IS NULL
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, RepoError> {
        let email = patch.email.clone().unwrap_or_default();
        let (photo_set, photo) = match patch.photo {
            Some(p) => (true, p),
            None => (false, None),
        };
        let sql = format!(
            r#"
            UPDATE users SET
                name          = COALESCE($2, name),
                email         = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role          = COALESCE($5, role),
                gender        = COALESCE($6, gender),
                age           = COALESCE($7, age),
                bio           = COALESCE($8, bio),
                photo         = CASE WHEN $9 THEN $10 ELSE photo END,
                updated_at    = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(patch.email)
            .bind(patch.password_hash)
            .bind(patch.role)
            .bind(patch.gender)
            .bind(patch.age)
            .bind(patch.bio)
            .bind(photo_set)
            .bind(photo)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_write_err(e, &email, "update user"))
    }

    async fn remove(&self, id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query(
            r#"
            UPDATE users SET deleted_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .context("soft delete user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_all(&self, query: &ListQuery) -> Result<Page<User>, RepoError> {
        let pattern = query.search.as_deref().map(like_pattern);
        const FILTER: &str = "deleted_at IS NULL \
                              AND ($1::text IS NULL OR email ILIKE $1 OR name ILIKE $1)";

        let Some(req) = query.pagination else {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE {FILTER} ORDER BY created_at DESC"
            );
            let entities = sqlx::query_as::<_, User>(&sql)
                .bind(pattern.as_deref())
                .fetch_all(&self.db)
                .await
                .context("list users")?;
            return Ok(Page {
                entities,
                meta: None,
            });
        };

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {FILTER} \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let entities = sqlx::query_as::<_, User>(&sql)
            .bind(pattern.as_deref())
            .bind(i64::from(req.limit))
            .bind(req.offset() as i64)
            .fetch_all(&self.db)
            .await
            .context("list users page")?;

        let count_sql = format!("SELECT COUNT(*) FROM users WHERE {FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(pattern.as_deref())
            .fetch_one(&self.db)
            .await
            .context("count users")?;

        Ok(Page {
            entities,
            meta: Some(PageMeta::new(req.page, req.limit, total.max(0) as u64)),
        })
    }
}
