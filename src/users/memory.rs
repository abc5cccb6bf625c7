//! In-process `UserRepo` used by tests. Mirrors the store's rules: soft
//! deletes, newest-first ordering, and a unique email among active rows.

use std::sync::Mutex;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{
    repo::{RepoError, UserRepo},
    repo_types::{ListQuery, NewUser, User, UserPatch},
};
use crate::response::{Page, PageMeta};

#[derive(Default)]
pub struct MemoryUserRepo {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw row access, soft-deleted rows included.
    pub fn all_rows(&self) -> Vec<User> {
        self.rows.lock().unwrap().clone()
    }
}

fn email_taken(rows: &[User], email: &str, except: Option<Uuid>) -> bool {
    rows.iter().any(|u| {
        u.deleted_at.is_none() && Some(u.id) != except && u.email.eq_ignore_ascii_case(email)
    })
}

fn matches(u: &User, search: Option<&str>) -> bool {
    match search {
        None => true,
        Some(s) => {
            let s = s.to_lowercase();
            u.email.to_lowercase().contains(&s) || u.name.to_lowercase().contains(&s)
        }
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let mut rows = self.rows.lock().unwrap();
        if email_taken(&rows, &new.email, None) {
            return Err(RepoError::DuplicateEmail(new.email));
        }
        // strictly increasing timestamps keep ordering deterministic
        let now = rows
            .last()
            .map(|u| u.created_at + Duration::milliseconds(1))
            .unwrap_or_else(OffsetDateTime::now_utc)
            .max(OffsetDateTime::now_utc());
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            gender: None,
            age: None,
            bio: None,
            photo: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|u| u.deleted_at.is_none() && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, RepoError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(email) = &patch.email {
            if email_taken(&rows, email, Some(id)) {
                return Err(RepoError::DuplicateEmail(email.clone()));
            }
        }
        let Some(user) = rows
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        else {
            return Ok(None);
        };
        if let Some(v) = patch.name {
            user.name = v;
        }
        if let Some(v) = patch.email {
            user.email = v;
        }
        if let Some(v) = patch.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        if let Some(v) = patch.gender {
            user.gender = Some(v);
        }
        if let Some(v) = patch.age {
            user.age = Some(v);
        }
        if let Some(v) = patch.bio {
            user.bio = Some(v);
        }
        if let Some(v) = patch.photo {
            user.photo = v;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn remove(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
        {
            Some(user) => {
                user.deleted_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_all(&self, query: &ListQuery) -> Result<Page<User>, RepoError> {
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<User> = rows
            .iter()
            .filter(|u| u.deleted_at.is_none() && matches(u, query.search.as_deref()))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let Some(req) = query.pagination else {
            return Ok(Page {
                entities: hits,
                meta: None,
            });
        };
        let total = hits.len() as u64;
        let entities = hits
            .into_iter()
            .skip(req.offset() as usize)
            .take(req.limit as usize)
            .collect();
        Ok(Page {
            entities,
            meta: Some(PageMeta::new(req.page, req.limit, total)),
        })
    }
}
