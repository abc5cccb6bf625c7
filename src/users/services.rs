use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{normalize_email, CreateUser, UpdateUser, UserFilter},
    repo::UserRepo,
    repo_types::{ListQuery, NewUser, Role, User, UserPatch, UserView},
};
use crate::{
    auth::password::PasswordHasher,
    cache::Cache,
    error::{AppError, AppResult},
    response::Page,
};

const NAMESPACE: &str = "user:";
const LIST_PREFIX: &str = "user:list:";

fn id_key(id: Uuid) -> String {
    format!("user:id:{id}")
}

fn email_key(email: &str) -> String {
    format!("user:email:{email}")
}

fn list_key(query: &ListQuery) -> String {
    // ListQuery serializes with a fixed field order
    let fingerprint = serde_json::to_string(query).unwrap_or_default();
    format!("{LIST_PREFIX}{fingerprint}")
}

fn not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("User with id {id} not found"))
}

/// Business rules over the user store, fronted by the cache.
pub struct UserService {
    repo: Arc<dyn UserRepo>,
    cache: Cache,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepo>, cache: Cache, hasher: PasswordHasher) -> Self {
        Self {
            repo,
            cache,
            hasher,
        }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub async fn create(&self, input: CreateUser) -> AppResult<UserView> {
        input.validate()?;
        if input.role == Role::Superadmin {
            warn!(email = %input.email, "attempt to create superadmin");
            return Err(AppError::bad_request(format!(
                "Can't create user with role {}",
                Role::Superadmin
            )));
        }

        let email = normalize_email(&input.email);
        if self.find_one_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(AppError::conflict(format!(
                "User with email {email} already exists"
            )));
        }

        let password_hash = self.hasher.hash(&input.password).await?;
        let user = self
            .repo
            .create(NewUser {
                name: input.name.trim().to_string(),
                email,
                password_hash,
                role: input.role,
            })
            .await?;

        self.invalidate_user(&user).await;
        info!(user_id = %user.id, email = %user.email, role = %user.role, "user created");
        Ok(user.into())
    }

    pub async fn find_one(&self, id: Uuid) -> AppResult<UserView> {
        let key = id_key(id);
        if let Some(hit) = self.cache.get::<UserView>(&key).await {
            return Ok(hit);
        }
        let user = self.repo.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        let view = UserView::from(user);
        self.cache.set(&key, &view).await;
        Ok(view)
    }

    pub async fn find_one_by_email(&self, email: &str) -> AppResult<Option<UserView>> {
        let email = normalize_email(email);
        let key = email_key(&email);
        if let Some(hit) = self.cache.get::<UserView>(&key).await {
            return Ok(Some(hit));
        }
        let Some(user) = self.repo.find_by_email(&email).await? else {
            return Ok(None);
        };
        let view = UserView::from(user);
        self.cache.set(&key, &view).await;
        Ok(Some(view))
    }

    /// Uncached lookup that keeps the password hash, for credential checks.
    pub async fn find_credentials(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.repo.find_by_email(&normalize_email(email)).await?)
    }

    pub async fn find_all(&self, filter: &UserFilter) -> AppResult<Page<UserView>> {
        let query = filter.normalize()?;
        let key = list_key(&query);
        if let Some(hit) = self.cache.get::<Page<UserView>>(&key).await {
            return Ok(hit);
        }
        let page = self.repo.find_all(&query).await?.map(UserView::from);
        self.cache.set(&key, &page).await;
        Ok(page)
    }

    pub async fn update(&self, id: Uuid, input: UpdateUser) -> AppResult<UserView> {
        input.validate()?;
        let current = self.repo.find_by_id(id).await?.ok_or_else(|| not_found(id))?;

        if input.role == Some(Role::Superadmin) && current.role != Role::Superadmin {
            warn!(user_id = %id, "attempt to promote user to superadmin");
            return Err(AppError::bad_request(format!(
                "Can't assign role {}",
                Role::Superadmin
            )));
        }

        let email = input.email.as_deref().map(normalize_email);
        if let Some(new_email) = &email {
            if let Some(owner) = self.repo.find_by_email(new_email).await? {
                if owner.id != id {
                    return Err(AppError::conflict(format!(
                        "User with email {new_email} already exists"
                    )));
                }
            }
        }

        let password_hash = match &input.password {
            Some(password) => {
                let old = input
                    .old_password
                    .as_deref()
                    .ok_or_else(|| AppError::bad_request("Old password is required"))?;
                if !self.hasher.verify(old, &current.password_hash).await? {
                    warn!(user_id = %id, "old password mismatch on update");
                    return Err(AppError::bad_request("Passwords do not match"));
                }
                Some(self.hasher.hash(password).await?)
            }
            None => None,
        };

        let patch = UserPatch {
            name: input.name.map(|n| n.trim().to_string()),
            email,
            password_hash,
            role: input.role,
            gender: input.gender,
            age: input.age,
            bio: input.bio,
            photo: None,
        };
        let updated = self.repo.update(id, patch).await?.ok_or_else(|| not_found(id))?;

        self.invalidate_all().await;
        info!(user_id = %id, "user updated");
        Ok(updated.into())
    }

    /// Sets the stored photo path; `None` clears it.
    pub async fn update_photo(&self, id: Uuid, photo: Option<String>) -> AppResult<UserView> {
        let patch = UserPatch {
            photo: Some(photo.filter(|p| !p.trim().is_empty())),
            ..Default::default()
        };
        let updated = self.repo.update(id, patch).await?.ok_or_else(|| not_found(id))?;
        self.invalidate_all().await;
        info!(user_id = %id, "user photo updated");
        Ok(updated.into())
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        if self.repo.find_by_id(id).await?.is_none() {
            return Err(not_found(id));
        }
        if !self.repo.remove(id).await? {
            return Err(not_found(id));
        }
        self.invalidate_all().await;
        info!(user_id = %id, "user soft-deleted");
        Ok(())
    }

    async fn invalidate_user(&self, user: &User) {
        self.cache.delete(&id_key(user.id)).await;
        self.cache.delete(&email_key(&user.email)).await;
        self.cache.delete_prefix(LIST_PREFIX).await;
    }

    /// Blanket clear of the user namespace, list pages included.
    async fn invalidate_all(&self) {
        self.cache.delete_prefix(NAMESPACE).await;
    }
}
