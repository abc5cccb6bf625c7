//! Route-level role requirements.
//!
//! Each policy is a marker type carrying a constant [`RoleSet`]. Handlers
//! take [`RequireRole<P>`] instead of [`AuthUser`] to demand that the
//! caller's role is in `P::ALLOWED`.

use std::{fmt, marker::PhantomData};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::extractors::AuthUser;
use crate::{error::AppError, state::AppState, users::repo_types::Role};

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet(0);

    const fn bit(role: Role) -> u8 {
        match role {
            Role::Superadmin => 1,
            Role::Admin => 1 << 1,
            Role::User => 1 << 2,
        }
    }

    pub const fn with(self, role: Role) -> RoleSet {
        RoleSet(self.0 | Self::bit(role))
    }

    pub const fn of(role: Role) -> RoleSet {
        Self::EMPTY.with(role)
    }

    pub const fn intersects(self, other: RoleSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, role: Role) -> bool {
        self.intersects(RoleSet::of(role))
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(Role::ALL.into_iter().filter(|r| self.contains(*r)))
            .finish()
    }
}

pub trait RolePolicy: Send + Sync + 'static {
    const ALLOWED: RoleSet;
}

/// ADMIN or SUPERADMIN.
pub struct Admins;

impl RolePolicy for Admins {
    const ALLOWED: RoleSet = RoleSet::of(Role::Admin).with(Role::Superadmin);
}

/// SUPERADMIN only.
pub struct Superadmins;

impl RolePolicy for Superadmins {
    const ALLOWED: RoleSet = RoleSet::of(Role::Superadmin);
}

pub fn authorize(user: &AuthUser, required: RoleSet) -> Result<(), AppError> {
    let held = RoleSet::of(user.role);
    if held.intersects(required) {
        return Ok(());
    }
    warn!(
        user_id = %user.id,
        held = ?held,
        required = ?required,
        "insufficient role"
    );
    Err(AppError::forbidden("Forbidden resource"))
}

/// An [`AuthUser`] whose role satisfies `P`.
pub struct RequireRole<P: RolePolicy>(pub AuthUser, pub PhantomData<fn() -> P>);

#[async_trait]
impl<P: RolePolicy> FromRequestParts<AppState> for RequireRole<P> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        authorize(&user, P::ALLOWED)?;
        Ok(RequireRole(user, PhantomData))
    }
}
