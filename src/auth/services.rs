use std::sync::Arc;

use tracing::{info, warn};

use super::{
    dto::{LoginRequest, LoginResponse, MeView, RegisterRequest},
    extractors::AuthUser,
    jwt::{TokenPayload, TokenService},
};
use crate::{
    error::{AppError, AppResult},
    users::{
        dto::CreateUser,
        repo_types::{Role, UserView},
        services::UserService,
    },
};

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Login and registration on top of the user service.
pub struct AuthService {
    users: Arc<UserService>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(users: Arc<UserService>, tokens: Arc<TokenService>) -> Self {
        Self { users, tokens }
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<UserView> {
        if let Some(confirm) = &req.confirm_password {
            if *confirm != req.password {
                return Err(AppError::bad_request("Passwords do not match"));
            }
        }
        if req.role == Some(Role::Superadmin) {
            warn!(email = %req.email, "registration asked for superadmin");
            return Err(AppError::bad_request(format!(
                "Can't register with role {}",
                Role::Superadmin
            )));
        }

        let user = self
            .users
            .create(CreateUser {
                name: req.name,
                email: req.email,
                password: req.password,
                role: Role::User,
            })
            .await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let Some(user) = self.users.find_credentials(&req.email).await? else {
            warn!(email = %req.email, "login unknown email");
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        };

        if !self
            .users
            .hasher()
            .verify(&req.password, &user.password_hash)
            .await?
        {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        }

        let view = UserView::from(user);
        let payload = TokenPayload {
            sub: view.id,
            email: view.email.clone(),
            role: view.role,
        };
        let ttl = self.tokens.ttl(req.remember_me);
        let access_token = self.tokens.issue(&payload, ttl.duration)?;

        info!(user_id = %view.id, remember_me = req.remember_me, "user logged in");
        Ok(LoginResponse {
            user: view,
            access_token,
            expires_in: ttl.label.clone(),
        })
    }

    pub fn me(&self, user: &AuthUser) -> MeView {
        MeView {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}
