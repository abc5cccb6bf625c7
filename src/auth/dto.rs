use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::{Role, UserView};

/// Request body for login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Request body for self-registration. `role` is accepted only to be
/// rejected when it asks for SUPERADMIN; registered users are always USER.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    pub expires_in: String,
}

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_me_defaults_to_false() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"p"}"#).unwrap();
        assert!(!req.remember_me);
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","password":"p","rememberMe":true}"#)
                .unwrap();
        assert!(req.remember_me);
    }

    #[test]
    fn register_accepts_optional_fields() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"name":"A","email":"a@x.com","password":"p","confirmPassword":"p","role":"SUPERADMIN"}"#,
        )
        .unwrap();
        assert_eq!(req.confirm_password.as_deref(), Some("p"));
        assert_eq!(req.role, Some(Role::Superadmin));
    }
}
