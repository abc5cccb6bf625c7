use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::repo_types::{Gender, ListQuery, PageRequest, Role};
use crate::error::AppError;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 8–24 characters with an upper, a lower, a digit and a special character.
pub(crate) fn check_password_policy(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(8..=24).contains(&len) {
        return Err(AppError::bad_request(
            "Password must be between 8 and 24 characters",
        ));
    }
    let upper = password.chars().any(|c| c.is_uppercase());
    let lower = password.chars().any(|c| c.is_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let special = password.chars().any(|c| !c.is_alphanumeric());
    if !(upper && lower && digit && special) {
        return Err(AppError::bad_request(
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        ));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::bad_request("Invalid email"))
    }
}

fn check_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        Err(AppError::bad_request("Name must not be empty"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), AppError> {
        check_name(&self.name)?;
        check_email(&normalize_email(&self.email))?;
        check_password_policy(&self.password)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub old_password: Option<String>,
    pub role: Option<Role>,
    pub gender: Option<Gender>,
    pub age: Option<i32>,
    pub bio: Option<String>,
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(email) = &self.email {
            check_email(&normalize_email(email))?;
        }
        if let Some(password) = &self.password {
            check_password_policy(password)?;
        }
        if let Some(age) = self.age {
            if age < 0 {
                return Err(AppError::bad_request("Age must not be negative"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePhoto {
    pub photo: Option<String>,
}

/// Query string of `GET /user`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub search: Option<String>,
    #[serde(default)]
    pub is_pagination: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl UserFilter {
    /// Applies defaults and bounds. Equal filters yield equal queries, so
    /// the result doubles as the list cache fingerprint.
    pub fn normalize(&self) -> Result<ListQuery, AppError> {
        let search = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let pagination = if self.is_pagination {
            let page = self.page.unwrap_or(DEFAULT_PAGE);
            let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
            if page < 1 {
                return Err(AppError::bad_request("page must be at least 1"));
            }
            if !(1..=MAX_LIMIT).contains(&limit) {
                return Err(AppError::bad_request(format!(
                    "limit must be between 1 and {MAX_LIMIT}"
                )));
            }
            Some(PageRequest { page, limit })
        } else {
            None
        };

        Ok(ListQuery { search, pagination })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn password_policy() {
        assert!(check_password_policy("Passw0rd!").is_ok());
        assert!(check_password_policy("password1!").is_err());
        assert!(check_password_policy("PASSWORD1!").is_err());
        assert!(check_password_policy("Password!!").is_err());
        assert!(check_password_policy("Password12").is_err());
        assert!(check_password_policy("Pa0!").is_err());
        assert!(check_password_policy("Passw0rd!Passw0rd!Passw0rd!").is_err());
    }

    #[test]
    fn filter_defaults() {
        let q = UserFilter {
            is_pagination: true,
            ..Default::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(q.pagination, Some(PageRequest { page: 1, limit: 10 }));
        assert_eq!(q.search, None);

        let unpaged = UserFilter {
            page: Some(4),
            limit: Some(50),
            ..Default::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(unpaged.pagination, None);
    }

    #[test]
    fn filter_bounds() {
        let bad_limit = UserFilter {
            is_pagination: true,
            limit: Some(101),
            ..Default::default()
        };
        assert!(matches!(bad_limit.normalize(), Err(AppError::BadRequest(_))));

        let bad_page = UserFilter {
            is_pagination: true,
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(bad_page.normalize(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn equivalent_filters_share_a_fingerprint() {
        let a = UserFilter {
            search: Some(" Ada ".into()),
            is_pagination: true,
            page: None,
            limit: Some(10),
        };
        let b = UserFilter {
            search: Some("ada".into()),
            is_pagination: true,
            page: Some(1),
            limit: None,
        };
        let ka = serde_json::to_string(&a.normalize().unwrap()).unwrap();
        let kb = serde_json::to_string(&b.normalize().unwrap()).unwrap();
        assert_eq!(ka, kb);
    }

    #[test]
    fn query_string_decodes_camel_case() {
        let f: UserFilter =
            serde_json::from_str(r#"{"isPagination":true,"page":3,"limit":10,"search":"x"}"#)
                .unwrap();
        assert!(f.is_pagination);
        assert_eq!(f.page, Some(3));
    }
}
