use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(email),
            created_at: crate::core::time::now_rfc3339(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_plausible_email, User};

    #[test]
    fn normalizes_email_on_create() {
        let user = User::new("  Ada@Example.COM ");
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn checks_email_shape() {
        assert!(is_plausible_email("a@b.io"));
        assert!(!is_plausible_email("no-at-sign"));
        assert!(!is_plausible_email("@b.io"));
        assert!(!is_plausible_email("a@localhost"));
    }
}
