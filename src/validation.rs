use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field names in their on-the-wire form, in display order.
pub const FIELD_NAMES: [&str; 4] = ["name", "email", "password", "confirmPassword"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupFields {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

impl SignupFields {
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "email" => Some(&self.email),
            "password" => Some(&self.password),
            "confirmPassword" => Some(&self.confirm_password),
            _ => None,
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        match field {
            "name" => self.name = value,
            "email" => self.email = value,
            "password" => self.password = value,
            "confirmPassword" => self.confirm_password = value,
            _ => {}
        }
    }

    /// Number of fields with non-whitespace content.
    pub fn filled_count(&self) -> usize {
        FIELD_NAMES
            .iter()
            .filter(|f| self.get(f).is_some_and(|v| !v.trim().is_empty()))
            .count()
    }
}

/// Field name -> single human-readable error. Absent key means valid;
/// empty map means the whole form is valid. BTreeMap keeps iteration
/// (and therefore reported field lists) sorted.
pub type ValidationErrors = BTreeMap<String, String>;

pub fn validate_signup(fields: &SignupFields) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if fields.name.trim().is_empty() {
        errors.insert("name".into(), "Name is required.".into());
    } else if fields.name.trim().chars().count() < 2 {
        errors.insert("name".into(), "Name must be at least 2 characters.".into());
    }

    if fields.email.trim().is_empty() {
        errors.insert("email".into(), "Email is required.".into());
    } else if !is_valid_email(&fields.email) {
        errors.insert(
            "email".into(),
            "Please enter a valid email address.".into(),
        );
    }

    if fields.password.is_empty() {
        errors.insert("password".into(), "Password is required.".into());
    } else if fields.password.chars().count() < 8 {
        errors.insert(
            "password".into(),
            "Password must be at least 8 characters.".into(),
        );
    }

    if fields.confirm_password.is_empty() {
        errors.insert(
            "confirmPassword".into(),
            "Please confirm your password.".into(),
        );
    } else if fields.password != fields.confirm_password {
        errors.insert("confirmPassword".into(), "Passwords do not match.".into());
    }

    errors
}

pub fn has_errors(errors: &ValidationErrors) -> bool {
    !errors.is_empty()
}

/// local@domain.tld: no whitespace, exactly one `@` with a non-empty local
/// part, and a `.` inside the domain with characters on both sides.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i < domain.len() - 1)
}
