//! Input checks applied by the HTTP layer before any workflow runs.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::{
    auth::dto::{
        ChangePasswordRequest, EmailRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    },
    error::AuthError,
};

pub const PASSWORD_MIN_CHARS: usize = 6;
pub const PASSWORD_MAX_CHARS: usize = 50;

const TEXT_MAX_CHARS: usize = 255;
const USERNAME_MAX_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Turns a violation list into the validation error, if any.
pub fn ensure_valid(violations: Vec<Violation>) -> Result<(), AuthError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(violations))
    }
}

fn check_email(field: &'static str, email: &str, out: &mut Vec<Violation>) {
    if email.chars().count() > TEXT_MAX_CHARS {
        out.push(Violation::new(field, "must be at most 255 characters"));
    } else if !is_valid_email(email) {
        out.push(Violation::new(field, "must be a valid email address"));
    }
}

fn check_length(field: &'static str, value: &str, max: usize, out: &mut Vec<Violation>) {
    let len = value.trim().chars().count();
    if len == 0 {
        out.push(Violation::new(field, "must not be empty"));
    } else if value.chars().count() > max {
        out.push(Violation::new(field, format!("must be at most {max} characters")));
    }
}

/// 6..=50 characters with an uppercase letter, a lowercase letter and a digit or symbol.
pub fn check_password(field: &'static str, password: &str, out: &mut Vec<Violation>) {
    let len = password.chars().count();
    if len < PASSWORD_MIN_CHARS {
        out.push(Violation::new(
            field,
            format!("must be at least {PASSWORD_MIN_CHARS} characters"),
        ));
        return;
    }
    if len > PASSWORD_MAX_CHARS {
        out.push(Violation::new(
            field,
            format!("must be at most {PASSWORD_MAX_CHARS} characters"),
        ));
        return;
    }
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit_or_symbol = password
        .chars()
        .any(|c| c.is_ascii_digit() || !(c.is_alphanumeric() || c == '_'));
    if !(has_upper && has_lower && has_digit_or_symbol) {
        out.push(Violation::new(
            field,
            "must include at least one uppercase letter, one lowercase letter, and one number or symbol",
        ));
    }
}

impl RegisterRequest {
    pub fn normalized(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self.name = self.name.trim().to_string();
        self.lastname = self.lastname.trim().to_string();
        self.location = self.location.trim().to_string();
        self.username = self
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        self
    }

    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_length("name", &self.name, TEXT_MAX_CHARS, &mut out);
        check_length("lastname", &self.lastname, TEXT_MAX_CHARS, &mut out);
        check_email("email", &self.email, &mut out);
        if let Some(username) = &self.username {
            check_length("username", username, USERNAME_MAX_CHARS, &mut out);
        }
        check_length("location", &self.location, TEXT_MAX_CHARS, &mut out);
        check_password("password", &self.password, &mut out);
        out
    }
}

impl LoginRequest {
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_email("email", &self.email, &mut out);
        if self.password.is_empty() {
            out.push(Violation::new("password", "must not be empty"));
        }
        out
    }
}

impl EmailRequest {
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_email("email", &self.email, &mut out);
        out
    }
}

impl ChangePasswordRequest {
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        if self.current_password.is_empty() {
            out.push(Violation::new("currentPassword", "must not be empty"));
        }
        check_password("newPassword", &self.new_password, &mut out);
        out
    }
}

impl ResetPasswordRequest {
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        if self.token.trim().is_empty() {
            out.push(Violation::new("token", "must not be empty"));
        }
        check_password("password", &self.password, &mut out);
        out
    }
}
