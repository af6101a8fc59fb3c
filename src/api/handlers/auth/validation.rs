//! Credential validation.
//!
//! Two stages: a structural pass that only checks the fields are present as
//! strings, then a semantic pass that applies the credential schema. The email
//! is trimmed, NFKC-normalized and lowercased; the password is never touched.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_SYMBOLS: &str = r#"!@#$%^&*()_+-=[]{};':"\|,.<>/?`~"#;

/// Untrusted body fields as they arrived, before any type checks.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawInput {
    pub email: Option<Value>,
    pub password: Option<Value>,
    pub confirm_password: Option<Value>,
}

/// Fields that passed the structural check.
#[derive(Debug)]
pub struct CredentialFields {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: Option<SecretString>,
}

/// Validated credentials. Never persisted, never logged.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
    Registration,
    Login,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("Email and password must be strings")]
    FieldsMustBeStrings,
    #[error("Email must be a string")]
    EmailMustBeString,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

/// Trim and Unicode-normalize an email without case folding.
#[must_use]
pub fn sanitize_email(email: &str) -> String {
    email.trim().nfkc().collect()
}

/// Structural stage: both fields must be present as strings.
///
/// # Errors
/// Returns [`StructureError::FieldsMustBeStrings`] if either is missing or not a string.
pub fn validate_structure(raw: RawInput) -> Result<CredentialFields, StructureError> {
    let (Some(Value::String(email)), Some(Value::String(password))) = (raw.email, raw.password)
    else {
        return Err(StructureError::FieldsMustBeStrings);
    };
    let confirm_password = match raw.confirm_password {
        Some(Value::String(value)) => Some(SecretString::from(value)),
        Some(Value::Null) | None => None,
        Some(_) => return Err(StructureError::FieldsMustBeStrings),
    };

    Ok(CredentialFields {
        email: sanitize_email(&email),
        password: SecretString::from(password),
        confirm_password,
    })
}

/// Structural stage for flows that only carry an email.
///
/// # Errors
/// Returns [`StructureError::EmailMustBeString`] if the email is missing or not a string.
pub fn validate_email_structure(raw: RawInput) -> Result<String, StructureError> {
    match raw.email {
        Some(Value::String(email)) => Ok(sanitize_email(&email)),
        _ => Err(StructureError::EmailMustBeString),
    }
}

/// Semantic stage: apply the credential schema. The first violated rule wins.
///
/// # Errors
/// Returns a [`ValidationError`] naming the offending field and rule.
pub fn validate_semantics(
    kind: CredentialKind,
    fields: CredentialFields,
) -> Result<Credentials, ValidationError> {
    let email = validate_email(&fields.email)?;
    validate_password(fields.password.expose_secret())?;

    if kind == CredentialKind::Registration {
        if let Some(confirm) = &fields.confirm_password {
            if confirm.expose_secret() != fields.password.expose_secret() {
                return Err(ValidationError::new(
                    "confirmPassword",
                    "Passwords do not match",
                ));
            }
        }
    }

    Ok(Credentials {
        email,
        password: fields.password,
    })
}

/// Check an already-sanitized email and return its lowercase form.
///
/// # Errors
/// Returns a [`ValidationError`] against the `email` field.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::new("email", "Email is required"));
    }
    if email.chars().count() > EMAIL_MAX_LENGTH {
        return Err(ValidationError::new(
            "email",
            "Email must be at most 254 characters",
        ));
    }
    let email = email.to_lowercase();
    if !valid_email(&email) {
        return Err(ValidationError::new("email", "Invalid email address"));
    }
    Ok(email)
}

fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(ValidationError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(ValidationError::new(
            "password",
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(ValidationError::new(
            "password",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(
            "password",
            "Password must contain at least one number",
        ));
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(ValidationError::new(
            "password",
            "Password must contain at least one special character",
        ));
    }
    Ok(())
}
