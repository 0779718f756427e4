use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Failure talking to the hosted data service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("insert into {0} returned no rows")]
    Empty(&'static str),
}

/// Failure from the auth service. The `Rejected` message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),
    #[error("could not reach the auth service: {0}")]
    Network(String),
}

/// Per-field validation messages for a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(value)` when no field failed.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessengerError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid input: {0}")]
    Invalid(#[from] FormErrors),
    #[error("no forum is selected")]
    NoForumSelected,
    #[error("reply target {0} is not in the current thread")]
    UnknownParent(String),
    #[error("view state is no longer available")]
    Detached,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_errors_keep_first_message_per_field() {
        let mut errors = FormErrors::new();
        errors.add("title", "Title is required");
        errors.add("title", "Title is too long");
        errors.add("category", "Category is required");

        assert_eq!(errors.get("title"), Some("Title is required"));
        assert_eq!(
            errors.to_string(),
            "category: Category is required; title: Title is required"
        );
        assert!(errors.into_result(()).is_err());
    }
}
