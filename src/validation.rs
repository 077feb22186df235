//! Field-level form validation shared by the profile and contact forms.

use serde::Serialize;

/// One rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Collects field errors in the order the checks run.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Character count (not bytes) must be within `min..=max`.
    pub fn length(&mut self, field: &'static str, value: &str, min: usize, max: usize) {
        let n = value.chars().count();
        if n < min {
            if min == 1 {
                self.reject(field, format!("{} is required", label(field)));
            } else {
                self.reject(
                    field,
                    format!("{} must be at least {} characters", label(field), min),
                );
            }
        } else if n > max {
            self.reject(
                field,
                format!("{} must be at most {} characters", label(field), max),
            );
        }
    }

    pub fn check(&mut self, field: &'static str, ok: bool, message: &str) {
        if !ok {
            self.reject(field, message);
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// `full_name` -> `Full name`
fn label(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render errors as `field: message; field: message`.
pub fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_messages() {
        let mut v = Validator::new();
        v.length("full_name", "", 1, 100);
        v.length("username", "ab", 3, 50);
        v.length("team_name", &"x".repeat(101), 0, 100);
        v.length("subject", "ok", 1, 200);
        let errors = v.finish().unwrap_err();

        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].message, "Full name is required");
        assert_eq!(errors[1].message, "Username must be at least 3 characters");
        assert_eq!(errors[2].message, "Team name must be at most 100 characters");
    }

    #[test]
    fn test_length_counts_chars() {
        let mut v = Validator::new();
        v.length("username", "äöü", 3, 3);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_describe() {
        let errors = vec![FieldError {
            field: "email",
            message: "Invalid email address".to_string(),
        }];
        assert_eq!(describe(&errors), "email: Invalid email address");
    }
}
