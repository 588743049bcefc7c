// Common validation types and traits

#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Validator<T> {
    fn validate(&self, data: &T) -> ValidationResult;
}

/// Checks a required text field: non-blank and at most `max_len` characters
pub fn validate_required_text(
    result: &mut ValidationResult,
    field: &str,
    value: &str,
    max_len: usize,
) {
    if value.trim().is_empty() {
        result.add_error(field, "must not be empty");
    } else if value.chars().count() > max_len {
        result.add_error(field, &format!("must be at most {} characters", max_len));
    }
}
