use crate::common::{validate_required_text, ValidationResult, Validator};

use super::models::CreateComment;

pub const MAX_CONTENT_CHARS: usize = 5000;
pub const MAX_TARGET_CHARS: usize = 2048;
pub const MAX_HOSTNAME_CHARS: usize = 255;

pub struct CommentValidator;

impl Validator<CreateComment> for CommentValidator {
    fn validate(&self, data: &CreateComment) -> ValidationResult {
        let mut result = ValidationResult::new();

        validate_required_text(&mut result, "content", &data.content, MAX_CONTENT_CHARS);
        validate_required_text(&mut result, "target", &data.target, MAX_TARGET_CHARS);

        if data.hostname.chars().count() > MAX_HOSTNAME_CHARS {
            result.add_error(
                "hostname",
                &format!("must be at most {} characters", MAX_HOSTNAME_CHARS),
            );
        }

        result
    }
}
