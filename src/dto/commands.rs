use validator::Validate;

/// Longest label the platform accepts for a poll answer.
pub const MAX_LABEL_CHARS: u64 = 55;

/// Option label submitted through the add command.
#[derive(Debug, Clone, Validate)]
pub struct OptionLabelInput {
    #[validate(length(
        min = 1,
        max = MAX_LABEL_CHARS,
        message = "an option must be between 1 and 55 characters long"
    ))]
    pub label: String,
}

impl OptionLabelInput {
    /// Wrap a raw label, trimming surrounding whitespace.
    pub fn new(raw: &str) -> Self {
        Self {
            label: raw.trim().to_owned(),
        }
    }
}
