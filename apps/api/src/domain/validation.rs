// Small helpers shared by entity constructors

use super::errors::{DomainError, DomainResult};

/// Trims `value` and rejects it when empty or longer than `max_len` characters
pub fn required_text(field: &str, value: &str, max_len: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(DomainError::validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

/// Like [`required_text`] but maps blank input to `None`
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => required_text(field, text, max_len).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims() {
        assert_eq!(required_text("Name", "  Áo thun ", 50).unwrap(), "Áo thun");
    }

    #[test]
    fn required_text_rejects_blank() {
        let err = required_text("Name", "   ", 50).unwrap_err();
        assert_eq!(err.to_string(), "Name is required");
    }

    #[test]
    fn required_text_counts_characters_not_bytes() {
        // 4 characters but 7 bytes
        assert!(required_text("Name", "Điện", 5).is_ok());
        assert!(required_text("Name", "Điện thoại", 5).is_err());
    }

    #[test]
    fn optional_text_maps_blank_to_none() {
        assert_eq!(optional_text("Note", Some("  "), 10).unwrap(), None);
        assert_eq!(optional_text("Note", None, 10).unwrap(), None);
        assert_eq!(
            optional_text("Note", Some(" hi "), 10).unwrap(),
            Some("hi".to_string())
        );
    }
}
