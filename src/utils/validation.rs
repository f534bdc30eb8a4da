// Validation utilities for request fields

/// Trim and validate string fields.
/// Required fields must be non-empty after trimming.
pub fn trim_and_validate_field(field: &str, required: bool) -> Result<String, String> {
    let trimmed = field.trim().to_string();
    if trimmed.is_empty() && required {
        Err("Field cannot be empty".to_string())
    } else {
        Ok(trimmed)
    }
}

/// `None` if the field is absent or blank after trimming
pub fn trim_optional_field(field: Option<&String>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Clamp an optional numeric query parameter into `[min, max]`
pub fn clamp_param(value: Option<i64>, default: i64, min: i64, max: i64) -> i64 {
    value.unwrap_or(default).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_validate_field() {
        assert_eq!(trim_and_validate_field("  hi ", true), Ok("hi".to_string()));
        assert!(trim_and_validate_field("   ", true).is_err());
        assert_eq!(trim_and_validate_field("   ", false), Ok(String::new()));
    }

    #[test]
    fn test_trim_optional_field() {
        assert_eq!(trim_optional_field(Some(&" x ".to_string())), Some("x".to_string()));
        assert_eq!(trim_optional_field(Some(&"  ".to_string())), None);
        assert_eq!(trim_optional_field(None), None);
    }

    #[test]
    fn test_clamp_param() {
        assert_eq!(clamp_param(None, 30, 1, 90), 30);
        assert_eq!(clamp_param(Some(0), 30, 1, 90), 1);
        assert_eq!(clamp_param(Some(500), 30, 1, 90), 90);
        assert_eq!(clamp_param(Some(7), 30, 1, 90), 7);
    }
}
