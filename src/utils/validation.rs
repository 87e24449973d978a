use crate::utils::error::{CallableError, Result};
use regex::Regex;
use std::sync::OnceLock;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn module_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("module id pattern is valid")
    })
}

/// Dotted identifier such as `math` or `pkg.util`.
pub fn validate_module_id(id: &str) -> Result<()> {
    if module_id_pattern().is_match(id) {
        Ok(())
    } else {
        Err(CallableError::InvalidConfigValueError {
            field: "module id".to_string(),
            value: id.to_string(),
            reason: "Module ids are dot-separated identifiers".to_string(),
        })
    }
}

pub fn validate_module_ids(field_name: &str, ids: &[String]) -> Result<()> {
    for id in ids {
        validate_module_id(id).map_err(|_| CallableError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: id.clone(),
            reason: "Module ids are dot-separated identifiers".to_string(),
        })?;
    }
    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CallableError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(CallableError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(CallableError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CallableError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(CallableError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Expected one of: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_module_id() {
        assert!(validate_module_id("math").is_ok());
        assert!(validate_module_id("pkg.sub_mod.leaf2").is_ok());
        assert!(validate_module_id("").is_err());
        assert!(validate_module_id("pkg..leaf").is_err());
        assert!(validate_module_id("../escape").is_err());
        assert!(validate_module_id("9lives").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_steps", 5, 1).is_ok());
        assert!(validate_positive_number("max_steps", 0, 1).is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("format", "json", &["compact", "json"]).is_ok());
        assert!(validate_one_of("format", "xml", &["compact", "json"]).is_err());
    }
}
