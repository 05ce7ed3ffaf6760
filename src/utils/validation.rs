use crate::utils::error::{PortalError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(PortalError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| PortalError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 檢查一組 key 是否重複（例如 catalog 裡的 add-on key）
pub fn validate_unique_keys<'a>(
    field_name: &str,
    keys: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(PortalError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: key.to_string(),
                reason: "Duplicate key".to_string(),
            });
        }
    }
    Ok(())
}

/// 簡單的 e-mail 格式檢查，真正的驗證交給後端
pub fn validate_email(field_name: &str, email: &str) -> Result<()> {
    let re = regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_err(|e| {
        PortalError::ConfigError {
            message: e.to_string(),
        }
    })?;
    if !re.is_match(email.trim()) {
        return Err(PortalError::ValidationError {
            message: format!("{} is not a valid e-mail address: {}", field_name, email),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("backend.url", "https://example.supabase.co").is_ok());
        assert!(validate_url("backend.url", "http://localhost:54321").is_ok());
        assert!(validate_url("backend.url", "").is_err());
        assert!(validate_url("backend.url", "invalid-url").is_err());
        assert!(validate_url("backend.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_unique_keys() {
        assert!(validate_unique_keys("add_ons", ["images", "infographics"]).is_ok());
        assert!(validate_unique_keys("add_ons", ["images", "images"]).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("contact.email", "anna@example.com").is_ok());
        assert!(validate_email("contact.email", "  anna@example.com ").is_ok());
        assert!(validate_email("contact.email", "anna.example.com").is_err());
        assert!(validate_email("contact.email", "anna@").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("multiplier", 1.5, 1.0, 10.0).is_ok());
        assert!(validate_range("multiplier", 0.5, 1.0, 10.0).is_err());
    }
}
