use crate::utils::error::{LoaderError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
});

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Schema, table and key identifiers are emitted unquoted, so they must be plain words.
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    if !IDENTIFIER.is_match(value) {
        return Err(LoaderError::validation(format!(
            "invalid {} identifier '{}'",
            field_name, value
        )));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name must be between 3 and 63 characters".to_string(),
        });
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots"
                .to_string(),
        });
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name cannot start or end with a hyphen".to_string(),
        });
    }

    Ok(())
}

pub fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

/// COPY delimiters and quote characters are single, non-alphanumeric characters.
pub fn validate_format_char(field_name: &str, value: char) -> Result<()> {
    if value.is_alphanumeric() || value == '\n' || value == '\r' {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be a single punctuation or whitespace character".to_string(),
        });
    }
    Ok(())
}
