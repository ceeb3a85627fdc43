//! Name validation for buckets and object keys.
//!
//! Bucket names follow a single, operator-facing rule: lowercase
//! alphanumerics, underscores, and hyphens, starting with an alphanumeric,
//! 2-63 characters total.

use crate::error::StorageError;

const MIN_BUCKET_NAME_LEN: usize = 2;
const MAX_BUCKET_NAME_LEN: usize = 63;
const MAX_KEY_BYTES: usize = 1024;

/// Validate a bucket name.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] if the name violates any rule.
pub fn validate_bucket_name(name: &str) -> Result<(), StorageError> {
    let len = name.len();

    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(StorageError::InvalidName {
            name: name.to_owned(),
            reason: format!(
                "bucket name must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"
            ),
        });
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    {
        return Err(StorageError::InvalidName {
            name: name.to_owned(),
            reason: "bucket name must only contain lowercase letters, digits, hyphens, and underscores"
                .to_owned(),
        });
    }

    let first = name.as_bytes()[0];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return Err(StorageError::InvalidName {
            name: name.to_owned(),
            reason: "bucket name must start with a lowercase letter or digit".to_owned(),
        });
    }

    Ok(())
}

/// Validate an object key.
///
/// Keys must be non-empty, UTF-8 (guaranteed by `&str`), at most
/// [`MAX_KEY_BYTES`], and must not contain a `..` path-traversal segment.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] if the key violates any rule.
pub fn validate_object_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidName {
            name: key.to_owned(),
            reason: "object key must not be empty".to_owned(),
        });
    }

    if key.len() > MAX_KEY_BYTES {
        return Err(StorageError::InvalidName {
            name: key.to_owned(),
            reason: format!("object key must be at most {MAX_KEY_BYTES} bytes"),
        });
    }

    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidName {
            name: key.to_owned(),
            reason: "object key must not be absolute or contain a \"..\" segment".to_owned(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_valid_bucket_names() {
        assert!(validate_bucket_name("my-bucket").is_ok());
        assert!(validate_bucket_name("a1").is_ok());
        assert!(validate_bucket_name("under_score").is_ok());
    }

    #[test]
    fn test_should_reject_short_bucket_names() {
        assert!(validate_bucket_name("a").is_err());
    }

    #[test]
    fn test_should_reject_uppercase_bucket_names() {
        assert!(validate_bucket_name("MyBucket").is_err());
    }

    #[test]
    fn test_should_reject_bucket_names_starting_with_hyphen() {
        assert!(validate_bucket_name("-bucket").is_err());
    }

    #[test]
    fn test_should_accept_nested_object_keys() {
        assert!(validate_object_key("folder/sub/file.txt").is_ok());
    }

    #[test]
    fn test_should_reject_empty_object_key() {
        assert!(validate_object_key("").is_err());
    }

    #[test]
    fn test_should_reject_path_traversal_object_key() {
        assert!(validate_object_key("../etc/passwd").is_err());
        assert!(validate_object_key("a/../b").is_err());
    }

    #[test]
    fn test_should_reject_absolute_object_key() {
        assert!(validate_object_key("/etc/passwd").is_err());
    }
}
