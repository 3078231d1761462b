//! Bundle name and item key validation.

use crate::error::GameplayDataError;

/// Longest accepted bundle name or item key, in characters.
pub const MAX_NAME_LENGTH: usize = 512;

fn is_valid(s: &str) -> bool {
    !s.is_empty()
        && s.chars().count() <= MAX_NAME_LENGTH
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

pub fn validate_bundle_name(name: &str) -> Result<(), GameplayDataError> {
    if is_valid(name) {
        Ok(())
    } else {
        Err(GameplayDataError::MalformedBundleName(name.to_string()))
    }
}

pub fn validate_item_key(key: &str) -> Result<(), GameplayDataError> {
    if is_valid(key) {
        Ok(())
    } else {
        Err(GameplayDataError::MalformedBundleItemKey(key.to_string()))
    }
}

/// Validates every key, reporting the first bad one.
pub fn validate_item_keys<'a>(
    keys: impl IntoIterator<Item = &'a String>,
) -> Result<(), GameplayDataError> {
    keys.into_iter().try_for_each(|k| validate_item_key(k))
}
