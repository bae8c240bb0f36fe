//! Identifier generation.

use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Length of generated object-store keys.
pub const KEY_LENGTH: usize = 11;

/// Generate a new entity id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new object-store key.
///
/// Keys draw from `[0-9A-Za-z]`; uniqueness is enforced by the
/// `file_versions.key` constraint.
pub fn generate_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_unique() {
        assert_ne!(generate_id(), generate_id());
        assert_eq!(generate_id().len(), 36);
    }

    #[test]
    fn test_generate_key_shape() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_LENGTH);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_key_unique() {
        let keys: std::collections::HashSet<String> = (0..100).map(|_| generate_key()).collect();
        assert_eq!(keys.len(), 100);
    }
}
