// Base62 slug generation for short links

use rand::Rng;

/// Base62 alphabet: 0-9, A-Z, a-z (62 characters total)
const BASE62_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated short link slugs
pub const SLUG_LENGTH: usize = 8;

/// Upper bound accepted by the redirect endpoint
pub const MAX_SLUG_LENGTH: usize = 32;

/// Generate a random Base62 string of `length` characters
pub fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| BASE62_ALPHABET[rng.gen_range(0..BASE62_ALPHABET.len())] as char)
        .collect()
}

/// Generate a random short link slug
pub fn random_slug() -> String {
    random_code(SLUG_LENGTH)
}

/// True when `s` could have been produced by this module
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_SLUG_LENGTH && s.bytes().all(|b| BASE62_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_slug_shape() {
        let slug = random_slug();
        assert_eq!(slug.len(), SLUG_LENGTH);
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_random_slugs_differ() {
        assert_ne!(random_slug(), random_slug());
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("aZ09"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("has-dash"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug(&"a".repeat(MAX_SLUG_LENGTH + 1)));
    }
}
