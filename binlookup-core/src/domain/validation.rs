/// Number of leading digits that identify an issuing range.
pub const BIN_PREFIX_LEN: usize = 6;

/// Returns true when `input`, after trimming, is at least six ASCII digits.
pub fn is_valid_bin(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.len() >= BIN_PREFIX_LEN && trimmed.bytes().all(|b| b.is_ascii_digit())
}

/// The first six characters of the trimmed input, or all of it when shorter.
pub fn bin_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(BIN_PREFIX_LEN) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bins() {
        assert!(is_valid_bin("411111"));
        assert!(is_valid_bin("411111111111"));
        assert!(is_valid_bin("000000"));
        assert!(is_valid_bin("  5222220000  "));
    }

    #[test]
    fn test_invalid_bins() {
        assert!(!is_valid_bin(""));
        assert!(!is_valid_bin("   "));
        assert!(!is_valid_bin("41111"));
        assert!(!is_valid_bin("abc123"));
        assert!(!is_valid_bin("4111 11"));
        assert!(!is_valid_bin("411111-1"));
        assert!(!is_valid_bin("41111a1"));
        // Non-ASCII digits are rejected.
        assert!(!is_valid_bin("٤١١١١١"));
    }

    #[test]
    fn test_every_short_digit_string_is_rejected() {
        for len in 0..BIN_PREFIX_LEN {
            assert!(!is_valid_bin(&"4".repeat(len)), "length {len}");
        }
    }

    #[test]
    fn test_bin_prefix_truncates() {
        assert_eq!(bin_prefix("411111234567"), "411111");
        assert_eq!(bin_prefix(" 411111 "), "411111");
        assert_eq!(bin_prefix("4111"), "4111");
    }
}
