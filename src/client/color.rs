//! Color strings accepted by the render-parameter setters.

/// Parse `#RRGGBB` or `#AARRGGBB` into ARGB. Six digits are opaque.
pub fn parse_argb(text: &str) -> Option<u32> {
    let digits = text.strip_prefix('#')?;
    if !matches!(digits.len(), 6 | 8) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    if digits.len() == 6 {
        Some(0xff00_0000 | value)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_both_lengths_either_case() {
        assert_eq!(parse_argb("#112233"), Some(0xff11_2233));
        assert_eq!(parse_argb("#80AbCdEf"), Some(0x80ab_cdef));
        assert_eq!(parse_argb("#000000"), Some(0xff00_0000));
    }

    #[test]
    fn test_rejects_everything_else() {
        for text in [
            "", "#", "112233", "#12345", "#1234567", "#123456789", "#GG0000", "#+12345", "# 12345",
            "##12345", "#１２３４５６",
        ] {
            assert_eq!(parse_argb(text), None, "{text:?} should be rejected");
        }
    }
}
