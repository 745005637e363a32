//! Contact value canonicalization
//!
//! Pure, deterministic functions producing comparable keys for phone numbers
//! and email addresses. Used identically by identity resolution and the
//! customer sync engine, so both sides of every comparison go through the
//! same code path.

/// Canonicalize a phone number into a bare digit string.
///
/// Strips a trailing extension marker (`x123`, `ext 123`, `# 123`), drops all
/// non-digit characters, and removes a leading US country code `1` when the
/// result is 11 digits.
pub fn normalize_phone(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    let without_ext = strip_extension(&lowered);

    let digits: String = without_ext.chars().filter(char::is_ascii_digit).collect();

    if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// Canonicalize an email address: trim surrounding whitespace and lowercase.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Drop a trailing extension suffix if present.
///
/// A suffix counts as an extension when a marker (`ext`, `x`, `#`) is
/// followed by nothing but digits and whitespace through the end of the
/// string. Markers are checked longest-first so `ext` is not mistaken for a
/// bare `x`.
fn strip_extension(value: &str) -> &str {
    const MARKERS: [&str; 4] = ["ext.", "ext", "x", "#"];

    for marker in MARKERS {
        if let Some(idx) = value.rfind(marker) {
            if idx == 0 {
                continue;
            }
            let tail = &value[idx + marker.len()..];
            let tail = tail.trim();
            if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
                return &value[..idx];
            }
        }
    }

    value
}
