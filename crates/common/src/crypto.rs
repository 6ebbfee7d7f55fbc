//! Cryptographic helpers shared across SmartSpend crates

/// Compare two secrets without short-circuiting on the first differing byte.
///
/// Length is not hidden: tokens compared here have a fixed, public length.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();

    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
