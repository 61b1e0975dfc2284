use zhconv::{zhconv, Variant};

/// Map simplified Chinese characters to traditional ones.
///
/// Text that is already traditional, or not Chinese at all, comes back as-is.
pub fn to_traditional(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    zhconv(text, Variant::ZhHant)
}
