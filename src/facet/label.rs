use convert_case::{Boundary, Case, Casing};

// Digits stay attached to their word: `iphone15` is one word.
const DIGIT_BOUNDARIES: [Boundary; 4] = [
    Boundary::LowerDigit,
    Boundary::UpperDigit,
    Boundary::DigitLower,
    Boundary::DigitUpper,
];

/// Human label for a raw value or key.
///
/// Empty stays empty and all-uppercase input is treated as an acronym and
/// left alone; anything else becomes Title Case.
pub fn title_label(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    if value.to_uppercase() == value {
        return value.to_string();
    }
    value.remove_boundaries(&DIGIT_BOUNDARIES).to_case(Case::Title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_label() {
        assert_eq!(title_label(""), "");
        assert_eq!(title_label("USA"), "USA");
        assert_eq!(title_label("A"), "A");
        assert_eq!(title_label("dark blue"), "Dark Blue");
        assert_eq!(title_label("unitPrice"), "Unit Price");
        assert_eq!(title_label("in_stock"), "In Stock");
    }

    #[test]
    fn test_title_label_keeps_digits_in_words() {
        assert_eq!(title_label("v1"), "V1");
        assert_eq!(title_label("iphone15"), "Iphone15");
        assert_eq!(title_label("size2xl"), "Size2xl");
        assert_eq!(title_label("size 2xl"), "Size 2xl");
    }
}
