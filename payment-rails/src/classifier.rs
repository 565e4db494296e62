//! Bank identifier classification
//!
//! Infers the identifier scheme from the shape of a raw bank code. Digit-count classes
//! are tested before the alphanumeric BIC pattern.

use crate::types::BankCodeType;
use regex::Regex;

lazy_static::lazy_static! {
    static ref BIC_PATTERN: Regex = Regex::new(r"^[A-Z]{6}[A-Z0-9]{2}([A-Z0-9]{3})?$").unwrap();
}

/// Classify a raw bank identifier. `None` means the scheme is unknown.
pub fn classify_bank_code(raw: &str) -> Option<BankCodeType> {
    let code: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    if code.is_empty() {
        return None;
    }

    if code.bytes().all(|b| b.is_ascii_digit()) {
        return match code.len() {
            3 => Some(BankCodeType::Nibss),
            9 => Some(BankCodeType::Routing),
            8 => Some(BankCodeType::Transit),
            6 => Some(BankCodeType::SortCode),
            _ => None,
        };
    }

    if BIC_PATTERN.is_match(&code) {
        return Some(BankCodeType::Swift);
    }

    None
}
