//! IBAN parsing and mod-97 verification

use crate::error::ErrorCode;

/// Shortest IBAN accepted
pub const MIN_LENGTH: usize = 15;
/// Longest IBAN accepted
pub const MAX_LENGTH: usize = 34;

/// IBAN check failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbanError {
    /// Stable code
    pub code: ErrorCode,
    /// Message
    pub message: String,
}

impl IbanError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A structurally valid, checksum-verified IBAN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iban {
    compact: String,
}

impl Iban {
    /// Parse and verify `raw` against the countries in `zone`.
    ///
    /// Steps run in order (length, prefix, zone membership, checksum) and the first
    /// failing step decides the error code.
    pub fn parse(raw: &str, zone: &[String]) -> Result<Self, IbanError> {
        let compact = compact(raw);

        if compact.len() < MIN_LENGTH || compact.len() > MAX_LENGTH {
            return Err(IbanError::new(
                ErrorCode::InvalidIbanLength,
                format!(
                    "IBAN must be between {} and {} characters",
                    MIN_LENGTH, MAX_LENGTH
                ),
            ));
        }

        let bytes = compact.as_bytes();
        let prefix_ok = bytes[..2].iter().all(u8::is_ascii_uppercase)
            && bytes[2..4].iter().all(u8::is_ascii_digit);
        if !prefix_ok {
            return Err(IbanError::new(
                ErrorCode::InvalidIbanFormat,
                "IBAN must start with a country code and check digits",
            ));
        }

        let country = &compact[..2];
        if !zone.iter().any(|c| c == country) {
            return Err(IbanError::new(
                ErrorCode::UnsupportedCountry,
                format!("Country {} is not in the SEPA zone", country),
            ));
        }

        if !checksum_valid(&compact) {
            return Err(IbanError::new(
                ErrorCode::InvalidChecksum,
                "Invalid IBAN checksum",
            ));
        }

        Ok(Self { compact })
    }

    /// ISO country code
    pub fn country(&self) -> &str {
        &self.compact[..2]
    }

    /// Basic bank account number (everything after the check digits)
    pub fn bban(&self) -> &str {
        &self.compact[4..]
    }

    /// Compact form
    pub fn as_str(&self) -> &str {
        &self.compact
    }

    /// Print form, groups of four
    pub fn formatted(&self) -> String {
        self.compact
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Strip whitespace and uppercase
pub fn compact(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// mod-97 check: rotate the first four characters to the end, expand letters to
/// `A=10..Z=35` and require remainder 1. Characters outside `[0-9A-Z]` fail.
pub fn checksum_valid(compact: &str) -> bool {
    if compact.len() < 4 || !compact.is_char_boundary(4) {
        return false;
    }

    let rearranged = compact[4..].chars().chain(compact[..4].chars());
    let mut remainder: u32 = 0;

    for c in rearranged {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'A'..='Z' => c as u32 - 55,
            _ => return false,
        };
        // Letters expand to two digits
        if value >= 10 {
            remainder = (remainder * 10 + value / 10) % 97;
            remainder = (remainder * 10 + value % 10) % 97;
        } else {
            remainder = (remainder * 10 + value) % 97;
        }
    }

    remainder == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> Vec<String> {
        ["DE", "FR", "NL", "GB", "BE"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn test_known_vectors() {
        for raw in [
            "DE89370400440532013000",
            "FR1420041010050500013M02606",
            "NL91ABNA0417164300",
            "GB82 WEST 1234 5698 7654 32",
            "BE68539007547034",
        ] {
            let iban = Iban::parse(raw, &zone()).unwrap();
            assert!(checksum_valid(iban.as_str()), "{}", raw);
        }
    }

    #[test]
    fn test_formatting() {
        let iban = Iban::parse("de89370400440532013000", &zone()).unwrap();
        assert_eq!(iban.formatted(), "DE89 3704 0044 0532 0130 00");
        assert_eq!(iban.country(), "DE");
        assert_eq!(iban.bban(), "370400440532013000");
    }

    #[test]
    fn test_step_order() {
        let err = Iban::parse("DE89", &zone()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIbanLength);

        let err = Iban::parse("1289370400440532013000", &zone()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIbanFormat);

        let err = Iban::parse("US89370400440532013000", &zone()).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedCountry);

        let err = Iban::parse("DE88370400440532013000", &zone()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidChecksum);
    }

    #[test]
    fn test_rejects_foreign_characters() {
        assert!(!checksum_valid("DE89370400440532013-00"));
    }
}
