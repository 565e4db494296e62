//! Property-based tests for rail invariants
//!
//! - Classification: digit-count classes and the BIC pattern
//! - IBAN: valid vectors survive formatting noise, single-digit corruption is caught
//! - Fees: NIBSS bands are monotonic and match their thresholds
//! - Canadian accounts: every layout normalizes to the same parts

use payment_rails::{
    classify_bank_code,
    iban::{self, Iban},
    providers::{interac::CanadianAccount, NibssProvider},
    BankCodeType,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const VALID_IBANS: &[&str] = &[
    "DE89370400440532013000",
    "FR1420041010050500013M02606",
    "NL91ABNA0417164300",
    "GB82WEST12345698765432",
    "BE68539007547034",
    "ES9121000418450200051332",
    "IT60X0542811101000000123456",
    "AT611904300234573201",
];

fn zone() -> Vec<String> {
    ["DE", "FR", "NL", "GB", "BE", "ES", "IT", "AT"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Strategy for picking a known-good IBAN
fn iban_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(VALID_IBANS)
}

/// Strategy for amounts in cents up to 1,000,000.00
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1u64..100_000_000u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: digit strings classify by length alone
    #[test]
    fn prop_digit_classes(code in "[0-9]{1,12}") {
        let expected = match code.len() {
            3 => Some(BankCodeType::Nibss),
            6 => Some(BankCodeType::SortCode),
            8 => Some(BankCodeType::Transit),
            9 => Some(BankCodeType::Routing),
            _ => None,
        };
        prop_assert_eq!(classify_bank_code(&code), expected);
    }

    /// Property: whitespace and case never change the classification
    #[test]
    fn prop_bic_ignores_spacing_and_case(bic in "[A-Z]{6}[A-Z0-9]{2}([A-Z0-9]{3})?") {
        prop_assert_eq!(classify_bank_code(&bic), Some(BankCodeType::Swift));

        let noisy = format!(" {} ", bic.to_lowercase());
        prop_assert_eq!(classify_bank_code(&noisy), Some(BankCodeType::Swift));
    }

    /// Property: a valid IBAN stays valid in grouped, lowercase form
    #[test]
    fn prop_iban_formatting_is_transparent(raw in iban_strategy()) {
        let iban = Iban::parse(raw, &zone()).unwrap();
        let reparsed = Iban::parse(&iban.formatted().to_lowercase(), &zone()).unwrap();
        prop_assert_eq!(iban, reparsed);
    }

    /// Property: changing any one digit breaks the mod-97 check
    #[test]
    fn prop_single_digit_corruption_detected(
        raw in iban_strategy(),
        position in 2usize..34,
        delta in 1u32..10,
    ) {
        let bytes = raw.as_bytes();
        let position = position % bytes.len();
        prop_assume!(bytes[position].is_ascii_digit());

        let digit = (bytes[position] - b'0') as u32;
        let replaced = char::from_digit((digit + delta) % 10, 10).unwrap();
        let mut corrupted = raw.to_string();
        corrupted.replace_range(position..position + 1, &replaced.to_string());

        prop_assert!(!iban::checksum_valid(&corrupted));
    }

    /// Property: NIBSS fees never decrease with the amount
    #[test]
    fn prop_nibss_fee_monotonic(a in amount_strategy(), b in amount_strategy()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(NibssProvider::fee_for(low) <= NibssProvider::fee_for(high));

        let fee = NibssProvider::fee_for(a);
        prop_assert!(fee == dec!(10.75) || fee == dec!(26.88) || fee == dec!(53.75));
    }

    /// Property: dash, space and concatenated layouts parse to the same account
    #[test]
    fn prop_canadian_layouts_agree(
        institution in "[0-9]{3}",
        transit in "[0-9]{5}",
        account in "[0-9]{7,12}",
    ) {
        let dashed = CanadianAccount::parse(&format!("{}-{}-{}", institution, transit, account));
        let spaced = CanadianAccount::parse(&format!("{} {} {}", institution, transit, account));
        let joined = CanadianAccount::parse(&format!("{}{}{}", institution, transit, account));

        prop_assert!(dashed.is_some());
        prop_assert_eq!(&dashed, &spaced);
        prop_assert_eq!(&dashed, &joined);

        let parsed = dashed.unwrap();
        prop_assert_eq!(parsed.institution, institution);
        prop_assert_eq!(parsed.transit, transit);
        prop_assert_eq!(parsed.account, account);
    }
}
