//! VAT number normalization and per-country format checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{country_from_vat_prefix, is_eu_member, registry_country_code};

/// Error returned when a VAT number fails format validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid VAT number '{value}': {reason}")]
pub struct VatFormatError {
    /// The normalized input.
    pub value: String,
    /// Why the value failed validation.
    pub reason: String,
    /// Member state, when the prefix was recognized.
    pub country_code: Option<String>,
}

/// A VAT number that passed the format check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VatNumber {
    /// ISO country code of the member state (GR for Greece).
    pub country_code: String,
    /// The number without its two-letter prefix.
    pub number: String,
    /// Uppercase, separators stripped, with the registry prefix (`EL` for
    /// Greece whether entered as `EL` or `GR`).
    pub normalized: String,
}

/// Uppercase and drop everything that is not `A-Z` or `0-9`.
pub fn normalize_vat_number(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalize a VAT number and check it against its member state's pattern.
///
/// Greek numbers are accepted with either `EL` or `GR` and always come back
/// with country code `GR` and the `EL` prefix in `normalized`, so both
/// spellings share one cache and history key.
pub fn parse_vat_number(input: &str) -> Result<VatNumber, VatFormatError> {
    let normalized = normalize_vat_number(input);
    if normalized.len() < 4 {
        return Err(VatFormatError {
            value: normalized,
            reason: "too short, must be at least 4 characters".into(),
            country_code: None,
        });
    }

    let prefix = &normalized[..2];
    let country = country_from_vat_prefix(prefix);
    if !is_eu_member(country) {
        return Err(VatFormatError {
            reason: format!("unknown or non-EU country prefix '{prefix}'"),
            value: normalized,
            country_code: None,
        });
    }
    let country = country.to_string();
    let number = normalized[2..].to_string();

    if !matches_country_pattern(&country, &number) {
        return Err(VatFormatError {
            reason: format!("invalid format for country {country}"),
            value: normalized,
            country_code: Some(country),
        });
    }

    Ok(VatNumber {
        normalized: format!("{}{number}", registry_country_code(&country)),
        country_code: country,
        number,
    })
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn all_upper(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_uppercase())
}

fn matches_country_pattern(country: &str, n: &str) -> bool {
    type VatValidator = fn(&str) -> bool;
    let patterns: &[(&str, VatValidator)] = &[
        ("AT", |n| n.len() == 9 && n.starts_with('U') && all_digits(&n[1..])),
        ("BE", |n| n.len() == 10 && all_digits(n)),
        ("BG", |n| (n.len() == 9 || n.len() == 10) && all_digits(n)),
        ("CY", |n| n.len() == 9 && all_digits(&n[..8]) && all_upper(&n[8..])),
        ("CZ", |n| (8..=10).contains(&n.len()) && all_digits(n)),
        ("DE", |n| n.len() == 9 && all_digits(n)),
        ("DK", |n| n.len() == 8 && all_digits(n)),
        ("EE", |n| n.len() == 9 && all_digits(n)),
        ("ES", |n| n.len() == 9 && all_digits(&n[1..8])),
        ("FI", |n| n.len() == 8 && all_digits(n)),
        ("FR", |n| n.len() == 11 && all_digits(&n[2..])),
        ("GR", |n| n.len() == 9 && all_digits(n)),
        ("HR", |n| n.len() == 11 && all_digits(n)),
        ("HU", |n| n.len() == 8 && all_digits(n)),
        ("IE", |n| {
            // 1234567X, 1234567XX or 1X23456X
            let modern = (n.len() == 8 || n.len() == 9) && all_digits(&n[..7]) && all_upper(&n[7..]);
            let legacy = n.len() == 8
                && all_digits(&n[..1])
                && all_upper(&n[1..2])
                && all_digits(&n[2..7])
                && all_upper(&n[7..]);
            modern || legacy
        }),
        ("IT", |n| n.len() == 11 && all_digits(n)),
        ("LT", |n| (9..=12).contains(&n.len()) && all_digits(n)),
        ("LU", |n| n.len() == 8 && all_digits(n)),
        ("LV", |n| n.len() == 11 && all_digits(n)),
        ("MT", |n| n.len() == 8 && all_digits(n)),
        ("NL", |n| n.len() == 12 && all_digits(&n[..9]) && &n[9..10] == "B" && all_digits(&n[10..])),
        ("PL", |n| n.len() == 10 && all_digits(n)),
        ("PT", |n| n.len() == 9 && all_digits(n)),
        ("RO", |n| (2..=10).contains(&n.len()) && all_digits(n)),
        ("SE", |n| n.len() == 12 && all_digits(n)),
        ("SI", |n| n.len() == 8 && all_digits(n)),
        ("SK", |n| n.len() == 10 && all_digits(n)),
    ];

    // Normalized input is pure ASCII, so byte slicing above is safe once the
    // length check has passed.
    patterns
        .iter()
        .find(|(cc, _)| *cc == country)
        .is_some_and(|(_, check)| check(n))
}

/// Mask a VAT number for logs: first four characters, `***`, last two.
pub fn mask_vat_number(vat: &str) -> String {
    if vat.len() < 6 || !vat.is_ascii() {
        return "***".into();
    }
    format!("{}***{}", &vat[..4], &vat[vat.len() - 2..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_de_vat() {
        let v = parse_vat_number("DE123456789").unwrap();
        assert_eq!(v.country_code, "DE");
        assert_eq!(v.number, "123456789");
        assert_eq!(v.normalized, "DE123456789");
    }

    #[test]
    fn separators_and_case_normalized() {
        let v = parse_vat_number(" de 123.456-789 ").unwrap();
        assert_eq!(v.normalized, "DE123456789");
    }

    #[test]
    fn greek_prefix_maps_to_gr() {
        let v = parse_vat_number("EL123456789").unwrap();
        assert_eq!(v.country_code, "GR");
        assert_eq!(v.number, "123456789");
        assert_eq!(v.normalized, "EL123456789");
    }

    #[test]
    fn greek_prefixes_share_one_key() {
        let el = parse_vat_number("el 123 456 789").unwrap();
        let gr = parse_vat_number("GR123456789").unwrap();
        assert_eq!(gr.country_code, "GR");
        assert_eq!(el.normalized, gr.normalized);
    }

    #[test]
    fn valid_formats() {
        for vat in [
            "ATU12345678",
            "BE0123456789",
            "CY12345678X",
            "FR12345678901",
            "FRAB123456789",
            "NL123456789B01",
            "IT12345678901",
            "ESX1234567X",
            "ES12345678Z",
            "IE1234567T",
            "IE1234567TW",
            "IE1A23456B",
            "PL1234567890",
            "RO12",
            "SE123456789012",
        ] {
            assert!(parse_vat_number(vat).is_ok(), "{vat} should be valid");
        }
    }

    #[test]
    fn invalid_formats() {
        for vat in [
            "DE12345678",
            "DE1234567890",
            "ATU1234567",
            "NL123456789X01",
            "CY123456789",
            "ES1234X567X",
        ] {
            let err = parse_vat_number(vat).unwrap_err();
            assert!(err.country_code.is_some(), "{vat}");
        }
    }

    #[test]
    fn non_eu_prefix_rejected() {
        let err = parse_vat_number("GB123456789").unwrap_err();
        assert!(err.country_code.is_none());
        assert!(parse_vat_number("XX12345678").is_err());
    }

    #[test]
    fn too_short_input() {
        assert!(parse_vat_number("DE").is_err());
        assert!(parse_vat_number("").is_err());
    }

    #[test]
    fn masking() {
        assert_eq!(mask_vat_number("DE123456789"), "DE12***89");
        assert_eq!(mask_vat_number("DE12"), "***");
    }
}
