//! EU member state codes and display names.
//!
//! The 27 member states (ISO 3166-1 alpha-2). VIES uses `EL` for Greece;
//! everything inside the engine uses `GR`.

/// Check whether `code` is one of the 27 EU member states.
pub fn is_eu_member(code: &str) -> bool {
    EU_MEMBER_STATES.binary_search(&code).is_ok()
}

/// English display name of a member state, `None` outside the EU.
pub fn country_name(code: &str) -> Option<&'static str> {
    EU_MEMBER_STATES
        .binary_search(&code)
        .ok()
        .map(|idx| EU_COUNTRY_NAMES[idx])
}

/// Country code as the VIES registry expects it (`GR` -> `EL`).
pub fn registry_country_code(code: &str) -> &str {
    if code == "GR" { "EL" } else { code }
}

/// Map a VAT number prefix to the ISO country code (`EL` -> `GR`).
pub fn country_from_vat_prefix(prefix: &str) -> &str {
    if prefix == "EL" { "GR" } else { prefix }
}

/// EU member states, sorted for binary search.
pub static EU_MEMBER_STATES: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GR", "HR", "HU", "IE", "IT",
    "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK",
];

static EU_COUNTRY_NAMES: &[&str] = &[
    "Austria",
    "Belgium",
    "Bulgaria",
    "Cyprus",
    "Czechia",
    "Germany",
    "Denmark",
    "Estonia",
    "Spain",
    "Finland",
    "France",
    "Greece",
    "Croatia",
    "Hungary",
    "Ireland",
    "Italy",
    "Lithuania",
    "Luxembourg",
    "Latvia",
    "Malta",
    "Netherlands",
    "Poland",
    "Portugal",
    "Romania",
    "Sweden",
    "Slovenia",
    "Slovakia",
];
