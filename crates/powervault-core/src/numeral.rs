//! Roman numeral decoding for vendor disk names.
//!
//! Virtual disks are named like `VirtualDisk_RAID5_III`; the trailing
//! ordinal is exported as a decimal `Index` label.

use crate::report::ParseError;

/// Supported ordinals, index `i` holds the numeral for `i + 1`.
const NUMERALS: [&str; 20] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII", "XIII", "XIV", "XV",
    "XVI", "XVII", "XVIII", "XIX", "XX",
];

/// Decodes a Roman numeral in `I..=XX` into its decimal string form.
///
/// Anything outside that set is `ParseError::UnknownOrdinal`.
pub fn decode(numeral: &str) -> Result<String, ParseError> {
    NUMERALS
        .iter()
        .position(|n| *n == numeral)
        .map(|idx| (idx + 1).to_string())
        .ok_or_else(|| ParseError::UnknownOrdinal(numeral.to_string()))
}
