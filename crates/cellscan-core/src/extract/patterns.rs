//! Regex patterns for battery label fields.
//!
//! All patterns are case-insensitive and unanchored, so values embedded in
//! surrounding OCR noise are still found.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Serial number: one uppercase letter followed by six digits (C044160).
    pub static ref SERIAL_NUMBER: Regex = Regex::new(
        r"(?i)([A-Z]\d{6})"
    ).unwrap();

    /// Model: four digits, one uppercase letter, one digit (6754E4).
    pub static ref MODEL: Regex = Regex::new(
        r"(?i)(\d{4}[A-Z]\d)"
    ).unwrap();

    /// Energy: decimal number followed by "Wh" (36.74Wh).
    pub static ref ENERGY: Regex = Regex::new(
        r"(?i)(\d+\.?\d*)\s*Wh"
    ).unwrap();

    /// Capacity: decimal number followed by "Ah" (10.8Ah).
    pub static ref CAPACITY: Regex = Regex::new(
        r"(?i)(\d+\.?\d*)\s*Ah"
    ).unwrap();

    /// Voltage: decimal number followed by "V" (3.40V).
    pub static ref VOLTAGE: Regex = Regex::new(
        r"(?i)(\d+\.?\d*)\s*V"
    ).unwrap();
}
