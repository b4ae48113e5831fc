//! EAN-13 and EAN-8 symbologies
//!
//! Values may be given with or without their check digit: 12 (EAN-13) or 7 (EAN-8)
//! digits get the check digit appended, 13 or 8 digits must carry the correct one.

use rowcode_core::EncodeError;

const START_END: [bool; 3] = [true, false, true];
const CENTER: [bool; 5] = [false, true, false, true, false];

/// Left-hand odd parity (set A) patterns for digits 0..=9.
const L_CODES: [&str; 10] = [
    "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
    "0110111", "0001011",
];

/// EAN-13 parity of the left half, selected by the leading digit.
const PARITY: [&str; 10] = [
    "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG", "LGGLLG", "LGGGLL", "LGLGLG", "LGLGGL",
    "LGGLGL",
];

#[derive(Clone, Copy)]
enum Set {
    L,
    G,
    R,
}

fn digit_modules(digit: u8, set: Set) -> Vec<bool> {
    let l: Vec<bool> = L_CODES[digit as usize].chars().map(|c| c == '1').collect();
    match set {
        Set::L => l,
        Set::R => l.iter().map(|bit| !bit).collect(),
        Set::G => l.iter().rev().map(|bit| !bit).collect(),
    }
}

fn invalid(format: &str, value: &str, reason: impl Into<String>) -> EncodeError {
    EncodeError::InvalidValue {
        format: format.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Modulo-10 check digit: weights 3,1,3,… from the rightmost data digit.
pub fn check_digit(data: &[u8]) -> u8 {
    let sum: u32 = data
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| *d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Parse `value` into a full digit sequence of `len` digits, check digit included.
fn complete_digits(format: &str, value: &str, len: usize) -> Result<Vec<u8>, EncodeError> {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(format, value, "only digits are allowed"));
    }
    let mut digits: Vec<u8> = value.bytes().map(|b| b - b'0').collect();

    if digits.len() == len - 1 {
        digits.push(check_digit(&digits));
        return Ok(digits);
    }
    if digits.len() == len {
        let expected = check_digit(&digits[..len - 1]);
        if digits[len - 1] != expected {
            return Err(invalid(
                format,
                value,
                format!("check digit should be {}", expected),
            ));
        }
        return Ok(digits);
    }

    Err(invalid(
        format,
        value,
        format!("expected {} or {} digits, got {}", len - 1, len, digits.len()),
    ))
}

/// EAN-13 module sequence (95 modules).
pub fn encode_ean13(value: &str) -> Result<Vec<bool>, EncodeError> {
    let digits = complete_digits("ean13", value, 13)?;
    let parity = PARITY[digits[0] as usize];

    let mut modules = Vec::with_capacity(95);
    modules.extend_from_slice(&START_END);
    for (digit, set) in digits[1..7].iter().zip(parity.chars()) {
        let set = if set == 'G' { Set::G } else { Set::L };
        modules.extend(digit_modules(*digit, set));
    }
    modules.extend_from_slice(&CENTER);
    for digit in &digits[7..] {
        modules.extend(digit_modules(*digit, Set::R));
    }
    modules.extend_from_slice(&START_END);
    Ok(modules)
}

/// EAN-8 module sequence (67 modules).
pub fn encode_ean8(value: &str) -> Result<Vec<bool>, EncodeError> {
    let digits = complete_digits("ean8", value, 8)?;

    let mut modules = Vec::with_capacity(67);
    modules.extend_from_slice(&START_END);
    for digit in &digits[..4] {
        modules.extend(digit_modules(*digit, Set::L));
    }
    modules.extend_from_slice(&CENTER);
    for digit in &digits[4..] {
        modules.extend(digit_modules(*digit, Set::R));
    }
    modules.extend_from_slice(&START_END);
    Ok(modules)
}
