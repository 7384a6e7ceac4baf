// SPDX-License-Identifier: GPL-3.0-only

//! EAN-13, UPC-A and EAN-8
//!
//! Digits are 7 modules wide and made of four elements. Left-half digits
//! start with a space and use either odd (L) or even (G) parity; the parity
//! sequence of the six left digits of an EAN-13 encodes its first digit.
//! Right-half digits start with a bar. An EAN-13 whose first digit is 0 is a
//! UPC-A.

use super::{Decoded, pattern_variance};
use crate::barcode::types::BarcodeFormat;

/// Element widths of the L-parity digits (space, bar, space, bar)
pub(super) const L_PATTERNS: [[u32; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Parity of the six left digits for each leading digit, G = 1, first digit
/// in the most significant bit
pub(super) const FIRST_DIGIT_PARITY: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011, 0b011001, 0b011100, 0b010101, 0b010110,
    0b011010,
];

const GUARD: [u32; 3] = [1, 1, 1];
const MIDDLE_GUARD: [u32; 5] = [1, 1, 1, 1, 1];

const MAX_AVG_VARIANCE: f32 = 0.48;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

/// Runs covered by an EAN-13 symbol: guard, 6 digits, middle, 6 digits, guard
const EAN13_RUNS: usize = 3 + 6 * 4 + 5 + 6 * 4 + 3;
const EAN8_RUNS: usize = 3 + 4 * 4 + 5 + 4 * 4 + 3;

pub(super) fn g_pattern(digit: usize) -> [u32; 4] {
    let mut pattern = L_PATTERNS[digit];
    pattern.reverse();
    pattern
}

fn matches(counters: &[u32], pattern: &[u32]) -> bool {
    pattern_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE) <= MAX_AVG_VARIANCE
}

/// Best digit for four element widths, with whether it used G parity
fn decode_digit(counters: &[u32], allow_even: bool) -> Option<(u8, bool)> {
    let mut best: Option<(u8, bool, f32)> = None;
    for digit in 0..10 {
        let mut candidates = vec![(L_PATTERNS[digit], false)];
        if allow_even {
            candidates.push((g_pattern(digit), true));
        }
        for (pattern, even) in candidates {
            let variance = pattern_variance(counters, &pattern, MAX_INDIVIDUAL_VARIANCE);
            if variance <= MAX_AVG_VARIANCE && best.is_none_or(|(_, _, v)| variance < v) {
                best = Some((digit as u8, even, variance));
            }
        }
    }
    best.map(|(digit, even, _)| (digit, even))
}

/// Verify the trailing check digit: weights alternate 3, 1 from the right
pub(super) fn checksum_ok(digits: &[u8]) -> bool {
    let Some((&check, body)) = digits.split_last() else {
        return false;
    };
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    (10 - sum % 10) % 10 == check as u32
}

/// Module width of a guard, rejecting digits far off that size
fn consistent(counters: &[u32], module: f32) -> bool {
    let digit_module = counters.iter().sum::<u32>() as f32 / 7.0;
    digit_module > module * 0.5 && digit_module < module * 2.0
}

/// Decode the digits of one half; returns digits and the parity mask
fn decode_half(
    widths: &[u32],
    from: usize,
    digits: usize,
    allow_even: bool,
    module: f32,
) -> Option<(Vec<u8>, u8)> {
    let mut out = Vec::with_capacity(digits);
    let mut parity = 0u8;
    for k in 0..digits {
        let counters = &widths[from + k * 4..from + k * 4 + 4];
        if !consistent(counters, module) {
            return None;
        }
        let (digit, even) = decode_digit(counters, allow_even)?;
        out.push(digit);
        parity = (parity << 1) | even as u8;
    }
    Some((out, parity))
}

/// Decode the common guard / half / middle / half / guard layout
fn decode_symbol(
    widths: &[u32],
    start: usize,
    half: usize,
    leading_parity: bool,
) -> Option<(Vec<u8>, u8, f32)> {
    let runs = 3 + half * 4 + 5 + half * 4 + 3;
    if widths.len() < start + runs {
        return None;
    }

    let guard = &widths[start..start + 3];
    if !matches(guard, &GUARD) {
        return None;
    }
    let module = guard.iter().sum::<u32>() as f32 / 3.0;

    let left_from = start + 3;
    let (left, parity) = decode_half(widths, left_from, half, leading_parity, module)?;

    let middle_from = left_from + half * 4;
    if !matches(&widths[middle_from..middle_from + 5], &MIDDLE_GUARD) {
        return None;
    }

    let right_from = middle_from + 5;
    let (right, _) = decode_half(widths, right_from, half, false, module)?;

    let end_from = right_from + half * 4;
    if !matches(&widths[end_from..end_from + 3], &GUARD) {
        return None;
    }

    let total: u32 = widths[start..start + runs].iter().sum();
    let modules = (3 + half * 7 + 5 + half * 7 + 3) as f32;

    let mut digits = left;
    digits.extend(right);
    Some((digits, parity, total as f32 / modules))
}

fn digits_to_string(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

/// Decode an EAN-13 (or UPC-A) whose start guard begins at run `start`
pub(super) fn decode_ean13(widths: &[u32], start: usize) -> Option<Decoded> {
    let (digits, parity, module) = decode_symbol(widths, start, 6, true)?;
    let first = FIRST_DIGIT_PARITY.iter().position(|&p| p == parity)? as u8;

    let mut all = Vec::with_capacity(13);
    all.push(first);
    all.extend(digits);
    if !checksum_ok(&all) {
        return None;
    }

    let (format, text) = if first == 0 {
        (BarcodeFormat::UpcA, digits_to_string(&all[1..]))
    } else {
        (BarcodeFormat::Ean13, digits_to_string(&all))
    };

    Some(Decoded {
        format,
        text,
        runs: EAN13_RUNS,
        module,
    })
}

/// Decode an EAN-8 whose start guard begins at run `start`
pub(super) fn decode_ean8(widths: &[u32], start: usize) -> Option<Decoded> {
    let (digits, _, module) = decode_symbol(widths, start, 4, false)?;
    if !checksum_ok(&digits) {
        return None;
    }
    Some(Decoded {
        format: BarcodeFormat::Ean8,
        text: digits_to_string(&digits),
        runs: EAN8_RUNS,
        module,
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{ean8_widths, ean13_widths, scaled};
    use super::*;

    #[test]
    fn test_checksum() {
        assert!(checksum_ok(&[4, 0, 0, 6, 3, 8, 1, 3, 3, 3, 9, 3, 1]));
        assert!(!checksum_ok(&[4, 0, 0, 6, 3, 8, 1, 3, 3, 3, 9, 3, 2]));
        assert!(checksum_ok(&[9, 6, 3, 8, 5, 0, 7, 4]));
        assert!(!checksum_ok(&[]));
    }

    #[test]
    fn test_parity_table_is_unique() {
        let mut seen = FIRST_DIGIT_PARITY.to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_decode_ean13_widths() {
        let widths = scaled(&ean13_widths("4006381333931"), 3);
        let decoded = decode_ean13(&widths, 0).unwrap();
        assert_eq!(decoded.format, BarcodeFormat::Ean13);
        assert_eq!(decoded.text, "4006381333931");
        assert_eq!(decoded.runs, widths.len());
        assert!((decoded.module - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_leading_zero_is_upca() {
        let widths = ean13_widths("0036000291452");
        let decoded = decode_ean13(&widths, 0).unwrap();
        assert_eq!(decoded.format, BarcodeFormat::UpcA);
        assert_eq!(decoded.text, "036000291452");
    }

    #[test]
    fn test_decode_ean8_widths() {
        let widths = scaled(&ean8_widths("96385074"), 2);
        let decoded = decode_ean8(&widths, 0).unwrap();
        assert_eq!(decoded.text, "96385074");
        // EAN-8 runs are too short for an EAN-13
        assert!(decode_ean13(&widths, 0).is_none());
    }

    #[test]
    fn test_bad_check_digit_rejected() {
        // Encode with a wrong check digit; the bars are well formed
        let widths = ean13_widths("4006381333932");
        assert!(decode_ean13(&widths, 0).is_none());
    }

    #[test]
    fn test_reversed_symbol_reads_as_invalid() {
        let mut widths = ean13_widths("4006381333931");
        widths.reverse();
        // Read backwards the right half looks like G parity, which no
        // leading digit produces in the first position
        assert!(decode_ean13(&widths, 0).is_none());
    }
}
