// SPDX-License-Identifier: GPL-3.0-only

//! Code 39
//!
//! Characters are five bars and four spaces, three of them wide, separated
//! by a narrow gap. Symbols start and end with `*`. Wide elements are told
//! apart from narrow ones per character, so the wide to narrow ratio may
//! vary across the symbol.

use super::Decoded;
use crate::barcode::types::BarcodeFormat;

pub(super) const ALPHABET: &[u8; 43] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

/// Wide/narrow layout of each character, first element in bit 8
pub(super) const ENCODINGS: [u16; 43] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
    0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, // A-J
    0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
    0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, // U-Z
    0x085, 0x184, 0x0C4, 0x0A8, 0x0A2, 0x08A, 0x02A, // - . space $ / + %
];

pub(super) const ASTERISK: u16 = 0x094;

/// Smallest accepted ratio between wide and narrow elements
const MIN_WIDE_RATIO: f32 = 1.5;

/// Largest accepted inter-character gap, in narrow widths
const MAX_GAP_NARROW: f32 = 3.5;

/// Classify nine elements; returns the encoding and the narrow width
fn classify(counters: &[u32]) -> Option<(u16, f32)> {
    let mut sorted = counters.to_vec();
    sorted.sort_unstable();
    let narrow_max = sorted[5];
    let wide_min = sorted[6];
    if narrow_max == 0 || (wide_min as f32) < narrow_max as f32 * MIN_WIDE_RATIO {
        return None;
    }

    let encoding = counters
        .iter()
        .fold(0u16, |acc, &w| (acc << 1) | (w >= wide_min) as u16);
    let narrow = sorted[..6].iter().sum::<u32>() as f32 / 6.0;
    Some((encoding, narrow))
}

fn lookup(encoding: u16) -> Option<char> {
    ENCODINGS
        .iter()
        .position(|&e| e == encoding)
        .map(|i| char::from(ALPHABET[i]))
}

/// Decode a Code 39 symbol whose start `*` begins at run `start`
pub(super) fn decode(widths: &[u32], start: usize) -> Option<Decoded> {
    if widths.len() < start + 9 {
        return None;
    }
    let (encoding, narrow) = classify(&widths[start..start + 9])?;
    if encoding != ASTERISK {
        return None;
    }

    let mut text = String::new();
    let mut j = start + 9;
    loop {
        if j + 10 > widths.len() {
            return None;
        }
        if widths[j] as f32 > narrow * MAX_GAP_NARROW {
            return None;
        }
        let (encoding, _) = classify(&widths[j + 1..j + 10])?;
        j += 10;
        if encoding == ASTERISK {
            break;
        }
        text.push(lookup(encoding)?);
    }

    if text.is_empty() {
        return None;
    }
    Some(Decoded {
        format: BarcodeFormat::Code39,
        text,
        runs: j - start,
        module: narrow,
    })
}
