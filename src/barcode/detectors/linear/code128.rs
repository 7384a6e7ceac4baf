// SPDX-License-Identifier: GPL-3.0-only

//! Code 128
//!
//! Every symbol is three bars and three spaces spanning 11 modules; the stop
//! pattern adds a final bar for 13 modules. The start symbol selects code set
//! A, B or C, and the symbol before the stop is a modulo 103 checksum.

use super::{Decoded, pattern_variance};
use crate::barcode::types::BarcodeFormat;

/// Element widths of symbol values 0 to 105 (bar first)
#[rustfmt::skip]
pub(super) const PATTERNS: [[u32; 6]; 106] = [
    [2, 1, 2, 2, 2, 2], [2, 2, 2, 1, 2, 2], [2, 2, 2, 2, 2, 1], [1, 2, 1, 2, 2, 3], [1, 2, 1, 3, 2, 2],
    [1, 3, 1, 2, 2, 2], [1, 2, 2, 2, 1, 3], [1, 2, 2, 3, 1, 2], [1, 3, 2, 2, 1, 2], [2, 2, 1, 2, 1, 3],
    [2, 2, 1, 3, 1, 2], [2, 3, 1, 2, 1, 2], [1, 1, 2, 2, 3, 2], [1, 2, 2, 1, 3, 2], [1, 2, 2, 2, 3, 1],
    [1, 1, 3, 2, 2, 2], [1, 2, 3, 1, 2, 2], [1, 2, 3, 2, 2, 1], [2, 2, 3, 2, 1, 1], [2, 2, 1, 1, 3, 2],
    [2, 2, 1, 2, 3, 1], [2, 1, 3, 2, 1, 2], [2, 2, 3, 1, 1, 2], [3, 1, 2, 1, 3, 1], [3, 1, 1, 2, 2, 2],
    [3, 2, 1, 1, 2, 2], [3, 2, 1, 2, 2, 1], [3, 1, 2, 2, 1, 2], [3, 2, 2, 1, 1, 2], [3, 2, 2, 2, 1, 1],
    [2, 1, 2, 1, 2, 3], [2, 1, 2, 3, 2, 1], [2, 3, 2, 1, 2, 1], [1, 1, 1, 3, 2, 3], [1, 3, 1, 1, 2, 3],
    [1, 3, 1, 3, 2, 1], [1, 1, 2, 3, 1, 3], [1, 3, 2, 1, 1, 3], [1, 3, 2, 3, 1, 1], [2, 1, 1, 3, 1, 3],
    [2, 3, 1, 1, 1, 3], [2, 3, 1, 3, 1, 1], [1, 1, 2, 1, 3, 3], [1, 1, 2, 3, 3, 1], [1, 3, 2, 1, 3, 1],
    [1, 1, 3, 1, 2, 3], [1, 1, 3, 3, 2, 1], [1, 3, 3, 1, 2, 1], [3, 1, 3, 1, 2, 1], [2, 1, 1, 3, 3, 1],
    [2, 3, 1, 1, 3, 1], [2, 1, 3, 1, 1, 3], [2, 1, 3, 3, 1, 1], [2, 1, 3, 1, 3, 1], [3, 1, 1, 1, 2, 3],
    [3, 1, 1, 3, 2, 1], [3, 3, 1, 1, 2, 1], [3, 1, 2, 1, 1, 3], [3, 1, 2, 3, 1, 1], [3, 3, 2, 1, 1, 1],
    [3, 1, 4, 1, 1, 1], [2, 2, 1, 4, 1, 1], [4, 3, 1, 1, 1, 1], [1, 1, 1, 2, 2, 4], [1, 1, 1, 4, 2, 2],
    [1, 2, 1, 1, 2, 4], [1, 2, 1, 4, 2, 1], [1, 4, 1, 1, 2, 2], [1, 4, 1, 2, 2, 1], [1, 1, 2, 2, 1, 4],
    [1, 1, 2, 4, 1, 2], [1, 2, 2, 1, 1, 4], [1, 2, 2, 4, 1, 1], [1, 4, 2, 1, 1, 2], [1, 4, 2, 2, 1, 1],
    [2, 4, 1, 2, 1, 1], [2, 2, 1, 1, 1, 4], [4, 1, 3, 1, 1, 1], [2, 4, 1, 1, 1, 2], [1, 3, 4, 1, 1, 1],
    [1, 1, 1, 2, 4, 2], [1, 2, 1, 1, 4, 2], [1, 2, 1, 2, 4, 1], [1, 1, 4, 2, 1, 2], [1, 2, 4, 1, 1, 2],
    [1, 2, 4, 2, 1, 1], [4, 1, 1, 2, 1, 2], [4, 2, 1, 1, 1, 2], [4, 2, 1, 2, 1, 1], [2, 1, 2, 1, 4, 1],
    [2, 1, 4, 1, 2, 1], [4, 1, 2, 1, 2, 1], [1, 1, 1, 1, 4, 3], [1, 1, 1, 3, 4, 1], [1, 3, 1, 1, 4, 1],
    [1, 1, 4, 1, 1, 3], [1, 1, 4, 3, 1, 1], [4, 1, 1, 1, 1, 3], [4, 1, 1, 3, 1, 1], [1, 1, 3, 1, 4, 1],
    [1, 1, 4, 1, 3, 1], [3, 1, 1, 1, 4, 1], [4, 1, 1, 1, 3, 1], [2, 1, 1, 4, 1, 2], [2, 1, 1, 2, 1, 4],
    [2, 1, 1, 2, 3, 2],
];

pub(super) const STOP: [u32; 7] = [2, 3, 3, 1, 1, 1, 2];

pub(super) const START_A: usize = 103;
pub(super) const START_B: usize = 104;
pub(super) const START_C: usize = 105;

const SHIFT: usize = 98;
const CODE_C: usize = 99;
const FNC1: usize = 102;

/// Group separator emitted for FNC1 inside the data
const GS: char = '\u{1d}';

const MAX_AVG_VARIANCE: f32 = 0.25;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
    C,
}

/// Best symbol value in `candidates` for six element widths
fn match_symbol(counters: &[u32], candidates: std::ops::RangeInclusive<usize>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for value in candidates {
        let variance = pattern_variance(counters, &PATTERNS[value], MAX_INDIVIDUAL_VARIANCE);
        if variance <= MAX_AVG_VARIANCE && best.is_none_or(|(_, v)| variance < v) {
            best = Some((value, variance));
        }
    }
    best.map(|(value, _)| value)
}

fn is_stop(counters: &[u32]) -> bool {
    pattern_variance(counters, &STOP, MAX_INDIVIDUAL_VARIANCE) <= MAX_AVG_VARIANCE
}

/// Checksum over the start value and position weighted data values
pub(super) fn checksum(values: &[usize]) -> usize {
    let Some((&start, data)) = values.split_first() else {
        return 0;
    };
    let weighted: usize = data.iter().enumerate().map(|(i, &v)| (i + 1) * v).sum();
    (start + weighted) % 103
}

/// Turn symbol values (start, data, checksum) into text
fn values_to_text(values: &[usize]) -> Option<String> {
    let mut set = match values.first()? {
        &START_A => CodeSet::A,
        &START_B => CodeSet::B,
        &START_C => CodeSet::C,
        _ => return None,
    };
    let data = &values[1..values.len().saturating_sub(1)];

    let mut text = String::new();
    let mut shifted: Option<CodeSet> = None;
    for (position, &value) in data.iter().enumerate() {
        let current = shifted.take().unwrap_or(set);

        if value == FNC1 {
            // A leading FNC1 only marks GS1 data
            if position > 0 {
                text.push(GS);
            }
            continue;
        }

        match current {
            CodeSet::C => match value {
                0..=99 => text.push_str(&format!("{:02}", value)),
                100 => set = CodeSet::B,
                101 => set = CodeSet::A,
                _ => return None,
            },
            CodeSet::A => match value {
                0..=63 => text.push(char::from(value as u8 + b' ')),
                64..=95 => text.push(char::from(value as u8 - 64)),
                SHIFT => shifted = Some(CodeSet::B),
                CODE_C => set = CodeSet::C,
                100 => set = CodeSet::B,
                // FNC2, FNC3 and FNC4 carry no text
                96 | 97 | 101 => {}
                _ => return None,
            },
            CodeSet::B => match value {
                0..=95 => text.push(char::from(value as u8 + b' ')),
                SHIFT => shifted = Some(CodeSet::A),
                CODE_C => set = CodeSet::C,
                101 => set = CodeSet::A,
                96 | 97 | 100 => {}
                _ => return None,
            },
        }
    }
    Some(text)
}

/// Decode a Code 128 symbol whose start character begins at run `start`
pub(super) fn decode(widths: &[u32], start: usize) -> Option<Decoded> {
    if widths.len() < start + 6 {
        return None;
    }
    let start_value = match_symbol(&widths[start..start + 6], START_A..=START_C)?;

    let mut values = vec![start_value];
    let mut j = start + 6;
    loop {
        if j + 7 <= widths.len() && is_stop(&widths[j..j + 7]) {
            j += 7;
            break;
        }
        if j + 6 > widths.len() {
            return None;
        }
        let value = match_symbol(&widths[j..j + 6], 0..=FNC1)?;
        values.push(value);
        j += 6;
    }

    // Start, at least one data symbol and the checksum
    if values.len() < 3 {
        return None;
    }
    let (&check, body) = values.split_last()?;
    if checksum(body) != check {
        return None;
    }

    let text = values_to_text(&values)?;
    if text.is_empty() {
        return None;
    }

    let total: u32 = widths[start..j].iter().sum();
    let modules = (values.len() * 11 + 13) as f32;
    Some(Decoded {
        format: BarcodeFormat::Code128,
        text,
        runs: j - start,
        module: total as f32 / modules,
    })
}
