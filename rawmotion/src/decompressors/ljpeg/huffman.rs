// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Huffman decoding for the lossless JPEG bitstream.
//!
//! The table is flattened into a direct lookup array indexed by the next
//! `maxbits` bits of the stream, so a single peek resolves code length and
//! difference category at once. Canonical code construction guarantees
//! that assigned prefixes never overlap; prefixes not covered by any code
//! stay marked invalid and surface as a corrupt stream during decode.

use thiserror::Error;

use crate::pumps::BitPump;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HuffmanError {
  #[error("Huffman table has no codes")]
  Empty,

  #[error("Huffman code count overflows length {}", _0)]
  Overfull(usize),

  #[error("Invalid difference category {}", _0)]
  BadCategory(u32),

  #[error("Bit prefix {:b} does not resolve to any code", _0)]
  InvalidPrefix(u32),
}

type Result<T> = std::result::Result<T, HuffmanError>;

/// Largest supported code length, fixed by the JPEG DHT layout.
const MAX_CODE_LEN: usize = 16;

/// Direct-lookup Huffman table for difference categories 0..=16.
#[derive(Debug, Clone)]
pub struct HuffTable {
  /// Width of the lookup prefix, equal to the longest code length.
  maxbits: u32,
  /// One entry per possible prefix: `len << 16 | category`, 0 = invalid.
  lookup: Vec<u32>,
  initialized: bool,
}

impl HuffTable {
  /// Placeholder for table slots never referenced by a scan component.
  pub fn empty() -> HuffTable {
    HuffTable {
      maxbits: 0,
      lookup: Vec::new(),
      initialized: false,
    }
  }

  /// Build the lookup table from the DHT arrays: `bits[l]` is the number
  /// of codes with length `l`, `huffval` lists the categories in
  /// ascending code length order.
  pub fn new(bits: [u32; 17], huffval: [u32; 256]) -> Result<HuffTable> {
    let maxbits = (1..=MAX_CODE_LEN).rev().find(|&len| bits[len] > 0).ok_or(HuffmanError::Empty)?;

    let mut lookup = vec![0_u32; 1 << maxbits];
    let mut code: u32 = 0;
    let mut sym: usize = 0;
    for len in 1..=maxbits {
      for _ in 0..bits[len] {
        if code >= (1 << len) {
          return Err(HuffmanError::Overfull(len));
        }
        let category = huffval[sym];
        sym += 1;
        if category > 16 {
          return Err(HuffmanError::BadCategory(category));
        }
        // A code of length len owns all prefixes that start with it
        let first = (code << (maxbits - len)) as usize;
        let span = 1_usize << (maxbits - len);
        for slot in lookup[first..first + span].iter_mut() {
          debug_assert_eq!(*slot, 0);
          *slot = ((len as u32) << 16) | category;
        }
        code += 1;
      }
      code <<= 1;
    }

    Ok(HuffTable {
      maxbits: maxbits as u32,
      lookup,
      initialized: true,
    })
  }

  pub fn initialized(&self) -> bool {
    self.initialized
  }

  /// Decode the next difference category and consume its code bits.
  #[inline(always)]
  pub fn huff_len(&self, pump: &mut impl BitPump) -> Result<u32> {
    if !self.initialized {
      return Err(HuffmanError::Empty);
    }
    let prefix = pump.peek_bits(self.maxbits);
    let entry = self.lookup[prefix as usize];
    if entry == 0 {
      return Err(HuffmanError::InvalidPrefix(prefix));
    }
    pump.consume_bits(entry >> 16);
    Ok(entry & 0xffff)
  }

  /// Read the magnitude bits for `category` and apply the lossless JPEG
  /// sign extension: values below 2^(cat-1) encode negative differences.
  #[inline(always)]
  pub fn huff_diff(&self, pump: &mut impl BitPump, category: u32) -> i32 {
    match category {
      0 => 0,
      16 => -32768,
      _ => {
        let raw = pump.get_bits(category) as i32;
        if raw < (1 << (category - 1)) { raw - (1 << category) + 1 } else { raw }
      }
    }
  }

  /// Decode one full difference value from the stream.
  #[inline(always)]
  pub fn huff_decode(&self, pump: &mut impl BitPump) -> Result<i32> {
    let category = self.huff_len(pump)?;
    Ok(self.huff_diff(pump, category))
  }

  #[cfg(test)]
  pub(crate) fn prefix_width(&self) -> u32 {
    self.maxbits
  }

  #[cfg(test)]
  pub(crate) fn resolve(&self, prefix: u32) -> Option<(u32, u32)> {
    let entry = self.lookup[prefix as usize];
    if entry == 0 { None } else { Some((entry >> 16, entry & 0xffff)) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pumps::BitPumpJpeg;

  fn dht(lengths: &[(u32, u32)]) -> ([u32; 17], [u32; 256]) {
    // lengths: list of (code length, category) in canonical order
    let mut bits = [0_u32; 17];
    let mut huffval = [0_u32; 256];
    for (i, (len, cat)) in lengths.iter().enumerate() {
      bits[*len as usize] += 1;
      huffval[i] = *cat;
    }
    (bits, huffval)
  }

  #[test]
  fn complete_table_covers_every_prefix() {
    // Complete code: lengths 1,2,3,3 exhaust the prefix space
    let (bits, huffval) = dht(&[(1, 0), (2, 1), (3, 2), (3, 3)]);
    let tbl = HuffTable::new(bits, huffval).unwrap();
    let width = tbl.prefix_width();
    assert_eq!(width, 3);
    let mut seen = [0_u32; 4];
    for prefix in 0..(1 << width) {
      let (_, cat) = tbl.resolve(prefix).expect("every prefix must resolve");
      seen[cat as usize] += 1;
    }
    // Each code owns exactly 2^(maxbits-len) prefixes, no overlaps
    assert_eq!(seen, [4, 2, 1, 1]);
  }

  #[test]
  fn incomplete_table_rejects_unassigned_prefix() {
    // Single 2-bit code, prefixes 01,10,11 stay invalid
    let (bits, huffval) = dht(&[(2, 5)]);
    let tbl = HuffTable::new(bits, huffval).unwrap();
    assert!(tbl.resolve(0b00).is_some());
    assert!(tbl.resolve(0b11).is_none());
  }

  #[test]
  fn overfull_table_is_rejected() {
    let (bits, huffval) = dht(&[(1, 0), (1, 1), (1, 2)]);
    assert!(matches!(HuffTable::new(bits, huffval), Err(HuffmanError::Overfull(1))));
  }

  #[test]
  fn sign_extension() {
    let (bits, huffval) = dht(&[(1, 0), (2, 1), (3, 2), (3, 3)]);
    let tbl = HuffTable::new(bits, huffval).unwrap();
    // Category 2: raw 00 -> -3, 01 -> -2, 10 -> 2, 11 -> 3
    let buf = [0b110_00_110, 0b01_110_10_1, 0b10_11_0000];
    let mut pump = BitPumpJpeg::new(&buf);
    assert_eq!(tbl.huff_decode(&mut pump).unwrap(), -3);
    assert_eq!(tbl.huff_decode(&mut pump).unwrap(), -2);
    assert_eq!(tbl.huff_decode(&mut pump).unwrap(), 2);
    assert_eq!(tbl.huff_decode(&mut pump).unwrap(), 3);
  }
}
