// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Lossless JPEG (ITU T.81 annex H) decompressor for raw sensor frames.
//!
//! MotionCam and MLV style recordings embed 12/14-bit Bayer data as a
//! restricted LJPEG stream: SOI, one DHT marker set, one SOF3 frame
//! header, SOS, entropy data, EOI. The decoder reconstructs each sample
//! from a predicted neighbor value plus a Huffman coded difference.

use log::debug;
use thiserror::Error;

use crate::bits::Endian;
use crate::decompressors::ljpeg::huffman::{HuffTable, HuffmanError};
use crate::pumps::{BitPumpJpeg, ByteStream, StreamError};

pub mod huffman;

/// Widest supported row in samples (components included).
const MAX_ROW_SAMPLES: usize = 1 << 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LjpegError {
  #[error("Corrupt stream: {}", _0)]
  CorruptStream(String),

  #[error("Unsupported stream: {}", _0)]
  Unsupported(String),

  #[error("Row of {} samples exceeds decoder limits", _0)]
  TooWide(usize),

  #[error("Cannot allocate decode buffer for {}x{} samples", _0, _1)]
  NoMemory(usize, usize),
}

impl From<StreamError> for LjpegError {
  fn from(err: StreamError) -> Self {
    Self::CorruptStream(err.to_string())
  }
}

impl From<HuffmanError> for LjpegError {
  fn from(err: HuffmanError) -> Self {
    Self::CorruptStream(err.to_string())
  }
}

type Result<T> = std::result::Result<T, LjpegError>;

enum Marker {
  Stuff = 0x00,
  Sof3 = 0xc3, // lossless frame header
  Dht = 0xc4,  // huffman tables
  Soi = 0xd8,  // start of image
  Eoi = 0xd9,  // end of image
  Sos = 0xda,  // start of scan
  Dqt = 0xdb,  // quantization tables, never valid in lossless
  Fill = 0xff,
}

fn m(marker: Marker) -> u8 {
  marker as u8
}

#[derive(Debug, Copy, Clone)]
struct ScanComponent {
  /// Identifier from the SOF marker (0..255).
  id: usize,
  /// Huffman table selector (0..3), read from the SOS marker.
  dc_tbl_num: usize,
}

#[derive(Debug, Clone)]
struct SofInfo {
  width: usize,
  height: usize,
  cps: usize,
  precision: usize,
  components: Vec<ScanComponent>,
}

impl SofInfo {
  fn empty() -> SofInfo {
    SofInfo {
      width: 0,
      height: 0,
      cps: 0,
      precision: 0,
      components: Vec::new(),
    }
  }

  fn parse_sof(&mut self, input: &mut ByteStream) -> Result<()> {
    let header_length = input.get_u16()? as usize;
    self.precision = input.get_u8()? as usize;
    self.height = input.get_u16()? as usize;
    self.width = input.get_u16()? as usize;
    self.cps = input.get_u8()? as usize;

    if self.precision > 16 || self.precision < 2 {
      return Err(LjpegError::Unsupported(format!("sample precision {}", self.precision)));
    }
    if self.cps > 4 || self.cps < 1 {
      return Err(LjpegError::Unsupported(format!("{} components", self.cps)));
    }
    if header_length != 8 + self.cps * 3 {
      return Err(LjpegError::CorruptStream("SOF header size mismatch".into()));
    }

    for _ in 0..self.cps {
      let id = input.get_u8()? as usize;
      input.get_u8()?; // Subsampling, always 1x1 for raw streams
      input.get_u8()?; // Quantization table, unused in lossless
      self.components.push(ScanComponent { id, dc_tbl_num: 0 });
    }
    Ok(())
  }

  /// Returns the predictor selector and point transform.
  fn parse_sos(&mut self, input: &mut ByteStream) -> Result<(usize, usize)> {
    if self.width == 0 {
      return Err(LjpegError::CorruptStream("SOS before SOF".into()));
    }
    input.get_u16()?; // Skip header length
    let soscps = input.get_u8()? as usize;
    if self.cps != soscps {
      return Err(LjpegError::CorruptStream("component count mismatch in SOS".into()));
    }
    for _ in 0..self.cps {
      let readcs = input.get_u8()? as usize;
      let component = match self.components.iter_mut().find(|c| c.id == readcs) {
        Some(val) => val,
        None => return Err(LjpegError::CorruptStream(format!("invalid component selector {}", readcs))),
      };
      let td = (input.get_u8()? as usize) >> 4;
      if td > 3 {
        return Err(LjpegError::CorruptStream(format!("invalid Huffman table selection {}", td)));
      }
      component.dc_tbl_num = td;
    }
    let pred = input.get_u8()? as usize;
    input.get_u8()?; // Se + Ah, unused in lossless mode
    let pt = (input.get_u8()? as usize) & 0xf; // Point transform
    Ok((pred, pt))
  }
}

/// Decoder handle for one LJPEG stream.
///
/// Construction parses all markers up to SOS and builds the Huffman
/// tables; `decode()` then runs the sequential differential
/// reconstruction. The handle borrows the input buffer and must not
/// outlive it.
#[derive(Debug)]
pub struct LjpegDecompressor<'a> {
  buffer: &'a [u8],
  sof: SofInfo,
  predictor: usize,
  point_transform: usize,
  dhts: Vec<HuffTable>,
}

impl<'a> LjpegDecompressor<'a> {
  pub fn new(src: &'a [u8]) -> Result<LjpegDecompressor<'a>> {
    let mut input = ByteStream::new(src, Endian::Big);
    if LjpegDecompressor::get_next_marker(&mut input, false)? != m(Marker::Soi) {
      return Err(LjpegError::CorruptStream("stream does not start with SOI".into()));
    }

    let mut sof = SofInfo::empty();
    let mut dht_init = [false; 4];
    let mut dht_bits = [[0_u32; 17]; 4];
    let mut dht_huffval = [[0_u32; 256]; 4];
    let pred;
    let pt;
    loop {
      let marker = LjpegDecompressor::get_next_marker(&mut input, true)?;
      if marker == m(Marker::Sof3) {
        sof.parse_sof(&mut input)?;
      } else if marker == m(Marker::Dht) {
        LjpegDecompressor::parse_dht(&mut input, &mut dht_init, &mut dht_bits, &mut dht_huffval)?;
      } else if marker == m(Marker::Sos) {
        // Start of the actual stream, we can decode after this
        let (a, b) = sof.parse_sos(&mut input)?;
        pred = a;
        pt = b;
        break;
      } else if marker == m(Marker::Eoi) {
        return Err(LjpegError::CorruptStream("reached EOI before SOS".into()));
      } else if marker == m(Marker::Dqt) {
        return Err(LjpegError::CorruptStream("found DQT, not a lossless stream".into()));
      }
    }

    if sof.width * sof.cps > MAX_ROW_SAMPLES {
      return Err(LjpegError::TooWide(sof.width * sof.cps));
    }

    let mut dhts = Vec::new();
    for i in 0..4 {
      dhts.push(if dht_init[i] { HuffTable::new(dht_bits[i], dht_huffval[i])? } else { HuffTable::empty() });
    }

    debug!(
      "ljpeg: {}x{} cps {} prec {} pred {} pt {}",
      sof.width, sof.height, sof.cps, sof.precision, pred, pt
    );

    let offset = input.get_pos();
    Ok(LjpegDecompressor {
      buffer: &src[offset..],
      sof,
      predictor: pred,
      point_transform: pt,
      dhts,
    })
  }

  fn get_next_marker(input: &mut ByteStream, allowskip: bool) -> Result<u8> {
    if !allowskip {
      if input.get_u8()? != 0xff {
        return Err(LjpegError::CorruptStream("expected marker not found".into()));
      }
      let mark = input.get_u8()?;
      if mark == m(Marker::Stuff) || mark == m(Marker::Fill) {
        return Err(LjpegError::CorruptStream("expected marker but found stuff or fill".into()));
      }
      return Ok(mark);
    }
    input.skip_to_marker()?;
    Ok(input.get_u8()?)
  }

  fn parse_dht(input: &mut ByteStream, init: &mut [bool; 4], bits: &mut [[u32; 17]; 4], huffval: &mut [[u32; 256]; 4]) -> Result<()> {
    let mut length = (input.get_u16()? as usize).saturating_sub(2);

    while length > 0 {
      let b = input.get_u8()? as usize;
      let tc = b >> 4;
      let th = b & 0xf;

      if tc != 0 {
        return Err(LjpegError::CorruptStream("unsupported table class in DHT".into()));
      }
      if th > 3 {
        return Err(LjpegError::CorruptStream(format!("unsupported table id {}", th)));
      }

      let mut acc: usize = 0;
      for i in 0..16 {
        bits[th][i + 1] = input.get_u8()? as u32;
        acc += bits[th][i + 1] as usize;
      }
      bits[th][0] = 0;

      if acc > 256 {
        return Err(LjpegError::CorruptStream("invalid DHT table".into()));
      }
      if length < 1 + 16 + acc {
        return Err(LjpegError::CorruptStream("invalid DHT table length".into()));
      }

      for i in 0..acc {
        huffval[th][i] = input.get_u8()? as u32;
      }

      init[th] = true;
      length -= 1 + 16 + acc;
    }

    Ok(())
  }

  /// Decode the stream into `out`.
  ///
  /// `x` is the first output column (in samples), `stripwidth` the
  /// distance between output rows (may exceed `width` when rows carry
  /// padding), `width` the wanted output width in samples. Encoded
  /// columns beyond `width` are decoded and thrown away. Reconstructed
  /// values are not clamped to the declared precision, matching the
  /// reference decoder.
  pub fn decode(&self, out: &mut [u16], x: usize, stripwidth: usize, width: usize, height: usize) -> Result<()> {
    let ncomp = self.components();
    if width == 0 || height == 0 {
      return Err(LjpegError::Unsupported("empty output geometry".into()));
    }
    if self.sof.width * ncomp < width || self.sof.height < height {
      return Err(LjpegError::Unsupported(format!(
        "trying to decode {}x{} into {}x{}",
        self.sof.width, self.sof.height, width, height
      )));
    }
    if out.len() < (height - 1) * stripwidth + x + width {
      return Err(LjpegError::NoMemory(width, height));
    }
    if !(1..=7).contains(&self.predictor) {
      return Err(LjpegError::Unsupported(format!("predictor {}", self.predictor)));
    }

    let htable = |index: usize| -> &HuffTable { &self.dhts[self.sof.components[index].dc_tbl_num] };
    let mut pump = BitPumpJpeg::new(self.buffer);
    let base_prediction = 1 << (self.sof.precision - self.point_transform - 1);

    // First pixel of the image predicts from the bit depth midpoint
    for c in 0..ncomp {
      out[x + c] = (base_prediction + htable(c).huff_decode(&mut pump)?) as u16;
    }

    let skip_x = self.sof.width - width / ncomp;

    for row in 0..height {
      let startcol = if row == 0 { x + ncomp } else { x }; // skip first pixel in first row
      for col in (startcol..(width + x)).step_by(ncomp) {
        for c in 0..ncomp {
          let p: i32 = if col == x {
            // Start of line predicts from the start of the previous line
            out[(row - 1) * stripwidth + x + c] as i32
          } else {
            match (row, self.predictor) {
              (0, _) | (_, 1) => out[row * stripwidth + (col - ncomp) + c] as i32,
              (_, 2) => out[(row - 1) * stripwidth + col + c] as i32,
              (_, 3) => out[(row - 1) * stripwidth + (col - ncomp) + c] as i32,
              (_, 4) => {
                let a = out[row * stripwidth + (col - ncomp) + c] as i32;
                let b = out[(row - 1) * stripwidth + col + c] as i32;
                let cc = out[(row - 1) * stripwidth + (col - ncomp) + c] as i32;
                a + b - cc
              }
              (_, 5) => {
                let a = out[row * stripwidth + (col - ncomp) + c] as i32;
                let b = out[(row - 1) * stripwidth + col + c] as i32;
                let cc = out[(row - 1) * stripwidth + (col - ncomp) + c] as i32;
                a + ((b - cc) >> 1)
              }
              (_, 6) => {
                let a = out[row * stripwidth + (col - ncomp) + c] as i32;
                let b = out[(row - 1) * stripwidth + col + c] as i32;
                let cc = out[(row - 1) * stripwidth + (col - ncomp) + c] as i32;
                b + ((a - cc) >> 1)
              }
              (_, 7) => {
                let a = out[row * stripwidth + (col - ncomp) + c] as i32;
                let b = out[(row - 1) * stripwidth + col + c] as i32;
                (a + b) >> 1
              }
              _ => unreachable!("predictor validated above"),
            }
          };

          let diff = htable(c).huff_decode(&mut pump)?;
          out[row * stripwidth + col + c] = (p + diff) as u16;
        }
      }
      for _ in 0..skip_x {
        for c in 0..ncomp {
          // Skip extra encoded differences if the frame is wider than the output
          htable(c).huff_decode(&mut pump)?;
        }
      }
    }

    Ok(())
  }

  /// Decode the full frame into a freshly allocated buffer.
  pub fn decode_frame(&self) -> Result<Vec<u16>> {
    let width = self.width();
    let height = self.height();
    let size = width.checked_mul(height).ok_or(LjpegError::NoMemory(width, height))?;
    let mut out = vec![0_u16; size];
    self.decode(&mut out, 0, width, width, height)?;
    Ok(out)
  }

  /// Output width in samples, components interleaved.
  pub fn width(&self) -> usize {
    self.sof.width * self.sof.cps
  }

  pub fn height(&self) -> usize {
    self.sof.height
  }

  pub fn precision(&self) -> usize {
    self.sof.precision
  }

  pub fn components(&self) -> usize {
    self.sof.components.len()
  }
}
