// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Loading and application of `.cube` color lookup tables.
//!
//! The text format carries either a 1D table (independent per-channel
//! curves) or a 3D lattice. 3D tables are applied with tetrahedral
//! interpolation by default: the lattice cube around a pixel is split
//! into six tetrahedra chosen by the ordering of the fractional offsets,
//! which preserves the neutral axis better than trilinear blending.

use std::path::Path;

use multiversion::multiversion;
use rayon::prelude::*;
use thiserror::Error;

use crate::imgop::RGB_CHANNELS;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CubeLutError {
  #[error("Invalid LUT header: {}", _0)]
  InvalidHeader(String),

  #[error("Invalid LUT file, line {}: {}", line, msg)]
  InvalidFile { line: usize, msg: String },

  #[error("LUT file ends after {} of {} table entries", got, expected)]
  FileTooShort { expected: usize, got: usize },

  #[error("LUT file has more than the declared {} table entries", _0)]
  FileTooLong(usize),

  #[error("I/O error: {}", _0)]
  Io(String),
}

type Result<T> = std::result::Result<T, CubeLutError>;

/// Interpolation mode for 3D tables. 1D tables always interpolate
/// linearly along each channel curve.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Interpolation {
  Trilinear,
  #[default]
  Tetrahedral,
}

/// A parsed `.cube` lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeLut {
  pub title: Option<String>,
  pub dimension: usize,
  pub is_3d: bool,
  pub domain_min: [f32; 3],
  pub domain_max: [f32; 3],
  /// `dimension * 3` floats for 1D, `dimension³ * 3` for 3D, red fastest.
  table: Vec<f32>,
}

impl CubeLut {
  pub fn load(path: impl AsRef<Path>) -> Result<CubeLut> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| CubeLutError::Io(e.to_string()))?;
    Self::parse(&text)
  }

  pub fn parse(text: &str) -> Result<CubeLut> {
    let mut title = None;
    let mut size: Option<(usize, bool)> = None;
    let mut domain_min = [0.0_f32; 3];
    let mut domain_max = [1.0_f32; 3];
    let mut table: Vec<f32> = Vec::new();
    let mut expected = 0;

    for (lineno, raw_line) in text.lines().enumerate() {
      let line = raw_line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let mut tokens = line.split_whitespace();
      let first = tokens.next().unwrap_or_default();
      match first {
        "TITLE" => {
          title = Some(line[5..].trim().trim_matches('"').to_string());
        }
        "LUT_1D_SIZE" | "LUT_3D_SIZE" => {
          if size.is_some() {
            return Err(CubeLutError::InvalidHeader("more than one size directive".into()));
          }
          let is_3d = first == "LUT_3D_SIZE";
          let dim: usize = tokens
            .next()
            .and_then(|tok| tok.parse().ok())
            .ok_or_else(|| CubeLutError::InvalidFile {
              line: lineno + 1,
              msg: format!("bad size argument in {}", first),
            })?;
          if dim < 2 {
            return Err(CubeLutError::InvalidHeader(format!("table dimension {} too small", dim)));
          }
          expected = if is_3d { dim * dim * dim * 3 } else { dim * 3 };
          size = Some((dim, is_3d));
          table.reserve_exact(expected);
        }
        "DOMAIN_MIN" | "DOMAIN_MAX" => {
          let mut vals = [0.0_f32; 3];
          for slot in vals.iter_mut() {
            *slot = tokens
              .next()
              .and_then(|tok| tok.parse().ok())
              .ok_or_else(|| CubeLutError::InvalidFile {
                line: lineno + 1,
                msg: format!("{} needs three floats", first),
              })?;
          }
          if first == "DOMAIN_MIN" {
            domain_min = vals;
          } else {
            domain_max = vals;
          }
        }
        _ => {
          // Has to be a sample triple
          if size.is_none() {
            return Err(CubeLutError::InvalidHeader("table data before size directive".into()));
          }
          let mut triple = [0.0_f32; 3];
          triple[0] = first.parse().map_err(|_| CubeLutError::InvalidFile {
            line: lineno + 1,
            msg: format!("unrecognized line: {}", line),
          })?;
          for slot in triple[1..].iter_mut() {
            *slot = tokens
              .next()
              .and_then(|tok| tok.parse().ok())
              .ok_or_else(|| CubeLutError::InvalidFile {
                line: lineno + 1,
                msg: "incomplete sample triple".into(),
              })?;
          }
          if tokens.next().is_some() {
            return Err(CubeLutError::InvalidFile {
              line: lineno + 1,
              msg: "trailing tokens after sample triple".into(),
            });
          }
          if table.len() + 3 > expected {
            return Err(CubeLutError::FileTooLong(expected / 3));
          }
          table.extend_from_slice(&triple);
        }
      }
    }

    let (dimension, is_3d) = size.ok_or_else(|| CubeLutError::InvalidHeader("missing size directive".into()))?;
    if table.len() < expected {
      return Err(CubeLutError::FileTooShort {
        expected: expected / 3,
        got: table.len() / 3,
      });
    }
    for c in 0..3 {
      if domain_max[c] <= domain_min[c] {
        return Err(CubeLutError::InvalidHeader(format!(
          "empty domain [{}, {}] for channel {}",
          domain_min[c], domain_max[c], c
        )));
      }
    }

    Ok(CubeLut {
      title,
      dimension,
      is_3d,
      domain_min,
      domain_max,
      table,
    })
  }

  /// Lattice sample, red index varies fastest in the table.
  #[inline(always)]
  fn at(&self, r: usize, g: usize, b: usize, c: usize) -> f32 {
    self.table[((b * self.dimension + g) * self.dimension + r) * RGB_CHANNELS + c]
  }

  /// Map a 16-bit value into lattice coordinates for channel `c`.
  #[inline(always)]
  fn lattice_pos(&self, v: u16, c: usize) -> f32 {
    let steps = (self.dimension - 1) as f32;
    let x = (v as f32 / 65536.0 - self.domain_min[c]) * steps / (self.domain_max[c] - self.domain_min[c]);
    x.clamp(0.0, steps)
  }

  /// Apply the table to an interleaved 16-bit RGB image.
  ///
  /// `intensity` runs 0..=100 and blends the transformed value against
  /// the original; 0 leaves the image bit-exact untouched.
  pub fn apply(&self, rgb: &mut [u16], width: usize, height: usize, mode: Interpolation, intensity: u8) {
    assert_eq!(rgb.len(), width * height * RGB_CHANNELS);
    let intensity = intensity.min(100);
    if intensity == 0 {
      return;
    }

    rgb.par_chunks_exact_mut(width * RGB_CHANNELS).for_each(|row| {
      apply_row(self, row, mode, intensity as f32 / 100.0);
    });
  }

  fn transform(&self, pix: [u16; 3], mode: Interpolation) -> [f32; 3] {
    if self.is_3d {
      match mode {
        Interpolation::Trilinear => self.trilinear(pix),
        Interpolation::Tetrahedral => self.tetrahedral(pix),
      }
    } else {
      let mut out = [0.0_f32; 3];
      for c in 0..RGB_CHANNELS {
        let x = self.lattice_pos(pix[c], c);
        let i0 = x.floor() as usize;
        let i1 = (i0 + 1).min(self.dimension - 1);
        let frac = x - i0 as f32;
        let lo = self.table[i0 * RGB_CHANNELS + c];
        let hi = self.table[i1 * RGB_CHANNELS + c];
        out[c] = lo + (hi - lo) * frac;
      }
      out
    }
  }

  fn trilinear(&self, pix: [u16; 3]) -> [f32; 3] {
    let (r0, g0, b0, r1, g1, b1, fr, fg, fb) = self.corners(pix);
    let mut out = [0.0_f32; 3];
    for c in 0..RGB_CHANNELS {
      let c00 = self.at(r0, g0, b0, c) * (1.0 - fr) + self.at(r1, g0, b0, c) * fr;
      let c01 = self.at(r0, g0, b1, c) * (1.0 - fr) + self.at(r1, g0, b1, c) * fr;
      let c10 = self.at(r0, g1, b0, c) * (1.0 - fr) + self.at(r1, g1, b0, c) * fr;
      let c11 = self.at(r0, g1, b1, c) * (1.0 - fr) + self.at(r1, g1, b1, c) * fr;
      let c0 = c00 * (1.0 - fg) + c10 * fg;
      let c1 = c01 * (1.0 - fg) + c11 * fg;
      out[c] = c0 * (1.0 - fb) + c1 * fb;
    }
    out
  }

  /// Tetrahedral interpolation: the unit cube is cut into six tetrahedra
  /// selected by the ordering of the fractional offsets; each output is
  /// a weighted sum of exactly four corners.
  fn tetrahedral(&self, pix: [u16; 3]) -> [f32; 3] {
    let (r0, g0, b0, r1, g1, b1, fr, fg, fb) = self.corners(pix);
    let mut out = [0.0_f32; 3];
    for c in 0..RGB_CHANNELS {
      let c000 = self.at(r0, g0, b0, c);
      let c111 = self.at(r1, g1, b1, c);
      out[c] = if fg >= fb && fb >= fr {
        // T1
        (1.0 - fg) * c000 + (fg - fb) * self.at(r0, g1, b0, c) + (fb - fr) * self.at(r0, g1, b1, c) + fr * c111
      } else if fb > fr && fr > fg {
        // T2
        (1.0 - fb) * c000 + (fb - fr) * self.at(r0, g0, b1, c) + (fr - fg) * self.at(r1, g0, b1, c) + fg * c111
      } else if fb > fg && fg >= fr {
        // T3
        (1.0 - fb) * c000 + (fb - fg) * self.at(r0, g0, b1, c) + (fg - fr) * self.at(r0, g1, b1, c) + fr * c111
      } else if fr >= fg && fg > fb {
        // T4
        (1.0 - fr) * c000 + (fr - fg) * self.at(r1, g0, b0, c) + (fg - fb) * self.at(r1, g1, b0, c) + fb * c111
      } else if fg > fr && fr >= fb {
        // T5
        (1.0 - fg) * c000 + (fg - fr) * self.at(r0, g1, b0, c) + (fr - fb) * self.at(r1, g1, b0, c) + fb * c111
      } else {
        // T6
        (1.0 - fr) * c000 + (fr - fb) * self.at(r1, g0, b0, c) + (fb - fg) * self.at(r1, g0, b1, c) + fg * c111
      };
    }
    out
  }

  #[inline(always)]
  #[allow(clippy::type_complexity)]
  fn corners(&self, pix: [u16; 3]) -> (usize, usize, usize, usize, usize, usize, f32, f32, f32) {
    let xr = self.lattice_pos(pix[0], 0);
    let xg = self.lattice_pos(pix[1], 1);
    let xb = self.lattice_pos(pix[2], 2);
    let r0 = xr.floor() as usize;
    let g0 = xg.floor() as usize;
    let b0 = xb.floor() as usize;
    let top = self.dimension - 1;
    let r1 = (r0 + 1).min(top);
    let g1 = (g0 + 1).min(top);
    let b1 = (b0 + 1).min(top);
    (r0, g0, b0, r1, g1, b1, xr - r0 as f32, xg - g0 as f32, xb - b0 as f32)
  }
}

#[multiversion(targets("x86_64+avx+avx2", "x86+sse", "aarch64+neon"))]
fn apply_row(lut: &CubeLut, row: &mut [u16], mode: Interpolation, blend: f32) {
  for pix in row.chunks_exact_mut(RGB_CHANNELS) {
    let orig = [pix[0], pix[1], pix[2]];
    let mapped = lut.transform(orig, mode);
    for c in 0..RGB_CHANNELS {
      let new = (mapped[c] * 65535.0).clamp(0.0, 65535.0);
      let mixed = orig[c] as f32 * (1.0 - blend) + new * blend;
      pix[c] = mixed.round().clamp(0.0, 65535.0) as u16;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn identity_3d(dim: usize) -> String {
    let mut text = format!("TITLE \"identity\"\nLUT_3D_SIZE {}\n", dim);
    let steps = (dim - 1) as f32;
    for b in 0..dim {
      for g in 0..dim {
        for r in 0..dim {
          text.push_str(&format!("{} {} {}\n", r as f32 / steps, g as f32 / steps, b as f32 / steps));
        }
      }
    }
    text
  }

  fn identity_1d(dim: usize) -> String {
    let mut text = format!("LUT_1D_SIZE {}\n", dim);
    let steps = (dim - 1) as f32;
    for i in 0..dim {
      let v = i as f32 / steps;
      text.push_str(&format!("{} {} {}\n", v, v, v));
    }
    text
  }

  #[test]
  fn parse_header_and_domain() {
    let text = "# comment\nTITLE \"test\"\nLUT_1D_SIZE 2\nDOMAIN_MIN 0.0 0.0 0.0\nDOMAIN_MAX 2.0 2.0 2.0\n0 0 0\n1 1 1\n";
    let lut = CubeLut::parse(text).unwrap();
    assert_eq!(lut.title.as_deref(), Some("test"));
    assert_eq!(lut.dimension, 2);
    assert!(!lut.is_3d);
    assert_eq!(lut.domain_max, [2.0, 2.0, 2.0]);
  }

  #[test]
  fn parse_rejects_junk_line() {
    let text = "LUT_1D_SIZE 2\n0 0 0\nnot a triple\n1 1 1\n";
    assert!(matches!(CubeLut::parse(text), Err(CubeLutError::InvalidFile { line: 3, .. })));
  }

  #[test]
  fn parse_rejects_short_and_long_tables() {
    let short = "LUT_1D_SIZE 3\n0 0 0\n1 1 1\n";
    assert!(matches!(CubeLut::parse(short), Err(CubeLutError::FileTooShort { expected: 3, got: 2 })));
    let long = "LUT_1D_SIZE 2\n0 0 0\n0.5 0.5 0.5\n1 1 1\n";
    assert!(matches!(CubeLut::parse(long), Err(CubeLutError::FileTooLong(2))));
  }

  #[test]
  fn parse_rejects_double_size() {
    let text = "LUT_1D_SIZE 2\nLUT_3D_SIZE 2\n";
    assert!(matches!(CubeLut::parse(text), Err(CubeLutError::InvalidHeader(_))));
  }

  #[test]
  fn zero_intensity_is_bit_exact_identity() {
    let lut = CubeLut::parse("LUT_1D_SIZE 2\n1 1 1\n0 0 0\n").unwrap(); // inverting curve
    let img: Vec<u16> = (0..30).map(|v| (v * 1000) as u16).collect();
    let mut work = img.clone();
    lut.apply(&mut work, 10, 1, Interpolation::Tetrahedral, 0);
    assert_eq!(work, img);
  }

  #[test]
  fn identity_lut_is_near_identity() {
    let lut = CubeLut::parse(&identity_3d(9)).unwrap();
    let img: Vec<u16> = (0..60).map(|v| (v * 1000) as u16).collect();
    for mode in [Interpolation::Trilinear, Interpolation::Tetrahedral] {
      let mut work = img.clone();
      lut.apply(&mut work, 10, 2, mode, 100);
      for (a, b) in work.iter().zip(img.iter()) {
        assert!((*a as i32 - *b as i32).abs() <= 2, "{} vs {} in {:?}", a, b, mode);
      }
    }
  }

  #[test]
  fn identity_1d_is_near_identity() {
    let lut = CubeLut::parse(&identity_1d(17)).unwrap();
    let img: Vec<u16> = (0..30).map(|v| (v * 2000) as u16).collect();
    let mut work = img.clone();
    lut.apply(&mut work, 10, 1, Interpolation::Trilinear, 100);
    for (a, b) in work.iter().zip(img.iter()) {
      assert!((*a as i32 - *b as i32).abs() <= 2, "{} vs {}", a, b);
    }
  }

  #[test]
  fn exact_lattice_point_returns_first_entry() {
    let mut text = identity_3d(3);
    // Repaint the origin entry with a distinctive color
    text = text.replacen("0 0 0\n", "0.25 0.5 0.75\n", 1);
    let lut = CubeLut::parse(&text).unwrap();
    for mode in [Interpolation::Trilinear, Interpolation::Tetrahedral] {
      let mut pix = [0_u16, 0, 0];
      let mut buf = pix.to_vec();
      lut.apply(&mut buf, 1, 1, mode, 100);
      pix.copy_from_slice(&buf);
      assert_eq!(pix[0], (0.25_f32 * 65535.0).round() as u16);
      assert_eq!(pix[1], (0.5_f32 * 65535.0).round() as u16);
      assert_eq!(pix[2], (0.75_f32 * 65535.0).round() as u16);
    }
  }

  #[test]
  fn intensity_blends_linearly() {
    // Constant LUT mapping everything to 1.0
    let lut = CubeLut::parse("LUT_1D_SIZE 2\n1 1 1\n1 1 1\n").unwrap();
    let mut buf = vec![0_u16; 3];
    lut.apply(&mut buf, 1, 1, Interpolation::Trilinear, 50);
    for v in buf {
      assert_eq!(v, (65535.0_f32 * 0.5).round() as u16);
    }
  }
}
