// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Output image profile: gamut conversion, tone mapping, gamma, an
//! optional gradation curve and saturation, applied in that order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::imgop::spline::{Spline, SplineError};
use crate::imgop::{clip01, Point, RGB_CHANNELS};

/// Tone mapping operator, dispatched through `match`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToneMapping {
  #[default]
  None,
  Reinhard,
  Tangent,
  AlexaLogC,
  CineonLog,
  SonySLog,
}

impl ToneMapping {
  /// Map a linear value in [0, 1] into display range.
  pub fn map(&self, v: f32) -> f32 {
    match self {
      Self::None => v,
      Self::Reinhard => v / (1.0 + v),
      Self::Tangent => v.tanh(),
      Self::AlexaLogC => {
        // ARRI LogC v3 EI800 encoding
        if v > 0.010591 {
          0.247190 * (5.555556 * v + 0.052272).log10() + 0.385537
        } else {
          5.367655 * v + 0.092809
        }
      }
      Self::CineonLog => {
        const BLACK: f32 = 0.0108;
        clip01(((v * (1.0 - BLACK) + BLACK).log10() * 300.0 + 685.0) / 1023.0)
      }
      Self::SonySLog => 0.432699 * (v + 0.037584).log10() + 0.616596 + 0.03,
    }
  }
}

/// Target color gamut. Values select the 3x3 matrix converting linear
/// sRGB primaries into the target primaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gamut {
  #[default]
  Srgb,
  Rec2020,
  AcesAp1,
}

impl Gamut {
  pub fn matrix(&self) -> [[f32; 3]; 3] {
    match self {
      Self::Srgb => [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
      Self::Rec2020 => [
        [0.627404, 0.329283, 0.043313],
        [0.069097, 0.919540, 0.011362],
        [0.016391, 0.088013, 0.895595],
      ],
      Self::AcesAp1 => [
        [0.613097, 0.339523, 0.047379],
        [0.070194, 0.916354, 0.013452],
        [0.020616, 0.109570, 0.869815],
      ],
    }
  }
}

/// Rendering parameters for the RGB output stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageProfile {
  pub tone_mapping: ToneMapping,
  pub gamut: Gamut,
  /// Display gamma, 1.0 keeps the data linear.
  pub gamma: f32,
  /// Saturation factor around per-pixel luma, 1.0 is neutral.
  pub saturation: f32,
  /// Gradation curve control points over the 16-bit range.
  pub curve: Option<Vec<Point>>,
  pub enable_tone_mapping: bool,
  pub enable_curve: bool,
  pub enable_saturation: bool,
}

impl Default for ImageProfile {
  fn default() -> Self {
    Self {
      tone_mapping: ToneMapping::None,
      gamut: Gamut::Srgb,
      gamma: 1.0,
      saturation: 1.0,
      curve: None,
      enable_tone_mapping: true,
      enable_curve: true,
      enable_saturation: true,
    }
  }
}

impl ImageProfile {
  /// Apply the profile to an interleaved 16-bit RGB image in place.
  ///
  /// Fails when the gradation curve control points are malformed, the
  /// profile may come from an untrusted config file.
  pub fn apply(&self, rgb: &mut [u16], width: usize, height: usize) -> Result<(), SplineError> {
    assert_eq!(rgb.len(), width * height * RGB_CHANNELS);
    let curve_lut = match (&self.curve, self.enable_curve) {
      (Some(points), true) => Some(Spline::new(points)?.calculate_curve()),
      _ => None,
    };
    let matrix = self.gamut.matrix();
    let inv_gamma = 1.0 / self.gamma;

    rgb.par_chunks_exact_mut(width * RGB_CHANNELS).for_each(|row| {
      for pix in row.chunks_exact_mut(RGB_CHANNELS) {
        let mut v = [
          pix[0] as f32 / 65535.0,
          pix[1] as f32 / 65535.0,
          pix[2] as f32 / 65535.0,
        ];
        v = [
          matrix[0][0] * v[0] + matrix[0][1] * v[1] + matrix[0][2] * v[2],
          matrix[1][0] * v[0] + matrix[1][1] * v[1] + matrix[1][2] * v[2],
          matrix[2][0] * v[0] + matrix[2][1] * v[1] + matrix[2][2] * v[2],
        ];
        for c in v.iter_mut() {
          if self.enable_tone_mapping {
            *c = self.tone_mapping.map(*c);
          }
          *c = clip01(*c);
          if self.gamma != 1.0 {
            *c = c.powf(inv_gamma);
          }
          if let Some(lut) = &curve_lut {
            *c = lut[(*c * 65535.0).round() as usize] as f32 / 65535.0;
          }
        }
        if self.enable_saturation && self.saturation != 1.0 {
          let luma = 0.2126 * v[0] + 0.7152 * v[1] + 0.0722 * v[2];
          for c in v.iter_mut() {
            *c = clip01(luma + (*c - luma) * self.saturation);
          }
        }
        for c in 0..RGB_CHANNELS {
          pix[c] = (v[c] * 65535.0).round() as u16;
        }
      }
    });
    Ok(())
  }
}
