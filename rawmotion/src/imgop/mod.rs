// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

pub mod ca;
pub mod denoise;
pub mod lut;
pub mod profile;
pub mod spline;

/// Samples per RGB pixel in the interleaved processing buffers.
pub const RGB_CHANNELS: usize = 3;

/// Point with x/y coordinates
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
  pub x: usize,
  pub y: usize,
}

impl Point {
  pub fn new(x: usize, y: usize) -> Self {
    Self { x, y }
  }
}

/// Clip a value with min/max value
pub fn clip(p: f32, min: f32, max: f32) -> f32 {
  if p > max {
    max
  } else if p < min {
    min
  } else if p.is_nan() {
    min
  } else {
    p
  }
}

/// Clip into the unit interval
pub fn clip01(p: f32) -> f32 {
  clip(p, 0.0, 1.0)
}
