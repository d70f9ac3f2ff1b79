// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Spatial denoisers for interleaved 16-bit RGB buffers.

use rayon::prelude::*;

use crate::imgop::RGB_CHANNELS;

/// Windowed median filter, blended against the original by `strength/100`.
///
/// `window` must be odd and at least 3. Border rows and columns that the
/// window would overhang are left untouched.
pub fn median_denoise(rgb: &mut [u16], width: usize, height: usize, window: usize, strength: u8) {
  assert_eq!(rgb.len(), width * height * RGB_CHANNELS);
  assert!(window >= 3 && window % 2 == 1, "window must be odd and >= 3");
  let strength = strength.min(100);
  if strength == 0 {
    return;
  }
  let radius = window / 2;
  if width <= 2 * radius || height <= 2 * radius {
    return;
  }

  let src = rgb.to_vec();
  let blend = strength as f32 / 100.0;
  let stride = width * RGB_CHANNELS;

  rgb.par_chunks_exact_mut(stride).enumerate().for_each(|(row, line)| {
    if row < radius || row >= height - radius {
      return;
    }
    let mut values = Vec::with_capacity(window * window);
    for col in radius..width - radius {
      for c in 0..RGB_CHANNELS {
        values.clear();
        for wy in row - radius..=row + radius {
          for wx in col - radius..=col + radius {
            values.push(src[wy * stride + wx * RGB_CHANNELS + c]);
          }
        }
        values.sort_unstable();
        let median = values[values.len() / 2];
        let orig = line[col * RGB_CHANNELS + c];
        let mixed = orig as f32 * (1.0 - blend) + median as f32 * blend;
        line[col * RGB_CHANNELS + c] = mixed.round() as u16;
      }
    }
  });
}

/// Lightweight edge-preserving denoiser.
///
/// Each sample is compared to the average of its 4-connected neighbors.
/// Differences below `1 << (strength + 6)` pull the sample toward the
/// average, weighted by how close it already is; larger differences are
/// treated as edges and kept.
pub fn easy_denoise(rgb: &mut [u16], width: usize, height: usize, strength: u8) {
  assert_eq!(rgb.len(), width * height * RGB_CHANNELS);
  let strength = strength.min(10);
  if width < 3 || height < 3 {
    return;
  }
  let threshold = (1_u32 << (strength + 6)) as f32;
  let src = rgb.to_vec();
  let stride = width * RGB_CHANNELS;

  rgb.par_chunks_exact_mut(stride).enumerate().for_each(|(row, line)| {
    if row == 0 || row == height - 1 {
      return;
    }
    for col in 1..width - 1 {
      for c in 0..RGB_CHANNELS {
        let pos = col * RGB_CHANNELS + c;
        let up = src[(row - 1) * stride + pos] as f32;
        let down = src[(row + 1) * stride + pos] as f32;
        let left = src[row * stride + pos - RGB_CHANNELS] as f32;
        let right = src[row * stride + pos + RGB_CHANNELS] as f32;
        let avg = (up + down + left + right) / 4.0;
        let orig = line[pos] as f32;
        let diff = (orig - avg).abs();
        if diff < threshold {
          let weight = (threshold - diff) / threshold;
          let mixed = orig * (1.0 - weight) + avg * weight;
          line[pos] = mixed.round().clamp(0.0, 65535.0) as u16;
        }
      }
    }
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  fn uniform(width: usize, height: usize, value: u16) -> Vec<u16> {
    vec![value; width * height * RGB_CHANNELS]
  }

  #[test]
  fn median_zero_strength_is_noop() {
    let img: Vec<u16> = (0..5 * 5 * 3).map(|v| (v * 97) as u16).collect();
    let mut work = img.clone();
    median_denoise(&mut work, 5, 5, 3, 0);
    assert_eq!(work, img);
  }

  #[test]
  fn median_uniform_image_unchanged_at_full_strength() {
    let img = uniform(6, 6, 4211);
    let mut work = img.clone();
    median_denoise(&mut work, 6, 6, 3, 100);
    assert_eq!(work, img);
  }

  #[test]
  fn median_removes_isolated_spike() {
    let mut work = uniform(5, 5, 1000);
    work[(2 * 5 + 2) * RGB_CHANNELS] = 60000; // red spike at center
    median_denoise(&mut work, 5, 5, 3, 100);
    assert_eq!(work[(2 * 5 + 2) * RGB_CHANNELS], 1000);
  }

  #[test]
  fn median_leaves_borders_untouched() {
    let mut work = uniform(5, 5, 1000);
    work[0] = 60000;
    work[(4 * 5 + 4) * RGB_CHANNELS + 2] = 60000;
    median_denoise(&mut work, 5, 5, 3, 100);
    assert_eq!(work[0], 60000);
    assert_eq!(work[(4 * 5 + 4) * RGB_CHANNELS + 2], 60000);
  }

  #[test]
  fn easy_uniform_image_unchanged() {
    let img = uniform(4, 4, 1000);
    let mut work = img.clone();
    easy_denoise(&mut work, 4, 4, 5);
    assert_eq!(work, img);
  }

  #[test]
  fn easy_keeps_hard_edges() {
    // Strength 0 -> threshold 64; a 10000-count step is far above it
    let mut work = uniform(4, 4, 1000);
    for row in 0..4 {
      for col in 2..4 {
        for c in 0..RGB_CHANNELS {
          work[(row * 4 + col) * RGB_CHANNELS + c] = 11000;
        }
      }
    }
    let before = work.clone();
    easy_denoise(&mut work, 4, 4, 0);
    assert_eq!(work, before);
  }

  #[test]
  fn easy_pulls_small_deviation_toward_average() {
    let mut work = uniform(5, 5, 1000);
    let pos = (2 * 5 + 2) * RGB_CHANNELS + 1;
    work[pos] = 1030; // 30 counts off, threshold at strength 0 is 64
    easy_denoise(&mut work, 5, 5, 0);
    assert!(work[pos] > 1000 && work[pos] < 1030, "got {}", work[pos]);
  }
}
