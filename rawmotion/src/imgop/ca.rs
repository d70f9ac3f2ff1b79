// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Edge-guided chromatic aberration correction.
//!
//! Fringing shows up around strong luminance edges as red/blue values
//! running away from green. The filter scans each row for green
//! gradients above a threshold, grows a window over the edge while the
//! gradient keeps its sign in any channel, and clamps the R-G and B-G
//! differences inside the window to the range they span at the window
//! borders. Luminance is untouched. The vertical pass runs the same
//! filter over a transposed copy.

use rayon::prelude::*;

use crate::bits::clamp;
use crate::imgop::RGB_CHANNELS;

/// Correct chromatic aberration in an interleaved 16-bit RGB image.
///
/// `threshold` is the minimum green gradient that counts as an edge,
/// `radius` bounds the window growth to either side of the detection
/// point. One horizontal and one vertical pass, no iteration.
pub fn correct(rgb: &mut [u16], width: usize, height: usize, threshold: u16, radius: usize) {
  assert_eq!(rgb.len(), width * height * RGB_CHANNELS);
  if width < 3 || height == 0 || radius == 0 {
    return;
  }

  rgb
    .par_chunks_exact_mut(width * RGB_CHANNELS)
    .for_each(|row| correct_row(row, width, threshold as i32, radius));

  // Vertical pass over the transposed image
  let mut flipped = transpose(rgb, width, height);
  flipped
    .par_chunks_exact_mut(height * RGB_CHANNELS)
    .for_each(|row| correct_row(row, height, threshold as i32, radius));
  let restored = transpose(&flipped, height, width);
  rgb.copy_from_slice(&restored);
}

/// Central gradient of channel `c` at pixel `pos`, only defined for
/// interior pixels.
#[inline(always)]
fn gradient(row: &[u16], pos: usize, c: usize) -> i32 {
  row[(pos + 1) * RGB_CHANNELS + c] as i32 - row[(pos - 1) * RGB_CHANNELS + c] as i32
}

/// True while the edge continues at `pos`: any channel still has a
/// same-signed gradient above the threshold.
#[inline(always)]
fn edge_continues(row: &[u16], pos: usize, sign: i32, threshold: i32) -> bool {
  (0..RGB_CHANNELS).any(|c| sign * gradient(row, pos, c) > threshold)
}

fn correct_row(row: &mut [u16], width: usize, threshold: i32, radius: usize) {
  let mut j = 1;
  while j + 1 < width {
    let grad = gradient(row, j, 1);
    if grad.abs() <= threshold {
      j += 1;
      continue;
    }
    let sign = grad.signum();

    // Grow the window outward over the edge. lpos/rpos end up on the
    // first pixel on each side where the edge has faded out.
    let mut lpos = j;
    while lpos > 1 && j - lpos < radius && edge_continues(row, lpos, sign, threshold) {
      lpos -= 1;
    }
    let mut rpos = j;
    while rpos + 2 < width && rpos - j < radius && edge_continues(row, rpos, sign, threshold) {
      rpos += 1;
    }

    // Clamp the chroma differences inside the window to the range they
    // span at the two window borders
    for c in [0, 2] {
      let left = row[lpos * RGB_CHANNELS + c] as i32 - row[lpos * RGB_CHANNELS + 1] as i32;
      let right = row[rpos * RGB_CHANNELS + c] as i32 - row[rpos * RGB_CHANNELS + 1] as i32;
      let (lo, hi) = if left < right { (left, right) } else { (right, left) };
      for k in lpos..=rpos {
        let green = row[k * RGB_CHANNELS + 1] as i32;
        let diff = row[k * RGB_CHANNELS + c] as i32 - green;
        row[k * RGB_CHANNELS + c] = clamp(clamp(diff, lo, hi) + green, 0, u16::MAX as i32) as u16;
      }
    }

    j = rpos + 1;
  }
}

/// Transpose an interleaved RGB image of `width`x`height` pixels.
fn transpose(src: &[u16], width: usize, height: usize) -> Vec<u16> {
  let mut out = vec![0_u16; src.len()];
  out.par_chunks_exact_mut(height * RGB_CHANNELS).enumerate().for_each(|(x, orow)| {
    for y in 0..height {
      let src_pix = (y * width + x) * RGB_CHANNELS;
      orow[y * RGB_CHANNELS..y * RGB_CHANNELS + RGB_CHANNELS].copy_from_slice(&src[src_pix..src_pix + RGB_CHANNELS]);
    }
  });
  out
}
