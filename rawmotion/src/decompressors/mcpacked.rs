// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Decoder for the legacy MotionCam bit-packed frame format
//! (container compression type 6).
//!
//! Samples come in blocks of 16. Each block starts with a 2-byte
//! little-endian header holding the packed bit width (upper 4 bits) and a
//! 12-bit reference value. Widths of 0 to 10 bits are tightly packed
//! MSB-first, anything wider is stored as raw little-endian 16-bit words.
//! Two consecutive blocks form one 32-sample encoding block whose outputs
//! interleave, so each Bayer channel of a row pair carries its own
//! reference value. Rows are padded to a multiple of 32 samples, the
//! padding is dropped when copying out.

use thiserror::Error;

use crate::bits::LEu16;
use crate::pumps::{BitPump, BitPumpMSB};

/// Samples per packed block.
const BLOCK_SAMPLES: usize = 16;
/// Samples per pair of interleaved blocks.
const ENCODING_SAMPLES: usize = 2 * BLOCK_SAMPLES;
/// Byte length of the block header.
const HEADER_BYTES: usize = 2;
/// Byte length of one trailing marker+offset record.
const TRAILER_BYTES: usize = 5;
/// Marker byte closing a trailer record.
const TRAILER_MARKER: u8 = 0xFF;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum McpackedError {
  #[error("Output buffer of {} samples is too small for {}x{}", _0, _1, _2)]
  OutputTooSmall(usize, usize, usize),
}

type Result<T> = std::result::Result<T, McpackedError>;

/// Byte length of one block's payload for a given packed width.
#[inline(always)]
fn payload_len(bits: usize) -> usize {
  if bits >= 11 {
    BLOCK_SAMPLES * 2
  } else {
    (BLOCK_SAMPLES * bits + 7) / 8
  }
}

/// Unpack one 16-sample block starting at `src[offset]` into `samples`.
/// Returns the new offset, or `None` if the block would run past the end
/// of the input.
#[inline]
fn read_block(src: &[u8], offset: usize, samples: &mut [u16; BLOCK_SAMPLES]) -> Option<usize> {
  if offset + HEADER_BYTES > src.len() {
    return None;
  }
  let header = LEu16(src, offset);
  let bits = (header >> 12) as usize;
  let reference = header & 0x0fff;

  let payload = payload_len(bits);
  if offset + HEADER_BYTES + payload > src.len() {
    return None;
  }
  let data = &src[offset + HEADER_BYTES..offset + HEADER_BYTES + payload];

  if bits == 0 {
    // Constant block, all samples equal the reference value
    samples.fill(reference);
  } else if bits >= 11 {
    for (sample, bytes) in samples.iter_mut().zip(data.chunks_exact(2)) {
      *sample = LEu16(bytes, 0).wrapping_add(reference);
    }
  } else {
    let mut pump = BitPumpMSB::new(data);
    for sample in samples.iter_mut() {
      *sample = (pump.get_bits(bits as u32) as u16).wrapping_add(reference);
    }
  }

  Some(offset + HEADER_BYTES + payload)
}

/// Byte offset where the payload ends, after stripping trailing 5-byte
/// marker+offset records. These records are historical block offsets and
/// not needed for decode; they are detected by their closing 0xFF marker
/// byte and skipped by reverse iteration.
fn payload_end(src: &[u8]) -> usize {
  let mut end = src.len();
  while end >= TRAILER_BYTES && src[end - 1] == TRAILER_MARKER {
    end -= TRAILER_BYTES;
  }
  end
}

/// Decode a legacy packed frame of `width`x`height` samples into `out`.
///
/// Returns the number of input bytes consumed. A complete decode consumes
/// the full input including any trailer records. Truncated input does not
/// fail: decoding stops at the last complete block and the short consumed
/// count tells the caller the frame is incomplete.
pub fn decode(out: &mut [u16], width: usize, height: usize, src: &[u8]) -> Result<usize> {
  if out.len() < width * height {
    return Err(McpackedError::OutputTooSmall(out.len(), width, height));
  }

  let end = payload_end(src);
  let padded_width = (width + ENCODING_SAMPLES - 1) / ENCODING_SAMPLES * ENCODING_SAMPLES;
  let mut row_buf = vec![0_u16; padded_width];

  let mut offset = 0;
  for row in 0..height {
    for chunk in 0..padded_width / ENCODING_SAMPLES {
      let mut even = [0_u16; BLOCK_SAMPLES];
      let mut odd = [0_u16; BLOCK_SAMPLES];
      offset = match read_block(&src[..end], offset, &mut even) {
        Some(next) => next,
        None => return Ok(offset),
      };
      offset = match read_block(&src[..end], offset, &mut odd) {
        Some(next) => next,
        None => return Ok(offset),
      };
      let base = chunk * ENCODING_SAMPLES;
      for i in 0..BLOCK_SAMPLES {
        row_buf[base + 2 * i] = even[i];
        row_buf[base + 2 * i + 1] = odd[i];
      }
    }
    // Drop the row padding while copying out
    out[row * width..(row + 1) * width].copy_from_slice(&row_buf[..width]);
  }

  Ok(src.len())
}
