// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

mod common;

use common::{encode_ljpeg, sample_grid};
use rawmotion::decompressors::ljpeg::{LjpegDecompressor, LjpegError};

type TestResult = anyhow::Result<()>;

#[test]
fn roundtrip_predictor_1_two_components() -> TestResult {
  let width = 64; // 32 pixels, 2 components
  let height = 20;
  let data = sample_grid(width, height, 12, 1);
  let stream = encode_ljpeg(&data, width, height, 2, 12, 1);

  let dec = LjpegDecompressor::new(&stream)?;
  assert_eq!(dec.width(), width);
  assert_eq!(dec.height(), height);
  assert_eq!(dec.precision(), 12);
  assert_eq!(dec.components(), 2);
  assert_eq!(dec.decode_frame()?, data);
  Ok(())
}

#[test]
fn roundtrip_all_predictors() -> TestResult {
  let width = 32;
  let height = 8;
  for predictor in 1..=7 {
    let data = sample_grid(width, height, 12, predictor as u32);
    let stream = encode_ljpeg(&data, width, height, 2, 12, predictor);
    let dec = LjpegDecompressor::new(&stream)?;
    assert_eq!(dec.decode_frame()?, data, "predictor {}", predictor);
  }
  Ok(())
}

#[test]
fn roundtrip_single_component_14bit_constant() -> TestResult {
  // Constant data exercises the category-0 path end to end
  let data = vec![0x2AAA_u16; 16 * 4];
  let stream = encode_ljpeg(&data, 16, 4, 1, 14, 1);
  let dec = LjpegDecompressor::new(&stream)?;
  assert_eq!(dec.decode_frame()?, data);
  Ok(())
}

#[test]
fn decode_into_strided_output() -> TestResult {
  let width = 16;
  let height = 4;
  let data = sample_grid(width, height, 12, 7);
  let stream = encode_ljpeg(&data, width, height, 2, 12, 1);
  let dec = LjpegDecompressor::new(&stream)?;

  // Place the frame at column 4 of a 24-sample wide target
  let stripwidth = 24;
  let mut out = vec![0_u16; stripwidth * height];
  dec.decode(&mut out, 4, stripwidth, width, height)?;
  for row in 0..height {
    assert_eq!(&out[row * stripwidth..row * stripwidth + 4], &[0, 0, 0, 0]);
    assert_eq!(&out[row * stripwidth + 4..row * stripwidth + 4 + width], &data[row * width..(row + 1) * width]);
  }
  Ok(())
}

#[test]
fn decode_narrower_than_stream_skips_tail_columns() -> TestResult {
  let width = 32;
  let height = 4;
  let data = sample_grid(width, height, 12, 3);
  let stream = encode_ljpeg(&data, width, height, 2, 12, 1);
  let dec = LjpegDecompressor::new(&stream)?;

  // Only keep the left 24 samples of every row
  let narrow = 24;
  let mut out = vec![0_u16; narrow * height];
  dec.decode(&mut out, 0, narrow, narrow, height)?;
  for row in 0..height {
    assert_eq!(&out[row * narrow..(row + 1) * narrow], &data[row * width..row * width + narrow]);
  }
  Ok(())
}

#[test]
fn stuffed_bytes_survive_roundtrip() -> TestResult {
  // Saturated 12-bit data produces long runs of 1-bits in the entropy
  // stream and with them stuffed 0xFF 0x00 sequences
  let width = 32;
  let height = 4;
  let mut data = vec![0_u16; width * height];
  for (i, v) in data.iter_mut().enumerate() {
    *v = if i % 2 == 0 { 0x0FFF } else { 0 };
  }
  let stream = encode_ljpeg(&data, width, height, 2, 12, 1);
  assert!(stream.windows(2).any(|w| w == [0xFF, 0x00]), "fixture must contain stuffing");
  let dec = LjpegDecompressor::new(&stream)?;
  assert_eq!(dec.decode_frame()?, data);
  Ok(())
}

#[test]
fn undersized_output_is_rejected() -> TestResult {
  let data = sample_grid(16, 4, 12, 9);
  let stream = encode_ljpeg(&data, 16, 4, 2, 12, 1);
  let dec = LjpegDecompressor::new(&stream)?;
  let mut out = vec![0_u16; 16 * 4 - 1];
  assert!(matches!(dec.decode(&mut out, 0, 16, 16, 4), Err(LjpegError::NoMemory(..))));
  Ok(())
}
