// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

//! Library to decode MotionCam raw video containers and run the raw
//! color pipeline on the decoded frames. Given a `.mcraw` file you can
//! enumerate frames by timestamp, decompress the 16-bit Bayer data and
//! post-process demosaiced RGB buffers with chromatic aberration
//! correction, `.cube` lookup tables, denoising and an output profile.
//!
//! # Example
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::prelude::*;
//! use std::io::BufWriter;
//!
//! fn main() {
//!   let container = rawmotion::McrawFile::open("clip.mcraw").unwrap();
//!   let ts = container.frames()[0].timestamp;
//!   let frame = container.load_frame(ts).unwrap();
//!
//!   // Write out the frame as a grayscale PPM
//!   let mut f = BufWriter::new(File::create("frame.ppm").unwrap());
//!   let preamble = format!("P5 {} {} {}\n", frame.metadata.width, frame.metadata.height, 65535).into_bytes();
//!   f.write_all(&preamble).unwrap();
//!   for pix in frame.pixels.pixels() {
//!     f.write_all(&pix.to_be_bytes()).unwrap();
//!   }
//! }
//! ```

#![deny(unstable_features)]

pub mod bits;
pub mod cfa;
pub mod container;
pub mod decompressors;
pub mod imgop;
pub mod pixarray;
pub mod pumps;

pub use cfa::CfaPattern;
pub use container::ContainerMetadata;
pub use container::FrameMetadata;
pub use container::McrawFile;
pub use container::RawFrame;
pub use pixarray::PixU16;

use thiserror::Error;

use container::ContainerError;
use decompressors::ljpeg::LjpegError;
use decompressors::mcpacked::McpackedError;
use imgop::lut::CubeLutError;
use imgop::spline::SplineError;

#[derive(Error, Debug)]
pub enum RawmotionError {
  #[error("File is unsupported: {}", _0)]
  Unsupported(String),

  #[error("{}", _0)]
  Container(#[from] ContainerError),

  #[error("{}", _0)]
  Ljpeg(#[from] LjpegError),

  #[error("{}", _0)]
  Mcpacked(#[from] McpackedError),

  #[error("{}", _0)]
  CubeLut(#[from] CubeLutError),

  #[error("{}", _0)]
  Spline(#[from] SplineError),

  #[error("{}", _0)]
  General(String),
}

pub type Result<T> = std::result::Result<T, RawmotionError>;

impl RawmotionError {
  pub fn with_io_error(path: impl AsRef<std::path::Path>, error: std::io::Error) -> Self {
    Self::General(format!("I/O error on file: {:?}, {}", path.as_ref(), error))
  }
}

#[cfg(test)]
pub(crate) fn init_test_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}
