// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use clap::ArgMatches;
use log::info;
use rawmotion::{McrawFile, RawFrame};

use crate::{AppError, Result};

/// Extract frames as 16-bit big-endian PGM files, one per timestamp.
pub fn extract(options: &ArgMatches) -> anyhow::Result<()> {
  let input = options.get_one::<String>("INPUT").expect("INPUT is required");
  let output = PathBuf::from(options.get_one::<String>("OUTPUT").expect("OUTPUT is required"));
  if !output.is_dir() {
    return Err(AppError::NotExists(output.display().to_string()).into());
  }
  let overwrite = options.get_flag("override");
  let verbose = options.get_flag("verbose");
  let file = McrawFile::open(input).map_err(AppError::from)?;

  if let Some(timestamp) = options.get_one::<i64>("frame") {
    let frame = file.load_frame(*timestamp).map_err(AppError::from)?;
    write_frame(&output, &frame, overwrite, verbose)?;
    return Ok(());
  }

  // Plumbed through for front-ends, the CLI itself never cancels
  let cancel = AtomicBool::new(false);
  let mut count = 0;
  file
    .decode_frames(&cancel, |frame| {
      write_frame(&output, &frame, overwrite, verbose).map_err(|e| rawmotion::container::ContainerError::Io(std::io::Error::other(e.to_string())))?;
      count += 1;
      Ok(())
    })
    .map_err(AppError::from)?;
  info!("extracted {} frames", count);
  Ok(())
}

fn write_frame(dir: &Path, frame: &RawFrame, overwrite: bool, verbose: bool) -> Result<()> {
  let path = dir.join(format!("frame_{}.pgm", frame.metadata.timestamp));
  if path.exists() && !overwrite {
    return Err(AppError::DestExists(path.display().to_string()));
  }
  let mut out = BufWriter::new(File::create(&path)?);
  let max_value = (1_u32 << frame.metadata.bits_per_pixel.clamp(1, 16)) - 1;
  writeln!(out, "P5 {} {} {}", frame.metadata.width, frame.metadata.height, max_value)?;
  for pix in frame.pixels.pixels() {
    out.write_all(&pix.to_be_bytes())?;
  }
  if verbose {
    println!("Wrote '{}'", path.display());
  }
  info!("wrote {}", path.display());
  Ok(())
}
