// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

use std::fs;
use std::path::PathBuf;

use clap::ArgMatches;
use log::info;
use rawmotion::McrawFile;

use crate::AppError;

/// Dump every indexed audio chunk as a raw PCM file.
pub fn audio(options: &ArgMatches) -> anyhow::Result<()> {
  let input = options.get_one::<String>("INPUT").expect("INPUT is required");
  let output = PathBuf::from(options.get_one::<String>("OUTPUT").expect("OUTPUT is required"));
  if !output.is_dir() {
    return Err(AppError::NotExists(output.display().to_string()).into());
  }
  let overwrite = options.get_flag("override");
  let verbose = options.get_flag("verbose");
  let file = McrawFile::open(input).map_err(AppError::from)?;

  for entry in file.audio_chunks() {
    let path = output.join(format!("audio_{}.pcm", entry.timestamp));
    if path.exists() && !overwrite {
      return Err(AppError::DestExists(path.display().to_string()).into());
    }
    let samples = file.load_audio(entry.timestamp).map_err(AppError::from)?;
    fs::write(&path, &samples)?;
    if verbose {
      println!("Wrote '{}' ({} bytes)", path.display(), samples.len());
    }
    info!("wrote {} ({} bytes)", path.display(), samples.len());
  }
  Ok(())
}
