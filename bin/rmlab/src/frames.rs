// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

use clap::ArgMatches;
use rawmotion::McrawFile;

use crate::AppError;

/// List all indexed frame and audio timestamps.
pub fn frames(options: &ArgMatches) -> anyhow::Result<()> {
  let path = options.get_one::<String>("FILE").expect("FILE is required");
  let file = McrawFile::open(path).map_err(AppError::from)?;

  for entry in file.frames() {
    println!("frame {:>20} @ byte {}", entry.timestamp, entry.offset);
  }
  for entry in file.audio_chunks() {
    println!("audio {:>20} @ byte {}", entry.timestamp, entry.offset);
  }
  Ok(())
}
