// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

use clap::ArgMatches;
use rawmotion::McrawFile;

use crate::AppError;

/// Print recording-level metadata for a container file.
pub fn info(options: &ArgMatches) -> anyhow::Result<()> {
  let path = options.get_one::<String>("FILE").expect("FILE is required");
  let file = McrawFile::open(path).map_err(AppError::from)?;
  let meta = file.metadata();

  if options.get_flag("json") {
    println!("{}", serde_json::to_string_pretty(meta)?);
    return Ok(());
  }

  println!("File:               {}", path);
  println!("Camera model:       {}", meta.camera_model);
  println!("Sensor arrangement: {}", meta.sensor_arrangement);
  println!("Frame rate:         {}", meta.fps);
  println!("Frames:             {}", file.frame_count());
  println!("Audio chunks:       {}", file.audio_chunks().len());
  if meta.audio_channels > 0 {
    println!("Audio:              {} ch, {} Hz", meta.audio_channels, meta.audio_sample_rate);
  }
  if let (Some(first), Some(last)) = (file.frames().first(), file.frames().last()) {
    let duration_ns = last.timestamp - first.timestamp;
    println!("Duration:           {:.3} s", duration_ns as f64 / 1_000_000_000.0);
  }
  Ok(())
}
