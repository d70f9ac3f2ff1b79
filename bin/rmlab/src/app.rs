// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

use clap::{crate_version, Arg, ArgAction, Command, value_parser};
use log::debug;

pub fn create_app() -> Command {
  debug!("Creating CLAP app configuration");
  Command::new("rmlab")
    .version(crate_version!())
    .author("Daniel V. <daniel@chaospixel.com>")
    .about("rmlab - MotionCam raw video inspection and extraction tool")
    .subcommand_required(true)
    .arg_required_else_help(true)
    .arg(
      Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .global(true)
        .help("Print more messages"),
    )
    .arg(
      Arg::new("debug")
        .short('d')
        .action(ArgAction::Count)
        .global(true)
        .help("Sets the level of debugging information"),
    )
    .subcommand(
      Command::new("info")
        .about("Show container metadata")
        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue).help("Format metadata as JSON"))
        .arg(Arg::new("FILE").required(true).help("Input file")),
    )
    .subcommand(
      Command::new("frames")
        .about("List frame and audio chunk timestamps")
        .arg(Arg::new("FILE").required(true).help("Input file")),
    )
    .subcommand(
      Command::new("extract")
        .about("Extract raw frames as 16-bit PGM files")
        .arg(
          Arg::new("frame")
            .long("frame")
            .value_parser(value_parser!(i64))
            .help("Extract only the frame with this timestamp"),
        )
        .arg(Arg::new("override").short('f').long("override").action(ArgAction::SetTrue).help("Override existing files"))
        .arg(Arg::new("INPUT").required(true).help("Input file"))
        .arg(Arg::new("OUTPUT").required(true).help("Existing output directory")),
    )
    .subcommand(
      Command::new("audio")
        .about("Extract audio chunks as raw PCM files")
        .arg(Arg::new("override").short('f').long("override").action(ArgAction::SetTrue).help("Override existing files"))
        .arg(Arg::new("INPUT").required(true).help("Input file"))
        .arg(Arg::new("OUTPUT").required(true).help("Existing output directory")),
    )
}
