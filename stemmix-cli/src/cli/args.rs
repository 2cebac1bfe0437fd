//! CLI argument definitions for `stemmix`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    with_mix_args(
        Command::new("stemmix")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Play the stems of a song together")
            .arg_required_else_help(true)
            .args_conflicts_with_subcommands(true)
            .arg(
                Arg::new("STEMS")
                    .help("Stem audio files (wav, flac, mp3) of one song")
                    .num_args(1..)
                    .index(1),
            ),
    )
    .subcommand(with_mix_args(
        Command::new("mixdown")
            .about("Render the stems offline into one WAV file")
            .arg(
                Arg::new("out")
                    .long("out")
                    .short('o')
                    .value_name("PATH")
                    .required(true)
                    .help("Output WAV path"),
            )
            .arg(
                Arg::new("STEMS")
                    .help("Stem audio files (wav, flac, mp3) of one song")
                    .num_args(1..)
                    .required(true)
                    .index(1),
            ),
    ))
    .subcommand(
        Command::new("create")
            .about("Emit default JSON payloads")
            .subcommand_required(true)
            .subcommand(
                Command::new("params-json")
                    .about("Print the default effect parameters as JSON"),
            ),
    )
}

/// Effect and engine flags shared by playback and mixdown.
fn with_mix_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("volume")
                .long("volume")
                .short('v')
                .value_name("GAIN")
                .value_parser(clap::value_parser!(f32))
                .help("Per-stem output gain (0.0-1.0)"),
        )
        .arg(
            Arg::new("reverb")
                .long("reverb")
                .value_name("AMOUNT")
                .value_parser(clap::value_parser!(f32))
                .help("Reverb amount (0.0-1.0)"),
        )
        .arg(
            Arg::new("delay")
                .long("delay")
                .value_name("AMOUNT")
                .value_parser(clap::value_parser!(f32))
                .help("Delay amount (0.0-1.0)"),
        )
        .arg(
            Arg::new("eq-low")
                .long("eq-low")
                .value_name("GAIN")
                .value_parser(clap::value_parser!(f32))
                .help("Low band gain (0.0-2.0)"),
        )
        .arg(
            Arg::new("eq-mid")
                .long("eq-mid")
                .value_name("GAIN")
                .value_parser(clap::value_parser!(f32))
                .help("Mid band gain (0.0-2.0)"),
        )
        .arg(
            Arg::new("eq-high")
                .long("eq-high")
                .value_name("GAIN")
                .value_parser(clap::value_parser!(f32))
                .help("High band gain (0.0-2.0)"),
        )
        .arg(
            Arg::new("no-effects")
                .long("no-effects")
                .action(ArgAction::SetTrue)
                .help("Start with reverb and delay bypassed"),
        )
        .arg(
            Arg::new("no-eq")
                .long("no-eq")
                .action(ArgAction::SetTrue)
                .help("Start with the EQ bypassed"),
        )
        .arg(
            Arg::new("params-json")
                .long("params-json")
                .short('P')
                .value_name("PATH")
                .help("Path to a JSON file of effect parameters; flags override it"),
        )
        .arg(
            Arg::new("block-frames")
                .long("block-frames")
                .value_name("FRAMES")
                .value_parser(clap::value_parser!(usize))
                .default_value("2048")
                .help("Frames rendered per callback"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Suppress all console output"),
        )
}
