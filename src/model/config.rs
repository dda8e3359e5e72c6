use crate::core::constants::{DEFAULT_BPM, TICKS_IN_BEAT};
use crate::plugins::midi::{InputOptions, OutputOptions};
use crate::util::parse_channels;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "svs_bridge",
    about = "Convert singing voice projects through a neutral project model."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the tempo map, meter and tracks of a MIDI file.
    Inspect {
        /// Path to the source MIDI file.
        midi: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Parse a MIDI file and dump the neutral project as JSON.
    ToJson {
        /// Path to the source MIDI file.
        midi: PathBuf,

        /// Where to write the JSON. Prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Generate a MIDI file from a JSON project.
    FromJson {
        /// Path to the JSON project.
        project: PathBuf,

        /// Path of the MIDI file to write.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        output_args: OutputArgs,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Parse a MIDI file and write it back out through the neutral project.
    RoundTrip {
        /// Path to the source MIDI file.
        midi: PathBuf,

        /// Path of the MIDI file to write.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output_args: OutputArgs,

        #[command(flatten)]
        content: ContentArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct InputArgs {
    /// Tempo to assume when the file carries none.
    #[arg(long, default_value_t = DEFAULT_BPM)]
    pub default_bpm: f64,

    /// Channels to import: first|split, or a 1-based list such as `1,3,5-12`.
    #[arg(short, long, default_value = "first")]
    pub channels: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Resolution of the written file.
    #[arg(long, default_value_t = TICKS_IN_BEAT as u16)]
    pub ticks_per_beat: u16,

    /// Transpose in semitones (positive or negative).
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub transpose: i32,
}

/// Which parts of a track are carried through the conversion.
#[derive(clap::Args, Debug, Clone)]
pub struct ContentArgs {
    /// Leave pitch bends out.
    #[arg(long)]
    pub no_pitch: bool,

    /// Leave lyrics out.
    #[arg(long)]
    pub no_lyrics: bool,
}

impl InputArgs {
    pub fn options(&self, content: &ContentArgs) -> InputOptions {
        InputOptions {
            import_lyrics: !content.no_lyrics,
            import_pitch: !content.no_pitch,
            multi_channel: parse_channels(&self.channels),
            default_bpm: self.default_bpm,
            ..Default::default()
        }
    }
}

impl OutputArgs {
    pub fn options(&self, content: &ContentArgs) -> OutputOptions {
        OutputOptions {
            export_lyrics: !content.no_lyrics,
            export_pitch: !content.no_pitch,
            transpose: self.transpose,
            ticks_per_beat: self.ticks_per_beat,
            ..Default::default()
        }
    }
}
