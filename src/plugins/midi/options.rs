use crate::core::constants::{DEFAULT_BPM, TICKS_IN_BEAT};
use serde::{Deserialize, Serialize};

/// Which MIDI channels become singing tracks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub enum MultiChannel {
    /// Only channel 1.
    #[default]
    First,

    /// Every channel becomes its own track.
    Split,

    /// An explicit, zero-based channel list.
    Custom(Vec<u8>),
}

impl MultiChannel {
    pub fn accepts(&self, channel: u8) -> bool {
        match self {
            MultiChannel::First => channel == 0,
            MultiChannel::Split => true,
            MultiChannel::Custom(channels) => channels.contains(&channel),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InputOptions {
    pub import_lyrics: bool,
    pub import_time_signatures: bool,
    pub import_pitch: bool,
    pub import_volume: bool,
    pub multi_channel: MultiChannel,
    /// Used when the file carries no tempo event.
    pub default_bpm: f64,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            import_lyrics: true,
            import_time_signatures: true,
            import_pitch: true,
            import_volume: true,
            multi_channel: MultiChannel::default(),
            default_bpm: DEFAULT_BPM,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub export_lyrics: bool,
    /// Strip common punctuation from lyrics before writing them.
    pub remove_symbols: bool,
    pub export_pitch: bool,
    pub transpose: i32,
    pub ticks_per_beat: u16,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            export_lyrics: true,
            remove_symbols: true,
            export_pitch: true,
            transpose: 0,
            ticks_per_beat: TICKS_IN_BEAT as u16,
        }
    }
}
