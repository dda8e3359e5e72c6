/// Ticks per quarter note of the neutral model. Formats with a different resolution rescale at
/// their own parser/generator boundary.
pub const TICKS_IN_BEAT: i32 = 480;

pub const DEFAULT_BPM: f64 = 120.0;

/// Two pitch samples further apart than this belong to different pitch sections.
pub const MIN_BREAK_LENGTH_BETWEEN_PITCH_SECTIONS: i32 = TICKS_IN_BEAT;

pub const DEFAULT_PITCH_BEND_SENSITIVITY: i32 = 2;
pub const MAX_PITCH_BEND_SENSITIVITY: i32 = 24;

/// Largest positive raw pitch bend value. The negative range is one larger.
pub const PITCH_MAX_VALUE: i32 = 8191;

/// Stored pitch value meaning "no pitch data here".
pub const NO_PITCH: i32 = -100;

pub const DEFAULT_PHONEME: &str = "la";
