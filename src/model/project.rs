use crate::core::constants::{DEFAULT_BPM, TICKS_IN_BEAT};
use crate::core::error::{Error, Result};
use crate::core::time_sync::TimeSynchronizer;
use crate::model::curve::ParamCurve;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    pub position: i32,
    pub bpm: f64,
}

impl Tempo {
    pub fn new(position: i32, bpm: f64) -> Self {
        Self { position, bpm }
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            position: 0,
            bpm: DEFAULT_BPM,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub bar_index: i32,
    pub numerator: i32,
    pub denominator: i32,
}

impl TimeSignature {
    pub fn new(bar_index: i32, numerator: i32, denominator: i32) -> Self {
        Self {
            bar_index,
            numerator,
            denominator,
        }
    }

    /// Length of one bar in neutral ticks.
    pub fn bar_length(&self) -> i32 {
        self.bar_length_in(TICKS_IN_BEAT).round() as i32
    }

    /// Length of one bar at an arbitrary resolution, used by parsers before rescaling.
    pub fn bar_length_in(&self, ticks_in_beat: i32) -> f64 {
        (ticks_in_beat * 4) as f64 * self.numerator as f64 / self.denominator as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(0, 4, 4)
    }
}

/// Checks the meter contract: at least one entry, positive numerator and denominator, bar
/// indices never decreasing.
pub fn validate_time_signature_list(time_signatures: &[TimeSignature]) -> Result<()> {
    if time_signatures.is_empty() {
        return Err(Error::EmptyTimeSignatureList);
    }

    for (index, signature) in time_signatures.iter().enumerate() {
        if signature.numerator <= 0 || signature.denominator <= 0 {
            return Err(Error::InvalidTimeSignature {
                bar_index: signature.bar_index,
                numerator: signature.numerator,
                denominator: signature.denominator,
            });
        }

        if index > 0 && signature.bar_index < time_signatures[index - 1].bar_index {
            return Err(Error::TimeSignatureOutOfOrder { index });
        }
    }

    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Phones {
    pub head_length_in_secs: f64,
    pub mid_ratio_over_tail: f64,
}

impl Default for Phones {
    fn default() -> Self {
        Self {
            head_length_in_secs: 1.0,
            mid_ratio_over_tail: -1.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VibratoParam {
    pub start_percent: f64,
    pub end_percent: f64,
    pub is_anti_phase: bool,
    pub amplitude: ParamCurve,
    pub frequency: ParamCurve,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub start_pos: i32,
    pub length: i32,
    pub key_number: i32,
    pub lyric: String,
    #[serde(default)]
    pub pronunciation: Option<String>,
    #[serde(default)]
    pub head_tag: Option<String>,
    #[serde(default)]
    pub edited_phones: Option<Phones>,
    #[serde(default)]
    pub vibrato: Option<VibratoParam>,
}

impl Note {
    /// Negative lengths are clamped to zero.
    pub fn new(start_pos: i32, length: i32, key_number: i32, lyric: impl Into<String>) -> Self {
        Self {
            start_pos,
            length: length.max(0),
            key_number,
            lyric: lyric.into(),
            ..Default::default()
        }
    }

    pub fn end_pos(&self) -> i32 {
        self.start_pos + self.length
    }
}

/// Whether any note starts before an earlier-starting note has ended.
pub fn has_overlap(notes: &[Note]) -> bool {
    if notes.len() < 2 {
        return false;
    }

    let mut spans: Vec<(i32, i32)> = notes.iter().map(|n| (n.start_pos, n.end_pos())).collect();
    spans.sort_unstable();

    let mut covered_until = i32::MIN;
    for (start, end) in spans {
        if start < covered_until {
            return true;
        }
        covered_until = covered_until.max(end);
    }

    false
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Params {
    pub pitch: ParamCurve,
    pub volume: ParamCurve,
    pub breath: ParamCurve,
    pub gender: ParamCurve,
    #[serde(default)]
    pub strength: ParamCurve,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SingingTrack {
    pub title: String,
    pub mute: bool,
    pub solo: bool,
    pub volume: f64,
    pub pan: f64,
    #[serde(default)]
    pub ai_singer_name: String,
    #[serde(default)]
    pub reverb_preset: String,
    pub note_list: Vec<Note>,
    #[serde(default)]
    pub edited_params: Params,
}

impl Default for SingingTrack {
    fn default() -> Self {
        Self {
            title: String::new(),
            mute: false,
            solo: false,
            volume: 1.0,
            pan: 0.0,
            ai_singer_name: String::new(),
            reverb_preset: String::new(),
            note_list: Vec::new(),
            edited_params: Params::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstrumentalTrack {
    pub title: String,
    pub mute: bool,
    pub solo: bool,
    pub volume: f64,
    pub pan: f64,
    pub audio_file_path: String,
    pub offset: i32,
}

impl Default for InstrumentalTrack {
    fn default() -> Self {
        Self {
            title: String::new(),
            mute: false,
            solo: false,
            volume: 1.0,
            pan: 0.0,
            audio_file_path: String::new(),
            offset: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Track {
    Singing(SingingTrack),
    Instrumental(InstrumentalTrack),
}

impl Track {
    pub fn title(&self) -> &str {
        match self {
            Track::Singing(track) => &track.title,
            Track::Instrumental(track) => &track.title,
        }
    }

    pub fn is_muted(&self) -> bool {
        match self {
            Track::Singing(track) => track.mute,
            Track::Instrumental(track) => track.mute,
        }
    }

    pub fn as_singing(&self) -> Option<&SingingTrack> {
        match self {
            Track::Singing(track) => Some(track),
            Track::Instrumental(_) => None,
        }
    }
}

/// The unit exchanged between every parser and generator.
///
/// Pitch curve positions include a leading bar that note and tempo positions do not. The two
/// axes differ by [`Project::first_bar_length`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Project {
    #[serde(default)]
    pub version: String,
    pub song_tempo_list: Vec<Tempo>,
    pub time_signature_list: Vec<TimeSignature>,
    pub track_list: Vec<Track>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            version: String::new(),
            song_tempo_list: vec![Tempo::default()],
            time_signature_list: vec![TimeSignature::default()],
            track_list: Vec::new(),
        }
    }
}

impl Project {
    pub fn new(
        song_tempo_list: Vec<Tempo>,
        time_signature_list: Vec<TimeSignature>,
        track_list: Vec<Track>,
    ) -> Result<Self> {
        let project = Self {
            version: String::new(),
            song_tempo_list,
            time_signature_list,
            track_list,
        };
        project.validate()?;

        Ok(project)
    }

    pub fn validate(&self) -> Result<()> {
        TimeSynchronizer::validate(&self.song_tempo_list)?;
        validate_time_signature_list(&self.time_signature_list)
    }

    pub fn first_bar_length(&self) -> i32 {
        self.time_signature_list
            .first()
            .copied()
            .unwrap_or_default()
            .bar_length()
    }

    pub fn time_synchronizer(&self) -> Result<TimeSynchronizer> {
        TimeSynchronizer::new(&self.song_tempo_list)
    }

    pub fn singing_tracks(&self) -> impl Iterator<Item = &SingingTrack> {
        self.track_list.iter().filter_map(Track::as_singing)
    }

    pub fn first_singing_track(&self) -> Result<&SingingTrack> {
        self.singing_tracks().next().ok_or(Error::NoSingingTrack)
    }

    /// Appends the tracks of `others` to this project. All projects must share the tempo and
    /// time signature lists.
    pub fn merge(mut self, others: Vec<Project>) -> Result<Project> {
        for other in others {
            if other.song_tempo_list != self.song_tempo_list
                || other.time_signature_list != self.time_signature_list
            {
                return Err(Error::ProjectMismatch);
            }
            self.track_list.extend(other.track_list);
        }

        Ok(self)
    }

    /// Splits the singing tracks into projects holding at most `max_track_count` tracks each.
    /// Instrumental tracks are dropped.
    pub fn split_tracks(&self, max_track_count: usize) -> Result<Vec<Project>> {
        let singing: Vec<&SingingTrack> = self.singing_tracks().collect();
        if singing.is_empty() {
            return Err(Error::NoSingingTrack);
        }

        Ok(singing
            .chunks(max_track_count.max(1))
            .map(|chunk| Project {
                version: self.version.clone(),
                song_tempo_list: self.song_tempo_list.clone(),
                time_signature_list: self.time_signature_list.clone(),
                track_list: chunk
                    .iter()
                    .map(|track| Track::Singing((*track).clone()))
                    .collect(),
            })
            .collect())
    }
}
