use super::{
    CC_DATA_ENTRY, CC_EXPRESSION, CC_RPN_LSB, CC_RPN_MSB, CC_VOLUME, MICROSECONDS_PER_MINUTE,
    controller_to_db,
};
use crate::core::constants::{DEFAULT_PHONEME, DEFAULT_PITCH_BEND_SENSITIVITY, TICKS_IN_BEAT};
use crate::core::tick_counter::{normalize_tempo_list, normalize_time_signature_list};
use crate::core::time_sync::TimeSynchronizer;
use crate::model::curve::ParamCurve;
use crate::model::point::Point;
use crate::model::project::{
    Note, Params, Project, SingingTrack, Tempo, TimeSignature, Track, has_overlap,
};
use crate::model::relative_pitch_curve::RelativePitchCurve;
use crate::pitch::bend::PitchBendFormat;
use crate::plugins::midi::options::InputOptions;
use anyhow::{Result, anyhow, bail};
use log::{debug, info, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Resolution facts of the file being parsed, fixed for the whole call.
#[derive(Debug, Clone, Copy)]
struct MidiTimeline {
    ticks_per_beat: i32,
    first_bar_length: i32,
}

impl MidiTimeline {
    fn to_neutral(&self, file_ticks: u64) -> i32 {
        (file_ticks as f64 * TICKS_IN_BEAT as f64 / self.ticks_per_beat as f64).round() as i32
    }
}

/// Channel-voice messages of one MIDI track, by channel, with absolute file ticks.
type ChannelEvents = BTreeMap<u8, Vec<(u64, MidiMessage)>>;

/// Builds a [`Project`] from Standard MIDI File bytes.
#[derive(Debug, Clone, Default)]
pub struct MidiParser {
    pub options: InputOptions,
}

impl MidiParser {
    pub fn new(options: InputOptions) -> Self {
        Self { options }
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Project> {
        let bytes = fs::read(path.as_ref()).map_err(|e| {
            anyhow!(
                "Failed to read MIDI file {}: {}",
                path.as_ref().display(),
                e
            )
        })?;

        self.parse_project(&bytes)
    }

    pub fn parse_project(&self, bytes: &[u8]) -> Result<Project> {
        let smf = Smf::parse(bytes).map_err(|e| anyhow!("Failed to parse MIDI: {:?}", e))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(t) => t.as_int() as i32,
            Timing::Timecode(_fps, _subframe) => {
                return Err(anyhow!(
                    "SMPTE timecode midi timing is not currently supported..!"
                ));
            }
        };

        if ticks_per_beat <= 0 {
            bail!("MIDI header declares zero ticks per quarter note..!");
        }

        debug!("Ticks per quarter note: {}", ticks_per_beat);
        debug!(
            "MIDI format: {:?}, tracks: {}",
            smf.header.format,
            smf.tracks.len()
        );

        let tracks: Vec<Vec<(u64, TrackEventKind)>> = smf
            .tracks
            .iter()
            .map(|track| {
                let mut abs_tick: u64 = 0;
                track
                    .iter()
                    .map(|event| {
                        abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);
                        (abs_tick, event.kind)
                    })
                    .collect()
            })
            .collect();

        let time_signature_list = match tracks.first() {
            Some(master) if self.options.import_time_signatures => {
                parse_time_signatures(master, ticks_per_beat)
            }
            _ => vec![TimeSignature::default()],
        };

        let timeline = MidiTimeline {
            ticks_per_beat,
            first_bar_length: time_signature_list[0].bar_length(),
        };

        let song_tempo_list = self.parse_tempos(&tracks, &timeline);
        let synchronizer = TimeSynchronizer::new(&song_tempo_list)?;

        let mut track_list: Vec<Track> = Vec::new();
        for (track_idx, events) in tracks.iter().enumerate() {
            for track in self.parse_track(track_idx, events, &timeline) {
                let end = track.note_list.last().map_or(0, Note::end_pos);
                debug!(
                    "Track '{}' holds {} note(s) over {:.3}s",
                    track.title,
                    track.note_list.len(),
                    synchronizer.get_actual_secs_from_ticks(end)
                );
                track_list.push(Track::Singing(track));
            }
        }

        info!(
            "Parsed {} singing track(s) from {} MIDI track(s)..!",
            track_list.len(),
            tracks.len()
        );

        Ok(Project::new(song_tempo_list, time_signature_list, track_list)?)
    }

    fn parse_tempos(
        &self,
        tracks: &[Vec<(u64, TrackEventKind)>],
        timeline: &MidiTimeline,
    ) -> Vec<Tempo> {
        let mut tempos: Vec<Tempo> = Vec::new();

        for (track_idx, events) in tracks.iter().enumerate() {
            for (tick, kind) in events {
                if let TrackEventKind::Meta(MetaMessage::Tempo(micro)) = kind {
                    let mpqn = micro.as_int();
                    if mpqn == 0 {
                        warn!("Ignoring zero-length tempo at tick {}..!", tick);
                        continue;
                    }

                    let bpm = (MICROSECONDS_PER_MINUTE / mpqn as f64 * 1000.0).round() / 1000.0;
                    debug!(
                        "Tempo change at tick {} -> {} bpm (track {})",
                        tick, bpm, track_idx
                    );

                    if tempos.last().is_some_and(|last| last.bpm == bpm) {
                        continue;
                    }
                    tempos.push(Tempo::new(timeline.to_neutral(*tick), bpm));
                }
            }
        }

        if tempos.is_empty() {
            warn!(
                "No tempo found in the MIDI file, defaulting to {} bpm..!",
                self.options.default_bpm
            );
        }

        normalize_tempo_list(&tempos, self.options.default_bpm)
    }

    fn parse_track(
        &self,
        track_idx: usize,
        events: &[(u64, TrackEventKind)],
        timeline: &MidiTimeline,
    ) -> Vec<SingingTrack> {
        let mut track_name: Option<String> = None;
        let mut lyrics: HashMap<u64, String> = HashMap::new();
        let mut channels: ChannelEvents = BTreeMap::new();

        for (tick, kind) in events {
            match kind {
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) if track_name.is_none() => {
                    track_name = Some(String::from_utf8_lossy(bytes).into_owned());
                }
                TrackEventKind::Meta(MetaMessage::Lyric(bytes)) if self.options.import_lyrics => {
                    lyrics.insert(*tick, String::from_utf8_lossy(bytes).into_owned());
                }
                TrackEventKind::Midi { channel, message } => {
                    channels
                        .entry(channel.as_int())
                        .or_default()
                        .push((*tick, *message));
                }
                _ => {}
            }
        }

        let mut tracks: Vec<SingingTrack> = Vec::new();
        for (channel, messages) in channels {
            if !self.options.multi_channel.accepts(channel) {
                debug!("Skipping channel {} of track {}", channel + 1, track_idx);
                continue;
            }

            let mut track = self.parse_channel(&messages, &lyrics, timeline);
            if track.note_list.is_empty() {
                continue;
            }

            if has_overlap(&track.note_list) {
                warn!(
                    "Overlapping notes in track {} channel {}..!",
                    track_idx,
                    channel + 1
                );
            }

            track.title = track_name
                .clone()
                .unwrap_or_else(|| format!("Track {} ({})", track_idx + 1, channel + 1));
            tracks.push(track);
        }

        tracks
    }

    fn parse_channel(
        &self,
        messages: &[(u64, MidiMessage)],
        lyrics: &HashMap<u64, String>,
        timeline: &MidiTimeline,
    ) -> SingingTrack {
        let format = PitchBendFormat::DEFAULT;

        let mut notes: Vec<Note> = Vec::new();
        let mut open_notes: HashMap<u8, Vec<u64>> = HashMap::new();
        let mut rel_pitch_points: Vec<Point> = Vec::new();
        let mut saw_bend = false;
        let mut expression: Vec<Point> = Vec::new();
        let mut volume_base = 0.0;
        let mut sensitivity = DEFAULT_PITCH_BEND_SENSITIVITY;
        let mut rpn: (Option<u8>, Option<u8>) = (None, None);

        let make_note = |key: u8, start_tick: u64, end_tick: u64| -> Note {
            let lyric = lyrics
                .get(&start_tick)
                .cloned()
                .unwrap_or_else(|| DEFAULT_PHONEME.to_string());
            let start_pos = timeline.to_neutral(start_tick);
            let mut note = Note::new(
                start_pos,
                timeline.to_neutral(end_tick) - start_pos,
                key as i32,
                lyric,
            );
            if note.lyric.chars().any(|c| c.is_ascii_alphabetic()) {
                note.pronunciation = Some(note.lyric.clone());
            }
            note
        };

        for (tick, message) in messages {
            let tick = *tick;
            match *message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    rel_pitch_points.push(Point::new(timeline.to_neutral(tick), 0));
                    open_notes.entry(key.as_int()).or_default().push(tick);
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let key = key.as_int();
                    let Some(open) = open_notes.remove(&key) else {
                        debug!("Orphaned NoteOff for {} at tick {}..!", key, tick);
                        continue;
                    };

                    // A note-on at this very tick survives the note-off.
                    let (keep, close): (Vec<u64>, Vec<u64>) =
                        open.into_iter().partition(|start| *start == tick);
                    notes.extend(close.into_iter().map(|start| make_note(key, start, tick)));
                    if !keep.is_empty() {
                        open_notes.insert(key, keep);
                    }
                }
                MidiMessage::PitchBend { bend } if self.options.import_pitch => {
                    saw_bend = true;
                    let weighted = bend.as_int() as i32 * sensitivity;
                    rel_pitch_points.push(Point::new(
                        timeline.to_neutral(tick),
                        format.weighted_bend_to_cents(weighted),
                    ));
                }
                MidiMessage::Controller { controller, value } => {
                    let value = value.as_int();
                    match controller.as_int() {
                        CC_RPN_MSB => rpn.0 = Some(value),
                        CC_RPN_LSB => rpn.1 = Some(value),
                        CC_DATA_ENTRY if rpn == (Some(0), Some(0)) => {
                            debug!("Pitch bend sensitivity -> {} at tick {}", value, tick);
                            sensitivity = value as i32;
                        }
                        CC_VOLUME if value > 0 => volume_base = controller_to_db(value),
                        CC_EXPRESSION if value > 0 && self.options.import_volume => {
                            expression.push(Point::new(
                                timeline.to_neutral(tick),
                                (volume_base + controller_to_db(value)).round() as i32,
                            ));
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let last_tick = messages.last().map_or(0, |(tick, _)| *tick);
        for (key, starts) in open_notes {
            for start in starts {
                let end = if last_tick > start {
                    last_tick
                } else {
                    start + timeline.ticks_per_beat as u64
                };
                warn!(
                    "Unclosed NoteOn for {} at tick: {} auto-closing at: {}..!",
                    key, start, end
                );
                notes.push(make_note(key, start, end));
            }
        }

        notes.sort_by_key(|note| note.start_pos);

        let mut edited_params = Params {
            volume: ParamCurve::new(expression),
            ..Default::default()
        };

        if self.options.import_pitch && saw_bend {
            rel_pitch_points.sort_by_key(|point| point.x);

            // The last sample at a tick wins, so a bend beats the zero a note-on put there.
            let mut samples: Vec<Point> = Vec::with_capacity(rel_pitch_points.len());
            for point in rel_pitch_points {
                match samples.last_mut() {
                    Some(last) if last.x == point.x => *last = point,
                    _ => samples.push(point),
                }
            }

            edited_params.pitch = RelativePitchCurve::new(timeline.first_bar_length)
                .to_absolute(&samples, &notes)
                .unwrap_or_default();
        }

        SingingTrack {
            note_list: notes,
            edited_params,
            ..Default::default()
        }
    }
}

/// Reads time signature meta events from the master track. Bar indices are counted with the
/// bar length of the signature in force before each change.
fn parse_time_signatures(
    master: &[(u64, TrackEventKind)],
    ticks_per_beat: i32,
) -> Vec<TimeSignature> {
    let mut signatures: Vec<TimeSignature> = Vec::new();
    let mut prev_tick: u64 = 0;
    let mut measure = 0.0;

    for (tick, kind) in master {
        if let TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_pow, _, _)) =
            kind
        {
            let Some(denominator) = 1i32.checked_shl(*denominator_pow as u32) else {
                warn!("Ignoring time signature with denominator 2^{}..!", denominator_pow);
                continue;
            };

            let ticks_in_bar = signatures.last().map_or((4 * ticks_per_beat) as f64, |prev| {
                prev.bar_length_in(ticks_per_beat).round()
            });
            measure += tick.saturating_sub(prev_tick) as f64 / ticks_in_bar;
            prev_tick = *tick;

            signatures.push(TimeSignature::new(
                measure.floor() as i32,
                *numerator as i32,
                denominator,
            ));
        }
    }

    normalize_time_signature_list(&signatures)
}
