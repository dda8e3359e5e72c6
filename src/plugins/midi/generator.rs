use super::{CC_DATA_ENTRY, CC_RPN_LSB, CC_RPN_MSB, MICROSECONDS_PER_MINUTE};
use crate::core::constants::TICKS_IN_BEAT;
use crate::model::context::ConversionContext;
use crate::model::curve::ParamCurve;
use crate::model::point::Point;
use crate::model::project::{Note, Project, SingingTrack, Tempo, TimeSignature, Track};
use crate::pitch::bend::{PitchBendFormat, generate_pitch_bend};
use crate::plugins::midi::options::OutputOptions;
use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use midly::num::u24;
use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent, TrackEventKind,
};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// Lead-in, in ticks, given to the pitch of a note that follows its neighbour closely.
pub const BORDER_APPEND_RADIUS: i32 = 20;

const NOTE_VELOCITY: u8 = 64;
const MAX_KEY: i32 = 127;
const MAX_TEMPO_MICROS: u32 = 0xFF_FFFF;
const LYRIC_SYMBOLS: &[char] = &[',', '.', '?', '!', '，', '。', '？', '！'];

/// Neutral ticks to output ticks.
#[derive(Debug, Clone, Copy)]
struct FileTimeline {
    ticks_per_beat: u16,
}

impl FileTimeline {
    fn to_file(&self, neutral: i32) -> u32 {
        (neutral.max(0) as f64 * self.ticks_per_beat as f64 / TICKS_IN_BEAT as f64).round() as u32
    }
}

/// A singing track flattened to owned, absolute-tick data. MIDI events borrow their text from it.
#[derive(Debug, Default)]
struct EncodedTrack {
    name: String,
    lyrics: Vec<(u32, String)>,
    messages: Vec<(u32, MidiMessage)>,
}

impl EncodedTrack {
    fn events(&self) -> Vec<TrackEvent<'_>> {
        let mut events: Vec<(u32, TrackEventKind<'_>)> = Vec::new();

        events.push((0, TrackEventKind::Meta(MetaMessage::TrackName(self.name.as_bytes()))));
        events.extend(self.lyrics.iter().map(|(tick, text)| {
            (*tick, TrackEventKind::Meta(MetaMessage::Lyric(text.as_bytes())))
        }));
        events.extend(self.messages.iter().map(|(tick, message)| {
            (
                *tick,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: *message,
                },
            )
        }));

        events.sort_by_key(|(tick, kind)| (*tick, event_order(kind)));
        finish_track(events)
    }
}

/// Ordering among events sharing a tick: releases first, then text, then controllers, so a
/// sensitivity change is in force before the note and bend that need it.
fn event_order(kind: &TrackEventKind) -> u8 {
    match kind {
        TrackEventKind::Midi {
            message: MidiMessage::NoteOff { .. },
            ..
        } => 0,
        TrackEventKind::Meta(_) => 1,
        TrackEventKind::Midi {
            message: MidiMessage::Controller { .. },
            ..
        } => 2,
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { .. },
            ..
        } => 3,
        _ => 4,
    }
}

/// Turns sorted absolute-tick events into a delta-timed track closed by an end-of-track event.
fn finish_track(events: Vec<(u32, TrackEventKind<'_>)>) -> Vec<TrackEvent<'_>> {
    let mut track: Vec<TrackEvent> = events
        .into_iter()
        .map(|(tick, kind)| TrackEvent {
            delta: tick.into(),
            kind,
        })
        .collect();

    convert_to_delta_times(&mut track);
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}

fn convert_to_delta_times(events: &mut [TrackEvent]) {
    let mut prev_tick = 0u32;
    for event in events.iter_mut() {
        let current_tick = event.delta.as_int();
        event.delta = current_tick.saturating_sub(prev_tick).into();
        prev_tick = current_tick;
    }
}

/// Writes a [`Project`] as a format 1 Standard MIDI File.
#[derive(Debug, Clone, Default)]
pub struct MidiGenerator {
    pub options: OutputOptions,
}

impl MidiGenerator {
    pub fn new(options: OutputOptions) -> Self {
        Self { options }
    }

    pub fn generate_file<P: AsRef<Path>>(&self, project: &Project, path: P) -> Result<()> {
        let bytes = self.generate(project)?;
        fs::write(path.as_ref(), bytes).map_err(|e| {
            anyhow!(
                "Failed to write MIDI file {}: {}",
                path.as_ref().display(),
                e
            )
        })
    }

    pub fn generate(&self, project: &Project) -> Result<Vec<u8>> {
        let context = ConversionContext::from_project(project)?;
        project.first_singing_track()?;

        let timeline = FileTimeline {
            ticks_per_beat: self.options.ticks_per_beat.max(1),
        };

        let encoded: Vec<EncodedTrack> = project
            .track_list
            .iter()
            .filter_map(|track| match track {
                Track::Singing(singing) => Some(self.encode_track(singing, &context, &timeline)),
                Track::Instrumental(instrumental) => {
                    debug!(
                        "Skipping instrumental track '{}'..!",
                        instrumental.title
                    );
                    None
                }
            })
            .collect();

        let mut tracks = vec![conductor_track(
            &project.song_tempo_list,
            &project.time_signature_list,
            &timeline,
        )];
        tracks.extend(encoded.iter().map(EncodedTrack::events));

        let smf = Smf {
            header: Header {
                format: Format::Parallel,
                timing: Timing::Metrical(timeline.ticks_per_beat.into()),
            },
            tracks,
        };

        let mut out = Vec::new();
        smf.write_std(&mut out)
            .map_err(|e| anyhow!("Failed to write MIDI: {}", e))?;

        info!(
            "Generated {} MIDI track(s), {} bytes..!",
            smf.tracks.len(),
            out.len()
        );

        Ok(out)
    }

    fn encode_track(
        &self,
        track: &SingingTrack,
        context: &ConversionContext,
        timeline: &FileTimeline,
    ) -> EncodedTrack {
        let mut encoded = EncodedTrack {
            name: track.title.clone(),
            ..Default::default()
        };

        let mut written: Vec<Note> = Vec::with_capacity(track.note_list.len());
        for note in &track.note_list {
            let key = note.key_number + self.options.transpose;
            let clamped = key.clamp(0, MAX_KEY);
            if clamped != key {
                warn!(
                    "Key {} at tick {} is out of MIDI range, clamping to {}..!",
                    key, note.start_pos, clamped
                );
            }
            written.push(Note {
                key_number: clamped,
                ..note.clone()
            });

            let start = timeline.to_file(note.start_pos);
            let end = timeline.to_file(note.end_pos());
            encoded.messages.push((
                start,
                MidiMessage::NoteOn {
                    key: (clamped as u8).into(),
                    vel: NOTE_VELOCITY.into(),
                },
            ));
            encoded.messages.push((
                end,
                MidiMessage::NoteOff {
                    key: (clamped as u8).into(),
                    vel: 0.into(),
                },
            ));

            if self.options.export_lyrics {
                let text = note
                    .pronunciation
                    .as_deref()
                    .filter(|pronunciation| !pronunciation.is_empty())
                    .unwrap_or(&note.lyric);
                let text = if self.options.remove_symbols {
                    remove_symbols(text)
                } else {
                    text.to_string()
                };

                if !text.is_empty() {
                    encoded.lyrics.push((start, text));
                }
            }
        }

        if self.options.export_pitch {
            self.encode_pitch(track, &written, context, timeline, &mut encoded.messages);
        }

        encoded
    }

    /// Encodes pitch against the keys actually written. The curve moves with the transpose, so a
    /// clamped key is made up for by a wider bend.
    fn encode_pitch(
        &self,
        track: &SingingTrack,
        written: &[Note],
        context: &ConversionContext,
        timeline: &FileTimeline,
        messages: &mut Vec<(u32, MidiMessage)>,
    ) {
        let shift = self.options.transpose * 100;
        let pitch = if shift == 0 {
            Cow::Borrowed(&track.edited_params.pitch)
        } else {
            Cow::Owned(ParamCurve::new(
                track
                    .edited_params
                    .pitch
                    .points
                    .iter()
                    .map(|point| Point::from_pitch(point.x, point.pitch().map(|y| y + shift)))
                    .collect(),
            ))
        };

        let data = match generate_pitch_bend(
            &pitch,
            written,
            context.first_bar_length,
            BORDER_APPEND_RADIUS,
            &PitchBendFormat::DEFAULT,
        ) {
            Ok(Some(data)) => data,
            Ok(None) => return,
            Err(e) => {
                warn!(
                    "Skipping pitch of track '{}': {}..!",
                    track.title, e
                );
                return;
            }
        };

        for event in &data.pbs {
            let tick = timeline.to_file(data.start_pos + event.pos);
            let sensitivity = event.value.clamp(0, 127) as u8;
            for (controller, value) in [(CC_RPN_MSB, 0), (CC_RPN_LSB, 0), (CC_DATA_ENTRY, sensitivity)]
            {
                messages.push((
                    tick,
                    MidiMessage::Controller {
                        controller: controller.into(),
                        value: value.into(),
                    },
                ));
            }
        }

        messages.extend(data.pit.iter().map(|event| {
            (
                timeline.to_file(data.start_pos + event.pos),
                MidiMessage::PitchBend {
                    bend: PitchBend::from_int(event.value as i16),
                },
            )
        }));
    }
}

fn remove_symbols(lyric: &str) -> String {
    lyric.chars().filter(|c| !LYRIC_SYMBOLS.contains(c)).collect()
}

/// Tempo and meter map. Signature ticks accumulate the bar lengths of the preceding signatures.
fn conductor_track<'a>(
    tempos: &[Tempo],
    time_signatures: &[TimeSignature],
    timeline: &FileTimeline,
) -> Vec<TrackEvent<'a>> {
    let mut events: Vec<(u32, TrackEventKind<'a>)> = Vec::new();

    for tempo in tempos {
        let micros = (MICROSECONDS_PER_MINUTE / tempo.bpm).round() as u32;
        events.push((
            timeline.to_file(tempo.position),
            TrackEventKind::Meta(MetaMessage::Tempo(u24::from(micros.min(MAX_TEMPO_MICROS)))),
        ));
    }

    let mut bar_tick = 0.0;
    let mut prev: Option<&TimeSignature> = None;
    for signature in time_signatures {
        if let Some(prev) = prev {
            bar_tick += (signature.bar_index - prev.bar_index) as f64
                * prev.bar_length_in(timeline.ticks_per_beat as i32);
        }
        prev = Some(signature);

        let denominator = signature.denominator.max(1) as u32;
        if !denominator.is_power_of_two() {
            warn!(
                "Denominator {} at bar {} is not a power of two, rounding down..!",
                denominator, signature.bar_index
            );
        }

        events.push((
            bar_tick.round() as u32,
            TrackEventKind::Meta(MetaMessage::TimeSignature(
                signature.numerator.clamp(1, u8::MAX as i32) as u8,
                denominator.ilog2() as u8,
                24,
                8,
            )),
        ));
    }

    events.sort_by_key(|(tick, _)| *tick);
    finish_track(events)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::error::Error;
    use crate::model::project::{InstrumentalTrack, Params};
    use crate::plugins::midi::parser::MidiParser;
    use crate::plugins::midi::parser::test::{note_off, note_on, smf_bytes};

    fn project(notes: Vec<Note>, pitch: ParamCurve) -> Project {
        Project::new(
            vec![Tempo::new(0, 120.0), Tempo::new(1920, 95.5)],
            vec![TimeSignature::new(0, 4, 4), TimeSignature::new(2, 3, 4)],
            vec![Track::Singing(SingingTrack {
                title: "Lead".into(),
                note_list: notes,
                edited_params: Params {
                    pitch,
                    ..Default::default()
                },
                ..Default::default()
            })],
        )
        .unwrap()
    }

    fn samples(curve: &ParamCurve) -> Vec<Point> {
        curve
            .points
            .iter()
            .copied()
            .filter(|p| p.pitch().is_some())
            .collect()
    }

    #[test]
    fn writes_header_and_tracks() {
        env_logger::try_init().unwrap_or(());

        let project = project(vec![Note::new(0, 480, 60, "a")], ParamCurve::default());
        let out = MidiGenerator::default().generate(&project).unwrap();

        assert_eq!(&out[0..4], b"MThd");
        let smf = Smf::parse(&out).unwrap();
        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.tracks.len(), 2);
        assert!(matches!(
            smf.tracks[1].last().map(|e| e.kind),
            Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
        ));
    }

    #[test]
    fn delta_times_follow_absolute_ticks() {
        let mut events = vec![
            TrackEvent {
                delta: 0.into(),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Test")),
            },
            TrackEvent {
                delta: 100.into(),
                kind: TrackEventKind::Meta(MetaMessage::Lyric(b"a")),
            },
            TrackEvent {
                delta: 250.into(),
                kind: TrackEventKind::Meta(MetaMessage::Lyric(b"b")),
            },
        ];

        convert_to_delta_times(&mut events);
        let deltas: Vec<u32> = events.iter().map(|e| e.delta.as_int()).collect();
        assert_eq!(deltas, vec![0, 100, 150]);
    }

    #[test]
    fn parse_back_restores_the_project() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![Note::new(0, 480, 60, "a"), Note::new(480, 480, 63, "b")];
        let mut points = vec![Point::start_point(), Point::gap(1920)];
        points.extend((0..960).step_by(5).map(|t| {
            let key = if t < 480 { 6000 } else { 6300 };
            Point::new(1920 + t, key + (t % 240) * 2 - 240)
        }));
        points.push(Point::end_point());
        let pitch = ParamCurve::new(points);
        let original = project(notes, pitch);

        let bytes = MidiGenerator::default().generate(&original).unwrap();
        let restored = MidiParser::default().parse_project(&bytes).unwrap();

        assert_eq!(restored.song_tempo_list, original.song_tempo_list);
        assert_eq!(restored.time_signature_list, original.time_signature_list);

        let before = original.first_singing_track().unwrap();
        let after = restored.first_singing_track().unwrap();
        assert_eq!(after.title, "Lead");

        let spans = |track: &SingingTrack| -> Vec<(i32, i32, i32, String)> {
            track
                .note_list
                .iter()
                .map(|n| (n.start_pos, n.length, n.key_number, n.lyric.clone()))
                .collect()
        };
        assert_eq!(spans(after), spans(before));
        assert_eq!(
            samples(&after.edited_params.pitch),
            samples(&before.edited_params.pitch)
        );
    }

    #[test]
    fn wide_pitch_writes_sensitivity() {
        let notes = vec![Note::new(0, 480, 60, "a")];
        let mut points = vec![Point::start_point(), Point::gap(1920)];
        points.extend((0..480).step_by(10).map(|t| Point::new(1920 + t, 6450)));
        points.push(Point::end_point());

        let bytes = MidiGenerator::default()
            .generate(&project(notes, ParamCurve::new(points)))
            .unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let data_entries: Vec<u8> = smf.tracks[1]
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::Controller { controller, value },
                    ..
                } if controller.as_int() == CC_DATA_ENTRY => Some(value.as_int()),
                _ => None,
            })
            .collect();
        assert_eq!(data_entries, vec![5, 2]);
    }

    #[test]
    fn transpose_and_lyric_cleanup() {
        env_logger::try_init().unwrap_or(());

        let mut note = Note::new(0, 480, 120, "ah!");
        note.pronunciation = Some(String::new());
        let project = project(vec![note], ParamCurve::default());

        let generator = MidiGenerator::new(OutputOptions {
            transpose: 12,
            ..Default::default()
        });
        let restored = MidiParser::default()
            .parse_project(&generator.generate(&project).unwrap())
            .unwrap();

        let note = &restored.first_singing_track().unwrap().note_list[0];
        assert_eq!(note.key_number, 127);
        assert_eq!(note.lyric, "ah");
    }

    #[test]
    fn clamped_keys_keep_their_pitch() {
        env_logger::try_init().unwrap_or(());

        let mut points = vec![Point::start_point(), Point::gap(1920)];
        points.extend((0..480).step_by(10).map(|t| Point::new(1920 + t, 12000)));
        points.push(Point::end_point());
        let project = project(vec![Note::new(0, 480, 120, "a")], ParamCurve::new(points));

        let generator = MidiGenerator::new(OutputOptions {
            transpose: 12,
            ..Default::default()
        });
        let restored = MidiParser::default()
            .parse_project(&generator.generate(&project).unwrap())
            .unwrap();

        let track = restored.first_singing_track().unwrap();
        assert_eq!(track.note_list[0].key_number, 127);

        let values: Vec<i32> = samples(&track.edited_params.pitch)
            .iter()
            .map(|p| p.y)
            .collect();
        assert_eq!(values.len(), 48);
        assert!(values.iter().all(|y| *y == 13200));
    }

    #[test]
    fn ticks_are_rescaled_on_output() {
        let project = project(vec![Note::new(480, 960, 60, "a")], ParamCurve::default());
        let generator = MidiGenerator::new(OutputOptions {
            ticks_per_beat: 96,
            ..Default::default()
        });
        let bytes = generator.generate(&project).unwrap();

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.timing, Timing::Metrical(96.into()));

        let restored = MidiParser::default().parse_project(&bytes).unwrap();
        let note = &restored.first_singing_track().unwrap().note_list[0];
        assert_eq!((note.start_pos, note.length), (480, 960));
        assert_eq!(restored.time_signature_list, project.time_signature_list);
    }

    #[test]
    fn instrumental_only_project_is_rejected() {
        let project = Project {
            track_list: vec![Track::Instrumental(InstrumentalTrack::default())],
            ..Default::default()
        };

        let err = MidiGenerator::default().generate(&project).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::NoSingingTrack));
    }

    #[test]
    fn overlapping_notes_drop_only_pitch() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![Note::new(0, 600, 60, "a"), Note::new(480, 480, 62, "b")];
        let pitch = ParamCurve::new(vec![Point::new(1920, 6000), Point::new(2000, 6010)]);
        let bytes = MidiGenerator::default()
            .generate(&project(notes, pitch))
            .unwrap();

        let parsed = MidiParser::default().parse_project(&bytes).unwrap();
        let track = parsed.first_singing_track().unwrap();
        assert_eq!(track.note_list.len(), 2);
        assert!(track.edited_params.pitch.is_empty());
    }

    #[test]
    fn orphaned_note_off_in_input_is_ignored() {
        let bytes = smf_bytes(480, vec![vec![note_off(0, 0, 61), note_on(0, 0, 60), note_off(480, 0, 60)]]);
        let project = MidiParser::default().parse_project(&bytes).unwrap();
        let out = MidiGenerator::default().generate(&project).unwrap();
        assert_eq!(Smf::parse(&out).unwrap().tracks.len(), 2);
    }
}
