use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use svs_bridge::model::curve::ParamCurve;
use svs_bridge::model::point::Point;
use svs_bridge::pitch::bend::{PitchBendFormat, generate_pitch_bend, section_pitch};
use svs_bridge::{
    ConversionContext, MidiGenerator, MidiParser, Note, Params, Project, SingingTrack, Tempo,
    TimeSignature, Track,
};

fn flat_project() -> Project {
    let mut points = vec![Point::start_point(), Point::gap(1920)];
    points.extend((0..480).step_by(5).map(|t| Point::new(1920 + t, 6000)));
    points.push(Point::gap(2400));
    points.push(Point::end_point());

    Project::new(
        vec![Tempo::new(0, 120.0)],
        vec![TimeSignature::new(0, 4, 4)],
        vec![Track::Singing(SingingTrack {
            title: "Vocal".into(),
            note_list: vec![Note::new(0, 480, 60, "a")],
            edited_params: Params {
                pitch: ParamCurve::new(points),
                ..Default::default()
            },
            ..Default::default()
        })],
    )
    .unwrap()
}

#[test]
fn flat_pitch_needs_no_sensitivity_change() {
    let project = flat_project();
    let context = ConversionContext::from_project(&project).unwrap();
    let track = project.first_singing_track().unwrap();
    let format = PitchBendFormat::DEFAULT;

    assert_eq!(context.first_bar_length, 1920);
    assert_eq!(context.synchronizer.get_actual_secs_from_ticks(480), 0.5);

    let data = generate_pitch_bend(
        &track.edited_params.pitch,
        &track.note_list,
        context.first_bar_length,
        0,
        &format,
    )
    .unwrap()
    .unwrap();

    assert!(data.pbs.is_empty());
    assert!(data.pit.iter().all(|event| event.value == 0));
    assert_eq!(data.pit.first().map(|event| event.pos), Some(0));
    assert!(data.pit.iter().all(|event| (0..480).contains(&event.pos)));

    let relative: Vec<Point> = data
        .pit
        .iter()
        .map(|event| Point::new(event.pos, 0))
        .collect();
    let sections = section_pitch(&relative, &format);
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].start_pos(), 0);
    assert!(sections[0].last_pos() < 480);
    assert_eq!(sections[0].required_sensitivity, 1);
}

#[test]
fn project_survives_midi() {
    let project = flat_project();
    let bytes = MidiGenerator::default().generate(&project).unwrap();
    let restored = MidiParser::default().parse_project(&bytes).unwrap();

    assert_eq!(restored.song_tempo_list, project.song_tempo_list);
    assert_eq!(restored.time_signature_list, project.time_signature_list);

    let before = project.first_singing_track().unwrap();
    let after = restored.first_singing_track().unwrap();
    assert_eq!(after.title, before.title);
    assert_eq!(after.note_list.len(), 1);
    assert_eq!(after.note_list[0].start_pos, 0);
    assert_eq!(after.note_list[0].length, 480);
    assert_eq!(after.note_list[0].key_number, 60);
    assert_eq!(after.note_list[0].lyric, "a");

    let pitch = |track: &SingingTrack| -> Vec<Point> {
        track
            .edited_params
            .pitch
            .points
            .iter()
            .copied()
            .filter(|point| point.pitch().is_some())
            .collect()
    };
    assert_eq!(pitch(after), pitch(before));
}

#[test]
fn midi_survives_project() {
    let event = |delta: u32, kind: TrackEventKind<'static>| TrackEvent {
        delta: u28::from(delta),
        kind,
    };
    let note = |delta: u32, key: u8, vel: u8| {
        event(
            delta,
            TrackEventKind::Midi {
                channel: u4::from(0),
                message: MidiMessage::NoteOn {
                    key: u7::from(key),
                    vel: u7::from(vel),
                },
            },
        )
    };

    let source = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::from(240)),
        },
        tracks: vec![
            vec![
                event(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(400_000)))),
                event(0, TrackEventKind::Meta(MetaMessage::TimeSignature(6, 3, 24, 8))),
                event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
            ],
            vec![
                event(0, TrackEventKind::Meta(MetaMessage::TrackName(b"Melody"))),
                event(0, TrackEventKind::Meta(MetaMessage::Lyric(b"do"))),
                note(0, 60, 100),
                note(240, 60, 0),
                event(0, TrackEventKind::Meta(MetaMessage::Lyric(b"re"))),
                note(0, 62, 100),
                note(480, 62, 0),
                event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
            ],
        ],
    };
    let mut bytes = Vec::new();
    source.write_std(&mut bytes).unwrap();

    let project = MidiParser::default().parse_project(&bytes).unwrap();
    assert_eq!(project.song_tempo_list, vec![Tempo::new(0, 150.0)]);
    assert_eq!(project.time_signature_list, vec![TimeSignature::new(0, 6, 8)]);

    let written = MidiGenerator::default().generate(&project).unwrap();
    let reparsed = MidiParser::default().parse_project(&written).unwrap();
    assert_eq!(reparsed, project);

    let notes: Vec<(i32, i32, i32, &str)> = reparsed
        .first_singing_track()
        .unwrap()
        .note_list
        .iter()
        .map(|n| (n.start_pos, n.length, n.key_number, n.lyric.as_str()))
        .collect();
    assert_eq!(notes, vec![(0, 480, 60, "do"), (480, 960, 62, "re")]);
}
