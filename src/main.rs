use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::fs;
use svs_bridge::{Args, Command, MidiGenerator, MidiParser, Project};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Inspect {
            midi,
            input,
            content,
        } => {
            info!("Importing MIDI file: '{}'...", midi.display());
            let project = MidiParser::new(input.options(&content)).parse_file(&midi)?;
            inspect(&project)?;
        }
        Command::ToJson {
            midi,
            output,
            input,
            content,
        } => {
            info!("Importing MIDI file: '{}'...", midi.display());
            let project = MidiParser::new(input.options(&content)).parse_file(&midi)?;
            let json = serde_json::to_string_pretty(&project)?;

            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote project JSON to '{}'..!", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::FromJson {
            project,
            output,
            output_args,
            content,
        } => {
            info!("Loading project: '{}'...", project.display());
            let text = fs::read_to_string(&project)
                .with_context(|| format!("Failed to read {}", project.display()))?;
            let project: Project = serde_json::from_str(&text)
                .with_context(|| format!("Malformed project JSON in {}", project.display()))?;
            project.validate()?;

            MidiGenerator::new(output_args.options(&content)).generate_file(&project, &output)?;
            info!("Wrote MIDI file to '{}'..!", output.display());
        }
        Command::RoundTrip {
            midi,
            output,
            input,
            output_args,
            content,
        } => {
            info!("Importing MIDI file: '{}'...", midi.display());
            let project = MidiParser::new(input.options(&content)).parse_file(&midi)?;
            debug!("Imported {} track(s)", project.track_list.len());

            MidiGenerator::new(output_args.options(&content)).generate_file(&project, &output)?;
            info!("Wrote MIDI file to '{}'..!", output.display());
        }
    }

    Ok(())
}

fn inspect(project: &Project) -> Result<()> {
    let synchronizer = project.time_synchronizer()?;

    for tempo in &project.song_tempo_list {
        info!(
            "Tempo {:>8.3} bpm at tick {:>7} ({:.3}s)",
            tempo.bpm,
            tempo.position,
            synchronizer.get_actual_secs_from_ticks(tempo.position)
        );
    }

    for signature in &project.time_signature_list {
        info!(
            "Meter {}/{} from bar {}",
            signature.numerator, signature.denominator, signature.bar_index
        );
    }

    for track in project.singing_tracks() {
        let (start, end) = match (track.note_list.first(), track.note_list.last()) {
            (Some(first), Some(last)) => (first.start_pos, last.end_pos()),
            _ => (0, 0),
        };
        let pitch_points = track
            .edited_params
            .pitch
            .points
            .iter()
            .filter(|point| point.pitch().is_some())
            .count();

        info!(
            "Track '{}': {} note(s), {} pitch point(s), {:.3}s",
            track.title,
            track.note_list.len(),
            pitch_points,
            synchronizer.get_duration_secs_from_ticks(start, end)
        );
    }

    Ok(())
}
