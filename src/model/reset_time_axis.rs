use crate::core::error::Result;
use crate::core::time_sync::TimeSynchronizer;
use crate::model::curve::ParamCurve;
use crate::model::point::Point;
use crate::model::project::{Note, Params, Project, Tempo, TimeSignature, Track};
use log::debug;

struct Retimer {
    synchronizer: TimeSynchronizer,
    old_first_bar_length: i32,
    new_first_bar_length: i32,
}

impl Retimer {
    fn ticks(&self, ticks: i32) -> i32 {
        self.synchronizer.get_actual_ticks_from_ticks(ticks).round() as i32
    }

    fn note(&self, note: &Note) -> Note {
        let start_pos = self.ticks(note.start_pos);
        let end_pos = self.ticks(note.end_pos());

        Note {
            start_pos,
            length: end_pos - start_pos,
            ..note.clone()
        }
    }

    // Brackets stay where they are so the curve keeps its start and end sentinels.
    fn curve(&self, curve: &ParamCurve) -> ParamCurve {
        let points = curve
            .points
            .iter()
            .map(|point| {
                if point.is_bracket() {
                    return *point;
                }
                let x = self.ticks(point.x - self.old_first_bar_length) + self.new_first_bar_length;
                Point::new(x, point.y)
            })
            .collect();

        ParamCurve::new(points)
    }

    fn params(&self, params: &Params) -> Params {
        Params {
            pitch: self.curve(&params.pitch),
            volume: self.curve(&params.volume),
            breath: self.curve(&params.breath),
            gender: self.curve(&params.gender),
            strength: self.curve(&params.strength),
        }
    }
}

/// Rebuilds `project` on a single `bpm` tempo in 4/4 so every event keeps its position in
/// seconds. Notes, curves and instrumental offsets are all re-timed.
pub fn reset_time_axis(project: &Project, bpm: f64) -> Result<Project> {
    project.validate()?;

    let time_signature = TimeSignature::new(0, 4, 4);
    let retimer = Retimer {
        synchronizer: TimeSynchronizer::absolute_time_code(&project.song_tempo_list, bpm)?,
        old_first_bar_length: project.first_bar_length(),
        new_first_bar_length: time_signature.bar_length(),
    };

    let track_list = project
        .track_list
        .iter()
        .map(|track| match track {
            Track::Singing(singing) => {
                let mut singing = singing.clone();
                singing.note_list = singing
                    .note_list
                    .iter()
                    .map(|note| retimer.note(note))
                    .collect();
                singing.edited_params = retimer.params(&singing.edited_params);
                Track::Singing(singing)
            }
            Track::Instrumental(instrumental) => {
                let mut instrumental = instrumental.clone();
                instrumental.offset = retimer.ticks(instrumental.offset);
                Track::Instrumental(instrumental)
            }
        })
        .collect();

    debug!(
        "Reset {} tempo(s) onto a constant {} bpm",
        project.song_tempo_list.len(),
        bpm
    );

    Ok(Project {
        version: project.version.clone(),
        song_tempo_list: vec![Tempo::new(0, bpm)],
        time_signature_list: vec![time_signature],
        track_list,
    })
}
