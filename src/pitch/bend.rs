use crate::core::constants::{
    DEFAULT_PITCH_BEND_SENSITIVITY, MAX_PITCH_BEND_SENSITIVITY,
    MIN_BREAK_LENGTH_BETWEEN_PITCH_SECTIONS, PITCH_MAX_VALUE,
};
use crate::core::error::Result;
use crate::model::curve::ParamCurve;
use crate::model::point::Point;
use crate::model::project::Note;
use crate::model::relative_pitch_curve::RelativePitchCurve;
use log::debug;
use serde::{Deserialize, Serialize};

/// Raw pitch bend range and sensitivity conventions of a relative-pitch format.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchBendFormat {
    /// Largest positive raw bend. Negative bends reach one further.
    pub bend_scale: i32,
    /// Sensitivity in force before the first explicit sensitivity event, in semitones.
    pub default_sensitivity: i32,
    pub max_sensitivity: i32,
}

impl PitchBendFormat {
    pub const DEFAULT: Self = Self {
        bend_scale: PITCH_MAX_VALUE,
        default_sensitivity: DEFAULT_PITCH_BEND_SENSITIVITY,
        max_sensitivity: MAX_PITCH_BEND_SENSITIVITY,
    };

    fn scale_for(&self, value: i32) -> f64 {
        if value > 0 {
            self.bend_scale as f64
        } else {
            (self.bend_scale + 1) as f64
        }
    }

    /// Raw bend for a deviation in cents under `sensitivity`, clamped to the bend range.
    pub fn cents_to_bend(&self, cents: i32, sensitivity: i32) -> i32 {
        let raw = cents as f64 * self.scale_for(cents) / 100.0 / sensitivity.max(1) as f64;
        raw.round()
            .clamp(-(self.bend_scale as f64) - 1.0, self.bend_scale as f64) as i32
    }

    /// Cents for a raw bend already multiplied by its sensitivity.
    pub fn weighted_bend_to_cents(&self, weighted: i32) -> i32 {
        (weighted as f64 * 100.0 / self.scale_for(weighted)).round() as i32
    }
}

impl Default for PitchBendFormat {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerEvent {
    pub pos: i32,
    pub value: i32,
}

impl ControllerEvent {
    pub fn new(pos: i32, value: i32) -> Self {
        Self { pos, value }
    }
}

/// Pitch bend (`pit`) and sensitivity (`pbs`) streams of one part, positioned relative to
/// `start_pos`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PartPitchData {
    pub start_pos: i32,
    pub pit: Vec<ControllerEvent>,
    pub pbs: Vec<ControllerEvent>,
}

/// A run of relative samples without a break of [`MIN_BREAK_LENGTH_BETWEEN_PITCH_SECTIONS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchSection {
    pub points: Vec<Point>,
    /// Smallest whole-semitone sensitivity covering the largest deviation, at least 1.
    pub required_sensitivity: i32,
}

impl PitchSection {
    pub fn start_pos(&self) -> i32 {
        self.points.first().map_or(0, |p| p.x)
    }

    pub fn last_pos(&self) -> i32 {
        self.points.last().map_or(0, |p| p.x)
    }
}

/// Groups relative samples into sections and works out the sensitivity each one needs.
pub fn section_pitch(points: &[Point], format: &PitchBendFormat) -> Vec<PitchSection> {
    let mut grouped: Vec<Vec<Point>> = Vec::new();
    let mut current_pos = 0;

    for point in points {
        match grouped.last_mut() {
            Some(section) if point.x - current_pos < MIN_BREAK_LENGTH_BETWEEN_PITCH_SECTIONS => {
                section.push(*point)
            }
            _ => grouped.push(vec![*point]),
        }
        current_pos = point.x;
    }

    grouped
        .into_iter()
        .map(|points| {
            let max_abs_cents = points.iter().map(|p| p.y.unsigned_abs()).max().unwrap_or(0);
            let required = (max_abs_cents as f64 / 100.0).ceil() as i32;

            PitchSection {
                points,
                required_sensitivity: required.clamp(1, format.max_sensitivity.max(1)),
            }
        })
        .collect()
}

/// Encodes an absolute pitch curve as pitch bend and sensitivity events.
///
/// Sections needing more than the default sensitivity get a sensitivity event at their start
/// and a reset shortly after their end. Returns `None` when the curve holds no pitch data.
pub fn generate_pitch_bend(
    pitch: &ParamCurve,
    notes: &[Note],
    first_bar_length: i32,
    border_append_radius: i32,
    format: &PitchBendFormat,
) -> Result<Option<PartPitchData>> {
    let Some(data) = RelativePitchCurve::new(first_bar_length).from_absolute(
        &pitch.points,
        notes,
        border_append_radius,
    )?
    else {
        return Ok(None);
    };

    let mut pit: Vec<ControllerEvent> = Vec::with_capacity(data.len());
    let mut pbs: Vec<ControllerEvent> = Vec::new();

    for section in section_pitch(&data, format) {
        let sensitivity = if section.required_sensitivity > format.default_sensitivity {
            pbs.push(ControllerEvent::new(
                section.start_pos(),
                section.required_sensitivity,
            ));
            pbs.push(ControllerEvent::new(
                section.last_pos() + MIN_BREAK_LENGTH_BETWEEN_PITCH_SECTIONS / 2,
                format.default_sensitivity,
            ));
            section.required_sensitivity
        } else {
            format.default_sensitivity
        };

        if section
            .points
            .iter()
            .any(|p| p.y.unsigned_abs() > (sensitivity * 100).unsigned_abs())
        {
            debug!(
                "Pitch section at tick {} exceeds {} semitones and will be clipped",
                section.start_pos(),
                sensitivity
            );
        }

        pit.extend(
            section
                .points
                .iter()
                .map(|p| ControllerEvent::new(p.x, format.cents_to_bend(p.y, sensitivity))),
        );
    }

    Ok(Some(PartPitchData {
        start_pos: 0,
        pit,
        pbs,
    }))
}

/// Multiplies every pitch bend by the sensitivity in force at its position, on the absolute
/// note timeline. A sensitivity event applies from its own position onwards.
///
/// Bends outside the raw range and sensitivities outside `0..=max_sensitivity` are clamped.
fn weighted_pitch(part: &PartPitchData, format: &PitchBendFormat) -> Vec<(i32, i32)> {
    let mut result: Vec<(i32, i32)> = Vec::with_capacity(part.pit.len());
    let mut pbs_events = part.pbs.iter().peekable();
    let mut sensitivity = format.default_sensitivity;

    for event in &part.pit {
        while let Some(pbs) = pbs_events.next_if(|pbs| pbs.pos <= event.pos) {
            sensitivity = pbs.value.clamp(0, format.max_sensitivity);
        }

        let pos = part.start_pos.saturating_add(event.pos);
        let bend = event.value.clamp(-format.bend_scale - 1, format.bend_scale);
        let value = bend * sensitivity;
        match result.last_mut() {
            Some(last) if last.0 == pos => last.1 = value,
            _ => result.push((pos, value)),
        }
    }

    result
}

/// Decodes the pitch bend streams of several parts back into an absolute pitch curve.
///
/// Where parts overlap, a later part cuts the merged stream at its own first position and
/// replaces everything from there on. Returns `None` without samples or notes.
pub fn pitch_from_parts(
    parts: &[PartPitchData],
    notes: &[Note],
    first_bar_length: i32,
    format: &PitchBendFormat,
) -> Option<ParamCurve> {
    let mut merged: Vec<(i32, i32)> = Vec::new();

    for part in parts {
        let weighted = weighted_pitch(part, format);
        let Some(&(first_pos, _)) = weighted.first() else {
            continue;
        };

        let cut = merged
            .iter()
            .position(|&(pos, _)| pos >= first_pos)
            .unwrap_or(merged.len());
        merged.truncate(cut);
        merged.extend(weighted);
    }

    if merged.is_empty() || notes.is_empty() {
        return None;
    }

    let data: Vec<Point> = merged
        .into_iter()
        .map(|(pos, weighted)| Point::new(pos, format.weighted_bend_to_cents(weighted)))
        .collect();

    RelativePitchCurve::new(first_bar_length).to_absolute(&data, notes)
}
