use crate::core::error::{Error, Result};
use crate::model::curve::ParamCurve;
use crate::model::point::Point;
use crate::model::project::Note;
use log::debug;
use std::borrow::Cow;

/// Converts between the model's absolute pitch curve and per-note relative pitch.
///
/// Relative points are positioned on the note timeline and hold cents away from the key of the
/// note they fall under. Absolute points are positioned on the project timeline, which is
/// `first_bar_length` ticks ahead of the note timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelativePitchCurve {
    pub first_bar_length: i32,
}

impl RelativePitchCurve {
    pub fn new(first_bar_length: i32) -> Self {
        Self { first_bar_length }
    }

    /// Re-baselines relative points onto the keys of `notes`.
    ///
    /// Points outside every note are dropped. Each note's run of samples is bracketed by
    /// sentinels and the whole curve by the start and end points. Returns `None` when there is
    /// nothing to convert, so callers can tell "absent" from "flat".
    pub fn to_absolute(&self, points: &[Point], notes: &[Note]) -> Option<ParamCurve> {
        if points.is_empty() || notes.is_empty() {
            return None;
        }

        let notes = sorted_by_start(notes);
        let mut curve: Vec<Point> = Vec::with_capacity(points.len() + 3);
        let mut prev_index: Option<usize> = None;

        for point in points {
            let Some(note_index) = notes
                .partition_point(|note| note.start_pos <= point.x)
                .checked_sub(1)
            else {
                continue;
            };

            let note = &notes[note_index];
            if point.x >= note.end_pos() {
                continue;
            }

            let x = point.x + self.first_bar_length;
            if prev_index != Some(note_index) {
                prev_index = Some(note_index);
                match curve.last() {
                    Some(last) => curve.push(Point::gap(last.x)),
                    None => curve.push(Point::start_point()),
                }
                curve.push(Point::gap(x));
            }

            curve.push(Point::new(x, note.key_number * 100 + point.y));
        }

        if curve.is_empty() {
            debug!("No relative pitch sample fell inside a note");
            return None;
        }
        curve.push(Point::end_point());

        Some(ParamCurve::new(curve))
    }

    /// Expresses an absolute pitch curve relative to the key of the note each sample belongs to.
    ///
    /// A sample belongs to the note whose region contains it; regions meet halfway between
    /// separated notes. Gap samples are skipped. `border_append_radius` adds a leading sample
    /// ahead of closely spaced note starts so the new key is reached on time.
    pub fn from_absolute(
        &self,
        points: &[Point],
        notes: &[Note],
        border_append_radius: i32,
    ) -> Result<Option<Vec<Point>>> {
        let notes = sorted_by_start(notes);
        let Some(first_note) = notes.first() else {
            return Ok(None);
        };

        let borders = note_borders(&notes)?;
        let mut index = 0;
        let mut key = first_note.key_number;
        let mut next_border = borders.first().copied();
        let mut converted: Vec<Point> = Vec::with_capacity(points.len());

        for point in points.iter().filter(|p| !p.is_bracket()) {
            let Some(value) = point.pitch() else {
                continue;
            };

            let pos = point.x - self.first_bar_length;
            while let Some(border) = next_border
                && pos >= border
            {
                index += 1;
                key = notes[index].key_number;
                next_border = borders.get(index).copied();
            }

            converted.push(Point::new(pos, value - key * 100));
        }

        if converted.is_empty() {
            return Ok(None);
        }

        Ok(Some(append_points_at_borders(
            converted,
            &notes,
            border_append_radius,
        )))
    }
}

/// Notes in start order. Input that is already sorted is borrowed as is.
fn sorted_by_start(notes: &[Note]) -> Cow<'_, [Note]> {
    if notes.is_sorted_by_key(|note| note.start_pos) {
        Cow::Borrowed(notes)
    } else {
        let mut sorted = notes.to_vec();
        sorted.sort_by_key(|note| note.start_pos);
        Cow::Owned(sorted)
    }
}

/// Positions where one note's region ends and the next begins.
fn note_borders(notes: &[Note]) -> Result<Vec<i32>> {
    notes
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let (prev, next) = (&pair[0], &pair[1]);
            let prev_end = prev.end_pos();

            if prev_end == next.start_pos {
                Ok(next.start_pos)
            } else if prev_end < next.start_pos {
                Ok((next.start_pos + prev_end).div_euclid(2))
            } else {
                Err(Error::NotesOverlapped { index: i + 1 })
            }
        })
        .collect()
}

fn append_points_at_borders(mut data: Vec<Point>, notes: &[Note], radius: i32) -> Vec<Point> {
    if radius <= 0 {
        return data;
    }

    for pair in notes.windows(2) {
        let (last_note, this_note) = (&pair[0], &pair[1]);
        if this_note.start_pos - last_note.end_pos() > radius {
            continue;
        }

        let Some(first_index) = data.iter().position(|p| p.x >= this_note.start_pos) else {
            continue;
        };

        let first_point = data[first_index];
        if first_point.x == this_note.start_pos || first_point.x - this_note.start_pos > radius {
            continue;
        }

        let new_point = Point::new(this_note.start_pos - radius, first_point.y);
        data.insert(first_index, new_point);
        data.retain(|p| !(new_point.x <= p.x && p.x < this_note.start_pos && *p != new_point));
    }

    data
}
