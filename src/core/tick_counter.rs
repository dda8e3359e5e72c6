use crate::model::project::{Tempo, TimeSignature};
use log::warn;

/// Cuts the first `skip_ticks` ticks off a tempo map. The tempo in force at `skip_ticks` is
/// re-anchored at tick 0.
pub fn skip_tempo_list(tempo_list: &[Tempo], skip_ticks: i32) -> Vec<Tempo> {
    let mut result: Vec<Tempo> = tempo_list
        .iter()
        .filter(|tempo| tempo.position >= skip_ticks)
        .map(|tempo| Tempo::new(tempo.position - skip_ticks, tempo.bpm))
        .collect();

    if result.first().is_none_or(|first| first.position > 0) {
        let carried = tempo_list
            .iter()
            .rfind(|tempo| tempo.position <= skip_ticks)
            .or(tempo_list.first())
            .map(|tempo| Tempo::new(0, tempo.bpm))
            .unwrap_or_default();
        result.insert(0, carried);
    }

    result
}

/// Cuts the first `skip_bars` bars off a time signature list.
pub fn skip_beat_list(beat_list: &[TimeSignature], skip_bars: i32) -> Vec<TimeSignature> {
    let mut result: Vec<TimeSignature> = beat_list
        .iter()
        .filter(|beat| beat.bar_index >= skip_bars)
        .map(|beat| TimeSignature {
            bar_index: beat.bar_index - skip_bars,
            ..*beat
        })
        .collect();

    if result.first().is_none_or(|first| first.bar_index > 0) {
        let carried = beat_list
            .iter()
            .rfind(|beat| beat.bar_index <= skip_bars)
            .or(beat_list.first())
            .map(|beat| TimeSignature {
                bar_index: 0,
                ..*beat
            })
            .unwrap_or_default();
        result.insert(0, carried);
    }

    result
}

/// Shifts every tempo but the first by `shift_ticks`.
pub fn shift_tempo_list(tempo_list: &[Tempo], shift_ticks: i32) -> Vec<Tempo> {
    tempo_list
        .iter()
        .enumerate()
        .map(|(i, tempo)| {
            if i == 0 {
                *tempo
            } else {
                Tempo::new(tempo.position + shift_ticks, tempo.bpm)
            }
        })
        .collect()
}

/// Shifts every time signature but the first by `shift_bars`.
pub fn shift_beat_list(beat_list: &[TimeSignature], shift_bars: i32) -> Vec<TimeSignature> {
    beat_list
        .iter()
        .enumerate()
        .map(|(i, beat)| {
            if i == 0 {
                *beat
            } else {
                TimeSignature {
                    bar_index: beat.bar_index + shift_bars,
                    ..*beat
                }
            }
        })
        .collect()
}

/// Turns an untrusted tempo list into one a [`TimeSynchronizer`] accepts: sorted, positive bpm
/// only, one entry per position (last wins) and anchored at tick 0.
///
/// [`TimeSynchronizer`]: crate::core::time_sync::TimeSynchronizer
pub fn normalize_tempo_list(tempo_list: &[Tempo], default_bpm: f64) -> Vec<Tempo> {
    let mut result: Vec<Tempo> = Vec::with_capacity(tempo_list.len() + 1);

    let mut sorted: Vec<Tempo> = tempo_list.to_vec();
    sorted.sort_by_key(|tempo| tempo.position);

    for tempo in sorted {
        if !(tempo.bpm > 0.0) || !tempo.bpm.is_finite() {
            warn!(
                "Dropping tempo with invalid bpm {} at tick {}..!",
                tempo.bpm, tempo.position
            );
            continue;
        }

        match result.last_mut() {
            Some(last) if last.position == tempo.position => *last = tempo,
            _ => result.push(tempo),
        }
    }

    match result.first().copied() {
        None => result.push(Tempo::new(0, default_bpm)),
        Some(first) if first.position > 0 => result.insert(0, Tempo::new(0, first.bpm)),
        Some(first) if first.position < 0 => {
            // Tempos before the origin collapse into the one in force at tick 0.
            let anchor = result
                .iter()
                .rfind(|tempo| tempo.position <= 0)
                .map(|tempo| tempo.bpm)
                .unwrap_or(default_bpm);
            result.retain(|tempo| tempo.position > 0);
            result.insert(0, Tempo::new(0, anchor));
        }
        Some(_) => {}
    }

    result
}

/// Sorts a time signature list and makes sure it starts with a bar-0 entry (4/4 if absent).
/// Entries with a non-positive numerator or denominator are dropped.
pub fn normalize_time_signature_list(beat_list: &[TimeSignature]) -> Vec<TimeSignature> {
    let mut result: Vec<TimeSignature> = beat_list
        .iter()
        .filter(|beat| beat.numerator > 0 && beat.denominator > 0)
        .copied()
        .collect();
    result.sort_by_key(|beat| beat.bar_index);

    if result.first().is_none_or(|first| first.bar_index > 0) {
        result.insert(0, TimeSignature::default());
    }

    result
}
