use crate::core::constants::TICKS_IN_BEAT;
use crate::core::error::{Error, Result};
use crate::core::tick_counter::skip_tempo_list;
use crate::model::project::Tempo;
use log::debug;

const SECONDS_PER_MINUTE: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    start_tick: i32,
    bpm: f64,
    secs_at_start: f64,
}

impl TempoSegment {
    fn ticks_to_secs(&self, ticks: f64) -> f64 {
        ticks / TICKS_IN_BEAT as f64 * SECONDS_PER_MINUTE / self.bpm
    }

    fn secs_to_ticks(&self, secs: f64) -> f64 {
        secs * self.bpm / SECONDS_PER_MINUTE * TICKS_IN_BEAT as f64
    }
}

/// Converts between neutral tick positions and elapsed seconds for one tempo map.
///
/// Immutable once built, so a single instance can be shared read-only across threads.
///
/// In absolute time code mode, tick outputs are measured on a single-tempo axis running at
/// `default_tempo` instead of on the tempo map itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSynchronizer {
    segments: Vec<TempoSegment>,
    default_tempo: Option<f64>,
}

impl TimeSynchronizer {
    pub fn new(tempo_list: &[Tempo]) -> Result<Self> {
        Self::validate(tempo_list)?;

        let mut segments: Vec<TempoSegment> = Vec::with_capacity(tempo_list.len());
        let mut secs_accum = 0.0;

        for tempo in tempo_list {
            if let Some(prev) = segments.last() {
                secs_accum += prev.ticks_to_secs((tempo.position - prev.start_tick) as f64);
            }

            segments.push(TempoSegment {
                start_tick: tempo.position,
                bpm: tempo.bpm,
                secs_at_start: secs_accum,
            });
        }

        debug!("Built time synchronizer over {} tempo segment(s)", segments.len());

        Ok(Self {
            segments,
            default_tempo: None,
        })
    }

    /// Builds a synchronizer whose tick outputs are re-timed onto a constant `default_tempo`.
    pub fn absolute_time_code(tempo_list: &[Tempo], default_tempo: f64) -> Result<Self> {
        if !(default_tempo > 0.0) || !default_tempo.is_finite() {
            return Err(Error::NonPositiveBpm {
                position: 0,
                bpm: default_tempo,
            });
        }

        Ok(Self {
            default_tempo: Some(default_tempo),
            ..Self::new(tempo_list)?
        })
    }

    pub fn is_absolute_time_code(&self) -> bool {
        self.default_tempo.is_some()
    }

    /// Builds a synchronizer for a timeline whose first `skip_ticks` ticks have been cut off.
    pub fn with_skip_ticks(tempo_list: &[Tempo], skip_ticks: i32) -> Result<Self> {
        if skip_ticks > 0 {
            Self::new(&skip_tempo_list(tempo_list, skip_ticks))
        } else {
            Self::new(tempo_list)
        }
    }

    /// Checks the tempo map contract: non-empty, anchored at tick 0, positions never decreasing,
    /// every bpm strictly positive.
    pub fn validate(tempo_list: &[Tempo]) -> Result<()> {
        let Some(first) = tempo_list.first() else {
            return Err(Error::EmptyTempoList);
        };

        if first.position != 0 {
            return Err(Error::MissingInitialTempo {
                position: first.position,
            });
        }

        for (index, tempo) in tempo_list.iter().enumerate() {
            if !(tempo.bpm > 0.0) || !tempo.bpm.is_finite() {
                return Err(Error::NonPositiveBpm {
                    position: tempo.position,
                    bpm: tempo.bpm,
                });
            }

            if index > 0 && tempo.position < tempo_list[index - 1].position {
                return Err(Error::TempoOutOfOrder { index });
            }
        }

        Ok(())
    }

    pub fn tempo_list(&self) -> Vec<Tempo> {
        self.segments
            .iter()
            .map(|segment| Tempo::new(segment.start_tick, segment.bpm))
            .collect()
    }

    // Ticks before the first segment fall into it and extrapolate backwards.
    fn segment_by_ticks(&self, ticks: f64) -> &TempoSegment {
        let index = self
            .segments
            .partition_point(|segment| segment.start_tick as f64 <= ticks);
        &self.segments[index.saturating_sub(1)]
    }

    fn segment_by_secs(&self, secs: f64) -> &TempoSegment {
        let index = self
            .segments
            .partition_point(|segment| segment.secs_at_start <= secs);
        &self.segments[index.saturating_sub(1)]
    }

    fn secs_at(&self, ticks: f64) -> f64 {
        let segment = self.segment_by_ticks(ticks);
        segment.secs_at_start + segment.ticks_to_secs(ticks - segment.start_tick as f64)
    }

    /// Seconds elapsed from tick 0 to `ticks`. Negative for ticks before the start.
    pub fn get_actual_secs_from_ticks(&self, ticks: i32) -> f64 {
        self.secs_at(ticks as f64)
    }

    /// Tick position reached after `secs` seconds. Callers round to whole ticks as needed.
    pub fn get_actual_ticks_from_secs(&self, secs: f64) -> f64 {
        if let Some(bpm) = self.default_tempo {
            return secs * bpm / SECONDS_PER_MINUTE * TICKS_IN_BEAT as f64;
        }

        let segment = self.segment_by_secs(secs);
        segment.start_tick as f64 + segment.secs_to_ticks(secs - segment.secs_at_start)
    }

    /// Position of `ticks` on the single-tempo axis. The identity outside absolute time code
    /// mode.
    pub fn get_actual_ticks_from_ticks(&self, ticks: i32) -> f64 {
        match self.default_tempo {
            Some(_) => self.get_actual_ticks_from_secs(self.get_actual_secs_from_ticks(ticks)),
            None => ticks as f64,
        }
    }

    /// Tick position `offset_secs` seconds after the tick `start_ticks`.
    pub fn get_actual_ticks_from_secs_offset(&self, start_ticks: i32, offset_secs: f64) -> f64 {
        self.get_actual_ticks_from_secs(self.get_actual_secs_from_ticks(start_ticks) + offset_secs)
    }

    pub fn get_duration_secs_from_ticks(&self, start_ticks: i32, end_ticks: i32) -> f64 {
        self.get_actual_secs_from_ticks(end_ticks) - self.get_actual_secs_from_ticks(start_ticks)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9
    }

    fn multi_tempo() -> TimeSynchronizer {
        TimeSynchronizer::new(&[
            Tempo::new(0, 120.0),
            Tempo::new(1920, 60.0),
            Tempo::new(3840, 150.0),
            Tempo::new(5000, 97.5),
        ])
        .unwrap()
    }

    #[test]
    fn single_tempo_quarter_note() {
        let sync = TimeSynchronizer::new(&[Tempo::new(0, 120.0)]).unwrap();
        assert_eq!(sync.get_actual_secs_from_ticks(480), 0.5);
        assert_eq!(sync.get_actual_secs_from_ticks(0), 0.0);
        assert!(approx_eq(sync.get_actual_ticks_from_secs(0.5), 480.0));
    }

    #[test]
    fn segments_accumulate() {
        let sync = multi_tempo();
        // 1920 ticks at 120 bpm = 2s, then 1920 ticks at 60 bpm = 4s.
        assert!(approx_eq(sync.get_actual_secs_from_ticks(1920), 2.0));
        assert!(approx_eq(sync.get_actual_secs_from_ticks(2400), 3.0));
        assert!(approx_eq(sync.get_actual_secs_from_ticks(3840), 6.0));
        assert!(approx_eq(sync.get_actual_secs_from_ticks(4320), 6.4));
    }

    #[test]
    fn round_trip_within_one_tick() {
        let sync = multi_tempo();
        for tick in (-5000..12000).step_by(37) {
            let secs = sync.get_actual_secs_from_ticks(tick);
            let back = sync.get_actual_ticks_from_secs(secs);
            assert!(
                (back - tick as f64).abs() <= 1.0,
                "tick {} came back as {}",
                tick,
                back
            );
        }
    }

    #[test]
    fn conversion_is_monotonic() {
        let sync = multi_tempo();
        let mut prev = f64::NEG_INFINITY;
        for tick in (-2000..10000).step_by(13) {
            let secs = sync.get_actual_secs_from_ticks(tick);
            assert!(secs >= prev);
            prev = secs;
        }
    }

    #[test]
    fn negative_ticks_extrapolate_with_first_tempo() {
        let sync = multi_tempo();
        assert!(approx_eq(sync.get_actual_secs_from_ticks(-480), -0.5));
        assert!(approx_eq(sync.get_actual_ticks_from_secs(-1.0), -960.0));
    }

    #[test]
    fn offset_and_duration() {
        let sync = multi_tempo();
        assert!(approx_eq(sync.get_duration_secs_from_ticks(1920, 3840), 4.0));
        assert!(approx_eq(
            sync.get_actual_ticks_from_secs_offset(1440, 1.0),
            2160.0
        ));
    }

    #[test]
    fn duplicate_positions_prefer_the_later_tempo() {
        let sync =
            TimeSynchronizer::new(&[Tempo::new(0, 120.0), Tempo::new(0, 60.0)]).unwrap();
        assert!(approx_eq(sync.get_actual_secs_from_ticks(480), 1.0));
        assert!(approx_eq(sync.get_actual_ticks_from_secs(1.0), 480.0));
    }

    #[test]
    fn malformed_tempo_maps_are_rejected() {
        assert_eq!(TimeSynchronizer::new(&[]), Err(Error::EmptyTempoList));
        assert_eq!(
            TimeSynchronizer::new(&[Tempo::new(10, 120.0)]),
            Err(Error::MissingInitialTempo { position: 10 })
        );
        assert!(matches!(
            TimeSynchronizer::new(&[Tempo::new(0, 0.0)]),
            Err(Error::NonPositiveBpm { .. })
        ));
        assert!(matches!(
            TimeSynchronizer::new(&[Tempo::new(0, f64::NAN)]),
            Err(Error::NonPositiveBpm { .. })
        ));
        assert_eq!(
            TimeSynchronizer::new(&[
                Tempo::new(0, 120.0),
                Tempo::new(960, 90.0),
                Tempo::new(480, 100.0)
            ]),
            Err(Error::TempoOutOfOrder { index: 2 })
        );
    }

    #[test]
    fn absolute_time_code_flattens_the_tempo_map() {
        let tempos = [Tempo::new(0, 120.0), Tempo::new(1920, 60.0)];
        let sync = TimeSynchronizer::absolute_time_code(&tempos, 120.0).unwrap();

        assert!(sync.is_absolute_time_code());
        assert!(approx_eq(sync.get_actual_ticks_from_ticks(960), 960.0));
        assert!(approx_eq(sync.get_actual_ticks_from_ticks(2400), 2880.0));
        assert!(approx_eq(sync.get_actual_ticks_from_ticks(-480), -480.0));
        assert!(approx_eq(sync.get_actual_ticks_from_secs(3.0), 2880.0));
        assert!(approx_eq(sync.get_actual_ticks_from_secs_offset(1920, 0.5), 2400.0));
        assert!(approx_eq(sync.get_duration_secs_from_ticks(1920, 2400), 1.0));

        let plain = TimeSynchronizer::new(&tempos).unwrap();
        assert!(!plain.is_absolute_time_code());
        assert_eq!(plain.get_actual_ticks_from_ticks(2400), 2400.0);
    }

    #[test]
    fn absolute_time_code_needs_a_positive_tempo() {
        let tempos = [Tempo::new(0, 120.0)];
        assert!(matches!(
            TimeSynchronizer::absolute_time_code(&tempos, 0.0),
            Err(Error::NonPositiveBpm { .. })
        ));
    }

    #[test]
    fn skipped_ticks_shift_the_origin() {
        let tempos = [Tempo::new(0, 120.0), Tempo::new(1920, 60.0)];
        let sync = TimeSynchronizer::with_skip_ticks(&tempos, 960).unwrap();

        assert_eq!(
            sync.tempo_list(),
            vec![Tempo::new(0, 120.0), Tempo::new(960, 60.0)]
        );
        assert!(approx_eq(sync.get_actual_secs_from_ticks(960), 1.0));
    }
}
