use crate::model::point::Point;
use serde::{Deserialize, Serialize};

/// An ordered sequence of samples for pitch, volume, breath, gender or strength.
///
/// An empty curve means "no data"; a curve holding only sentinels means "explicitly no
/// automation". Positions never decrease.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ParamCurve {
    pub points: Vec<Point>,
}

impl ParamCurve {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total_points_count(&self) -> usize {
        self.points.len()
    }

    /// Whether any sample carries a value other than `interrupt_value`, brackets excluded.
    pub fn has_data(&self, interrupt_value: i32) -> bool {
        self.points
            .iter()
            .any(|p| !p.is_bracket() && p.y != interrupt_value)
    }

    /// Splits the curve into contiguous runs of samples that are not `interrupt_value`.
    /// Bracket points and points at negative positions are ignored.
    pub fn split_into_segments(&self, interrupt_value: i32) -> Vec<Vec<Point>> {
        let mut segments: Vec<Vec<Point>> = Vec::new();
        let mut buffer: Vec<Point> = Vec::new();

        for point in self.points.iter().filter(|p| p.x >= 0 && !p.is_bracket()) {
            if point.y != interrupt_value {
                buffer.push(*point);
            } else if !buffer.is_empty() {
                segments.push(std::mem::take(&mut buffer));
            }
        }

        if !buffer.is_empty() {
            segments.push(buffer);
        }

        segments
    }

    /// Averages samples closer together than `interval` ticks. Samples equal to
    /// `interrupt_value` are kept verbatim and never averaged into their neighbours.
    pub fn reduce_sample_rate(&self, interval: i32, interrupt_value: i32) -> ParamCurve {
        if interval <= 0 || self.points.len() <= 1 {
            return self.clone();
        }

        let mut result: Vec<Point> = Vec::with_capacity(self.points.len());
        let mut group: Vec<Point> = Vec::new();

        let flush = |group: &mut Vec<Point>, result: &mut Vec<Point>| {
            if group.is_empty() {
                return;
            }
            let count = group.len() as f64;
            let x_sum: f64 = group.iter().map(|p| p.x as f64).sum();
            let y_sum: f64 = group.iter().map(|p| p.y as f64).sum();
            result.push(Point::new(
                (x_sum / count).round() as i32,
                (y_sum / count).round() as i32,
            ));
            group.clear();
        };

        for point in self.points.iter().copied() {
            if point.y == interrupt_value || point.is_bracket() {
                flush(&mut group, &mut result);
                result.push(point);
                continue;
            }

            if let Some(first) = group.first()
                && point.x >= first.x + interval
            {
                flush(&mut group, &mut result);
            }
            group.push(point);
        }
        flush(&mut group, &mut result);

        ParamCurve::new(result)
    }
}

impl From<Vec<Point>> for ParamCurve {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}
