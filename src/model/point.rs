use crate::core::constants::NO_PITCH;
use serde::{Deserialize, Serialize};

/// A single sample of a parameter curve.
///
/// For pitch curves `y` is an absolute pitch in cents, or [`NO_PITCH`] where there is no data.
/// Pitch algorithms go through [`Point::pitch`] and [`Point::from_pitch`] so the sentinel only
/// exists in the stored encoding.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const START_X: i32 = -192_000;
    pub const END_X: i32 = 1_073_741_823;

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Leading bracket of a pitch curve.
    pub const fn start_point() -> Self {
        Self::new(Self::START_X, NO_PITCH)
    }

    /// Trailing bracket of a pitch curve.
    pub const fn end_point() -> Self {
        Self::new(Self::END_X, NO_PITCH)
    }

    pub const fn gap(x: i32) -> Self {
        Self::new(x, NO_PITCH)
    }

    pub fn from_pitch(x: i32, pitch: Option<i32>) -> Self {
        Self::new(x, pitch.unwrap_or(NO_PITCH))
    }

    pub fn pitch(&self) -> Option<i32> {
        (self.y != NO_PITCH).then_some(self.y)
    }

    pub fn is_bracket(&self) -> bool {
        self.x <= Self::START_X || self.x >= Self::END_X
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Linear interpolation between two points, evaluated at `x`.
pub fn linear_interpolation(x: i32, start: Point, end: Point) -> f64 {
    if end.x == start.x {
        return start.y as f64;
    }

    let ratio = (x - start.x) as f64 / (end.x - start.x) as f64;
    start.y as f64 + (end.y - start.y) as f64 * ratio
}

/// Fills every gap between successive points with samples `sampling_interval` ticks apart.
/// The first and last input points are kept as-is.
pub fn interpolate_linear(points: &[Point], sampling_interval: i32) -> Vec<Point> {
    if points.is_empty() || sampling_interval <= 0 {
        return points.to_vec();
    }

    let mut result = vec![points[0]];
    for pair in points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let mut x = start.x + 1;
        while x < end.x {
            result.push(Point::new(
                x,
                linear_interpolation(x, start, end).round() as i32,
            ));
            x += sampling_interval;
        }
    }

    if points.len() > 1 {
        result.push(points[points.len() - 1]);
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sentinel_maps_to_none() {
        assert_eq!(Point::new(0, 6000).pitch(), Some(6000));
        assert_eq!(Point::gap(0).pitch(), None);
        assert_eq!(Point::from_pitch(5, None), Point::new(5, NO_PITCH));
        assert!(Point::start_point().is_bracket());
        assert!(Point::end_point().is_bracket());
        assert!(!Point::new(0, 0).is_bracket());
    }

    #[test]
    fn interpolation_keeps_endpoints() {
        let points = [Point::new(0, 0), Point::new(10, 100)];
        let result = interpolate_linear(&points, 5);

        assert_eq!(result.first(), Some(&Point::new(0, 0)));
        assert_eq!(result.last(), Some(&Point::new(10, 100)));
        assert!(result.contains(&Point::new(1, 10)));
        assert!(result.contains(&Point::new(6, 60)));
        assert!(result.windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn interpolation_of_single_point() {
        let points = [Point::new(3, 7)];
        assert_eq!(interpolate_linear(&points, 5), points.to_vec());
        assert!(interpolate_linear(&[], 5).is_empty());
    }
}
