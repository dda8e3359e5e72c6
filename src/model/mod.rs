pub mod config;
pub mod context;
pub mod curve;
pub mod point;
pub mod project;
pub mod relative_pitch_curve;
pub mod reset_time_axis;
