pub mod core;
pub mod model;
pub mod pitch;
pub mod plugins;
mod util;

pub use crate::core::error::{Error, Result};
pub use model::config::*;
pub use model::context::ConversionContext;
pub use model::project::*;
pub use model::reset_time_axis::reset_time_axis;
pub use plugins::midi::{MidiGenerator, MidiParser};
pub use util::*;
