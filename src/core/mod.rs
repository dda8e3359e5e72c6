pub mod constants;
pub mod error;
pub mod tick_counter;
pub mod time_sync;
