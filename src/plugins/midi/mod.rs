//! Standard MIDI File support.

mod generator;
mod options;
mod parser;

pub use generator::*;
pub use options::*;
pub use parser::*;

const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

const CC_DATA_ENTRY: u8 = 6;
const CC_VOLUME: u8 = 7;
const CC_EXPRESSION: u8 = 11;
const CC_RPN_LSB: u8 = 100;
const CC_RPN_MSB: u8 = 101;

/// Exponent of the General MIDI volume and expression curves.
const GM_GAIN_EXPONENT: f64 = 2.0;

/// Gain in dB for a 0..=127 controller value, guarded against log of zero.
fn controller_to_db(value: u8) -> f64 {
    20.0 * ((value as f64 / 127.0).powf(GM_GAIN_EXPONENT) + 1e-6).log10()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn controller_gain() {
        assert!(controller_to_db(127).abs() < 1e-3);
        assert!((controller_to_db(64) - -11.9).abs() < 0.05);
        assert!(controller_to_db(0).is_finite());
        assert!((controller_to_db(0) - -120.0).abs() < 1e-6);
    }
}
