use crate::plugins::midi::MultiChannel;
use log::info;

const CHANNEL_COUNT: u8 = 16;

/// Reads a channel selection: `first`, `split`, or a 1-based list of channels and ranges such as
/// `1,3,5-12`. Channels come back zero-based.
pub fn parse_channels(s: &str) -> MultiChannel {
    match s.to_lowercase().as_str() {
        "f" | "first" => MultiChannel::First,
        "s" | "split" | "all" => MultiChannel::Split,
        other => {
            let mut channels: Vec<u8> = Vec::new();
            for part in other.split(',').map(str::trim).filter(|part| !part.is_empty()) {
                let range = match part.split_once('-') {
                    Some((start, end)) => start.trim().parse::<u8>().ok().zip(end.trim().parse::<u8>().ok()),
                    None => part.parse::<u8>().ok().map(|channel| (channel, channel)),
                };

                match range {
                    Some((start, end)) if 1 <= start && start <= end && end <= CHANNEL_COUNT => {
                        channels.extend((start..=end).map(|channel| channel - 1));
                    }
                    _ => info!("Ignoring invalid channel selection '{}'..!", part),
                }
            }

            channels.sort_unstable();
            channels.dedup();

            if channels.is_empty() {
                info!("No usable channel in '{}', defaulting to `first`..!", other);
                MultiChannel::First
            } else {
                MultiChannel::Custom(channels)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn presets() {
        assert_eq!(parse_channels("first"), MultiChannel::First);
        assert_eq!(parse_channels("SPLIT"), MultiChannel::Split);
    }

    #[test]
    fn lists_and_ranges() {
        assert_eq!(
            parse_channels("1,3,5-7"),
            MultiChannel::Custom(vec![0, 2, 4, 5, 6])
        );
        assert_eq!(parse_channels(" 2 , 2,1 "), MultiChannel::Custom(vec![0, 1]));
    }

    #[test]
    fn invalid_parts_are_skipped() {
        assert_eq!(parse_channels("0,17,3,9-4"), MultiChannel::Custom(vec![2]));
        assert_eq!(parse_channels("nonsense"), MultiChannel::First);
    }
}
