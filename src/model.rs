use clap::ValueEnum;
use strum::Display;

/// Cellular network generation of a measurement. Selects both the
/// signal column that gets plotted and the operator map layer that
/// gets requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, ValueEnum)]
#[strum(serialize_all = "UPPERCASE")]
pub enum NetworkType {
    Gsm,
    Lte,
    Nr,
}

/// Pixel dimensions of a requested coverage image. Should match the
/// aspect ratio of the figure or the overlay will look distorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_type_names() {
        assert_eq!(NetworkType::Gsm.to_string(), "GSM");
        assert_eq!(NetworkType::Lte.to_string(), "LTE");
        assert_eq!(NetworkType::Nr.to_string(), "NR");
    }
}
