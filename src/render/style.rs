//! Colors, labels and file naming for the rendered figures.

use plotters::style::{HSLColor, RGBColor};

use crate::model::NetworkType;

pub const TRACK: RGBColor = RGBColor(169, 169, 169);
pub const EVENT_MARKER: RGBColor = RGBColor(128, 128, 128);

/// Covered pixels of an operator overlay are recolored to this before
/// compositing; 60% opacity over the basemap.
pub const COVERAGE_HIGHLIGHT: [u8; 3] = [248, 113, 113];
pub const COVERAGE_ALPHA: u8 = 153;

/// Reversed-rainbow colormap over `t` in `[0, 1]`: weakest samples
/// come out red, strongest violet.
pub fn signal_color(t: f64) -> HSLColor {
    HSLColor(0.75 * t.clamp(0.0, 1.0), 0.9, 0.5)
}

/// Track color for a display-info override event. Falls back to plain
/// orange for override values the palette does not know.
pub fn override_color(override_type: &str, connected_type: &str) -> RGBColor {
    match override_type {
        "NR_NSA_MMWAVE" => RGBColor(0, 0, 139),     // darkblue
        "NR_NSA" => RGBColor(65, 105, 225),         // royalblue
        "LTE_ADVANCED_PRO" => RGBColor(255, 140, 0), // darkorange
        "LTE_CA" => RGBColor(255, 215, 0),          // gold
        "NONE" if connected_type == "LTE" => RGBColor(0, 255, 127), // springgreen
        "EDGE" => RGBColor(178, 34, 34),            // firebrick
        _ => RGBColor(255, 165, 0),
    }
}

/// Legend label of an override event: the override value, or the
/// connected network type when nothing was overridden.
pub fn override_label(override_type: &str, connected_type: &str) -> String {
    if override_type == "NONE" {
        connected_type.to_string()
    } else {
        override_type.to_string()
    }
}

/// Colorbar axis label for the plotted signal column.
pub fn axis_label(network_type: NetworkType, plot_rsrq: bool) -> &'static str {
    match network_type {
        NetworkType::Gsm => "RSSI in dBm",
        NetworkType::Lte | NetworkType::Nr if plot_rsrq => "RSRQ in dB",
        NetworkType::Lte | NetworkType::Nr => "RSRP in dBm",
    }
}

/// Figure title, composed from the plotted layers unless the caller
/// supplied one.
pub fn title(
    explicit: Option<&str>,
    network_type: Option<NetworkType>,
    operator: Option<&str>,
    has_signal: bool,
    plot_rsrq: bool,
) -> String {
    if let Some(title) = explicit {
        return title.to_string();
    }

    let mut s = String::new();
    if let Some(network_type) = network_type {
        s.push_str(&format!("{network_type} "));
    }
    if !has_signal {
        s.push_str("Dead Spots ");
    } else if plot_rsrq {
        s.push_str("Signal Quality ");
    } else {
        s.push_str("Signal Strength ");
    }
    if let Some(operator) = operator {
        s.push_str(&format!("({operator})"));
    }

    s.trim().to_string()
}

/// Output file name under `out/graphs/{id}/`. `override` figures are
/// the display-info maps, everything else is a coverage figure.
pub fn output_name(
    has_display_info: bool,
    operator: Option<&str>,
    network_type: Option<NetworkType>,
    plot_rsrq: bool,
    dpi: u32,
) -> String {
    let mut s = String::from(if has_display_info { "override-" } else { "coverage-" });
    if let Some(operator) = operator {
        s.push_str(&format!("{operator}-"));
    }
    if let Some(network_type) = network_type {
        s.push_str(&format!("{network_type}-"));
    }
    if plot_rsrq {
        s.push_str("rsrq-");
    }
    s.push_str(&format!("{dpi}.png"));
    s
}
