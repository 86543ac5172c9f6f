use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod bounds;
mod config;
mod coverage;
mod guess_time;
mod http;
mod measurements;
mod mercator;
mod model;
mod render;
mod tiles;

use coverage::Operator;
use model::NetworkType;

#[derive(Debug, Parser)]
#[command(about = "Generate coverage maps for cellular measurement data")]
struct Cli {
    /// Optional TOML configuration file (defaults to config.toml when
    /// present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a measurement log onto a basemap
    Render(RenderArgs),
    /// Recover missing timestamps on a location-update log
    GuessTime(GuessTimeArgs),
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Measurement identifier, used as the output directory name
    #[arg(short, long)]
    id: String,

    /// Network type to plot; required for signal or coverage layers
    #[arg(short = 't', long = "type", value_enum, ignore_case = true)]
    network_type: Option<NetworkType>,

    /// Padding around the measured area, in degrees
    #[arg(short, long, default_value_t = 0.02)]
    padding_degrees: f64,

    #[arg(long, default_value_t = 16.0 / 9.0)]
    aspect_ratio: f64,

    #[arg(long, default_value_t = 100)]
    dpi: u32,

    /// Location-update log (CSV)
    #[arg(short, long)]
    location_updates: Option<PathBuf>,

    /// Signal-strength log (CSV)
    #[arg(short, long, requires = "network_type")]
    signal_strengths: Option<PathBuf>,

    /// Display-info log with network override events (CSV)
    #[arg(short, long)]
    display_info: Option<PathBuf>,

    /// Operator whose coverage map gets overlaid
    #[arg(short, long, value_enum, ignore_case = true, requires = "network_type")]
    operator: Option<OperatorArg>,

    /// Figure title; composed from the plotted layers when omitted
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    hide_title: bool,

    /// Lower bound of the signal color scale
    #[arg(long)]
    vmin: Option<f64>,

    /// Upper bound of the signal color scale
    #[arg(long)]
    vmax: Option<f64>,

    /// Plot signal quality (RSRQ) instead of signal strength
    #[arg(long)]
    rsrq: bool,

    /// Download the coverage image even when a cached copy exists
    #[arg(long)]
    no_cache: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OperatorArg {
    Telekom,
    Vodafone,
}

impl OperatorArg {
    fn resolve(self) -> &'static Operator {
        match self {
            OperatorArg::Telekom => &coverage::TELEKOM,
            OperatorArg::Vodafone => &coverage::VODAFONE,
        }
    }
}

#[derive(Debug, Args)]
struct GuessTimeArgs {
    #[arg(short, long)]
    location_updates: PathBuf,

    #[arg(short, long)]
    cell_info: PathBuf,

    #[arg(short, long)]
    signal_strengths: PathBuf,

    #[arg(short, long)]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Render(args) => render_command(args, &config)?,
        Command::GuessTime(args) => guess_time::run(
            &args.location_updates,
            &args.cell_info,
            &args.signal_strengths,
            &args.out,
        )?,
    }

    Ok(())
}

fn render_command(args: RenderArgs, config: &config::Config) -> Result<()> {
    let location = match &args.location_updates {
        Some(path) => Some(measurements::load_locations(path)?),
        None => None,
    };
    let signal = match &args.signal_strengths {
        Some(path) => Some(measurements::load_signals(path)?),
        None => None,
    };
    let display_info = match &args.display_info {
        Some(path) => Some(measurements::load_display_info(path)?),
        None => None,
    };
    if location.is_none() && signal.is_none() && display_info.is_none() {
        bail!("at least one of --location-updates, --signal-strengths or --display-info is required");
    }

    let downloader = http::HttpDownloader::new(
        Duration::from_secs(config.http_timeout_secs),
        &config.user_agent,
    )?;

    let opts = render::RenderOptions {
        measurement_id: args.id,
        network_type: args.network_type,
        padding_degrees: args.padding_degrees,
        aspect_ratio: args.aspect_ratio,
        dpi: args.dpi,
        operator: args.operator.map(OperatorArg::resolve),
        title: args.title,
        show_title: !args.hide_title,
        vmin: args.vmin,
        vmax: args.vmax,
        plot_rsrq: args.rsrq,
        use_cache: !args.no_cache,
    };

    let path = render::run(
        &opts,
        location.as_deref(),
        signal.as_deref(),
        display_info.as_deref(),
        config,
        &downloader,
    )?;
    info!(path = %path.display(), "wrote figure");

    Ok(())
}
