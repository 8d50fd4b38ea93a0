use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusty_stockframes::{config::Config, stock::StockRS, stockplotter::StillStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stockframes", about = "Daily stock closes as stills, animations and scrubbable frames")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Ticker symbol, overrides the config.
    #[arg(long)]
    symbol: Option<String>,

    /// Start date (YYYY-MM-DD), overrides the config.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD), overrides the config.
    #[arg(long)]
    end: Option<String>,

    /// Moving-average window, overrides the config.
    #[arg(long)]
    window: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the series and print its first rows.
    Fetch {
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
    /// Write one frame as a PNG (the last frame by default).
    Snapshot {
        #[arg(long)]
        frame: Option<usize>,
        #[arg(long)]
        out: Option<PathBuf>,
        /// line, area, scatter-viridis or scatter-plasma.
        #[arg(long)]
        style: Option<StillStyle>,
    },
    /// Play the animation at the configured tick rate, recording a GIF.
    Play {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export every frame as a numbered PNG and assemble them into a GIF.
    Export {
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        gif: Option<PathBuf>,
        /// Only write the frames.
        #[arg(long, default_value_t = false)]
        no_assemble: bool,
    },
    /// Scrub through frames from stdin.
    Scrub,
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(symbol) = &cli.symbol {
        config.symbol = symbol.clone();
    }
    if let Some(start) = &cli.start {
        config.start_date = start.parse().with_context(|| format!("invalid --start `{}`", start))?;
    }
    if let Some(end) = &cli.end {
        config.end_date = end.parse().with_context(|| format!("invalid --end `{}`", end))?;
    }
    if let Some(window) = cli.window {
        config.ma_window = window;
    }
    config.validate()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rusty_stockframes=info".parse()?))
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let mut config = Config::read_config(&cli.config)
        .with_context(|| format!("couldn't load {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli)?;

    let app = StockRS::from_config(config).context("couldn't set up the data provider")?;
    let series = app.load();
    if series.is_empty() {
        warn!(symbol = %app.config.symbol, "no data for the requested range");
    }

    match cli.command {
        Commands::Fetch { rows } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "{:<12} {:>10}", "Date", "Close")?;
            for point in series.head(rows) {
                writeln!(out, "{:<12} {:>10.2}", point.date.to_string(), point.close)?;
            }
            writeln!(out, "{} rows", series.len())?;
        }
        Commands::Snapshot { frame, out, style } => {
            let out = out.unwrap_or_else(|| app.config.snapshot_path.clone());
            let style = style.unwrap_or(app.config.still_style);
            app.snapshot(&series, frame, style, &out)?;
        }
        Commands::Play { out } => {
            let out = out.unwrap_or_else(|| app.config.gif_path.clone());
            app.play(&series, &out)?;
        }
        Commands::Export { dir, gif, no_assemble } => {
            let dir = dir.unwrap_or_else(|| app.config.frame_dir.clone());
            let gif = gif.unwrap_or_else(|| app.config.gif_path.clone());
            let assembler = app.config.assembler.clone();
            let target = if no_assemble { None } else { Some((&assembler, gif.as_path())) };
            if let Some(report) = app.export(&series, &dir, target)? {
                info!(frames = report.frames.len(), gif = ?report.gif, "export done");
            }
        }
        Commands::Scrub => match app.plotter(&series) {
            Some(mut plotter) => {
                let stdin = io::stdin();
                let notes = app.scrub(&series, &mut plotter, stdin.lock(), io::stdout())?;
                info!(notes = notes.len(), "scrub session ended");
            }
            None => warn!("nothing to scrub"),
        },
    }
    Ok(())
}
