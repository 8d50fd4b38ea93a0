use std::{
    io::{BufRead, Write},
    iter,
    ops::ControlFlow,
    path::{Path, PathBuf},
    str::FromStr,
};

use tracing::{info, warn};

use crate::{
    alphavantage::AlphaVantage,
    config::{Config, ProviderKind},
    error::{ExportError, FetchError, RenderError},
    export::{FrameExporter, SequenceAssembler},
    frame::{FadeSchedule, FrameRenderer},
    overlay::OverlaySpec,
    playback::{LiveAnimation, Playback, Scrubber},
    source::{DailyProvider, TimeSeriesSource},
    stockplotter::{StillStyle, StockPlotter, UserNote, PRICE_LABEL},
    timeseries::PriceSeries,
    yahoo::Yahoo,
};

/// Application facade: one configured ticker, its source and its renderer.
pub struct StockRS {
    pub config: Config,
    source: TimeSeriesSource,
    renderer: FrameRenderer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub frames: Vec<PathBuf>,
    pub gif: Option<PathBuf>,
}

impl StockRS {
    pub fn from_config(config: Config) -> Result<Self, FetchError> {
        let provider: Box<dyn DailyProvider> = match config.provider {
            ProviderKind::Yahoo => Box::new(Yahoo::new(config.request_timeout)?),
            ProviderKind::AlphaVantage => Box::new(AlphaVantage::with_key(&config.key, config.request_timeout)?),
        };
        Ok(StockRS::with_source(config, TimeSeriesSource::new(provider)))
    }

    pub fn with_source(config: Config, source: TimeSeriesSource) -> Self {
        let renderer = FrameRenderer::new(vec![
            OverlaySpec::moving_average(config.ma_window),
            OverlaySpec::split_markers(config.split_dates.clone()),
        ])
        .with_annotation(&config.annotation_text, FadeSchedule::new(1.0, config.fade_duration));

        StockRS {
            config,
            source,
            renderer,
        }
    }

    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }

    pub fn load(&self) -> PriceSeries {
        self.source
            .fetch(&self.config.symbol, self.config.start_date, self.config.end_date)
    }

    /// Plotter scaled to `series`, with the configured series hidden.
    pub fn plotter(&self, series: &PriceSeries) -> Option<StockPlotter> {
        let mut plotter =
            StockPlotter::for_series(series, self.config.img_width, self.config.img_height, self.config.palette)?;
        let labels = self.series_labels();
        for label in &self.config.hidden_series {
            if !labels.contains(&label.as_str()) {
                warn!(label = %label, "hidden_series names no known series");
            }
            plotter.set_visible(label, false);
        }
        Some(plotter)
    }

    /// Legend labels that can be shown or hidden.
    pub fn series_labels(&self) -> Vec<&str> {
        iter::once(PRICE_LABEL)
            .chain(self.renderer.overlays().iter().map(|o| o.label()))
            .collect()
    }

    /// Still image of one frame, the last one by default.
    pub fn snapshot(
        &self,
        series: &PriceSeries,
        frame: Option<usize>,
        style: StillStyle,
        out: &Path,
    ) -> Result<bool, RenderError> {
        let plotter = match self.plotter(series) {
            Some(plotter) => plotter,
            None => {
                warn!(symbol = %series.equity_name, "no data, snapshot skipped");
                return Ok(false);
            }
        };
        let state = self.renderer.render(series, frame.unwrap_or(series.len()));
        plotter.save_still(out, &state, style, &[])?;
        info!(path = %out.display(), %style, "snapshot written");
        Ok(true)
    }

    /// Live playback at the configured tick rate, recorded straight into a GIF.
    pub fn play(&self, series: &PriceSeries, out: &Path) -> Result<usize, RenderError> {
        let plotter = match self.plotter(series) {
            Some(plotter) => plotter,
            None => {
                warn!(symbol = %series.equity_name, "no data, nothing to play");
                return Ok(0);
            }
        };
        let mut recorder = plotter.gif_recorder(out, self.config.tick_interval)?;
        let mut playback = Playback::new(&self.renderer, series);
        let shown = LiveAnimation::new(self.config.tick_interval).run(&mut playback, |frame| {
            recorder.push(frame)?;
            Ok::<_, RenderError>(ControlFlow::Continue(()))
        })?;
        let written = recorder.finish();
        info!(path = %out.display(), frames = shown, gif_frames = written, "animation written");
        Ok(shown)
    }

    /// Writes every frame to `dir`, then hands them to `assembler` when a GIF path is given.
    ///
    /// Frames stay on disk whatever the assembler does.
    pub fn export<A: SequenceAssembler + ?Sized>(
        &self,
        series: &PriceSeries,
        dir: &Path,
        gif: Option<(&A, &Path)>,
    ) -> Result<Option<ExportReport>, ExportError> {
        let mut plotter = match self.plotter(series) {
            Some(plotter) => plotter,
            None => {
                warn!(symbol = %series.equity_name, "no data, export skipped");
                return Ok(None);
            }
        };
        let frames = FrameExporter::new(dir).export(&self.renderer, series, &mut plotter)?;
        let gif = match gif {
            Some((assembler, path)) => {
                if let Err(e) = assembler.assemble(&frames, path) {
                    warn!(dir = %dir.display(), "assembly failed, frames are kept");
                    return Err(e);
                }
                Some(path.to_path_buf())
            }
            None => None,
        };
        Ok(Some(ExportReport { frames, gif }))
    }

    /// Interactive scrub over line-based input. Returns the notes taken.
    pub fn scrub<R: BufRead, W: Write>(
        &self,
        series: &PriceSeries,
        plotter: &mut StockPlotter,
        input: R,
        mut out: W,
    ) -> Result<Vec<UserNote>, RenderError> {
        let mut scrubber = Scrubber::new(&self.renderer, series);
        let mut notes = Vec::new();
        writeln!(
            out,
            "frames 0..={} (enter a number, `note <text>`, `toggle <series>`, `save` or `quit`)",
            scrubber.max()
        )?;

        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ScrubCommand>() {
                Ok(ScrubCommand::Frame(value)) => {
                    let frame = scrubber.set(value);
                    writeln!(out, "{}", frame.describe())?;
                    if let Some(annotation) = &frame.annotation {
                        writeln!(out, "{}", annotation.text)?;
                    }
                }
                Ok(ScrubCommand::Note(text)) => match scrubber.current().last_visible() {
                    Some(point) => {
                        notes.push(UserNote {
                            text,
                            date: point.date,
                            close: point.close,
                        });
                        writeln!(out, "noted at {}", point.date)?;
                    }
                    None => writeln!(out, "nothing to annotate")?,
                },
                Ok(ScrubCommand::Toggle(label)) => {
                    if self.series_labels().contains(&label.as_str()) {
                        let state = if plotter.toggle(&label) { "shown" } else { "hidden" };
                        writeln!(out, "{}: {}", label, state)?;
                    } else {
                        writeln!(out, "unknown series `{}` ({})", label, self.series_labels().join(", "))?;
                    }
                }
                Ok(ScrubCommand::Save) => {
                    let path = &self.config.snapshot_path;
                    plotter.save_still(path, &scrubber.current(), self.config.still_style, &notes)?;
                    writeln!(out, "saved {}", path.display())?;
                }
                Ok(ScrubCommand::Quit) => break,
                Err(e) => writeln!(out, "{}", e)?,
            }
        }
        Ok(notes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrubCommand {
    Frame(usize),
    Note(String),
    Toggle(String),
    Save,
    Quit,
}

impl FromStr for ScrubCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "save" => return Ok(ScrubCommand::Save),
            "quit" | "q" => return Ok(ScrubCommand::Quit),
            _ => {}
        }
        if let Some(text) = s.strip_prefix("note ") {
            let text = text.trim();
            if text.is_empty() {
                return Err(String::from("note needs some text"));
            }
            return Ok(ScrubCommand::Note(String::from(text)));
        }
        if let Some(label) = s.strip_prefix("toggle ") {
            let label = label.trim();
            if label.is_empty() {
                return Err(String::from("toggle needs a series name"));
            }
            return Ok(ScrubCommand::Toggle(String::from(label)));
        }
        s.parse::<usize>()
            .map(ScrubCommand::Frame)
            .map_err(|_| format!("unknown input `{}`", s))
    }
}
