//! Frame rendering.
//!
//! `FrameRenderer::render` maps a series and a frame index to everything the
//! chart shows at that playback position. It is pure: live playback, the scrub
//! control and batch export all call it and get identical frames for the same
//! index.

use std::time::Duration;

use chrono::NaiveDate;

use crate::{
    overlay::{trailing_mean, OverlaySpec},
    timeseries::{PricePoint, PriceSeries},
};

pub const DEFAULT_ANNOTATION: &str = "Market Peak";
pub const DEFAULT_FADE: Duration = Duration::from_secs(1);

/// Upper bound on fade frames, whatever the tick rate.
pub const MAX_FADE_STEPS: usize = 600;

/// Linear opacity decay of the terminal annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeSchedule {
    pub start_opacity: f64,
    pub duration: Duration,
}

impl FadeSchedule {
    pub fn new(start_opacity: f64, duration: Duration) -> Self {
        FadeSchedule {
            start_opacity: start_opacity.clamp(0.0, 1.0),
            duration,
        }
    }

    pub fn opacity_at(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() || elapsed >= self.duration {
            return 0.0;
        }
        let remaining = 1.0 - elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.start_opacity * remaining
    }

    /// Opacity for each tick of `interval` after the fade starts, ending with 0.
    ///
    /// More than `MAX_FADE_STEPS` ticks are resampled to `MAX_FADE_STEPS` even steps.
    pub fn steps(&self, interval: Duration) -> Vec<f64> {
        if interval.is_zero() || self.duration.is_zero() {
            return vec![0.0];
        }
        let ticks = (self.duration.as_secs_f64() / interval.as_secs_f64()).ceil();
        if ticks > MAX_FADE_STEPS as f64 {
            return (1..=MAX_FADE_STEPS)
                .map(|t| self.start_opacity * (1.0 - t as f64 / MAX_FADE_STEPS as f64))
                .collect();
        }
        let ticks = (ticks as u32).max(1);
        (1..=ticks).map(|t| self.opacity_at(interval * t)).collect()
    }
}

impl Default for FadeSchedule {
    fn default() -> Self {
        FadeSchedule::new(1.0, DEFAULT_FADE)
    }
}

/// One-time label shown on the terminal frame, anchored at the last visible point.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalAnnotation {
    pub text: String,
    pub date: NaiveDate,
    pub close: f64,
    pub fade: FadeSchedule,
}

/// An overlay evaluated for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayState {
    /// One entry per visible point, `None` where the window is not yet full.
    TrailingMean {
        label: String,
        window: usize,
        values: Vec<Option<f64>>,
    },
    DateMarkers { label: String, dates: Vec<NaiveDate> },
}

impl OverlayState {
    pub fn label(&self) -> &str {
        match self {
            OverlayState::TrailingMean { label, .. } | OverlayState::DateMarkers { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    /// Effective (clamped) index, `None` for an empty series.
    pub index: Option<usize>,
    pub series_len: usize,
    pub visible: Vec<PricePoint>,
    pub overlays: Vec<OverlayState>,
    pub is_terminal: bool,
    pub annotation: Option<TerminalAnnotation>,
}

impl FrameState {
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn last_visible(&self) -> Option<&PricePoint> {
        self.visible.last()
    }

    /// Playback position in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        match self.index {
            Some(i) if self.series_len > 1 => i as f64 / (self.series_len - 1) as f64,
            Some(_) => 1.0,
            None => 0.0,
        }
    }

    /// Tooltip-style description of the newest visible point.
    pub fn describe(&self) -> String {
        match self.last_visible() {
            Some(p) => format!("{}\nClose: {:.2}", p.date, p.close),
            None => String::from("no data"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameRenderer {
    overlays: Vec<OverlaySpec>,
    annotation_text: String,
    fade: FadeSchedule,
}

impl FrameRenderer {
    pub fn new(overlays: Vec<OverlaySpec>) -> Self {
        FrameRenderer {
            overlays,
            annotation_text: String::from(DEFAULT_ANNOTATION),
            fade: FadeSchedule::default(),
        }
    }

    pub fn with_annotation(mut self, text: &str, fade: FadeSchedule) -> Self {
        self.annotation_text = String::from(text);
        self.fade = fade;
        self
    }

    pub fn overlays(&self) -> &[OverlaySpec] {
        &self.overlays
    }

    pub fn fade(&self) -> FadeSchedule {
        self.fade
    }

    pub fn render(&self, series: &PriceSeries, frame: usize) -> FrameState {
        let effective = series.last_index().map(|last| frame.min(last));
        let visible_len = effective.map_or(0, |i| i + 1);
        let visible = series.points()[..visible_len].to_vec();

        let closes: Vec<f64> = series.closes().collect();
        let overlays = self
            .overlays
            .iter()
            .map(|spec| match spec {
                OverlaySpec::TrailingMean { label, window } => OverlayState::TrailingMean {
                    label: label.clone(),
                    window: *window,
                    values: trailing_mean(&closes, *window, visible_len),
                },
                OverlaySpec::DateMarkers { label, dates } => OverlayState::DateMarkers {
                    label: label.clone(),
                    dates: dates.clone(),
                },
            })
            .collect();

        let is_terminal = effective.is_some() && effective == series.last_index();
        let annotation = if is_terminal {
            visible.last().map(|p| TerminalAnnotation {
                text: self.annotation_text.clone(),
                date: p.date,
                close: p.close,
                fade: self.fade,
            })
        } else {
            None
        };

        FrameState {
            index: effective,
            series_len: series.len(),
            visible,
            overlays,
            is_terminal,
            annotation,
        }
    }
}

/// `FrameRenderer::render` with the default annotation.
pub fn render_frame(series: &PriceSeries, overlays: &[OverlaySpec], frame: usize) -> FrameState {
    FrameRenderer::new(overlays.to_vec()).render(series, frame)
}
