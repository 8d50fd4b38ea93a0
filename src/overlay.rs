use chrono::NaiveDate;

pub const DEFAULT_MA_WINDOW: usize = 50;

/// Something drawn next to the price line.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlaySpec {
    /// Mean of the last `window` closes at each position.
    TrailingMean { label: String, window: usize },
    /// Vertical reference lines at fixed dates, e.g. stock splits.
    DateMarkers { label: String, dates: Vec<NaiveDate> },
}

impl OverlaySpec {
    pub fn moving_average(window: usize) -> Self {
        OverlaySpec::TrailingMean {
            label: format!("{}-Day MA", window),
            window,
        }
    }

    pub fn split_markers(dates: Vec<NaiveDate>) -> Self {
        OverlaySpec::DateMarkers {
            label: String::from("Split"),
            dates,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            OverlaySpec::TrailingMean { label, .. } | OverlaySpec::DateMarkers { label, .. } => label,
        }
    }
}

/// Trailing mean over `closes[..len]`.
///
/// Position `i` is `None` until `window` closes are available; a shorter
/// window is never substituted. A zero window has no values at all.
pub fn trailing_mean(closes: &[f64], window: usize, len: usize) -> Vec<Option<f64>> {
    let len = len.min(closes.len());
    (0..len)
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            let slice = &closes[i + 1 - window..=i];
            Some(slice.iter().sum::<f64>() / window as f64)
        })
        .collect()
}
