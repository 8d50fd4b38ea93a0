pub mod alphavantage;
pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod overlay;
pub mod playback;
pub mod source;
pub mod stock;
pub mod stockplotter;
pub mod timeseries;
pub mod yahoo;

pub use frame::{render_frame, FrameRenderer, FrameState};
pub use overlay::OverlaySpec;
pub use source::{DailyProvider, TimeSeriesSource};
pub use timeseries::{PricePoint, PriceSeries};
