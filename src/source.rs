use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::{
    error::FetchError,
    timeseries::{PricePoint, PriceSeries},
};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) rusty-stockframes";

/// A remote source of daily closes.
pub trait DailyProvider {
    fn name(&self) -> &str;

    fn fetch_daily(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PricePoint>, FetchError>;
}

/// `None` keeps the request blocking until the server answers or the connection fails.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<Client, FetchError> {
    Ok(Client::builder().user_agent(USER_AGENT).timeout(timeout).build()?)
}

/// Fail-soft front of a provider: every failure becomes an empty series.
pub struct TimeSeriesSource {
    provider: Box<dyn DailyProvider>,
}

impl TimeSeriesSource {
    pub fn new(provider: Box<dyn DailyProvider>) -> Self {
        TimeSeriesSource { provider }
    }

    pub fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            warn!("no symbol given, nothing to fetch");
            return PriceSeries::empty(symbol);
        }
        if start > end {
            warn!(%start, %end, "start date is after end date, nothing to fetch");
            return PriceSeries::empty(symbol);
        }

        match self.provider.fetch_daily(symbol, start, end) {
            Ok(points) => {
                let series = PriceSeries::from_points(symbol, points).between(start, end);
                info!(
                    symbol,
                    provider = self.provider.name(),
                    days = series.len(),
                    "fetched daily closes"
                );
                series
            }
            Err(e) => {
                warn!(symbol, provider = self.provider.name(), "error fetching data: {}", e);
                PriceSeries::empty(symbol)
            }
        }
    }
}
