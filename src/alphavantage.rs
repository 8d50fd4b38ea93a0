use std::{str::FromStr, time::Duration};

use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder};
use tracing::debug;

use crate::{
    error::FetchError,
    source::{http_client, DailyProvider},
    timeseries::PricePoint,
};

const QUERY_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantage {
    key: String,
    client: Client,
}

impl AlphaVantage {
    pub fn with_key(key: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        Ok(AlphaVantage {
            key: String::from(key),
            client: http_client(timeout)?,
        })
    }

    fn daily_request(&self, symbol: &str) -> RequestBuilder {
        self.client.get(QUERY_URL).query(&[
            ("function", "TIME_SERIES_DAILY"),
            ("outputsize", "full"),
            ("symbol", symbol),
            ("apikey", self.key.as_str()),
        ])
    }

    /// Reads the `Time Series (Daily)` object, keeping closes inside `[start, end]`.
    pub fn parse_daily(body: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PricePoint>, FetchError> {
        let parsed = json::parse(body)?;

        // Alpha Vantage answers 200 OK with one of these on bad keys, symbols and throttling.
        for field in ["Error Message", "Note", "Information"] {
            if let Some(message) = parsed[field].as_str() {
                return Err(FetchError::Api(message.to_string()));
            }
        }

        let daily = &parsed["Time Series (Daily)"];
        if !daily.is_object() {
            return Err(FetchError::Malformed("missing `Time Series (Daily)`".into()));
        }

        let mut points = Vec::new();
        for (key, entry) in daily.entries() {
            let date = NaiveDate::from_str(key)
                .map_err(|e| FetchError::Malformed(format!("bad date `{}`: {}", key, e)))?;
            if date < start || date > end {
                continue;
            }
            let close_json = &entry["4. close"];
            let close = close_json
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .or_else(|| close_json.as_f64())
                .ok_or_else(|| FetchError::Malformed(format!("no close for {}", date)))?;
            points.push(PricePoint::new(date, close));
        }
        Ok(points)
    }
}

impl DailyProvider for AlphaVantage {
    fn name(&self) -> &str {
        "alphavantage"
    }

    fn fetch_daily(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PricePoint>, FetchError> {
        debug!(symbol, "requesting daily series from Alpha Vantage");
        let body = self
            .daily_request(symbol)
            .send()?
            .error_for_status()?
            .text()?;
        AlphaVantage::parse_daily(&body, start, end)
    }
}
