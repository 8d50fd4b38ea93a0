//! Yahoo Finance v8 chart endpoint.
//!
//! Only the daily closes are read. Days whose close is `null` (halts, holidays
//! reported by the API) are skipped rather than filled.

use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use reqwest::blocking::Client;
use tracing::debug;

use crate::{
    error::FetchError,
    source::{http_client, DailyProvider},
    timeseries::PricePoint,
};

pub struct Yahoo {
    client: Client,
}

impl Yahoo {
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        Ok(Yahoo {
            client: http_client(timeout)?,
        })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<String, FetchError> {
        let start_ts = start
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| FetchError::InvalidRequest(format!("bad start date {}", start)))?
            .and_utc()
            .timestamp();
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| FetchError::InvalidRequest(format!("bad end date {}", end)))?
            .and_utc()
            .timestamp();
        Ok(format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d"
        ))
    }

    pub fn parse_chart(body: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PricePoint>, FetchError> {
        let parsed = json::parse(body)?;
        let chart = &parsed["chart"];

        let error = &chart["error"];
        if !error.is_null() {
            let description = error["description"]
                .as_str()
                .or_else(|| error["code"].as_str())
                .unwrap_or("unknown error");
            return Err(FetchError::Api(description.to_string()));
        }

        let result = &chart["result"][0];
        if result.is_null() {
            return Err(FetchError::Malformed("empty `chart.result`".into()));
        }

        // No `timestamp` array means no trading days in the window.
        let timestamps = &result["timestamp"];
        if !timestamps.is_array() {
            return Ok(Vec::new());
        }
        let closes = &result["indicators"]["quote"][0]["close"];
        if !closes.is_array() {
            return Err(FetchError::Malformed("no close prices".into()));
        }

        let mut points = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.members().enumerate() {
            let ts = ts
                .as_i64()
                .ok_or_else(|| FetchError::Malformed(format!("bad timestamp at {}", i)))?;
            let date = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| FetchError::Malformed(format!("timestamp out of range: {}", ts)))?;
            let close = match closes[i].as_f64() {
                Some(close) if close.is_finite() => close,
                _ => continue,
            };
            if date < start || date > end {
                continue;
            }
            points.push(PricePoint::new(date, close));
        }
        Ok(points)
    }
}

impl DailyProvider for Yahoo {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_daily(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PricePoint>, FetchError> {
        let url = Yahoo::chart_url(symbol, start, end)?;
        debug!(%url, "requesting chart");
        let body = self.client.get(&url).send()?.error_for_status()?.text()?;
        Yahoo::parse_chart(&body, start, end)
    }
}
