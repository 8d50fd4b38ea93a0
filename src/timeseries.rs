use std::collections::BTreeMap;

use chrono::NaiveDate;

/// One trading day: the calendar date and its closing price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        PricePoint { date, close }
    }
}

/// Daily closes of one equity, ascending by date with unique dates.
///
/// An empty series is the explicit "no data" state and every consumer has to
/// accept it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub equity_name: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn empty(symbol: &str) -> Self {
        PriceSeries {
            equity_name: String::from(symbol),
            points: Vec::new(),
        }
    }

    pub fn from_entries(symbol: &str, entries: BTreeMap<NaiveDate, f64>) -> Self {
        PriceSeries {
            equity_name: String::from(symbol),
            points: entries
                .into_iter()
                .map(|(date, close)| PricePoint { date, close })
                .collect(),
        }
    }

    /// Sorts by date; for duplicated dates the later point wins.
    pub fn from_points<I>(symbol: &str, points: I) -> Self
    where
        I: IntoIterator<Item = PricePoint>,
    {
        let entries: BTreeMap<NaiveDate, f64> =
            points.into_iter().map(|p| (p.date, p.close)).collect();
        PriceSeries::from_entries(symbol, entries)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.points.get(index)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.points.len().checked_sub(1)
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.close)
    }

    pub fn head(&self, n: usize) -> &[PricePoint] {
        &self.points[..n.min(self.points.len())]
    }

    /// Points with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        PriceSeries {
            equity_name: self.equity_name.clone(),
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
        }
    }

    pub fn get_max_close(&self) -> Option<f64> {
        self.closes().reduce(f64::max)
    }

    pub fn get_min_close(&self) -> Option<f64> {
        self.closes().reduce(f64::min)
    }
}
