use std::{
    collections::HashMap,
    fmt::{self, Display},
    ops::RangeInclusive,
};

use time::Date;
use tracing::trace;

use crate::{Measurement, Store};

/// Hourly station: a complete day holds this many readings.
pub const EXPECTED_READINGS_PER_DAY: usize = 24;

/// Every calendar day from `first` to `last`, both included.
///
/// Empty when `first` comes after `last`.
#[derive(Debug, Clone)]
pub struct DateRange {
    next: Option<Date>,
    last: Date,
}

impl DateRange {
    pub fn new(first: Date, last: Date) -> Self {
        Self {
            next: (first <= last).then_some(first),
            last,
        }
    }
}

impl Iterator for DateRange {
    type Item = Date;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next_day().filter(|day| *day <= self.last);
        Some(current)
    }
}

/// Kahan summation. The running compensation is subtracted from the final sum.
///
/// Falls back to the plain sum when the compensation overflows into NaN.
fn compensated_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut compensation = 0.0;
    let mut simple_sum = 0.0;
    for &value in values {
        let corrected = value - compensation;
        let next = sum + corrected;
        compensation = (next - sum) - corrected;
        sum = next;
        simple_sum += value;
    }

    let total = sum - compensation;
    if total.is_nan() && simple_sum.is_infinite() {
        simple_sum
    } else {
        total
    }
}

/// Round to two decimals, halves away from zero.
fn round2(value: f64) -> f64 {
    // Adding 0.0 turns a rounded -0.0 into 0.0
    (value * 100.0).round() / 100.0 + 0.0
}

// Shortest representation that reads back to the same value, but integral
// values keep their decimal point: `5.0` rather than `5`.
struct Decimal(f64);

impl Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyAverage {
    pub date: Date,
    pub temperature: f64,
}

impl Display for DailyAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} average temperature: {} degrees Celsius",
            self.date,
            Decimal(self.temperature)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingReadings {
    pub date: Date,
    /// Negative when the day holds more readings than expected
    pub missing: i64,
}

impl Display for MissingReadings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} missing {} values", self.date, self.missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Approval {
    NoData,
    Rate {
        from: Date,
        to: Date,
        percentage: f64,
    },
}

impl Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Approval::NoData => write!(f, "No values available for the specified date range."),
            Approval::Rate {
                from,
                to,
                percentage,
            } => write!(
                f,
                "Approved values between {from} and {to}: {} %",
                Decimal(*percentage)
            ),
        }
    }
}

/// Read-only queries over a [`Store`].
///
/// Every query takes an inclusive `from..=to` range of days. A range where
/// `from` comes after `to` holds no day and is not an error.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    store: &'a Store,
}

impl Store {
    pub fn query(&self) -> QueryEngine<'_> {
        QueryEngine::new(self)
    }
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    fn within(&self, from: Date, to: Date) -> impl Iterator<Item = &'a Measurement> {
        let range: RangeInclusive<Date> = from..=to;
        self.store
            .iter()
            .filter(move |measurement| range.contains(&measurement.date()))
    }

    /// Mean temperature of each day of the range that has at least one reading.
    pub fn daily_averages(&self, from: Date, to: Date) -> Vec<DailyAverage> {
        let mut temperatures: HashMap<Date, Vec<f64>> = HashMap::new();
        for measurement in self.within(from, to) {
            temperatures
                .entry(measurement.date())
                .or_default()
                .push(measurement.temperature());
        }

        let averages: Vec<DailyAverage> = DateRange::new(from, to)
            .filter_map(|date| {
                let day = temperatures.get(&date)?;
                Some(DailyAverage {
                    date,
                    temperature: round2(compensated_sum(day) / day.len() as f64),
                })
            })
            .collect();

        trace!(%from, %to, days = averages.len(), "computed daily averages");
        averages
    }

    /// Readings missing from every day of the range, most incomplete days first.
    ///
    /// Days with the same count stay in date order.
    pub fn missing_readings(&self, from: Date, to: Date) -> Vec<MissingReadings> {
        let mut counts: HashMap<Date, usize> = HashMap::new();
        for measurement in self.within(from, to) {
            *counts.entry(measurement.date()).or_default() += 1;
        }

        let mut report: Vec<MissingReadings> = DateRange::new(from, to)
            .map(|date| {
                let count = counts.get(&date).copied().unwrap_or(0);
                MissingReadings {
                    date,
                    missing: EXPECTED_READINGS_PER_DAY as i64 - count as i64,
                }
            })
            .collect();
        // `sort_by` is stable
        report.sort_by(|left, right| right.missing.cmp(&left.missing));

        trace!(%from, %to, days = report.len(), "computed missing readings");
        report
    }

    /// Share of approved readings over the whole range.
    pub fn approval(&self, from: Date, to: Date) -> Approval {
        let (total, approved) = self
            .within(from, to)
            .fold((0usize, 0usize), |(total, approved), measurement| {
                (total + 1, approved + usize::from(measurement.confirmed()))
            });

        trace!(%from, %to, total, approved, "computed approval");
        if total == 0 {
            return Approval::NoData;
        }
        Approval::Rate {
            from,
            to,
            percentage: round2(approved as f64 / total as f64 * 100.0),
        }
    }

    pub fn average_temperatures(&self, from: Date, to: Date) -> Vec<String> {
        lines(self.daily_averages(from, to))
    }

    pub fn missing_values(&self, from: Date, to: Date) -> Vec<String> {
        lines(self.missing_readings(from, to))
    }

    pub fn approved_values(&self, from: Date, to: Date) -> Vec<String> {
        vec![self.approval(from, to).to_string()]
    }
}

fn lines<T: Display>(rows: Vec<T>) -> Vec<String> {
    rows.iter().map(ToString::to_string).collect()
}
