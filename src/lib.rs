use std::{num::ParseFloatError, str::FromStr};

use logos::{Lexer, Logos};
use thiserror::Error;
use time::{Date, Month, Time};

mod query;
mod store;

pub use query::{
    Approval, DailyAverage, DateRange, MissingReadings, QueryEngine, EXPECTED_READINGS_PER_DAY,
};
pub use store::{LoadError, Store};

#[derive(Logos, Debug, PartialEq)]
enum Token {
    #[regex("[0-9]+")]
    Number,
    #[token("-")]
    Dash,
    #[token(":")]
    Colon,
}

/// One hourly reading of the station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    date: Date,
    time: Time,
    temperature: f64,
    confirmed: bool,
}

impl Measurement {
    pub fn new(date: Date, time: Time, temperature: f64, confirmed: bool) -> Self {
        Self {
            date,
            time,
            temperature,
            confirmed,
        }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn time(&self) -> Time {
        self.time
    }

    /// Temperature in degrees Celsius
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Whether the reading was approved, marked with a `G` in the source file
    pub fn confirmed(&self) -> bool {
        self.confirmed
    }
}

#[derive(Debug, Error)]
pub enum ParseMeasurementError {
    #[error("Expected 4 fields separated by `;`, found {0}")]
    FieldCount(usize),
    #[error("Bad date `{0}`, expecting YYYY-MM-DD")]
    BadDate(String),
    #[error("Invalid date: {0}")]
    InvalidDate(#[source] time::error::ComponentRange),
    #[error("Bad time `{0}`, expecting HH:MM or HH:MM:SS")]
    BadTime(String),
    #[error("Invalid time: {0}")]
    InvalidTime(#[source] time::error::ComponentRange),
    #[error("Bad temperature `{0}`: {1}")]
    BadTemperature(String, #[source] ParseFloatError),
    #[error("Bad temperature `{0}`: not a finite number")]
    NonFiniteTemperature(String),
}

impl ParseMeasurementError {
    /// Index of the `;` separated field that failed, `None` when the whole line is wrong.
    pub fn field(&self) -> Option<usize> {
        match self {
            Self::FieldCount(_) => None,
            Self::BadDate(_) | Self::InvalidDate(_) => Some(0),
            Self::BadTime(_) | Self::InvalidTime(_) => Some(1),
            Self::BadTemperature(..) | Self::NonFiniteTemperature(_) => Some(2),
        }
    }
}

impl FromStr for Measurement {
    type Err = ParseMeasurementError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(';').collect();
        let [date, time, temperature, flag] = fields.as_slice() else {
            return Err(ParseMeasurementError::FieldCount(fields.len()));
        };

        let date = parse_date(date)?;
        let time = parse_time(time)?;
        let temperature = parse_temperature(temperature)?;
        let confirmed = *flag == "G";

        Ok(Self {
            date,
            time,
            temperature,
            confirmed,
        })
    }
}

fn parse_temperature(s: &str) -> Result<f64, ParseMeasurementError> {
    let temperature: f64 = s
        .trim()
        .parse()
        .map_err(|e| ParseMeasurementError::BadTemperature(s.to_string(), e))?;
    if !temperature.is_finite() {
        return Err(ParseMeasurementError::NonFiniteTemperature(s.to_string()));
    }
    Ok(temperature)
}

fn number<T: FromStr>(lexer: &mut Lexer<Token>, digits: usize) -> Option<T> {
    match lexer.next() {
        Some(Ok(Token::Number)) if lexer.slice().len() == digits => lexer.slice().parse().ok(),
        _ => None,
    }
}

fn separator(lexer: &mut Lexer<Token>, expected: Token) -> Option<()> {
    match lexer.next() {
        Some(Ok(token)) if token == expected => Some(()),
        _ => None,
    }
}

fn date_parts(date: &mut Lexer<Token>) -> Option<(i32, u8, u8)> {
    let year = number(date, 4)?;
    separator(date, Token::Dash)?;
    let month = number(date, 2)?;
    separator(date, Token::Dash)?;
    let day = number(date, 2)?;
    date.next().is_none().then_some((year, month, day))
}

fn time_parts(time: &mut Lexer<Token>) -> Option<(u8, u8, u8)> {
    let hour = number(time, 2)?;
    separator(time, Token::Colon)?;
    let minute = number(time, 2)?;
    match time.next() {
        None => Some((hour, minute, 0)),
        Some(Ok(Token::Colon)) => {
            let second = number(time, 2)?;
            time.next().is_none().then_some((hour, minute, second))
        }
        Some(_) => None,
    }
}

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<Date, ParseMeasurementError> {
    let (year, month, day) = date_parts(&mut Token::lexer(s))
        .ok_or_else(|| ParseMeasurementError::BadDate(s.to_string()))?;

    let month = Month::try_from(month).map_err(ParseMeasurementError::InvalidDate)?;
    Date::from_calendar_date(year, month, day).map_err(ParseMeasurementError::InvalidDate)
}

/// Parse a `HH:MM` or `HH:MM:SS` time of day.
pub fn parse_time(s: &str) -> Result<Time, ParseMeasurementError> {
    let (hour, minute, second) = time_parts(&mut Token::lexer(s))
        .ok_or_else(|| ParseMeasurementError::BadTime(s.to_string()))?;

    Time::from_hms(hour, minute, second).map_err(ParseMeasurementError::InvalidTime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_measurement() {
        let measurement: Measurement = "2000-01-01;06:00:00;-3.5;G".parse().unwrap();
        assert_eq!(
            measurement.date(),
            Date::from_calendar_date(2000, Month::January, 1).unwrap()
        );
        assert_eq!(measurement.time(), Time::from_hms(6, 0, 0).unwrap());
        assert_eq!(measurement.temperature(), -3.5);
        assert!(measurement.confirmed());
    }

    #[test]
    fn anything_but_g_is_unconfirmed() {
        for flag in ["Y", "g", "", " G"] {
            let line = format!("2000-01-01;06:00;1.0;{flag}");
            let measurement: Measurement = line.parse().unwrap();
            assert!(!measurement.confirmed(), "flag {flag:?}");
        }
    }

    #[test]
    fn short_time_has_no_seconds() {
        assert_eq!(parse_time("23:59").unwrap(), Time::from_hms(23, 59, 0).unwrap());
        assert_eq!(parse_time("23:59:30").unwrap(), Time::from_hms(23, 59, 30).unwrap());
    }

    #[test]
    fn wrong_field_count() {
        let err = "2000-01-01;06:00;1.0".parse::<Measurement>().unwrap_err();
        assert!(matches!(err, ParseMeasurementError::FieldCount(3)));
        assert_eq!(err.field(), None);

        let err = "2000-01-01;06:00;1.0;G;extra"
            .parse::<Measurement>()
            .unwrap_err();
        assert!(matches!(err, ParseMeasurementError::FieldCount(5)));

        let err = "".parse::<Measurement>().unwrap_err();
        assert!(matches!(err, ParseMeasurementError::FieldCount(1)));
    }

    #[test]
    fn bad_dates() {
        for date in [
            "2000/01/01",
            "2000-1-01",
            "20000-01-01",
            "2000-01-01T",
            "today",
            "",
            "2000 - 01 - 01",
            " 2000-01-01",
            "2000-01-01\t",
        ] {
            assert!(
                matches!(parse_date(date), Err(ParseMeasurementError::BadDate(_))),
                "{date:?}"
            );
        }
        assert!(matches!(
            parse_date("2001-02-29"),
            Err(ParseMeasurementError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_date("2000-13-01"),
            Err(ParseMeasurementError::InvalidDate(_))
        ));
        assert!(parse_date("2000-02-29").is_ok());
    }

    #[test]
    fn bad_times() {
        for time in [
            "6:00",
            "06-00",
            "06:00:",
            "06:00:00:00",
            "noon",
            "06 : 00",
            "06:00 ",
        ] {
            assert!(
                matches!(parse_time(time), Err(ParseMeasurementError::BadTime(_))),
                "{time:?}"
            );
        }
        assert!(matches!(
            parse_time("24:00"),
            Err(ParseMeasurementError::InvalidTime(_))
        ));
    }

    #[test]
    fn bad_temperature_points_at_third_field() {
        let err = "2000-01-01;06:00;warm;G".parse::<Measurement>().unwrap_err();
        assert!(matches!(err, ParseMeasurementError::BadTemperature(ref t, _) if t == "warm"));
        assert_eq!(err.field(), Some(2));
    }

    #[test]
    fn non_finite_temperatures_are_rejected() {
        for temperature in ["inf", "-inf", "Infinity", "infinity", "NaN", "nan"] {
            let line = format!("2000-01-01;06:00;{temperature};G");
            let err = line.parse::<Measurement>().unwrap_err();
            assert!(
                matches!(err, ParseMeasurementError::NonFiniteTemperature(ref t) if t == temperature),
                "{temperature:?}"
            );
            assert_eq!(err.field(), Some(2));
        }
    }

    #[test]
    fn blanks_around_a_line_field_fail_the_line() {
        let err = "2000 - 01 - 01;06:00;1.0;G"
            .parse::<Measurement>()
            .unwrap_err();
        assert!(matches!(err, ParseMeasurementError::BadDate(_)));
        let err = "2000-01-01;06 : 00;1.0;G".parse::<Measurement>().unwrap_err();
        assert!(matches!(err, ParseMeasurementError::BadTime(_)));
    }

    #[test]
    fn temperature_is_trimmed() {
        let measurement: Measurement = "2000-01-01;06:00; 12.25 ;G".parse().unwrap();
        assert_eq!(measurement.temperature(), 12.25);
    }
}
