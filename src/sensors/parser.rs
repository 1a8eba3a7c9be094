//! Turns one line of raw sensor text into a [`Measurement`].
//!
//! Two grammars are accepted:
//!
//! | Grammar     | Example                                                  |
//! |-------------|----------------------------------------------------------|
//! | plain CSV   | `45.2,21.7,300.0`                                        |
//! | labeled CSV | `Humidity: 45.2%, Temperature: 21.7°C, Light Level: 300` |
//!
//! The labeled grammar is selected when the line starts with `Humidity:`.

use thiserror::Error;

use crate::db::models::Measurement;

/// Lines the device prints that carry no sample.
const BANNERS: &[&str] = &["Loading measurements..."];

const LABELED_PREFIX: &str = "Humidity:";

/// `(label, unit suffix)` for each field of the labeled grammar, in order.
const LABELS: [(&str, &str); 3] = [
    ("Humidity:", "%"),
    ("Temperature:", "°C"),
    ("Light Level:", ""),
];

const FIELD_NAMES: [&str; 3] = ["humidity", "temperature", "light_level"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected} comma-separated fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field {field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field {field} is not finite")]
    NonFinite { field: &'static str },

    #[error("expected label {label:?} in {value:?}")]
    MissingLabel { label: &'static str, value: String },
}

/// Outcome of parsing a line that is not malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Sample(Measurement),
    /// Banner or blank line: neither a sample nor an error.
    Ignored,
}

pub fn parse(line: &str) -> Result<Parsed, ParseError> {
    let line = line.trim();

    if line.is_empty() || BANNERS.iter().any(|banner| line.contains(banner)) {
        return Ok(Parsed::Ignored);
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FIELD_NAMES.len() {
        return Err(ParseError::FieldCount {
            expected: FIELD_NAMES.len(),
            found: fields.len(),
        });
    }

    let mut values = [0.0_f64; 3];
    let labeled = line.starts_with(LABELED_PREFIX);

    for (i, raw) in fields.into_iter().enumerate() {
        let number = if labeled {
            let (label, unit) = LABELS[i];
            let rest = raw.strip_prefix(label).ok_or_else(|| ParseError::MissingLabel {
                label,
                value: raw.to_owned(),
            })?;
            let rest = rest.trim();
            rest.strip_suffix(unit).unwrap_or(rest).trim()
        } else {
            raw
        };
        values[i] = parse_number(number, FIELD_NAMES[i])?;
    }

    let [humidity, temperature, light_level] = values;
    Ok(Parsed::Sample(Measurement {
        humidity,
        temperature,
        light_level,
    }))
}

fn parse_number(raw: &str, field: &'static str) -> Result<f64, ParseError> {
    let value: f64 = raw.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: raw.to_owned(),
    })?;
    if !value.is_finite() {
        return Err(ParseError::NonFinite { field });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(h: f64, t: f64, l: f64) -> Parsed {
        Parsed::Sample(Measurement {
            humidity: h,
            temperature: t,
            light_level: l,
        })
    }

    #[test]
    fn plain_csv_is_parsed_in_order() {
        assert_eq!(parse("45.2,21.7,300.0").unwrap(), sample(45.2, 21.7, 300.0));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(parse("  45.2 , 21.7 ,300\r\n").unwrap(), sample(45.2, 21.7, 300.0));
    }

    #[test]
    fn negative_values_pass_through() {
        assert_eq!(parse("-1,-20.5,-3").unwrap(), sample(-1.0, -20.5, -3.0));
    }

    #[test]
    fn too_few_fields_is_an_error() {
        assert_eq!(
            parse("45.2,21.7").unwrap_err(),
            ParseError::FieldCount { expected: 3, found: 2 }
        );
    }

    #[test]
    fn too_many_fields_is_an_error() {
        assert_eq!(
            parse("1,2,3,4").unwrap_err(),
            ParseError::FieldCount { expected: 3, found: 4 }
        );
    }

    #[test]
    fn non_numeric_field_is_an_error() {
        assert_eq!(
            parse("45.2,warm,300").unwrap_err(),
            ParseError::InvalidNumber {
                field: "temperature",
                value: "warm".to_owned()
            }
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert_eq!(
            parse("NaN,21.7,300").unwrap_err(),
            ParseError::NonFinite { field: "humidity" }
        );
        assert_eq!(
            parse("45,21.7,inf").unwrap_err(),
            ParseError::NonFinite { field: "light_level" }
        );
    }

    #[test]
    fn banner_is_ignored() {
        assert_eq!(parse("Loading measurements...").unwrap(), Parsed::Ignored);
        assert_eq!(parse(">> Loading measurements... please wait").unwrap(), Parsed::Ignored);
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse("   ").unwrap(), Parsed::Ignored);
    }

    #[test]
    fn labeled_csv_is_parsed() {
        assert_eq!(
            parse("Humidity: 45.2%, Temperature: 21.7°C, Light Level: 300.0").unwrap(),
            sample(45.2, 21.7, 300.0)
        );
    }

    #[test]
    fn labeled_csv_units_are_optional() {
        assert_eq!(
            parse("Humidity: 50, Temperature: 20, Light Level: 1").unwrap(),
            sample(50.0, 20.0, 1.0)
        );
    }

    #[test]
    fn labeled_csv_with_wrong_label_is_an_error() {
        let err = parse("Humidity: 45.2%, Temp: 21.7°C, Light Level: 300").unwrap_err();
        assert!(matches!(err, ParseError::MissingLabel { label: "Temperature:", .. }));
    }

    #[test]
    fn labeled_round_trip_through_to_labeled() {
        let m = Measurement {
            humidity: 61.5,
            temperature: -3.25,
            light_level: 812.0,
        };
        assert_eq!(parse(&m.to_labeled()).unwrap(), Parsed::Sample(m));
    }
}
