//! Value types of attributes and data elements.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifier::CodeGenerator;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap()
});

static PHONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9+() \-]{4,50}$").unwrap());

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").unwrap());

static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").unwrap());

/// Maximum length of a short text value.
pub const MAX_TEXT_LENGTH: usize = 50_000;

/// The type of values an attribute or data element accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    #[default]
    Text,
    LongText,
    Letter,
    PhoneNumber,
    Email,
    Boolean,
    TrueOnly,
    Date,
    Datetime,
    Time,
    Number,
    UnitInterval,
    Percentage,
    Integer,
    IntegerPositive,
    IntegerNegative,
    IntegerZeroOrPositive,
    Url,
    OrganisationUnit,
    Username,
    Age,
}

/// Reason a value was rejected for its value type.
pub type ValueTypeViolation = &'static str;

impl ValueType {
    /// Checks `value` against this value type.
    pub fn validate(&self, value: &str) -> Result<(), ValueTypeViolation> {
        let ok = match self {
            ValueType::Text | ValueType::Username => value.chars().count() <= MAX_TEXT_LENGTH,
            ValueType::LongText => true,
            ValueType::Letter => value.chars().count() == 1 && value.chars().all(char::is_alphabetic),
            ValueType::PhoneNumber => PHONE_NUMBER.is_match(value),
            ValueType::Email => EMAIL.is_match(value),
            ValueType::Boolean => matches!(value, "true" | "false"),
            ValueType::TrueOnly => value == "true",
            ValueType::Date | ValueType::Age => parse_date(value).is_some(),
            ValueType::Datetime => parse_date_time(value).is_some(),
            ValueType::Time => TIME.is_match(value),
            ValueType::Number => parse_number(value).is_some(),
            ValueType::UnitInterval => parse_number(value).is_some_and(|n| (0.0..=1.0).contains(&n)),
            ValueType::Percentage => parse_number(value).is_some_and(|n| (0.0..=100.0).contains(&n)),
            ValueType::Integer => value.parse::<i64>().is_ok(),
            ValueType::IntegerPositive => value.parse::<i64>().is_ok_and(|n| n > 0),
            ValueType::IntegerNegative => value.parse::<i64>().is_ok_and(|n| n < 0),
            ValueType::IntegerZeroOrPositive => value.parse::<i64>().is_ok_and(|n| n >= 0),
            ValueType::Url => URL.is_match(value),
            ValueType::OrganisationUnit => CodeGenerator::is_valid_uid(value),
        };

        if ok { Ok(()) } else { Err(self.violation()) }
    }

    fn violation(&self) -> ValueTypeViolation {
        match self {
            ValueType::Text | ValueType::Username => "value_length_greater_than_max_length",
            ValueType::LongText => "value_not_valid",
            ValueType::Letter => "value_not_valid_letter",
            ValueType::PhoneNumber => "value_not_valid_phone_number",
            ValueType::Email => "value_not_valid_email",
            ValueType::Boolean => "value_not_bool",
            ValueType::TrueOnly => "value_not_true_only",
            ValueType::Date | ValueType::Age => "value_not_valid_date",
            ValueType::Datetime => "value_not_valid_datetime",
            ValueType::Time => "value_not_valid_time",
            ValueType::Number => "value_not_numeric",
            ValueType::UnitInterval => "value_not_unit_interval",
            ValueType::Percentage => "value_not_percentage",
            ValueType::Integer => "value_not_integer",
            ValueType::IntegerPositive => "value_not_positive_integer",
            ValueType::IntegerNegative => "value_not_negative_integer",
            ValueType::IntegerZeroOrPositive => "value_not_zero_or_positive_integer",
            ValueType::Url => "value_not_url",
            ValueType::OrganisationUnit => "value_not_valid_organisation_unit",
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    crate::model::parse_instant(value).map(|instant| instant.naive_utc())
}
