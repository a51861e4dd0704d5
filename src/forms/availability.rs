use chrono::{Days, NaiveDate, NaiveTime};

use crate::forms::{Field, FieldErrors, ValidationError};

pub const END_TIME_BEFORE_START: &str = "End time must be after start time";
pub const DATE_IN_PAST: &str = "Date cannot be in the past";
pub const END_DATE_BEFORE_START: &str = "End date must be after start date";
pub const START_DATE_IN_PAST: &str = "Start date cannot be in the past";
pub const NO_DATES_GENERATED: &str = "No valid dates could be generated";

const ISO_DATE: &str = "%Y-%m-%d";
const PREVIEW_DATE: &str = "%a, %b %-d, %Y";

/// Parses an `<input type="date">` value. Blank or malformed input is treated as unset.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ISO_DATE).ok()
}

/// Parses an `<input type="time">` value (`HH:MM`, optionally with seconds).
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn check_time_range(field: Field, start: &str, end: &str) -> Result<(), ValidationError> {
    match (parse_time(start), parse_time(end)) {
        (Some(start), Some(end)) if start >= end => {
            Err(ValidationError::field(field, END_TIME_BEFORE_START))
        }
        _ => Ok(()),
    }
}

/// Leading-digit count parse: `"3 weeks"` reads as 3, anything else as 1.
fn parse_weeks(raw: &str) -> u32 {
    let digits = raw
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    match digits.parse::<u32>() {
        Ok(weeks) if weeks > 0 => weeks,
        _ => 1,
    }
}

/// One availability slot on one date.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SingleSlotForm {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl SingleSlotForm {
    pub fn check_time_range(&self) -> Result<(), ValidationError> {
        check_time_range(Field::EndTime, &self.start_time, &self.end_time)
    }

    pub fn check_date(&self, today: NaiveDate) -> Result<(), ValidationError> {
        match parse_date(&self.date) {
            Some(date) if date < today => Err(ValidationError::field(Field::Date, DATE_IN_PAST)),
            _ => Ok(()),
        }
    }

    /// Re-runs the check tied to a changed input.
    pub fn on_change(&self, field: Field, today: NaiveDate, errors: &mut FieldErrors) -> bool {
        match field {
            Field::StartTime | Field::EndTime => {
                errors.record(Field::EndTime, &self.check_time_range())
            }
            Field::Date => errors.record(Field::Date, &self.check_date(today)),
            _ => true,
        }
    }

    /// Runs every check, records each outcome and returns the first failure.
    pub fn validate(&self, today: NaiveDate, errors: &mut FieldErrors) -> Result<(), ValidationError> {
        let time = self.check_time_range();
        let date = self.check_date(today);
        errors.record(Field::EndTime, &time);
        errors.record(Field::Date, &date);
        time.and(date)
    }
}

/// A date range of slots, optionally repeated weekly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkSlotForm {
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub weekly_recurrence: bool,
    pub recurrence_weeks: String,
}

/// Human-readable listing of the dates a bulk submission would create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePreview {
    pub lines: Vec<String>,
    pub total: String,
}

impl BulkSlotForm {
    pub fn check_date_order(&self) -> Result<(), ValidationError> {
        match (parse_date(&self.start_date), parse_date(&self.end_date)) {
            (Some(start), Some(end)) if start > end => {
                Err(ValidationError::field(Field::EndDate, END_DATE_BEFORE_START))
            }
            _ => Ok(()),
        }
    }

    /// Only checked once both ends of the range are filled.
    pub fn check_start_date(&self, today: NaiveDate) -> Result<(), ValidationError> {
        match (parse_date(&self.start_date), parse_date(&self.end_date)) {
            (Some(start), Some(_)) if start < today => {
                Err(ValidationError::field(Field::StartDate, START_DATE_IN_PAST))
            }
            _ => Ok(()),
        }
    }

    pub fn check_time_range(&self) -> Result<(), ValidationError> {
        check_time_range(Field::BulkEndTime, &self.start_time, &self.end_time)
    }

    pub fn recurrence_weeks(&self) -> u32 {
        parse_weeks(&self.recurrence_weeks)
    }

    pub fn validate(&self, today: NaiveDate, errors: &mut FieldErrors) -> Result<(), ValidationError> {
        let order = self.check_date_order();
        let past = self.check_start_date(today);
        let time = self.check_time_range();
        errors.record(Field::EndDate, &order);
        errors.record(Field::StartDate, &past);
        errors.record(Field::BulkEndTime, &time);
        let outcome = order.and(past).and(time);
        if outcome.is_err() {
            errors.clear_form_error();
        }
        outcome
    }

    /// Every date in the range, plus weekly repeats, as sorted ISO strings.
    pub fn generate_dates(&self) -> Vec<String> {
        let (Some(start), Some(end)) = (parse_date(&self.start_date), parse_date(&self.end_date))
        else {
            return Vec::new();
        };

        let base = start
            .iter_days()
            .take_while(|date| *date <= end)
            .collect::<Vec<_>>();
        let mut dates = base.clone();

        let weeks = self.recurrence_weeks();
        if self.weekly_recurrence && weeks > 1 {
            for week in 1..weeks {
                let shift = Days::new(u64::from(week) * 7);
                dates.extend(base.iter().filter_map(|date| date.checked_add_days(shift)));
            }
        }

        let mut formatted = dates
            .into_iter()
            .map(|date| date.format(ISO_DATE).to_string())
            .collect::<Vec<_>>();
        formatted.sort();
        formatted
    }

    pub fn preview(&self) -> Option<DatePreview> {
        let dates = self.generate_dates();
        if dates.is_empty() {
            return None;
        }
        let lines = dates
            .iter()
            .filter_map(|raw| parse_date(raw))
            .map(|date| date.format(PREVIEW_DATE).to_string())
            .collect();
        Some(DatePreview {
            lines,
            total: format!("Total: {} dates", dates.len()),
        })
    }

    /// Validates, then expands the dates to submit.
    pub fn submit(
        &self,
        today: NaiveDate,
        errors: &mut FieldErrors,
    ) -> Result<Vec<String>, ValidationError> {
        self.validate(today, errors)?;
        let dates = self.generate_dates();
        if dates.is_empty() {
            errors.set_form_error(NO_DATES_GENERATED);
            return Err(ValidationError::form(NO_DATES_GENERATED));
        }
        errors.clear_form_error();
        Ok(dates)
    }
}

/// Hidden-field encoding of the generated dates.
pub fn encode_dates(dates: &[String]) -> String {
    dates.join(",")
}
