//! The request/response cycle behind the form: collect, build, predict, render.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::slice;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{FormError, PredictionError};
use crate::model::PredictionService;
use crate::schema::Category;
use crate::types::{limits, CarFormInput, CarInputRecord, FuelType, PriceEstimate, Transmission};

/// Widget state exactly as the browser posts it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormFields {
    pub year: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,
    pub condition: Option<String>,
    pub cylinders: Option<String>,
    pub body: Option<String>,
    pub fuel: Option<String>,
    pub transmission: Option<String>,
    pub odometer: Option<String>,
    pub color: Option<String>,
    pub interior: Option<String>,
    pub seller: Option<String>,
    pub mmr: Option<String>,
    pub sale_year: Option<String>,
    pub sale_month: Option<String>,
    pub sale_day: Option<String>,
    pub sale_weekday: Option<String>,
}

impl From<&CarFormInput> for FormFields {
    fn from(i: &CarFormInput) -> Self {
        Self {
            year: Some(i.year.to_string()),
            make: Some(i.make.clone()),
            model: Some(i.model.clone()),
            trim: Some(i.trim.clone()),
            condition: Some(i.condition.to_string()),
            cylinders: Some(i.cylinders.to_string()),
            body: Some(i.body.clone()),
            fuel: Some(i.fuel.as_str().to_string()),
            transmission: Some(i.transmission.as_str().to_string()),
            odometer: Some(i.odometer.to_string()),
            color: Some(i.color.clone()),
            interior: Some(i.interior.clone()),
            seller: Some(i.seller.clone()),
            mmr: Some(i.mmr.to_string()),
            sale_year: Some(i.sale_year.to_string()),
            sale_month: Some(i.sale_month.to_string()),
            sale_day: Some(i.sale_day.to_string()),
            sale_weekday: Some(i.sale_weekday.to_string()),
        }
    }
}

fn required<'a>(field: &'static str, raw: &'a Option<String>) -> Result<&'a str, FormError> {
    raw.as_deref()
        .map(str::trim)
        .ok_or(FormError::Missing { field })
}

fn text(field: &'static str, raw: &Option<String>) -> Result<String, FormError> {
    let s = required(field, raw)?;
    if s.is_empty() {
        return Err(FormError::Empty { field });
    }
    Ok(s.to_string())
}

fn int_in<T>(field: &'static str, raw: &Option<String>, (min, max): (T, T)) -> Result<T, FormError>
where
    T: TryFrom<i64> + Into<i64> + Copy + fmt::Display,
{
    let s = required(field, raw)?;
    let not_a_number = || FormError::NotANumber {
        field,
        value: s.to_string(),
    };
    let v: i64 = s.parse().map_err(|_| not_a_number())?;
    if v < min.into() || v > max.into() {
        return Err(FormError::OutOfRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
            value: v.to_string(),
        });
    }
    T::try_from(v).map_err(|_| not_a_number())
}

fn number(field: &'static str, raw: &Option<String>) -> Result<f64, FormError> {
    let s = required(field, raw)?;
    s.parse().map_err(|_| FormError::NotANumber {
        field,
        value: s.to_string(),
    })
}

fn choice<T>(field: &'static str, raw: &Option<String>, pick: fn(&str) -> Option<T>) -> Result<T, FormError> {
    let s = required(field, raw)?;
    pick(s).ok_or_else(|| FormError::UnknownOption {
        field,
        value: s.to_string(),
    })
}

/// Read every widget. Ranges are inclusive.
pub fn collect_input(fields: &FormFields) -> Result<CarFormInput, FormError> {
    let input = CarFormInput {
        year: int_in("year", &fields.year, limits::YEAR)?,
        make: text("make", &fields.make)?,
        model: text("model", &fields.model)?,
        trim: text("trim", &fields.trim)?,
        condition: int_in("condition", &fields.condition, limits::CONDITION)?,
        cylinders: int_in("cylinders", &fields.cylinders, limits::CYLINDERS)?,
        body: text("body", &fields.body)?,
        fuel: choice("fuel", &fields.fuel, FuelType::from_option)?,
        transmission: choice("transmission", &fields.transmission, Transmission::from_option)?,
        odometer: int_in("odometer", &fields.odometer, limits::ODOMETER)?,
        color: text("color", &fields.color)?,
        interior: text("interior", &fields.interior)?,
        seller: text("seller", &fields.seller)?,
        mmr: number("mmr", &fields.mmr)?,
        sale_year: int_in("sale_year", &fields.sale_year, limits::SALE_YEAR)?,
        sale_month: int_in("sale_month", &fields.sale_month, limits::SALE_MONTH)?,
        sale_day: int_in("sale_day", &fields.sale_day, limits::SALE_DAY)?,
        sale_weekday: int_in("sale_weekday", &fields.sale_weekday, limits::SALE_WEEKDAY)?,
    };
    input.validate()?;
    Ok(input)
}

/// Assemble the model row. `state` has no input and is always missing.
pub fn build_record(input: &CarFormInput) -> CarInputRecord {
    // TODO: send cylinders and fuel once a model trained with those columns ships.
    debug!(
        cylinders = input.cylinders,
        fuel = input.fuel.as_str(),
        "inputs without a model column"
    );
    CarInputRecord {
        year: input.year,
        make: Category::label(input.make.trim()),
        model: Category::label(input.model.trim()),
        trim: Category::label(input.trim.trim()),
        body: Category::label(input.body.trim()),
        transmission: Category::label(input.transmission.as_str()),
        state: Category::Missing,
        condition: input.condition,
        odometer: input.odometer,
        color: Category::label(input.color.trim()),
        interior: Category::label(input.interior.trim()),
        seller: Category::label(input.seller.trim()),
        mmr: input.mmr,
        sale_year: input.sale_year,
        sale_month: input.sale_month,
        sale_day: input.sale_day,
        sale_weekday: input.sale_weekday,
    }
}

/// Ask the service about exactly one record and take its first value.
pub fn predict(
    record: &CarInputRecord,
    service: &dyn PredictionService,
) -> Result<PriceEstimate, PredictionError> {
    let values = service.predict(slice::from_ref(record))?;
    match values.as_slice() {
        [] => Err(PredictionError::new("prediction service returned no values")),
        [first, rest @ ..] => {
            if !rest.is_empty() {
                warn!(extra = rest.len(), "prediction service returned more than one value");
            }
            Ok(PriceEstimate(*first))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Estimate(PriceEstimate),
    PredictionFailed(PredictionError),
    InvalidInput(FormError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// What the result area shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub severity: Severity,
    pub message: String,
}

pub fn render(outcome: &Outcome) -> Rendered {
    match outcome {
        Outcome::Estimate(p) => Rendered {
            severity: Severity::Success,
            message: format!("💰 Estimated Car Price: ₹ {}", p),
        },
        Outcome::PredictionFailed(e) => Rendered {
            severity: Severity::Error,
            message: format!("⚠️ Prediction failed: {}", e),
        },
        Outcome::InvalidInput(e) => Rendered {
            severity: Severity::Error,
            message: format!("⚠️ Invalid input: {}", e),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Collecting,
    Submitted,
    Succeeded,
    Failed,
}

/// One form session. Submissions are independent; the session is back to
/// `Idle` after each one whatever its outcome.
pub struct PredictorSession {
    service: Arc<dyn PredictionService>,
    phase: SessionPhase,
}

impl PredictorSession {
    pub fn new(service: Arc<dyn PredictionService>) -> Self {
        Self {
            service,
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run a form submission end to end.
    pub fn submit(&mut self, fields: &FormFields) -> Outcome {
        self.enter(SessionPhase::Collecting);
        let outcome = match collect_input(fields) {
            Ok(input) => self.estimate(&input),
            Err(e) => {
                self.enter(SessionPhase::Failed);
                Outcome::InvalidInput(e)
            }
        };
        self.enter(SessionPhase::Idle);
        outcome
    }

    /// Same cycle for input that arrived already typed.
    pub fn submit_input(&mut self, input: &CarFormInput) -> Outcome {
        self.enter(SessionPhase::Collecting);
        let outcome = match input.validate() {
            Ok(()) => self.estimate(input),
            Err(e) => {
                self.enter(SessionPhase::Failed);
                Outcome::InvalidInput(e)
            }
        };
        self.enter(SessionPhase::Idle);
        outcome
    }

    fn estimate(&mut self, input: &CarFormInput) -> Outcome {
        let record = build_record(input);
        self.enter(SessionPhase::Submitted);
        match predict(&record, self.service.as_ref()) {
            Ok(price) => {
                self.enter(SessionPhase::Succeeded);
                debug!(price = price.value(), "prediction ok");
                Outcome::Estimate(price)
            }
            Err(e) => {
                self.enter(SessionPhase::Failed);
                warn!(error = %e, "prediction failed");
                Outcome::PredictionFailed(e)
            }
        }
    }

    fn enter(&mut self, next: SessionPhase) {
        debug!(from = ?self.phase, to = ?next, "session phase");
        self.phase = next;
    }
}
