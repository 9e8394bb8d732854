use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FormError;
use crate::schema::{CellValue, Category, Column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FuelType {
    #[default]
    Petrol,
    Diesel,
    #[serde(rename = "CNG")]
    Cng,
    #[serde(rename = "LPG")]
    Lpg,
    Electric,
}

impl FuelType {
    pub const ALL: [FuelType; 5] = [
        FuelType::Petrol,
        FuelType::Diesel,
        FuelType::Cng,
        FuelType::Lpg,
        FuelType::Electric,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FuelType::Petrol => "Petrol",
            FuelType::Diesel => "Diesel",
            FuelType::Cng => "CNG",
            FuelType::Lpg => "LPG",
            FuelType::Electric => "Electric",
        }
    }

    pub fn from_option(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transmission {
    #[default]
    Manual,
    Automatic,
}

impl Transmission {
    pub const ALL: [Transmission; 2] = [Transmission::Manual, Transmission::Automatic];

    pub fn as_str(self) -> &'static str {
        match self {
            Transmission::Manual => "Manual",
            Transmission::Automatic => "Automatic",
        }
    }

    pub fn from_option(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Inclusive widget ranges.
pub mod limits {
    pub const YEAR: (i32, i32) = (1990, 2025);
    pub const CONDITION: (u8, u8) = (1, 5);
    pub const CYLINDERS: (u8, u8) = (2, 12);
    pub const ODOMETER: (u32, u32) = (0, 500_000);
    pub const SALE_YEAR: (i32, i32) = (2000, 2025);
    pub const SALE_MONTH: (u8, u8) = (1, 12);
    pub const SALE_DAY: (u8, u8) = (1, 31);
    pub const SALE_WEEKDAY: (u8, u8) = (0, 6);
}

/// Collected widget values. `cylinders` and `fuel` are gathered but the model
/// row has no column for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarFormInput {
    pub year: i32,
    pub make: String,
    pub model: String,
    pub trim: String,
    pub condition: u8,
    pub cylinders: u8,
    pub body: String,
    pub fuel: FuelType,
    pub transmission: Transmission,
    pub odometer: u32,
    pub color: String,
    pub interior: String,
    pub seller: String,
    pub mmr: f64,
    pub sale_year: i32,
    pub sale_month: u8,
    pub sale_day: u8,
    /// 0 = Monday, 6 = Sunday
    pub sale_weekday: u8,
}

impl Default for CarFormInput {
    fn default() -> Self {
        Self {
            year: 2015,
            make: "Toyota".into(),
            model: "Corolla".into(),
            trim: "LX".into(),
            condition: 3,
            cylinders: 4,
            body: "Sedan".into(),
            fuel: FuelType::Petrol,
            transmission: Transmission::Manual,
            odometer: 50_000,
            color: "White".into(),
            interior: "Black".into(),
            seller: "Dealer".into(),
            mmr: 10_000.0,
            sale_year: 2024,
            sale_month: 6,
            sale_day: 15,
            sale_weekday: 0,
        }
    }
}

pub(crate) fn check_range<T>(field: &'static str, value: T, (min, max): (T, T)) -> Result<T, FormError>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(FormError::OutOfRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn check_text(field: &'static str, value: &str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        return Err(FormError::Empty { field });
    }
    Ok(())
}

impl CarFormInput {
    /// Enforce the constraints the form widgets carry.
    pub fn validate(&self) -> Result<(), FormError> {
        check_range("year", self.year, limits::YEAR)?;
        check_text("make", &self.make)?;
        check_text("model", &self.model)?;
        check_text("trim", &self.trim)?;
        check_range("condition", self.condition, limits::CONDITION)?;
        check_range("cylinders", self.cylinders, limits::CYLINDERS)?;
        check_text("body", &self.body)?;
        check_range("odometer", self.odometer, limits::ODOMETER)?;
        check_text("color", &self.color)?;
        check_text("interior", &self.interior)?;
        check_text("seller", &self.seller)?;
        if !self.mmr.is_finite() || self.mmr < 0.0 {
            return Err(FormError::OutOfRange {
                field: "mmr",
                min: "0".into(),
                max: "any finite amount".into(),
                value: self.mmr.to_string(),
            });
        }
        check_range("sale_year", self.sale_year, limits::SALE_YEAR)?;
        check_range("sale_month", self.sale_month, limits::SALE_MONTH)?;
        check_range("sale_day", self.sale_day, limits::SALE_DAY)?;
        check_range("sale_weekday", self.sale_weekday, limits::SALE_WEEKDAY)?;
        Ok(())
    }
}

/// One model row. Categorical columns hold [`Category`] values only.
#[derive(Debug, Clone, PartialEq)]
pub struct CarInputRecord {
    pub year: i32,
    pub make: Category,
    pub model: Category,
    pub trim: Category,
    pub body: Category,
    pub transmission: Category,
    pub state: Category,
    pub condition: u8,
    pub odometer: u32,
    pub color: Category,
    pub interior: Category,
    pub seller: Category,
    pub mmr: f64,
    pub sale_year: i32,
    pub sale_month: u8,
    pub sale_day: u8,
    pub sale_weekday: u8,
}

impl CarInputRecord {
    pub fn value(&self, column: Column) -> CellValue<'_> {
        match column {
            Column::Year => CellValue::Integer(self.year.into()),
            Column::Make => CellValue::Category(&self.make),
            Column::Model => CellValue::Category(&self.model),
            Column::Trim => CellValue::Category(&self.trim),
            Column::Body => CellValue::Category(&self.body),
            Column::Transmission => CellValue::Category(&self.transmission),
            Column::State => CellValue::Category(&self.state),
            Column::Condition => CellValue::Integer(self.condition.into()),
            Column::Odometer => CellValue::Integer(self.odometer.into()),
            Column::Color => CellValue::Category(&self.color),
            Column::Interior => CellValue::Category(&self.interior),
            Column::Seller => CellValue::Category(&self.seller),
            Column::Mmr => CellValue::Number(self.mmr),
            Column::SaleYear => CellValue::Integer(self.sale_year.into()),
            Column::SaleMonth => CellValue::Integer(self.sale_month.into()),
            Column::SaleDay => CellValue::Integer(self.sale_day.into()),
            Column::SaleWeekday => CellValue::Integer(self.sale_weekday.into()),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (Column, CellValue<'_>)> + '_ {
        Column::ALL.into_iter().map(move |c| (c, self.value(c)))
    }
}

/// A predicted price in the model's target currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceEstimate(pub f64);

impl PriceEstimate {
    pub fn value(self) -> f64 {
        self.0
    }
}

/// `42000.0` -> `42,000.00`
impl fmt::Display for PriceEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_thousands(self.0))
    }
}

pub fn format_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if value < 0.0 {
        out.push('-');
    }
    let n = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (n - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.push('.');
    out.push_str(frac);
    out
}

// ---------- JSON API ----------

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub price: f64,
    pub display: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub trees: usize,
    pub features: Vec<String>,
    pub objective: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(42000.0), "42,000.00");
        assert_eq!(format_thousands(0.0), "0.00");
        assert_eq!(format_thousands(999.994), "999.99");
        assert_eq!(format_thousands(999.995_1), "1,000.00");
        assert_eq!(format_thousands(1_234_567.891), "1,234,567.89");
        assert_eq!(format_thousands(-1500.5), "-1,500.50");
        assert_eq!(format_thousands(-0.001), "-0.00");
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(CarFormInput::default().validate(), Ok(()));
    }

    #[test]
    fn negative_mmr_rejected() {
        let input = CarFormInput {
            mmr: -1.0,
            ..CarFormInput::default()
        };
        assert!(matches!(
            input.validate(),
            Err(FormError::OutOfRange { field: "mmr", .. })
        ));
    }

    #[test]
    fn fuel_options() {
        assert_eq!(FuelType::from_option("CNG"), Some(FuelType::Cng));
        assert_eq!(FuelType::from_option("Hydrogen"), None);
        let json = serde_json::to_string(&FuelType::Lpg).unwrap();
        assert_eq!(json, "\"LPG\"");
    }
}
