//! Column schema of the model row and the category tables behind it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The seventeen columns of a [`CarInputRecord`](crate::types::CarInputRecord),
/// in the order the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Year,
    Make,
    Model,
    Trim,
    Body,
    Transmission,
    State,
    Condition,
    Odometer,
    Color,
    Interior,
    Seller,
    Mmr,
    SaleYear,
    SaleMonth,
    SaleDay,
    SaleWeekday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Number,
    /// Nominal category: unordered labels, encoded through a [`CategoryTable`].
    Category,
}

impl Column {
    pub const ALL: [Column; 17] = [
        Column::Year,
        Column::Make,
        Column::Model,
        Column::Trim,
        Column::Body,
        Column::Transmission,
        Column::State,
        Column::Condition,
        Column::Odometer,
        Column::Color,
        Column::Interior,
        Column::Seller,
        Column::Mmr,
        Column::SaleYear,
        Column::SaleMonth,
        Column::SaleDay,
        Column::SaleWeekday,
    ];

    pub const CATEGORICAL: [Column; 9] = [
        Column::Make,
        Column::Model,
        Column::Transmission,
        Column::Trim,
        Column::Body,
        Column::State,
        Column::Color,
        Column::Interior,
        Column::Seller,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Year => "year",
            Column::Make => "make",
            Column::Model => "model",
            Column::Trim => "trim",
            Column::Body => "body",
            Column::Transmission => "transmission",
            Column::State => "state",
            Column::Condition => "condition",
            Column::Odometer => "odometer",
            Column::Color => "color",
            Column::Interior => "interior",
            Column::Seller => "seller",
            Column::Mmr => "mmr",
            Column::SaleYear => "sale_year",
            Column::SaleMonth => "sale_month",
            Column::SaleDay => "sale_day",
            Column::SaleWeekday => "sale_weekday",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::Make
            | Column::Model
            | Column::Trim
            | Column::Body
            | Column::Transmission
            | Column::State
            | Column::Color
            | Column::Interior
            | Column::Seller => ColumnKind::Category,
            Column::Mmr => ColumnKind::Number,
            _ => ColumnKind::Integer,
        }
    }

    pub fn is_categorical(self) -> bool {
        self.kind() == ColumnKind::Category
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value of nominal category type. Never compared as raw text by the model:
/// it only reaches the trees through its [`CategoryTable`] code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Label(String),
    Missing,
}

impl Category {
    pub fn label(s: impl Into<String>) -> Self {
        Category::Label(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Category::Missing)
    }
}

/// One cell of a record, typed by its column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    Integer(i64),
    Number(f64),
    Category(&'a Category),
}

impl CellValue<'_> {
    pub fn kind(&self) -> ColumnKind {
        match self {
            CellValue::Integer(_) => ColumnKind::Integer,
            CellValue::Number(_) => ColumnKind::Number,
            CellValue::Category(_) => ColumnKind::Category,
        }
    }
}

/// Label -> code mapping for one categorical column. The code of a label is its
/// position in the table the model was fit with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTable {
    labels: Vec<String>,
    codes: HashMap<String, u32>,
}

impl CategoryTable {
    pub fn new(labels: Vec<String>) -> Result<Self, String> {
        let mut codes = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if codes.insert(label.clone(), i as u32).is_some() {
                return Err(format!("duplicate category label '{}'", label));
            }
        }
        Ok(Self { labels, codes })
    }

    pub fn code(&self, label: &str) -> Option<u32> {
        self.codes.get(label).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// What to do with a label that is not in the column's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnseenCategoryPolicy {
    /// Encode as missing; the trees route it by their default direction.
    #[default]
    Missing,
    /// Fail the prediction.
    Reject,
}

impl FromStr for UnseenCategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "missing" => Ok(Self::Missing),
            "reject" => Ok(Self::Reject),
            other => Err(format!("expected 'missing' or 'reject', got '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_categorical_columns() {
        let cats: Vec<_> = Column::ALL
            .into_iter()
            .filter(|c| c.is_categorical())
            .collect();
        assert_eq!(cats.len(), 9);
        for c in Column::CATEGORICAL {
            assert!(cats.contains(&c));
        }
    }

    #[test]
    fn names_round_trip() {
        for c in Column::ALL {
            assert_eq!(Column::from_name(c.name()), Some(c));
        }
        assert_eq!(Column::from_name("cylinders"), None);
        assert_eq!(Column::from_name("fuel"), None);
    }

    #[test]
    fn table_codes_follow_position() {
        let t = CategoryTable::new(vec!["BMW".into(), "Ford".into(), "Toyota".into()]).unwrap();
        assert_eq!(t.code("BMW"), Some(0));
        assert_eq!(t.code("Toyota"), Some(2));
        assert_eq!(t.code("toyota"), None);
    }

    #[test]
    fn table_rejects_duplicates() {
        assert!(CategoryTable::new(vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn policy_parses() {
        assert_eq!("Reject".parse(), Ok(UnseenCategoryPolicy::Reject));
        assert_eq!(" missing ".parse(), Ok(UnseenCategoryPolicy::Missing));
        assert!("drop".parse::<UnseenCategoryPolicy>().is_err());
    }
}
