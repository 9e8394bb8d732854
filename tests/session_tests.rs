/// Form session tests against stub prediction services
///
/// Run with: cargo test --test session_tests -- --nocapture

use std::sync::{Arc, Mutex};

use car_price_predictor::session::{SessionPhase, Severity};
use car_price_predictor::{
    build_record, collect_input, predict, render, CarFormInput, CarInputRecord, Category,
    CellValue, Column, ColumnKind, FormError, FormFields, Outcome, PredictionError,
    PredictionService, PredictorSession,
};

struct FixedPrice(Vec<f64>);

impl PredictionService for FixedPrice {
    fn predict(&self, _records: &[CarInputRecord]) -> Result<Vec<f64>, PredictionError> {
        Ok(self.0.clone())
    }
}

struct Failing(&'static str);

impl PredictionService for Failing {
    fn predict(&self, _records: &[CarInputRecord]) -> Result<Vec<f64>, PredictionError> {
        Err(PredictionError::new(self.0))
    }
}

/// Remembers what it was asked.
#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<Vec<CarInputRecord>>>,
}

impl PredictionService for Recording {
    fn predict(&self, records: &[CarInputRecord]) -> Result<Vec<f64>, PredictionError> {
        self.calls.lock().unwrap().push(records.to_vec());
        Ok(vec![1.0; records.len()])
    }
}

fn default_fields() -> FormFields {
    FormFields::from(&CarFormInput::default())
}

#[test]
fn test_record_has_every_column_with_its_kind() {
    println!("\n=== Test: Record Columns ===");
    let record = build_record(&CarFormInput::default());

    let cells: Vec<_> = record.cells().collect();
    assert_eq!(cells.len(), 17);
    for (col, cell) in &cells {
        assert_eq!(cell.kind(), col.kind(), "column {} has the wrong type", col);
    }

    let categorical: Vec<Column> = cells
        .iter()
        .filter(|(_, cell)| cell.kind() == ColumnKind::Category)
        .map(|(col, _)| *col)
        .collect();
    assert_eq!(categorical.len(), 9);
    for col in [
        Column::Make,
        Column::Model,
        Column::Transmission,
        Column::Trim,
        Column::Body,
        Column::State,
        Column::Color,
        Column::Interior,
        Column::Seller,
    ] {
        assert!(categorical.contains(&col), "{} should be categorical", col);
    }
    println!("✓ 17 columns, 9 categorical");
}

#[test]
fn test_record_values_come_from_input() {
    let input = CarFormInput {
        make: "  BMW ".into(),
        mmr: 12_345.5,
        ..CarFormInput::default()
    };
    let record = build_record(&input);

    assert_eq!(record.value(Column::Make), CellValue::Category(&Category::label("BMW")));
    assert_eq!(record.value(Column::Transmission), CellValue::Category(&Category::label("Manual")));
    assert_eq!(record.value(Column::Year), CellValue::Integer(2015));
    assert_eq!(record.value(Column::Mmr), CellValue::Number(12_345.5));
    assert_eq!(record.value(Column::SaleWeekday), CellValue::Integer(0));
}

#[test]
fn test_state_is_always_missing() {
    println!("\n=== Test: State Always Missing ===");
    let inputs = [
        CarFormInput::default(),
        CarFormInput {
            make: "Ford".into(),
            seller: "Private".into(),
            year: 1990,
            ..CarFormInput::default()
        },
        CarFormInput {
            sale_year: 2000,
            sale_weekday: 6,
            odometer: 500_000,
            ..CarFormInput::default()
        },
    ];
    for input in &inputs {
        let record = build_record(input);
        assert!(record.state.is_missing());
        assert_eq!(record.value(Column::State), CellValue::Category(&Category::Missing));
    }
    println!("✓ state missing for {} inputs", inputs.len());
}

#[test]
fn test_collect_and_build_are_idempotent() {
    let fields = default_fields();
    let a = build_record(&collect_input(&fields).unwrap());
    let b = build_record(&collect_input(&fields).unwrap());
    assert_eq!(a, b);
}

#[test]
fn test_boundary_values_accepted() {
    println!("\n=== Test: Boundary Values ===");
    let cases: [(&str, &str); 6] = [
        ("year", "1990"),
        ("year", "2025"),
        ("condition", "1"),
        ("condition", "5"),
        ("sale_weekday", "0"),
        ("sale_weekday", "6"),
    ];
    for (field, value) in cases {
        let mut fields = default_fields();
        let v = Some(value.to_string());
        match field {
            "year" => fields.year = v,
            "condition" => fields.condition = v,
            _ => fields.sale_weekday = v,
        }
        let input = collect_input(&fields);
        assert!(input.is_ok(), "{}={} rejected: {:?}", field, value, input);
        println!("✓ {}={} accepted", field, value);
    }
}

#[test]
fn test_out_of_range_rejected() {
    let mut fields = default_fields();
    fields.year = Some("1989".into());
    assert_eq!(
        collect_input(&fields),
        Err(FormError::OutOfRange {
            field: "year",
            min: "1990".into(),
            max: "2025".into(),
            value: "1989".into(),
        })
    );

    let mut fields = default_fields();
    fields.sale_weekday = Some("7".into());
    assert!(matches!(
        collect_input(&fields),
        Err(FormError::OutOfRange { field: "sale_weekday", .. })
    ));

    let mut fields = default_fields();
    fields.odometer = Some("lots".into());
    assert!(matches!(
        collect_input(&fields),
        Err(FormError::NotANumber { field: "odometer", .. })
    ));
}

#[test]
fn test_free_text_and_choices() {
    let mut fields = default_fields();
    fields.make = Some("   ".into());
    assert_eq!(collect_input(&fields), Err(FormError::Empty { field: "make" }));

    let mut fields = default_fields();
    fields.fuel = Some("Hydrogen".into());
    assert!(matches!(
        collect_input(&fields),
        Err(FormError::UnknownOption { field: "fuel", .. })
    ));

    let mut fields = default_fields();
    fields.seller = None;
    assert_eq!(collect_input(&fields), Err(FormError::Missing { field: "seller" }));

    // never seen in training, still a valid widget value
    let mut fields = default_fields();
    fields.model = Some("Model T".into());
    assert_eq!(collect_input(&fields).unwrap().model, "Model T");
}

#[test]
fn test_fixed_price_renders_currency() {
    println!("\n=== Test: Fixed Price Stub ===");
    let service = FixedPrice(vec![42000.0]);
    let record = build_record(&CarFormInput::default());

    let price = predict(&record, &service).unwrap();
    assert_eq!(price.value(), 42000.0);

    let rendered = render(&Outcome::Estimate(price));
    assert_eq!(rendered.message, "💰 Estimated Car Price: ₹ 42,000.00");
    assert_eq!(rendered.severity, Severity::Success);
    println!("✓ {}", rendered.message);
}

#[test]
fn test_failure_is_displayed_and_session_survives() {
    println!("\n=== Test: Failing Stub ===");
    let mut session = PredictorSession::new(Arc::new(Failing("bad category")));

    let outcome = session.submit(&default_fields());
    let rendered = render(&outcome);
    assert_eq!(rendered.severity, Severity::Error);
    assert!(rendered.message.contains("bad category"));
    assert_eq!(session.phase(), SessionPhase::Idle);

    // same session, next attempt
    let again = render(&session.submit(&default_fields()));
    assert_eq!(again, rendered);
    println!("✓ {}", rendered.message);
}

#[test]
fn test_empty_result_is_a_prediction_error() {
    let record = build_record(&CarFormInput::default());
    let err = predict(&record, &FixedPrice(vec![])).unwrap_err();
    assert!(err.message().contains("no values"));
}

#[test]
fn test_first_value_wins() {
    let record = build_record(&CarFormInput::default());
    let price = predict(&record, &FixedPrice(vec![1.5, 99.0])).unwrap();
    assert_eq!(price.value(), 1.5);
}

#[test]
fn test_service_sees_exactly_one_record() {
    let service = Arc::new(Recording::default());
    let mut session = PredictorSession::new(service.clone());

    let outcome = session.submit(&default_fields());
    assert!(matches!(outcome, Outcome::Estimate(_)));

    let calls = service.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 1);
    assert_eq!(calls[0][0], build_record(&CarFormInput::default()));
}

#[test]
fn test_invalid_input_never_reaches_service() {
    let service = Arc::new(Recording::default());
    let mut session = PredictorSession::new(service.clone());

    let mut fields = default_fields();
    fields.condition = Some("9".into());
    let outcome = session.submit(&fields);

    assert!(matches!(outcome, Outcome::InvalidInput(_)));
    assert!(render(&outcome).message.starts_with("⚠️ Invalid input:"));
    assert!(service.calls.lock().unwrap().is_empty());
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn test_typed_submission() {
    let mut session = PredictorSession::new(Arc::new(FixedPrice(vec![1_234_567.891])));
    let outcome = session.submit_input(&CarFormInput::default());
    assert_eq!(render(&outcome).message, "💰 Estimated Car Price: ₹ 1,234,567.89");

    let bad = CarFormInput {
        cylinders: 13,
        ..CarFormInput::default()
    };
    assert!(matches!(session.submit_input(&bad), Outcome::InvalidInput(_)));
}
