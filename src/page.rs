//! Server-rendered form page.

use std::fmt::Write;

use crate::session::{FormFields, Rendered, Severity};
use crate::types::{limits, FuelType, Transmission};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; }
.cols { display: flex; gap: 2rem; }
.cols > div { flex: 1; }
label { display: block; margin-top: .8rem; font-size: .9rem; }
input, select { width: 100%; padding: .35rem; box-sizing: border-box; }
button { margin-top: 1.2rem; padding: .6rem 1.2rem; font-size: 1rem; }
.result { margin-top: 1.2rem; padding: .8rem 1rem; border-radius: .4rem; }
.success { background: #e6f4ea; color: #1e4620; }
.error { background: #fdecea; color: #611a15; }
footer { margin-top: 2rem; color: #777; font-size: .85rem; }
"#;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn val(v: &Option<String>) -> String {
    escape(v.as_deref().unwrap_or(""))
}

fn number_input(html: &mut String, name: &str, label: &str, min: i64, max: Option<i64>, value: &Option<String>) {
    let max_attr = max.map(|m| format!(" max=\"{}\"", m)).unwrap_or_default();
    let _ = write!(
        html,
        "<label for=\"{name}\">{label}</label><input type=\"number\" id=\"{name}\" name=\"{name}\" min=\"{min}\"{max_attr} step=\"1\" value=\"{}\" required>",
        val(value)
    );
}

fn text_input(html: &mut String, name: &str, label: &str, value: &Option<String>) {
    let _ = write!(
        html,
        "<label for=\"{name}\">{label}</label><input type=\"text\" id=\"{name}\" name=\"{name}\" value=\"{}\" required>",
        val(value)
    );
}

fn slider(html: &mut String, name: &str, label: &str, (min, max): (u8, u8), value: &Option<String>) {
    let _ = write!(
        html,
        "<label for=\"{name}\">{label}: <output id=\"{name}_out\">{v}</output></label><input type=\"range\" id=\"{name}\" name=\"{name}\" min=\"{min}\" max=\"{max}\" value=\"{v}\" oninput=\"{name}_out.value=this.value\">",
        v = val(value)
    );
}

fn select(html: &mut String, name: &str, label: &str, options: &[(String, String)], selected: &Option<String>) {
    let _ = write!(html, "<label for=\"{name}\">{label}</label><select id=\"{name}\" name=\"{name}\">");
    for (value, text) in options {
        let sel = if selected.as_deref() == Some(value.as_str()) { " selected" } else { "" };
        let _ = write!(html, "<option value=\"{}\"{sel}>{}</option>", escape(value), escape(text));
    }
    html.push_str("</select>");
}

/// The whole page: form pre-filled from `fields`, plus the result area.
pub fn render_page(fields: &FormFields, result: Option<&Rendered>) -> String {
    let fuels: Vec<(String, String)> = FuelType::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), f.as_str().to_string()))
        .collect();
    let transmissions: Vec<(String, String)> = Transmission::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), t.as_str().to_string()))
        .collect();
    let weekdays: Vec<(String, String)> = (limits::SALE_WEEKDAY.0..=limits::SALE_WEEKDAY.1)
        .map(|d| (d.to_string(), d.to_string()))
        .collect();

    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>Car Price Prediction App</title><style>{STYLE}</style></head><body>"
    );
    html.push_str("<h1>🚗 Car Price Prediction App</h1>");
    html.push_str("<p>This app predicts used car prices using a trained XGBoost model.</p>");
    html.push_str("<h2>🧾 Enter Car Details</h2>");
    html.push_str("<form method=\"post\" action=\"/predict\"><div class=\"cols\"><div>");

    number_input(&mut html, "year", "Manufacture Year", limits::YEAR.0.into(), Some(limits::YEAR.1.into()), &fields.year);
    text_input(&mut html, "make", "Make (e.g., Toyota, Ford, BMW)", &fields.make);
    text_input(&mut html, "model", "Model Name", &fields.model);
    text_input(&mut html, "trim", "Trim (e.g., LX, EX, SE)", &fields.trim);
    number_input(&mut html, "condition", "Condition (1–5)", limits::CONDITION.0.into(), Some(limits::CONDITION.1.into()), &fields.condition);
    number_input(&mut html, "cylinders", "Cylinders", limits::CYLINDERS.0.into(), Some(limits::CYLINDERS.1.into()), &fields.cylinders);
    text_input(&mut html, "body", "Body Type (e.g., Sedan, SUV)", &fields.body);

    html.push_str("</div><div>");

    select(&mut html, "fuel", "Fuel Type", &fuels, &fields.fuel);
    select(&mut html, "transmission", "Transmission", &transmissions, &fields.transmission);
    number_input(&mut html, "odometer", "Odometer (in km)", limits::ODOMETER.0.into(), Some(limits::ODOMETER.1.into()), &fields.odometer);
    text_input(&mut html, "color", "Car Color", &fields.color);
    text_input(&mut html, "interior", "Interior Color", &fields.interior);
    text_input(&mut html, "seller", "Seller Type (Dealer/Private)", &fields.seller);
    number_input(&mut html, "mmr", "MMR Value", 0, None, &fields.mmr);

    html.push_str("</div></div>");

    number_input(&mut html, "sale_year", "Sale Year", limits::SALE_YEAR.0.into(), Some(limits::SALE_YEAR.1.into()), &fields.sale_year);
    slider(&mut html, "sale_month", "Sale Month", limits::SALE_MONTH, &fields.sale_month);
    slider(&mut html, "sale_day", "Sale Day", limits::SALE_DAY, &fields.sale_day);
    select(&mut html, "sale_weekday", "Sale Weekday (0=Mon, 6=Sun)", &weekdays, &fields.sale_weekday);

    html.push_str("<button type=\"submit\">Predict Car Price 💰</button></form>");

    if let Some(r) = result {
        let class = match r.severity {
            Severity::Success => "success",
            Severity::Error => "error",
        };
        let _ = write!(html, "<div class=\"result {class}\" role=\"status\">{}</div>", escape(&r.message));
    }

    html.push_str("<hr><footer>Built with ❤️ using Rust, axum and XGBoost</footer></body></html>");
    html
}
