//! Chart specifications for the presentation layer.
//!
//! Each function maps a derived view to a JSON object describing one chart.
//! Nothing is rendered here; NaN and undefined values become `null`.

use crate::error::{OptionsError, Result};
use crate::models::greeks::{Greeks, GreeksRow};
use crate::models::option::{CanonicalOptionRow, OptionType};
use crate::models::sentiment::{classify_sentiment, MonthlySentiment, Sentiment};
use crate::models::volatility::VolatilitySurfaceGrid;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const COLORSCALE_STOPS: usize = 11;

/// Greek selectable for the by-strike chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GreekKind {
    Delta,
    Gamma,
    Theta,
    Vega,
    Rho,
}

impl GreekKind {
    pub fn value(&self, greeks: &Greeks) -> f64 {
        match self {
            GreekKind::Delta => greeks.delta,
            GreekKind::Gamma => greeks.gamma,
            GreekKind::Theta => greeks.theta,
            GreekKind::Vega => greeks.vega,
            GreekKind::Rho => greeks.rho,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GreekKind::Delta => "Delta",
            GreekKind::Gamma => "Gamma",
            GreekKind::Theta => "Theta",
            GreekKind::Vega => "Vega",
            GreekKind::Rho => "Rho",
        }
    }
}

fn finite_or_null(v: f64) -> Value {
    if v.is_finite() {
        json!(v)
    } else {
        Value::Null
    }
}

fn viridis_scale() -> Vec<Value> {
    let gradient = colorous::VIRIDIS;
    (0..COLORSCALE_STOPS)
        .map(|i| {
            let t = i as f64 / (COLORSCALE_STOPS - 1) as f64;
            json!([t, format!("#{:x}", gradient.eval_continuous(t))])
        })
        .collect()
}

fn sentiment_color(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Bullish => "#2ca02c",
        Sentiment::Neutral => "#7f7f7f",
        Sentiment::Bearish => "#d62728",
    }
}

/// 3D surface of implied volatility over time to expiration and strike
pub fn surface_chart(grid: &VolatilitySurfaceGrid, title: &str) -> Value {
    let z: Vec<Vec<Value>> = grid
        .values
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|&v| finite_or_null(v)).collect())
        .collect();

    json!({
        "type": "surface",
        "title": title,
        "x": grid.x_axis,
        "y": grid.y_axis,
        "z": z,
        "x_title": "Time to expiration (years)",
        "y_title": grid.axis.label(),
        "z_title": "Implied volatility",
        "colorscale": viridis_scale(),
        "samples": grid.samples,
    })
}

/// Bars of the call/put ratio per expiration month, colored by sentiment
pub fn monthly_sentiment_chart(monthly: &MonthlySentiment) -> Value {
    let months: Vec<String> = monthly.iter().map(|m| m.month.to_string()).collect();
    let ratios: Vec<Value> = monthly
        .iter()
        .map(|m| m.ratio.value().map_or(Value::Null, finite_or_null))
        .collect();
    let colors: Vec<&str> = monthly
        .iter()
        .map(|m| sentiment_color(classify_sentiment(m.ratio)))
        .collect();
    let labels: Vec<String> = monthly
        .iter()
        .map(|m| classify_sentiment(m.ratio).to_string())
        .collect();

    json!({
        "type": "bar",
        "title": "Call/put volume ratio by expiration month",
        "x": months,
        "y": ratios,
        "marker_colors": colors,
        "text": labels,
        "x_title": "Expiration month",
        "y_title": "Call/put ratio",
    })
}

/// One line per option type of the selected Greek against strike.
///
/// Rows whose Greeks were rejected are left out of the lines.
pub fn greeks_chart(
    rows: &[CanonicalOptionRow],
    greeks: &[GreeksRow],
    greek: GreekKind,
) -> Result<Value> {
    if rows.len() != greeks.len() {
        return Err(OptionsError::DataUnavailable(format!(
            "{} Greeks rows for {} contracts",
            greeks.len(),
            rows.len()
        )));
    }

    let trace = |option_type: OptionType| {
        let (x, y): (Vec<f64>, Vec<Value>) = rows
            .iter()
            .zip(greeks)
            .filter(|(row, _)| row.option_type == option_type)
            .filter_map(|(row, g)| {
                g.outcome
                    .greeks()
                    .map(|values| (row.strike, finite_or_null(greek.value(values))))
            })
            .unzip();
        json!({
            "name": format!("{}s", option_type),
            "x": x,
            "y": y,
            "mode": "markers",
        })
    };

    Ok(json!({
        "type": "scatter",
        "title": format!("{} by strike", greek.label()),
        "traces": [trace(OptionType::Call), trace(OptionType::Put)],
        "x_title": "Strike",
        "y_title": greek.label(),
    }))
}
