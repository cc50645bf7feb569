//! Answer rendering for executed queries.
//!
//! Renders result rows as a markdown table and produces the short
//! natural-language summary shown under it. Summaries come from the LLM
//! when possible and from a deterministic column heuristic otherwise.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AnswerConfig;
use crate::db::{QueryResult, Value};
use crate::llm::{build_summary_messages, GenerationOptions, LlmClient};

/// Default number of rows rendered by [`to_markdown_table`].
pub const DEFAULT_MAX_PREVIEW: usize = 50;

/// Where a summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Llm,
    Fallback,
}

/// Natural-language summary of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

impl Answer {
    fn llm(text: String) -> Self {
        Self {
            text,
            source: AnswerSource::Llm,
        }
    }

    fn fallback(text: String) -> Self {
        Self {
            text,
            source: AnswerSource::Fallback,
        }
    }
}

/// Renders up to `max_preview` rows as a markdown table.
///
/// Rows beyond the preview are reported on a trailing italic line.
pub fn to_markdown_table(result: &QueryResult, max_preview: usize) -> String {
    if result.columns.is_empty() {
        return "_Sin resultados_".to_string();
    }

    let headers: Vec<String> = result.columns.iter().map(|c| escape_cell(&c.name)).collect();
    let mut lines = vec![
        format!("| {} |", headers.join(" | ")),
        format!("| {} |", vec!["---"; headers.len()].join(" | ")),
    ];

    for row in result.rows.iter().take(max_preview) {
        let cells: Vec<String> = row
            .iter()
            .map(|v| escape_cell(&v.to_display_string()))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    if result.rows.len() > max_preview {
        lines.push(format!(
            "_ {} filas más no mostradas_",
            result.rows.len() - max_preview
        ));
    }

    lines.join("\n")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Summarizes `result` for the user.
///
/// Uses the LLM when summaries are enabled. Any LLM failure degrades to
/// [`fallback_summary`]; this never fails.
pub async fn summarize(
    llm: &dyn LlmClient,
    question: &str,
    sql: &str,
    result: &QueryResult,
    config: &AnswerConfig,
) -> Answer {
    if !config.enabled {
        debug!("LLM summaries disabled, using fallback summary");
        return Answer::fallback(fallback_summary(result));
    }

    let messages = build_summary_messages(
        question,
        sql,
        result,
        &config.language,
        config.max_rows_in_prompt,
    );

    match llm.complete(&messages, GenerationOptions::summary()).await {
        Ok(text) if !text.trim().is_empty() => Answer::llm(text.trim().to_string()),
        Ok(_) => {
            warn!("LLM returned an empty summary, using fallback summary");
            Answer::fallback(fallback_summary(result))
        }
        Err(e) => {
            warn!(error = %e, "Summary generation failed, using fallback summary");
            Answer::fallback(fallback_summary(result))
        }
    }
}

const CATEGORY_COLUMNS: &[&str] = &[
    "tipo",
    "estado",
    "categoria",
    "clase",
    "nivel",
    "origen",
    "canal",
];
const AMOUNT_COLUMNS: &[&str] = &[
    "precio", "costo", "valor", "monto", "cantidad", "total", "suma",
];
const DATE_COLUMNS: &[&str] = &[
    "fecha",
    "fecha_inicio",
    "fecha_fin",
    "created_at",
    "updated_at",
];
const FLAG_COLUMNS: &[&str] = &[
    "activo",
    "disponible",
    "confirmado",
    "pagado",
    "frigobar",
    "jacuzzi",
    "balcon",
];
const ID_COLUMNS: &[&str] = &["id", "numero", "codigo"];

/// Describes a result without the LLM, from well-known column names.
///
/// Category columns get value counts, amount columns a price range, date
/// columns the number of distinct dates, flag columns how many are set and
/// identifier columns their numeric range.
pub fn fallback_summary(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return "No se encontraron resultados que cumplan con los criterios especificados."
            .to_string();
    }

    let mut insights = Vec::new();

    for (idx, column) in result.columns.iter().enumerate() {
        let name = column.name.to_lowercase();
        let values: Vec<&Value> = result.column_values(idx).collect();

        let insight = if CATEGORY_COLUMNS.contains(&name.as_str()) {
            category_insight(&values)
        } else if AMOUNT_COLUMNS.contains(&name.as_str()) {
            amount_insight(&values)
        } else if DATE_COLUMNS.contains(&name.as_str()) {
            date_insight(&values)
        } else if FLAG_COLUMNS.contains(&name.as_str()) {
            flag_insight(&values)
        } else {
            None
        };

        if let Some(detail) = insight {
            insights.push(format!("{}: {}", column.name, detail));
        }
    }

    for (idx, column) in result.columns.iter().enumerate() {
        if !ID_COLUMNS.contains(&column.name.to_lowercase().as_str()) {
            continue;
        }
        if let Some(detail) = id_range_insight(&result.column_values(idx).collect::<Vec<_>>()) {
            insights.push(format!("{}: {}", column.name, detail));
        }
    }

    let mut text = match result.rows.len() {
        1 => "Se encontró 1 resultado".to_string(),
        n => format!("Se encontraron {n} resultados"),
    };
    if !insights.is_empty() {
        text.push_str(" con ");
        text.push_str(&insights.join(", "));
    }
    text.push('.');
    text
}

/// "2 doble, 1 suite", in first-seen order; a single distinct value is shown alone.
fn category_insight(values: &[&Value]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        let key = value.to_display_string();
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, count)) => *count += 1,
            None => counts.push((key, 1)),
        }
    }

    match counts.len() {
        0 => None,
        1 => counts.into_iter().next().map(|(value, _)| value),
        _ => Some(
            counts
                .iter()
                .map(|(value, count)| format!("{count} {value}"))
                .collect::<Vec<_>>()
                .join(", "),
        ),
    }
}

fn amount_insight(values: &[&Value]) -> Option<String> {
    let numbers: Vec<f64> = values
        .iter()
        .filter_map(|v| v.as_f64())
        .filter(|n| n.is_finite())
        .collect();

    let min = numbers.iter().copied().reduce(f64::min)?;
    let max = numbers.iter().copied().reduce(f64::max)?;

    if min == max {
        Some(format_currency(min))
    } else {
        Some(format!("{} - {}", format_currency(min), format_currency(max)))
    }
}

fn date_insight(values: &[&Value]) -> Option<String> {
    let mut dates: Vec<String> = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| v.to_display_string())
        .collect();
    dates.sort();
    dates.dedup();

    match dates.len() {
        0 => None,
        1 => dates.pop(),
        n => Some(format!("{n} fechas diferentes")),
    }
}

fn flag_insight(values: &[&Value]) -> Option<String> {
    let set = values.iter().filter(|v| is_truthy(v)).count();
    (set > 0).then(|| format!("{set} activos"))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Integer(i) => *i == 1,
        Value::Real(r) => *r == 1.0,
        Value::Text(s) => matches!(s.as_str(), "1" | "true" | "activo" | "disponible"),
        Value::Null | Value::Blob(_) => false,
    }
}

/// "101-302" over the all-digit values; nothing when they are all equal.
fn id_range_insight(values: &[&Value]) -> Option<String> {
    let ids: Vec<u64> = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| v.to_display_string())
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|s| s.parse().ok())
        .collect();

    let min = ids.iter().min()?;
    let max = ids.iter().max()?;
    (min != max).then(|| format!("{min}-{max}"))
}

/// Whole-unit currency with thousands separators: `$1,234,568`.
fn format_currency(amount: f64) -> String {
    let rounded = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, digit) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if amount < 0.0 && rounded != "0" {
        format!("$-{grouped}")
    } else {
        format!("${grouped}")
    }
}
