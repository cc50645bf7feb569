//! Prompt construction for LLM requests.
//!
//! Two prompts: NL→SQL translation with the database schema and few-shot
//! examples, and a short natural-language summary of executed results.

use crate::db::{QueryResult, Schema};
use crate::llm::types::Message;

/// Rules for the NL→SQL translator. `{max_rows}` is replaced at build time.
const SQL_SYSTEM_RULES: &str = "Eres un traductor NL→SQL para una base SQLite de reservas de hotel. \
Devuelves SOLO SQL válido.
Requisitos:
- Solo SELECT. Prohibido DDL/DML.
- Una sola sentencia, sin comentarios.
- Respeta tablas/columnas del ESQUEMA.
- Agrega LIMIT {max_rows}.";

/// Worked examples shown to the model before the question.
pub const FEW_SHOTS: &str = r#"-- Usuario: "Cuántas reservas se confirmaron este mes?"
SELECT COUNT(*) AS total_reservas_confirmadas
FROM RESERVA
WHERE estado = 'confirmada'
  AND strftime('%Y-%m', fecha_checkin) = strftime('%Y-%m', 'now')
LIMIT 1;

-- Usuario: "Listado de habitaciones dobles con frigobar disponibles esta semana"
SELECT h.numero, h.piso, h.precio
FROM HABITACION h
LEFT JOIN RESERVA_HABITACION rh ON rh.habitacion_id = h.id
LEFT JOIN RESERVA r ON r.id = rh.reserva_id
WHERE h.tipo = 'doble'
  AND h.frigobar = 1
  AND (r.id IS NULL OR r.estado NOT IN ('confirmada','en_uso'))
LIMIT 50;"#;

/// Marker preceding the user's question in the SQL prompt.
pub const QUESTION_MARKER: &str = "PREGUNTA:";

/// Marker preceding the question in the summary prompt.
pub const SUMMARY_QUESTION_MARKER: &str = "Pregunta original:";

/// Builds the rules message with the row cap filled in.
pub fn build_sql_rules(max_rows: u32) -> String {
    SQL_SYSTEM_RULES.replace("{max_rows}", &max_rows.to_string())
}

/// Builds the NL→SQL request: rules, then schema, examples and question.
pub fn build_sql_messages(schema: &Schema, question: &str, max_rows: u32) -> Vec<Message> {
    let body = format!(
        "ESQUEMA:\n{}\n\nEJEMPLOS:\n{}\n\n{}\n{}\n\nSQL:",
        schema.format_for_llm(),
        FEW_SHOTS,
        QUESTION_MARKER,
        question.trim()
    );

    vec![Message::system(build_sql_rules(max_rows)), Message::user(body)]
}

/// Builds the summary request for an executed query.
///
/// At most `max_rows_in_prompt` rows are shown to the model.
pub fn build_summary_messages(
    question: &str,
    sql: &str,
    result: &QueryResult,
    language: &str,
    max_rows_in_prompt: usize,
) -> Vec<Message> {
    let system = format!(
        "Eres un analista de datos de hotel. Analiza los resultados y proporciona un \
         resumen descriptivo. Responde de forma clara y concisa en idioma '{language}'."
    );

    let body = if result.is_empty() {
        format!(
            "{SUMMARY_QUESTION_MARKER} {}\nSQL ejecutado: {sql}\n\
             La consulta no devolvió filas. Explica brevemente esto al usuario.",
            question.trim()
        )
    } else {
        let total = result.total_rows.unwrap_or(result.row_count);
        format!(
            "{SUMMARY_QUESTION_MARKER} {}\nSQL utilizado: {sql}\n\
             Filas devueltas: {total}\n\
             Muestra de resultados:\n{}\n\n\
             Proporciona un resumen descriptivo de los resultados en 2-3 oraciones, \
             destacando información relevante como tipos, precios y características. \
             Si hay conteos o agregaciones, menciona los valores clave.",
            question.trim(),
            format_rows_for_prompt(result, max_rows_in_prompt)
        )
    };

    vec![Message::system(system), Message::user(body)]
}

/// Renders up to `max_rows` rows as a markdown table with real column names.
pub fn format_rows_for_prompt(result: &QueryResult, max_rows: usize) -> String {
    if result.rows.is_empty() {
        return "(sin filas)".to_string();
    }

    let headers = result.column_names();
    let mut out = vec![
        format!("| {} |", headers.join(" | ")),
        format!("| {} |", vec!["---"; headers.len()].join(" | ")),
    ];
    for row in result.rows.iter().take(max_rows) {
        let cells: Vec<String> = row.iter().map(|v| v.to_display_string()).collect();
        out.push(format!("| {} |", cells.join(" | ")));
    }
    if result.rows.len() > max_rows {
        out.push(format!(
            "(Mostrando {} de {} filas)",
            max_rows,
            result.rows.len()
        ));
    }
    out.join("\n")
}
