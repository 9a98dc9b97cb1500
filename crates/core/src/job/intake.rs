//! Inbound message decoding and validation.
//!
//! Malformed input is rejected with an explicit error so the transport
//! layer can dead-letter it; nothing is silently dropped.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use super::types::{EntityTask, Job, JobStatus, OperationMode};
use super::wire::{InboundEntity, InboundJobMessage, MessageHeaders};
use super::Period;

/// Error type for intake validation failures.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Malformed job message: {0}")]
    Malformed(String),

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("Job has no entities")]
    EmptyEntityList,

    #[error("Missing transport header: {0}")]
    MissingHeader(&'static str),
}

/// Decode and validate an inbound job message into a ready-to-run [`Job`].
///
/// Entity expansion happens here: an entity with operation mode "todos"
/// (or no mode at all) becomes two tasks, one entry and one exit.
pub fn decode_job(
    body: &[u8],
    headers: &MessageHeaders,
    period_days: i64,
) -> Result<Job, IntakeError> {
    let message: InboundJobMessage =
        serde_json::from_slice(body).map_err(|e| IntakeError::Malformed(e.to_string()))?;

    if headers.token.is_empty() {
        return Err(IntakeError::MissingHeader("token"));
    }
    if headers.identificador.is_empty() {
        return Err(IntakeError::MissingHeader("identificador"));
    }

    if message.empresas.is_empty() {
        return Err(IntakeError::EmptyEntityList);
    }

    let start = parse_date(&message.data_inicial)?;
    let end = parse_date(&message.data_final)?;
    if start > end {
        return Err(IntakeError::InvertedRange { start, end });
    }

    let tasks = expand_entities(&message.empresas);
    let periods = Period::split(start, end, period_days);

    Ok(Job {
        id: message.id,
        company_id: headers.identificador.clone(),
        token: headers.token.clone(),
        credentials: message.contador,
        start,
        end,
        periods,
        tasks,
        status: JobStatus::Processing,
        created_at: Utc::now(),
    })
}

/// Only the first 10 characters are significant; the upstream sometimes
/// sends full timestamps.
fn parse_date(raw: &str) -> Result<NaiveDate, IntakeError> {
    let significant = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(significant, "%Y-%m-%d").map_err(|e| IntakeError::InvalidDate {
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn expand_entities(empresas: &[InboundEntity]) -> Vec<EntityTask> {
    let mut tasks = Vec::with_capacity(empresas.len());
    for empresa in empresas {
        let oper = empresa.oper.as_deref().unwrap_or("todos").trim();
        match oper {
            "1" => tasks.push(EntityTask::new(&empresa.ie, OperationMode::Entry)),
            "0" => tasks.push(EntityTask::new(&empresa.ie, OperationMode::Exit)),
            _ if oper.eq_ignore_ascii_case("todos") => {
                tasks.push(EntityTask::new(&empresa.ie, OperationMode::Entry));
                tasks.push(EntityTask::new(&empresa.ie, OperationMode::Exit));
            }
            // Unknown mode: treat like "todos" rather than dropping the entity.
            _ => {
                tasks.push(EntityTask::new(&empresa.ie, OperationMode::Entry));
                tasks.push(EntityTask::new(&empresa.ie, OperationMode::Exit));
            }
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> MessageHeaders {
        MessageHeaders {
            identificador: "4321".to_string(),
            token: "tok-1".to_string(),
        }
    }

    fn body(empresas: &str) -> Vec<u8> {
        format!(
            r#"{{
                "id": "job-1",
                "empresas": {empresas},
                "dataInicial": "2024-01-01T00:00:00",
                "dataFinal": "2024-02-15",
                "contador": {{"cpf": "12345678900", "senha": "secret"}}
            }}"#
        )
        .into_bytes()
    }

    #[test]
    fn test_decode_valid_job() {
        let job = decode_job(&body(r#"[{"ie": "101", "oper": "1"}]"#), &headers(), 30).unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.company_id, "4321");
        assert_eq!(job.token, "tok-1");
        assert_eq!(job.tasks.len(), 1);
        assert_eq!(job.tasks[0].mode, OperationMode::Entry);
        assert_eq!(job.periods.len(), 2);
        assert_eq!(job.period_key(), "01012024_15022024");
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn test_decode_truncates_timestamp_to_date() {
        let job = decode_job(&body(r#"[{"ie": "101", "oper": "0"}]"#), &headers(), 30).unwrap();
        assert_eq!(job.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_todos_expands_to_two_tasks() {
        let job = decode_job(&body(r#"[{"ie": "101", "oper": "Todos"}]"#), &headers(), 30).unwrap();
        assert_eq!(job.tasks.len(), 2);
        assert_eq!(job.tasks[0].mode, OperationMode::Entry);
        assert_eq!(job.tasks[1].mode, OperationMode::Exit);
        assert_eq!(job.tasks[0].ie, "101");
        assert_eq!(job.tasks[1].ie, "101");
    }

    #[test]
    fn test_missing_oper_expands_to_two_tasks() {
        let job = decode_job(&body(r#"[{"ie": "101"}]"#), &headers(), 30).unwrap();
        assert_eq!(job.tasks.len(), 2);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let result = decode_job(b"{not json", &headers(), 30);
        assert!(matches!(result, Err(IntakeError::Malformed(_))));
    }

    #[test]
    fn test_empty_entity_list_is_rejected() {
        let result = decode_job(&body("[]"), &headers(), 30);
        assert!(matches!(result, Err(IntakeError::EmptyEntityList)));
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let mut h = headers();
        h.token.clear();
        let result = decode_job(&body(r#"[{"ie": "101"}]"#), &h, 30);
        assert!(matches!(result, Err(IntakeError::MissingHeader("token"))));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let body = br#"{
            "id": "job-1",
            "empresas": [{"ie": "101", "oper": "1"}],
            "dataInicial": "2024-03-01",
            "dataFinal": "2024-01-01",
            "contador": {"cpf": "1", "senha": "2"}
        }"#;
        let result = decode_job(body, &headers(), 30);
        assert!(matches!(result, Err(IntakeError::InvertedRange { .. })));
    }

    #[test]
    fn test_garbage_date_is_rejected() {
        let body = br#"{
            "id": "job-1",
            "empresas": [{"ie": "101", "oper": "1"}],
            "dataInicial": "not-a-date",
            "dataFinal": "2024-01-01",
            "contador": {"cpf": "1", "senha": "2"}
        }"#;
        let result = decode_job(body, &headers(), 30);
        assert!(matches!(result, Err(IntakeError::InvalidDate { .. })));
    }
}
