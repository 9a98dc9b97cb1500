//! Queue message contract.
//!
//! Field names follow the upstream queue contract (Portuguese, camelCase),
//! so the wire types carry serde renames rather than leaking those names
//! into the rest of the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound job request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundJobMessage {
    pub id: String,
    pub empresas: Vec<InboundEntity>,
    pub data_inicial: String,
    pub data_final: String,
    pub contador: Credentials,
}

/// One requested tax-registration entity with its operation mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundEntity {
    pub ie: String,
    /// "1" = entry, "0" = exit, "todos" = both. Missing means both.
    #[serde(default)]
    pub oper: Option<String>,
}

/// Accountant credentials. Treated as an opaque pair; never logged.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub cpf: String,
    pub senha: String,
}

/// Transport headers correlating the job with its requester.
#[derive(Debug, Clone, Default)]
pub struct MessageHeaders {
    /// Company identifier.
    pub identificador: String,
    /// Correlation token echoed on every outbound status message.
    pub token: String,
}

/// Wire-level job status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum WireStatus {
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "INVALID")]
    Invalid,
}

/// Outbound status message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub id: String,
    pub status: WireStatus,
    pub obs: String,
    /// Semicolon-joined artifact root paths.
    pub caminho_xmls: String,
    pub dh_consulta: String,
}

impl StatusMessage {
    pub fn new(id: impl Into<String>, status: WireStatus, obs: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status,
            obs: obs.into(),
            caminho_xmls: String::new(),
            dh_consulta: format_timestamp(Utc::now()),
        }
    }

    pub fn with_paths(mut self, paths: &[String]) -> Self {
        self.caminho_xmls = paths.join(";");
        self
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_inbound_message() {
        let json = r#"{
            "id": "job-1",
            "empresas": [{"ie": "101234567", "oper": "1"}, {"ie": "109999999"}],
            "dataInicial": "2024-01-01T00:00:00",
            "dataFinal": "2024-02-15",
            "contador": {"cpf": "12345678900", "senha": "secret"}
        }"#;
        let msg: InboundJobMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "job-1");
        assert_eq!(msg.empresas.len(), 2);
        assert_eq!(msg.empresas[0].oper.as_deref(), Some("1"));
        assert!(msg.empresas[1].oper.is_none());
        assert_eq!(msg.contador.cpf, "12345678900");
    }

    #[test]
    fn test_status_message_wire_shape() {
        let msg = StatusMessage::new("job-1", WireStatus::Finished, "OK")
            .with_paths(&["/xmls/a".to_string(), "/xmls/b".to_string()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["status"], "FINISHED");
        assert_eq!(json["caminhoXmls"], "/xmls/a;/xmls/b");
        assert!(json.get("dhConsulta").is_some());
    }

    #[test]
    fn test_wire_status_values() {
        assert_eq!(
            serde_json::to_string(&WireStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
        assert_eq!(
            serde_json::to_string(&WireStatus::Invalid).unwrap(),
            "\"INVALID\""
        );
    }
}
