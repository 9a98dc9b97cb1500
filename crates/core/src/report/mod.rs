//! Final job report and best-effort operator alerts.

use async_trait::async_trait;
use tracing::warn;

use crate::config::AlertConfig;
use crate::job::{EntityStatus, Job};

/// Discord caps message content at 2000 characters; stay under it.
const ALERT_CHUNK_CHARS: usize = 1900;

/// Aggregated terminal outcome of one job, bucketed per entity.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub period: String,
    pub total: usize,
    pub success: usize,
    pub no_results: usize,
    pub permission_denied: usize,
    /// Errored entities with their classified causes.
    pub errors: Vec<(String, String)>,
}

impl Report {
    /// Build the report from a finished job's tasks. Tasks skipped by the
    /// checkpoint were never run and are not counted.
    pub fn from_job(job: &Job) -> Self {
        let mut report = Report {
            period: format!("{} a {}", job.start.format("%d/%m/%Y"), job.end.format("%d/%m/%Y")),
            ..Default::default()
        };

        for task in &job.tasks {
            match task.status {
                EntityStatus::Success => report.success += 1,
                EntityStatus::NoResults => report.no_results += 1,
                EntityStatus::PermissionDenied => report.permission_denied += 1,
                EntityStatus::Error => {
                    let cause = task
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "Erro desconhecido ao executar o robô.".to_string());
                    report.errors.push((task.ie.clone(), cause));
                }
                EntityStatus::Pending | EntityStatus::Attempting => continue,
            }
            report.total += 1;
        }

        report
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Operator-facing report text, also used as the terminal status
    /// message observation.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("----- RELATÓRIO FINAL -----\n");
        out.push_str(&format!("Período: {}\n", self.period));
        out.push_str(&format!("Total de empresas: {}\n", self.total));
        out.push_str(&format!("Sucesso: {}\n", self.success));
        out.push_str(&format!("Sem resultado: {}\n", self.no_results));
        out.push_str(&format!("Permissão negada: {}\n", self.permission_denied));
        out.push_str(&format!("Com erro: {}", self.errors.len()));
        for (ie, cause) in &self.errors {
            out.push_str(&format!("\n  - IE {}: {}", ie, cause));
        }
        out
    }
}

/// Best-effort sink for free-text operator alerts. Failures are logged
/// and never affect job outcomes.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, text: &str);
}

/// Posts alerts to a webhook (Discord-compatible payload), splitting long
/// reports into message-sized chunks.
pub struct WebhookAlertSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(config: &AlertConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs as u64))
            .build()?;
        Ok(Self {
            client,
            url: config.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send(&self, text: &str) {
        for chunk in chunk_text(text, ALERT_CHUNK_CHARS) {
            let payload = serde_json::json!({ "content": chunk });
            match self.client.post(&self.url).json(&payload).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!("Alert webhook returned HTTP {}", response.status());
                }
                Ok(_) => {}
                Err(e) => warn!("Alert webhook unreachable: {}", e),
            }
        }
    }
}

/// Split on line boundaries where possible, hard-splitting oversized lines.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let mut line = line;
        while line.chars().count() > max_chars {
            let cut: String = line.chars().take(max_chars).collect();
            let cut_bytes = cut.len();
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(cut);
            line = &line[cut_bytes..];
        }
        let needed = line.chars().count() + if current.is_empty() { 0 } else { 1 };
        if current.chars().count() + needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
