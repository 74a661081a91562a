use std::fmt::Write as FmtWrite;

use crate::models::OutputFormat;
use crate::services::BatchReport;

pub trait Formatter {
    fn format_batch_report(&self, report: &BatchReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub store_driver: String,
    pub store_description: String,
    pub store_connected: bool,
    pub embedding_provider: String,
    pub embedding_description: String,
    pub embedding_healthy: bool,
    pub collection: String,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_batch_report(&self, report: &BatchReport) -> String {
        format!(
            "{}: {} documents -> {} ({}ms)\n",
            report.batch,
            report.documents,
            report.collection,
            report.elapsed.as_millis()
        )
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let store_status = if status.store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            status.store_driver, store_status
        )
        .unwrap();
        writeln!(output, "  Backend:     {}", status.store_description).unwrap();
        writeln!(output, "  Collection:  {}", status.collection).unwrap();
        writeln!(output).unwrap();

        let embedding_status = if status.embedding_healthy {
            "[READY]"
        } else {
            "[UNAVAILABLE]"
        };
        writeln!(
            output,
            "Embedding:     {} ({})",
            status.embedding_provider, embedding_status
        )
        .unwrap();
        writeln!(output, "  Function:    {}", status.embedding_description).unwrap();

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)) + "\n"
    }
}

impl Formatter for JsonFormatter {
    fn format_batch_report(&self, report: &BatchReport) -> String {
        match serde_json::to_value(report) {
            Ok(value) => self.render(&value),
            Err(e) => self.format_error(&e.to_string()),
        }
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "vector_store": {
                "driver": status.store_driver,
                "backend": status.store_description,
                "connected": status.store_connected,
                "collection": status.collection,
            },
            "embedding": {
                "provider": status.embedding_provider,
                "function": status.embedding_description,
                "healthy": status.embedding_healthy,
            }
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string() + "\n"
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string() + "\n"
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        // One report per line so multi-file runs stay parseable.
        OutputFormat::Json => Box::new(JsonFormatter::new(false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PipelineStage;
    use std::time::Duration;

    fn report() -> BatchReport {
        BatchReport {
            batch: "doc.json".to_string(),
            collection: "docs".to_string(),
            documents: 4,
            stage: PipelineStage::Done,
            elapsed: Duration::from_millis(12),
        }
    }

    fn status() -> StatusInfo {
        StatusInfo {
            store_driver: "local".to_string(),
            store_description: "local (in memory)".to_string(),
            store_connected: true,
            embedding_provider: "http".to_string(),
            embedding_description: "http (http://localhost:11411)".to_string(),
            embedding_healthy: false,
            collection: "vecput".to_string(),
        }
    }

    #[test]
    fn test_text_report() {
        assert_eq!(
            TextFormatter.format_batch_report(&report()),
            "doc.json: 4 documents -> docs (12ms)\n"
        );
    }

    #[test]
    fn test_json_report_is_one_line() {
        let output = get_formatter(OutputFormat::Json).format_batch_report(&report());
        assert_eq!(output.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["documents"], 4);
        assert_eq!(value["elapsed_ms"], 12);
    }

    #[test]
    fn test_status_output() {
        let text = TextFormatter.format_status(&status());
        assert!(text.contains("local ([CONNECTED])"));
        assert!(text.contains("http ([UNAVAILABLE])"));

        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(true).format_status(&status())).unwrap();
        assert_eq!(json["vector_store"]["connected"], true);
        assert_eq!(json["embedding"]["healthy"], false);
    }

    #[test]
    fn test_message_and_error() {
        assert_eq!(TextFormatter.format_message("done"), "done\n");
        assert_eq!(TextFormatter.format_error("boom"), "Error: boom\n");
        assert_eq!(
            JsonFormatter::new(false).format_error("boom"),
            "{\"error\":\"boom\"}\n"
        );
    }
}
