//! CLI runner - executes commands

use crate::auth::{Authenticator, TokenProvider};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::ExtractConfig;
use crate::error::{Error, Result, ResultExt};
use crate::flatten::Record;
use crate::http::HttpClient;
use crate::output::{convert_file, output_path, RowSink, TsvWriter};
use crate::pagination::{Page, PageConfig, Paginator, RunSummary, Terminal};
use crate::status::{StatusEvent, StatusNotifier, TracingNotifier};
use crate::types::JsonValue;
use chrono::{Local, Utc};
use serde_json::{json, Value};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// How a command ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Finished normally
    Completed,
    /// Body reads exhausted the retry bound and the run stopped
    SelfTerminated {
        /// Consecutive failures
        attempts: u32,
    },
}

impl Outcome {
    /// Process exit code
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::SelfTerminated { .. } => 2,
        }
    }
}

/// Result of an extraction run
#[derive(Debug, Clone)]
pub struct ExtractReport {
    /// Row file written
    pub output: PathBuf,
    /// JSON rendition, when requested and the run completed
    pub json_output: Option<PathBuf>,
    /// Pagination counters
    pub summary: RunSummary,
}

impl ExtractReport {
    /// Map the run's terminal state to a command outcome
    pub fn outcome(&self) -> Outcome {
        match self.summary.terminal {
            Terminal::Done => Outcome::Completed,
            Terminal::Failed { attempts } => Outcome::SelfTerminated { attempts },
        }
    }
}

/// Run one extraction: every page flattened into a new row file
///
/// The row file is created before the first request. When the run
/// self-terminates, the rows written so far stay in the file and no JSON
/// rendition is produced.
pub async fn extract(
    config: &ExtractConfig,
    notifier: Arc<dyn StatusNotifier>,
) -> Result<ExtractReport> {
    let started = Local::now();
    notifier.notify(&StatusEvent::RunStarted {
        at: started.with_timezone(&Utc),
    });

    let tokens = Arc::new(Authenticator::new(config.auth_config()?));
    let client = Arc::new(HttpClient::with_config(config.http_config())?);
    let paginator = Paginator::new(client, tokens, config.paginator_config())
        .with_notifier(Arc::clone(&notifier));

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let path = output_path(&config.output_dir, &config.file_prefix, started);
    let mut sink = TsvWriter::create(&path)
        .with_context(|| format!("Failed to create row file {}", path.display()))?;
    info!(path = %path.display(), "Writing rows");

    let summary = paginator
        .run(&config.initial_path, |page| {
            let rows = sink.write_records(&page.records)?;
            sink.flush()?;
            Ok(rows)
        })
        .await?;
    sink.into_inner()?;

    let mut json_output = None;
    if summary.is_done() {
        if config.emit_json {
            json_output = Some(convert_file(&path)?);
        }
        notifier.notify(&StatusEvent::RunFinished {
            at: Utc::now(),
            pages: summary.pages,
            records: summary.records,
        });
    }

    Ok(ExtractReport {
        output: path,
        json_output,
        summary,
    })
}

/// Read records from a local JSON document
///
/// Accepts a page object (with the records field), an array of records, or a
/// single record.
pub fn load_records(text: &str, config: &PageConfig) -> Result<Vec<Record>> {
    let value: JsonValue = serde_json::from_str(text)?;
    match value {
        JsonValue::Object(ref fields)
            if fields.contains_key(&config.records_field)
                && !fields.contains_key(&config.id_field) =>
        {
            Ok(Page::decode(text, config)?.records)
        }
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| Record::from_value(item, &config.id_field))
            .collect(),
        record @ JsonValue::Object(_) => Ok(vec![Record::from_value(record, &config.id_field)?]),
        _ => Err(Error::malformed(
            "expected a record, an array of records or a page object",
        )),
    }
}

/// CLI runner
pub struct Runner {
    cli: Cli,
    notifier: Arc<dyn StatusNotifier>,
}

impl Runner {
    /// Create a new runner reporting status to the tracing log
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            notifier: Arc::new(TracingNotifier),
        }
    }

    /// Set the status notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<Outcome> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Extract {
                output_dir,
                json,
                initial_path,
            } => {
                self.extract(output_dir.as_deref(), *json, initial_path.as_deref())
                    .await
            }
            Commands::Flatten {
                input,
                output,
                id_field,
            } => self.flatten(input, output.as_deref(), id_field.as_deref()),
        }
    }

    fn load_config(&self) -> Result<ExtractConfig> {
        match &self.cli.config {
            Some(path) => ExtractConfig::from_file(path),
            None => Err(Error::missing_field("--config")),
        }
    }

    async fn check(&self) -> Result<Outcome> {
        let config = self.load_config()?;
        let authenticator = Authenticator::new(config.auth_config()?);

        match authenticator.get_token().await {
            Ok(credential) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": "Access token acquired",
                        "expiresAt": credential.expires_at().map(|at| at.to_rfc3339())
                    }
                }));
                Ok(Outcome::Completed)
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": e.to_string()
                    }
                }));
                Err(e)
            }
        }
    }

    async fn extract(
        &self,
        output_dir: Option<&Path>,
        emit_json: bool,
        initial_path: Option<&str>,
    ) -> Result<Outcome> {
        let mut config = self.load_config()?;
        if let Some(dir) = output_dir {
            config.output_dir = dir.to_path_buf();
        }
        if emit_json {
            config.emit_json = true;
        }
        if let Some(path) = initial_path {
            config.initial_path = path.to_string();
            config.validate()?;
        }

        let start = Instant::now();
        let report = match extract(&config, Arc::clone(&self.notifier)).await {
            Ok(report) => report,
            Err(e) => {
                self.notifier.notify(&StatusEvent::Fatal {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let summary = &report.summary;
        let status = if summary.is_done() {
            "SUCCEEDED"
        } else {
            "SELF_TERMINATED"
        };
        self.output_message(&json!({
            "type": "RUN_SUMMARY",
            "summary": {
                "status": status,
                "output": report.output.display().to_string(),
                "jsonOutput": report.json_output.as_ref().map(|p| p.display().to_string()),
                "pages": summary.pages,
                "records": summary.records,
                "rows": summary.rows,
                "retries": summary.retries,
                "durationMs": start.elapsed().as_millis() as u64
            }
        }));

        Ok(report.outcome())
    }

    fn flatten(
        &self,
        input: &Path,
        output: Option<&Path>,
        id_field: Option<&str>,
    ) -> Result<Outcome> {
        let mut page_config = match &self.cli.config {
            Some(path) => ExtractConfig::from_file(path)?.page,
            None => PageConfig::default(),
        };
        if let Some(field) = id_field {
            page_config.id_field = field.to_string();
        }

        let text = fs::read_to_string(input).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound {
                path: input.display().to_string(),
            },
            _ => Error::Io(e),
        })?;
        let records = load_records(&text, &page_config)?;

        let rows = match output {
            Some(path) => {
                let mut sink = TsvWriter::create(path)?;
                let rows = sink.write_records(&records)?;
                sink.into_inner()?;
                self.output_message(&json!({
                    "type": "FLATTEN_SUMMARY",
                    "summary": {
                        "output": path.display().to_string(),
                        "records": records.len(),
                        "rows": rows
                    }
                }));
                rows
            }
            None => {
                let stdout = std::io::stdout().lock();
                let mut sink = TsvWriter::new(BufWriter::new(stdout))?;
                let rows = sink.write_records(&records)?;
                sink.into_inner()?;
                rows
            }
        };

        info!(records = records.len(), rows, "Flattened local file");
        Ok(Outcome::Completed)
    }

    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("cli", &self.cli)
            .finish_non_exhaustive()
    }
}
