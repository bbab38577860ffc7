// src/pipeline.rs

use crate::bill::{BillEntry, BillFile, BillStatus, ExtractedBill};
use crate::claude::{ClaudeClient, ExtractionBackend};
use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use crate::store::BillStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Strip markdown code-fence markers the model may wrap its JSON in.
///
/// Tolerates zero or more fence markers and surrounding whitespace, so
/// running it over already-clean text is a no-op.
pub fn strip_code_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Clean up a model reply and parse it as a structured bill record.
pub fn parse_reply(reply: &str) -> Result<ExtractedBill, AnalyzeError> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned).map_err(|_| AnalyzeError::MalformedResponse {
        raw: cleaned.to_string(),
    })
}

/// Run the full analysis sequence for one file: credential check, then
/// attachment registration, then the extraction call, then reply parsing.
/// The credential check comes first so a missing key never reaches the
/// network.
async fn analyze(
    config: &AnalyzerConfig,
    backend: &dyn ExtractionBackend,
    file: &BillFile,
) -> Result<ExtractedBill, AnalyzeError> {
    config.require_api_key()?;
    let attachment_id = backend.upload_attachment(file).await?;
    let reply = backend.extract(&attachment_id, &file.media_type).await?;
    parse_reply(&reply)
}

/// Orchestrates bill ingestion: one independent analysis task per file,
/// per-file status bookkeeping in the owned [`BillStore`], and a manual
/// retry path for failed entries.
pub struct BillPipeline {
    config: AnalyzerConfig,
    backend: Arc<dyn ExtractionBackend>,
    store: BillStore,
    tasks: Mutex<JoinSet<()>>,
}

impl BillPipeline {
    /// Pipeline backed by the real provider client.
    pub fn new(config: AnalyzerConfig) -> Self {
        let backend = Arc::new(ClaudeClient::new(config.clone()));
        Self::with_backend(config, backend)
    }

    /// Pipeline with a caller-supplied backend (used by tests).
    pub fn with_backend(config: AnalyzerConfig, backend: Arc<dyn ExtractionBackend>) -> Self {
        Self {
            config,
            backend,
            store: BillStore::new(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// The entry collection, for the presentation layer to snapshot.
    pub fn store(&self) -> &BillStore {
        &self.store
    }

    /// Submit files for analysis. Each file gets its own entry, published
    /// in `Processing` state before any network work starts, and its own
    /// task; no task waits on another, and completion order across files is
    /// unspecified. Returns the new entry ids in submission order.
    pub async fn submit(&self, files: Vec<BillFile>) -> Vec<String> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let submitted_at = OffsetDateTime::now_utc().unix_timestamp_nanos();
            let id = self.store.generate_id(&file.name, submitted_at);
            self.store.insert(BillEntry::new(id.clone(), file));
            self.spawn_analysis(id.clone()).await;
            ids.push(id);
        }
        ids
    }

    /// Re-run analysis for an entry that previously failed. The file
    /// payload retained on the entry is reused, so the user never has to
    /// re-select the file. Refused (returning false) for unknown ids and
    /// for entries not currently in `Error` state.
    pub async fn retry(&self, id: &str) -> bool {
        let Some(entry) = self.store.get(id) else {
            warn!(id = %id, "retry requested for unknown entry");
            return false;
        };
        if entry.status != BillStatus::Error {
            warn!(id = %id, status = ?entry.status, "retry requested for entry not in error state");
            return false;
        }
        info!(id = %id, file = %entry.file_name(), "retrying analysis");
        self.store.replace(entry.reprocessing());
        self.spawn_analysis(id.to_string()).await;
        true
    }

    /// Wait for every in-flight analysis task to finish.
    pub async fn join(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "analysis task aborted");
            }
        }
    }

    /// Spawn the analysis task for one entry. The task reads the file off
    /// the store, runs `analyze`, and publishes the outcome as a whole-entry
    /// replacement. Any failure stays on this entry; siblings are untouched.
    async fn spawn_analysis(&self, id: String) {
        let config = self.config.clone();
        let backend = Arc::clone(&self.backend);
        let store = self.store.clone();

        self.tasks.lock().await.spawn(async move {
            let Some(entry) = store.get(&id) else {
                warn!(id = %id, "entry disappeared before analysis started");
                return;
            };
            info!(id = %id, file = %entry.file_name(), "analysis started");
            match analyze(&config, backend.as_ref(), &entry.file).await {
                Ok(data) => {
                    info!(
                        id = %id,
                        file = %entry.file_name(),
                        vendor = ?data.vendor,
                        amount = ?data.amount,
                        category = ?data.category,
                        items = data.items.len(),
                        "analysis completed"
                    );
                    store.replace(entry.completed(data));
                }
                Err(e) => {
                    warn!(id = %id, file = %entry.file_name(), error = %e, "analysis failed");
                    store.replace(entry.failed(e.to_string()));
                }
            }
        });
    }
}
