//! Claude Code transcript loader
//!
//! Data roots, in order of precedence:
//! - every directory in the comma-separated `CLAUDE_CONFIG_DIR`
//! - `~/.config/claude`
//! - `~/.claude`
//!
//! Only roots with a `projects/` subdirectory are used.
//!
//! # Examples
//!
//! ```no_run
//! use agstat_core::provider::ProviderDataLoader;
//! use agstat_provider_claude::DataLoader;
//! use futures::StreamExt;
//!
//! # async fn example() -> agstat_core::Result<()> {
//! let loader = DataLoader::new().await?;
//! let mut entries = loader.load_entries();
//! while let Some(entry) = entries.next().await {
//!     let entry = entry?;
//!     println!("{} {}", entry.model, entry.tokens.total());
//! }
//! # Ok(())
//! # }
//! ```

use agstat_core::error::{AgstatError, Result};
use agstat_core::provider::{EntryStream, ProviderDataLoader};
use agstat_core::types::{ISOTimestamp, ModelName, SessionId, TokenCounts, UsageEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

const CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

/// Model id Claude Code uses for locally generated messages
const SYNTHETIC_MODEL: &str = "<synthetic>";

pub struct DataLoader {
    roots: Vec<PathBuf>,
}

#[async_trait]
impl ProviderDataLoader for DataLoader {
    const NAME: &'static str = "Claude";

    async fn new() -> Result<Self> {
        let roots: Vec<PathBuf> = candidate_roots()?
            .into_iter()
            .filter(|root| root.join("projects").is_dir())
            .collect();

        if roots.is_empty() {
            return Err(AgstatError::NoDataDirectory {
                provider: Self::NAME,
            });
        }
        debug!("Discovered {} Claude data directories", roots.len());
        Ok(Self { roots })
    }

    fn load_entries(&self) -> EntryStream<'_> {
        Box::pin(async_stream::try_stream! {
            let files = self.find_jsonl_files().await?;
            debug!("Found {} Claude transcript files", files.len());

            let mut seen = HashSet::new();
            for path in files {
                match parse_transcript(&path, &mut seen).await {
                    Ok(entries) => {
                        for entry in entries {
                            yield entry;
                        }
                    }
                    Err(e) => warn!("Skipping {}: {}", path.display(), e),
                }
            }
        })
    }
}

impl DataLoader {
    /// Loader over explicit data roots, skipping discovery
    pub fn from_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// All `*.jsonl` files below each root's `projects/`, sorted by path
    pub async fn find_jsonl_files(&self) -> Result<Vec<PathBuf>> {
        let dirs: Vec<PathBuf> = self.roots.iter().map(|r| r.join("projects")).collect();
        let files = tokio::task::spawn_blocking(move || {
            let mut files: Vec<PathBuf> = dirs
                .iter()
                .flat_map(|dir| walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
                .collect();
            files.sort();
            files
        })
        .await
        .map_err(|e| AgstatError::Config(format!("file discovery task failed: {e}")))?;
        Ok(files)
    }
}

fn candidate_roots() -> Result<Vec<PathBuf>> {
    if let Ok(value) = std::env::var(CONFIG_DIR_ENV) {
        let roots: Vec<PathBuf> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        if !roots.is_empty() {
            return Ok(roots);
        }
    }

    let home = dirs::home_dir()
        .ok_or_else(|| AgstatError::Config("Cannot determine home directory".into()))?;
    Ok(vec![home.join(".config").join("claude"), home.join(".claude")])
}

// ---------------------------------------------------------------------------
// Transcript schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptLine {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<AssistantMessage>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(rename = "costUSD", default)]
    cost_usd: Option<f64>,
    #[serde(default)]
    is_api_error_message: bool,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<MessageUsage>,
}

#[derive(Debug, Deserialize)]
struct MessageUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

impl TranscriptLine {
    /// `message.id` + `requestId`; streamed responses repeat both
    fn dedup_key(&self) -> Option<String> {
        let msg_id = self.message.as_ref().and_then(|m| m.id.as_deref());
        match (msg_id, self.request_id.as_deref()) {
            (Some(m), Some(r)) => Some(format!("{m}:{r}")),
            (Some(m), None) => Some(m.to_string()),
            (None, Some(r)) => Some(r.to_string()),
            (None, None) => None,
        }
    }

    fn into_entry(self, fallback_session: &str, fallback_project: Option<&str>) -> Option<UsageEntry> {
        if self.is_api_error_message || self.kind.as_deref().is_some_and(|k| k != "assistant") {
            return None;
        }
        let message = self.message?;
        let usage = message.usage?;
        let model = message.model.filter(|m| m != SYNTHETIC_MODEL)?;
        let timestamp = self.timestamp.as_deref().and_then(ISOTimestamp::parse)?;

        let project = self
            .cwd
            .as_deref()
            .and_then(|cwd| Path::new(cwd).file_name())
            .and_then(|n| n.to_str())
            .or(fallback_project)
            .map(str::to_string);

        Some(UsageEntry {
            session_id: SessionId::new(self.session_id.as_deref().unwrap_or(fallback_session)),
            timestamp,
            model: ModelName::new(model),
            tokens: TokenCounts::new(
                usage.input_tokens,
                usage.output_tokens,
                usage.cache_creation_input_tokens,
                usage.cache_read_input_tokens,
            ),
            total_cost: self.cost_usd,
            project,
        })
    }
}

/// Parse one transcript, skipping malformed lines and already-seen requests
async fn parse_transcript(path: &Path, seen: &mut HashSet<String>) -> Result<Vec<UsageEntry>> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown");
    let dir_project = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str());

    let mut entries = Vec::new();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: TranscriptLine = match serde_json::from_str(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("{}:{}: unparsable line: {}", path.display(), line_no, e);
                continue;
            }
        };

        if let Some(key) = parsed.dedup_key()
            && !seen.insert(key)
        {
            continue;
        }
        if let Some(entry) = parsed.into_entry(stem, dir_project) {
            entries.push(entry);
        }
    }
    Ok(entries)
}
