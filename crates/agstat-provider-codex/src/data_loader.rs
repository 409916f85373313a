//! Codex session loader
//!
//! Reads `$CODEX_HOME/sessions/**/*.jsonl` (default `~/.codex`). The lines
//! that matter are:
//!
//! - `session_meta`: session id and working directory
//! - `turn_context`: the model used by the following turns
//! - `event_msg` with `payload.type == "token_count"`: cumulative usage
//!
//! Each rollout file is its own counter stream.

use agstat_core::error::{AgstatError, Result};
use agstat_core::provider::{EntryStream, ProviderDataLoader};
use agstat_core::reconcile::{RawSnapshot, Reconciled, StreamReconciler, UsageDelta};
use agstat_core::types::{ISOTimestamp, ModelName, SessionId, UsageEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

const CODEX_HOME_ENV: &str = "CODEX_HOME";

/// Used until the first `turn_context` names a model
pub const DEFAULT_MODEL: &str = "gpt-5";

pub struct DataLoader {
    sessions_dir: PathBuf,
}

#[async_trait]
impl ProviderDataLoader for DataLoader {
    const NAME: &'static str = "Codex";

    async fn new() -> Result<Self> {
        let home = match std::env::var(CODEX_HOME_ENV) {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => dirs::home_dir()
                .ok_or_else(|| AgstatError::Config("Cannot determine home directory".into()))?
                .join(".codex"),
        };
        let sessions_dir = home.join("sessions");
        if !sessions_dir.is_dir() {
            return Err(AgstatError::NoDataDirectory {
                provider: Self::NAME,
            });
        }
        Ok(Self { sessions_dir })
    }

    fn load_entries(&self) -> EntryStream<'_> {
        Box::pin(async_stream::try_stream! {
            let files = self.find_session_files().await?;
            debug!("Found {} Codex session files", files.len());

            let mut reconciler = StreamReconciler::new();
            for path in files {
                match parse_session(&path, &mut reconciler).await {
                    Ok(entries) => {
                        for entry in entries {
                            yield entry;
                        }
                    }
                    Err(e) => warn!("Skipping {}: {}", path.display(), e),
                }
            }
            if reconciler.resets() > 0 {
                debug!("Codex counters restarted {} times", reconciler.resets());
            }
        })
    }
}

impl DataLoader {
    pub fn from_sessions_dir(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub async fn find_session_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.sessions_dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
                .collect();
            files.sort();
            files
        })
        .await
        .map_err(|e| AgstatError::Config(format!("file discovery task failed: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct RolloutLine {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TokenCountInfo {
    #[serde(default)]
    total_token_usage: Option<RawSnapshot>,
    #[serde(default)]
    last_token_usage: Option<RawSnapshot>,
}

/// Per-file state while walking a rollout
struct SessionState {
    stream_key: String,
    session_id: String,
    project: Option<String>,
    model: String,
}

impl SessionState {
    fn for_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self {
            session_id: stem.clone(),
            stream_key: stem,
            project: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn apply_meta(&mut self, payload: &serde_json::Value) {
        if let Some(id) = payload.get("id").and_then(|v| v.as_str()) {
            self.session_id = id.to_string();
        }
        if let Some(name) = payload
            .get("cwd")
            .and_then(|v| v.as_str())
            .and_then(|cwd| Path::new(cwd).file_name())
            .and_then(|n| n.to_str())
        {
            self.project = Some(name.to_string());
        }
    }

    fn entry(&self, timestamp: ISOTimestamp, delta: UsageDelta) -> UsageEntry {
        UsageEntry {
            session_id: SessionId::new(self.session_id.clone()),
            timestamp,
            model: ModelName::new(self.model.clone()),
            tokens: delta.to_token_counts(),
            total_cost: None,
            project: self.project.clone(),
        }
    }
}

/// Parse one rollout; on a read error the file's stream is rolled back to
/// where it stood before, so its discarded entries leave no baseline behind
async fn parse_session(
    path: &Path,
    reconciler: &mut StreamReconciler<String>,
) -> Result<Vec<UsageEntry>> {
    let state = SessionState::for_path(path);
    let stream_key = state.stream_key.clone();
    let checkpoint = reconciler.previous(stream_key.as_str()).copied();

    let result = read_rollout(path, state, reconciler).await;
    if result.is_err() {
        reconciler.restore(stream_key, checkpoint);
    }
    result
}

async fn read_rollout(
    path: &Path,
    mut state: SessionState,
    reconciler: &mut StreamReconciler<String>,
) -> Result<Vec<UsageEntry>> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut entries = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<RolloutLine>(&line) else {
            continue;
        };

        match parsed.kind.as_str() {
            "session_meta" => state.apply_meta(&parsed.payload),
            "turn_context" => {
                if let Some(model) = parsed.payload.get("model").and_then(|m| m.as_str()) {
                    state.model = model.to_string();
                }
            }
            "event_msg" => {
                if parsed.payload.get("type").and_then(|t| t.as_str()) != Some("token_count") {
                    continue;
                }
                let Some(timestamp) = parsed.timestamp.as_deref().and_then(ISOTimestamp::parse)
                else {
                    continue;
                };
                let info = match parsed.payload.get("info") {
                    Some(info) if !info.is_null() => {
                        match serde_json::from_value::<TokenCountInfo>(info.clone()) {
                            Ok(info) => info,
                            Err(e) => {
                                debug!("{}: malformed token_count: {}", path.display(), e);
                                continue;
                            }
                        }
                    }
                    _ => continue,
                };

                let delta = match (info.total_token_usage, info.last_token_usage) {
                    (Some(total), _) => {
                        let reconciled = reconciler.observe(state.stream_key.clone(), total);
                        if let Reconciled::Reset(_) = reconciled {
                            debug!(
                                "Counter reset in {} at {}",
                                path.display(),
                                timestamp.inner()
                            );
                        }
                        reconciled.usage()
                    }
                    (None, Some(last)) => UsageDelta::from(&last),
                    (None, None) => continue,
                };

                if delta.total_tokens() > 0 {
                    entries.push(state.entry(timestamp, delta));
                }
            }
            _ => {}
        }
    }
    Ok(entries)
}
