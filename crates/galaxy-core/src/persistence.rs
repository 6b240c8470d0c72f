//! Persistence collaborator.
//!
//! The engine only needs per-record load and save; each call is assumed
//! atomic for its one record. Transactions across records are not offered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::civilization::Civilization;
use crate::ids::{CivilizationId, PlayerId};
use crate::player::{AiProfile, ControlType};

/// What is remembered about a player between connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSession {
    pub session_id: String,
    pub player: PlayerId,
    pub name: String,
    pub control: ControlType,
    pub civilization: Option<CivilizationId>,
    pub ai: Option<AiProfile>,
    pub saved_at: DateTime<Utc>,
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn load_civilization(&self, id: &CivilizationId) -> Result<Option<Civilization>>;

    async fn save_civilization(&self, record: &Civilization) -> Result<()>;

    async fn load_player_session(&self, session_id: &str) -> Result<Option<PlayerSession>>;

    async fn save_player_session(&self, session: &PlayerSession) -> Result<()>;
}

/// In-process store, the default for tests and ephemeral games.
#[derive(Debug, Default)]
pub struct MemoryStore {
    civilizations: RwLock<HashMap<CivilizationId, Civilization>>,
    sessions: RwLock<HashMap<String, PlayerSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn civilization_count(&self) -> usize {
        self.civilizations.read().await.len()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn load_civilization(&self, id: &CivilizationId) -> Result<Option<Civilization>> {
        Ok(self.civilizations.read().await.get(id).cloned())
    }

    async fn save_civilization(&self, record: &Civilization) -> Result<()> {
        self.civilizations
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load_player_session(&self, session_id: &str) -> Result<Option<PlayerSession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save_player_session(&self, session: &PlayerSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}

/// One JSON file per record under a data directory.
///
/// ```text
/// <root>/civilizations/<id>.json
/// <root>/sessions/<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn civilization_path(&self, id: &CivilizationId) -> PathBuf {
        self.root
            .join("civilizations")
            .join(format!("{}.json", file_stem(id.as_str())))
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join("sessions")
            .join(format!("{}.json", file_stem(session_id)))
    }

    async fn read<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    /// Write to a sibling temp file, then rename over the target
    async fn write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn file_stem(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl Persistence for JsonDirStore {
    async fn load_civilization(&self, id: &CivilizationId) -> Result<Option<Civilization>> {
        Self::read(&self.civilization_path(id)).await
    }

    async fn save_civilization(&self, record: &Civilization) -> Result<()> {
        Self::write(&self.civilization_path(&record.id), record).await
    }

    async fn load_player_session(&self, session_id: &str) -> Result<Option<PlayerSession>> {
        Self::read(&self.session_path(session_id)).await
    }

    async fn save_player_session(&self, session: &PlayerSession) -> Result<()> {
        Self::write(&self.session_path(&session.session_id), session).await
    }
}
