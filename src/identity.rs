use crate::error::Result;
use crate::utils::random_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Стабильный идентификатор участника; уходит в каждом исходящем сообщении
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Новый случайный идентификатор, живущий до конца процесса
    pub fn ephemeral() -> Self {
        Self(random_id())
    }

    /// Читает идентификатор из файла; если файла нет или он пуст,
    /// генерирует новый и сохраняет его туда
    pub fn load_or_create(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) if !raw.trim().is_empty() => {
                debug!(path = %path.display(), "loaded participant id");
                return Ok(Self(raw.trim().to_string()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let id = Self::ephemeral();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &id.0)?;
        info!(path = %path.display(), "stored new participant id");
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
