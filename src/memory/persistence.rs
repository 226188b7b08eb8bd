//! Session persistence: one JSON file per patient
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::memory::conversation::SessionExport;

const FILE_PREFIX: &str = "patient_";

/// Encode a patient id for use in a file name. ASCII letters, digits
/// and `-` pass through; every other byte becomes `_xx` in hex, so
/// distinct ids never share a file.
pub fn encode_id(patient_id: &str) -> String {
    let mut encoded = String::with_capacity(patient_id.len());
    for byte in patient_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{:02x}", byte));
        }
    }
    encoded
}

/// Inverse of [`encode_id`]; `None` for names it could not have produced
pub fn decode_id(encoded: &str) -> Option<String> {
    let raw = encoded.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        match raw[i] {
            b'_' => {
                let hex = encoded
                    .get(i + 1..i + 3)
                    .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => {
                bytes.push(b);
                i += 1;
            }
            _ => return None,
        }
    }

    String::from_utf8(bytes).ok()
}

/// Session file store
#[derive(Debug, Clone)]
pub struct SessionPersistence {
    storage_dir: PathBuf,
}

impl SessionPersistence {
    /// Create persistence rooted at `storage_dir`, creating it if needed
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        if !storage_dir.exists() {
            fs::create_dir_all(&storage_dir)
                .context("Failed to create session storage directory")?;
        }

        Ok(Self { storage_dir })
    }

    fn path_for(&self, patient_id: &str) -> PathBuf {
        self.storage_dir
            .join(format!("{}{}.json", FILE_PREFIX, encode_id(patient_id)))
    }

    /// Save a patient's session to disk
    pub fn save(&self, session: &SessionExport) -> Result<PathBuf> {
        let path = self.path_for(&session.patient_id);

        let json = serde_json::to_string_pretty(session)
            .context("Failed to serialize session")?;

        fs::write(&path, json)
            .context("Failed to write session file")?;

        Ok(path)
    }

    /// Load a patient's session; `None` when no file exists or the file
    /// belongs to another patient
    pub fn load(&self, patient_id: &str) -> Result<Option<SessionExport>> {
        let path = self.path_for(patient_id);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .context("Failed to read session file")?;

        let session: SessionExport = serde_json::from_str(&json)
            .context("Failed to deserialize session")?;

        if session.patient_id != patient_id {
            warn!(
                requested = patient_id,
                found = %session.patient_id,
                "session file belongs to another patient, ignoring"
            );
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// List the patient ids that have a session file
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.storage_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.storage_dir)? {
            let path = entry?.path();

            if path.is_file() {
                if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                    if filename.starts_with(FILE_PREFIX) && filename.ends_with(".json") {
                        let encoded = &filename[FILE_PREFIX.len()..filename.len() - ".json".len()];
                        if let Some(id) = decode_id(encoded) {
                            ids.push(id);
                        }
                    }
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Delete a patient's session file if present
    pub fn delete(&self, patient_id: &str) -> Result<()> {
        let path = self.path_for(patient_id);

        if path.exists() {
            fs::remove_file(&path)
                .context("Failed to delete session file")?;
        }

        Ok(())
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}
