//! Per-request storage for synthesized speech.
//!
//! Every synthesis gets its own `<uuid>.<ext>` file, so concurrent voice
//! interactions never read each other's audio. Files stay downloadable for
//! the configured TTL and are removed by [`AudioStore::purge_expired`].
//! Opening a store adopts speech files left by an earlier process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::VoiceError;
use crate::{AudioFormat, SynthesizedSpeech};

/// Descriptor of a stored speech file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioArtifact {
    pub id: Uuid,
    pub format: AudioFormat,
    pub mime: &'static str,
    pub size: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub path: PathBuf,
}

impl AudioArtifact {
    /// File name offered to the browser, e.g. `speech.mp3`.
    pub fn download_name(&self) -> String {
        format!("speech.{}", self.format.extension())
    }
}

pub struct AudioStore {
    dir: PathBuf,
    ttl: chrono::Duration,
    artifacts: Mutex<HashMap<Uuid, AudioArtifact>>,
}

impl AudioStore {
    /// Open (creating if needed) the audio directory.
    pub async fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, VoiceError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            VoiceError::Storage(format!("failed to create {}: {}", dir.display(), e))
        })?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| VoiceError::Config(format!("audio TTL out of range: {}", e)))?;
        let artifacts = scan_existing(&dir).await?;
        info!(
            dir = %dir.display(),
            ttl_secs = ttl.num_seconds(),
            adopted = artifacts.len(),
            "Audio store ready"
        );
        Ok(Self {
            dir,
            ttl,
            artifacts: Mutex::new(artifacts),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, AudioArtifact>> {
        // A poisoned map is still consistent: entries are inserted whole.
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write `speech` to a fresh file and register it.
    pub async fn save(&self, speech: &SynthesizedSpeech) -> Result<AudioArtifact, VoiceError> {
        let id = Uuid::new_v4();
        let path = self
            .dir
            .join(format!("{}.{}", id, speech.format.extension()));
        tokio::fs::write(&path, &speech.bytes).await.map_err(|e| {
            VoiceError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;

        let artifact = AudioArtifact {
            id,
            format: speech.format,
            mime: speech.format.mime(),
            size: speech.bytes.len(),
            created_at: Utc::now(),
            path,
        };
        self.lock().insert(id, artifact.clone());
        debug!(%id, size = artifact.size, "Stored audio artifact");
        Ok(artifact)
    }

    /// Descriptor and bytes of a stored, unexpired artifact.
    pub async fn load(&self, id: Uuid) -> Result<(AudioArtifact, Vec<u8>), VoiceError> {
        let artifact = self
            .lock()
            .get(&id)
            .filter(|a| !self.is_expired(a, Utc::now()))
            .cloned()
            .ok_or(VoiceError::NotFound(id))?;
        let bytes = match tokio::fs::read(&artifact.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.lock().remove(&id);
                return Err(VoiceError::NotFound(id));
            }
            Err(e) => return Err(VoiceError::Io(e)),
        };
        Ok((artifact, bytes))
    }

    fn is_expired(&self, artifact: &AudioArtifact, now: DateTime<Utc>) -> bool {
        artifact.created_at + self.ttl <= now
    }

    /// Delete artifacts older than the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, VoiceError> {
        let now = Utc::now();
        let expired: Vec<AudioArtifact> = {
            let mut map = self.lock();
            let ids: Vec<Uuid> = map
                .values()
                .filter(|a| self.is_expired(a, now))
                .map(|a| a.id)
                .collect();
            ids.iter().filter_map(|id| map.remove(id)).collect()
        };

        for artifact in &expired {
            if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(id = %artifact.id, error = %e, "Failed to delete expired audio");
                }
            }
        }
        if !expired.is_empty() {
            info!(removed = expired.len(), "Purged expired audio artifacts");
        }
        Ok(expired.len())
    }
}

/// Register speech files left in `dir` by an earlier process, dated by their
/// modification time, so the TTL sweep covers them too. Other files are
/// ignored.
async fn scan_existing(dir: &Path) -> Result<HashMap<Uuid, AudioArtifact>, VoiceError> {
    let storage = |e: std::io::Error| {
        VoiceError::Storage(format!("failed to scan {}: {}", dir.display(), e))
    };
    let mut found = HashMap::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(storage)?;
    while let Some(entry) = entries.next_entry().await.map_err(storage)? {
        let path = entry.path();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("mp3") => AudioFormat::Mp3,
            Some("wav") => AudioFormat::Wav,
            _ => continue,
        };
        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            continue;
        };
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        found.insert(
            id,
            AudioArtifact {
                id,
                format,
                mime: format.mime(),
                size: metadata.len() as usize,
                created_at,
                path,
            },
        );
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech(bytes: &[u8]) -> SynthesizedSpeech {
        SynthesizedSpeech {
            bytes: bytes.to_vec(),
            format: AudioFormat::Mp3,
        }
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("audio");
        let store = AudioStore::open(&dir, Duration::from_secs(60)).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_uses_unique_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path(), Duration::from_secs(60)).await.unwrap();
        let a = store.save(&speech(b"first")).await.unwrap();
        let b = store.save(&speech(b"second")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.path, b.path);
        assert!(a.path.exists() && b.path.exists());
        assert_eq!(a.download_name(), "speech.mp3");
        assert_eq!(a.mime, "audio/mpeg");
        assert_eq!(store.len(), 2);

        let (_, first) = store.load(a.id).await.unwrap();
        let (meta, second) = store.load(b.id).await.unwrap();
        assert_eq!(first, b"first");
        assert_eq!(second, b"second");
        assert_eq!(meta.size, 6);
    }

    #[tokio::test]
    async fn test_load_unknown_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path(), Duration::from_secs(60)).await.unwrap();
        let id = Uuid::new_v4();
        assert!(matches!(store.load(id).await, Err(VoiceError::NotFound(x)) if x == id));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path(), Duration::from_secs(60)).await.unwrap();
        let artifact = store.save(&speech(b"x")).await.unwrap();
        std::fs::remove_file(&artifact.path).unwrap();
        assert!(matches!(store.load(artifact.id).await, Err(VoiceError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired_removes_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path(), Duration::ZERO).await.unwrap();
        let artifact = store.save(&speech(b"old")).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(!artifact.path.exists());
        assert!(store.is_empty());
        assert!(matches!(store.load(artifact.id).await, Err(VoiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_purge_keeps_fresh_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path(), Duration::from_secs(1800)).await.unwrap();
        store.save(&speech(b"fresh")).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_purges_files_from_previous_run() {
        let tmp = tempfile::tempdir().unwrap();
        let old = {
            let store = AudioStore::open(tmp.path(), Duration::ZERO).await.unwrap();
            store.save(&speech(b"left behind")).await.unwrap()
        };
        std::fs::write(tmp.path().join("notes.txt"), b"keep").unwrap();

        let store = AudioStore::open(tmp.path(), Duration::ZERO).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(!old.path.exists());
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_reopen_keeps_fresh_files_downloadable() {
        let tmp = tempfile::tempdir().unwrap();
        let old = {
            let store = AudioStore::open(tmp.path(), Duration::from_secs(1800)).await.unwrap();
            store
                .save(&SynthesizedSpeech {
                    bytes: b"RIFF".to_vec(),
                    format: AudioFormat::Wav,
                })
                .await
                .unwrap()
        };

        let store = AudioStore::open(tmp.path(), Duration::from_secs(1800)).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        let (artifact, bytes) = store.load(old.id).await.unwrap();
        assert_eq!(artifact.format, AudioFormat::Wav);
        assert_eq!(artifact.size, 4);
        assert_eq!(bytes, b"RIFF");
    }

    #[test]
    fn test_artifact_serializes_without_path() {
        let artifact = AudioArtifact {
            id: Uuid::nil(),
            format: AudioFormat::Wav,
            mime: AudioFormat::Wav.mime(),
            size: 44,
            created_at: Utc::now(),
            path: PathBuf::from("/tmp/secret/location.wav"),
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["format"], "wav");
        assert_eq!(json["mime"], "audio/wav");
        assert!(json.get("path").is_none());
    }
}
