//! Persistence for chunk indexes and reports.
//!
//! Chunk indexes are stored as JSON (the format the indexing pipeline
//! exports) or bincode (compact binary). Reports are always pretty JSON.

use crate::error::{EvalError, Result};
use crate::retrieval::ChunkIndex;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default filename for the exported chunk index.
pub const DEFAULT_CHUNKS_FILENAME: &str = "indexed_chunks.json";

/// Save format for chunk indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Save a chunk index, picking the format from the extension.
pub fn save_chunks(index: &ChunkIndex, path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let data = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::to_vec(index)
            .map_err(|e| EvalError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => bincode::encode_to_vec(index, bincode::config::standard())
            .map_err(|e| EvalError::Serialization(e.to_string()))?,
    };

    fs::write(path, &data).map_err(|e| EvalError::io(path, e))
}

/// Load a chunk index, picking the format from the extension.
pub fn load_chunks(path: &Path) -> Result<ChunkIndex> {
    if !path.exists() {
        return Err(EvalError::ChunkIndexNotFound(path.to_path_buf()));
    }

    let data = fs::read(path).map_err(|e| EvalError::io(path, e))?;

    match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::from_slice(&data).map_err(|e| {
            EvalError::Serialization(format!("Failed to parse chunk index {:?}: {}", path, e))
        }),
        SaveFormat::Bincode => {
            let (index, _): (ChunkIndex, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| EvalError::Serialization(e.to_string()))?;
            Ok(index)
        }
    }
}

/// `<dir>/<prefix>_<YYYY-MM-DDTHH-MM-SS>.json`
pub fn report_path(dir: &Path, prefix: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}_{}.json", prefix, at.format("%Y-%m-%dT%H-%M-%S")))
}

/// Write `report` as pretty JSON to a timestamped file under `dir`.
pub fn save_report<T: Serialize>(report: &T, dir: &Path, prefix: &str) -> Result<PathBuf> {
    let path = report_path(dir, prefix, Local::now());
    write_json(report, &path)?;
    Ok(path)
}

/// Write `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| EvalError::Serialization(e.to_string()))?;
    fs::write(path, json).map_err(|e| EvalError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::IndexedChunk;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_index() -> ChunkIndex {
        ChunkIndex::new(vec![
            IndexedChunk {
                content: "A tax group needs resident members.".to_string(),
                page_number: Some(3),
                embedding: vec![0.1, 0.2, 0.3],
                contextual_header: Some("Chapter 4 > Tax groups".to_string()),
                section: Some("Tax groups".to_string()),
            },
            IndexedChunk {
                content: "Rates apply above the threshold.".to_string(),
                page_number: None,
                embedding: vec![0.3, 0.2, 0.1],
                contextual_header: None,
                section: None,
            },
        ])
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunks.json");

        save_chunks(&create_test_index(), &path).unwrap();
        let loaded = load_chunks(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.chunks[0].page_number, Some(3));
        assert!(fs::read_to_string(&path).unwrap().starts_with('['));
    }

    #[test]
    fn test_save_and_load_bincode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("chunks.bin");

        save_chunks(&create_test_index(), &path).unwrap();
        let loaded = load_chunks(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.chunks[1].embedding, vec![0.3, 0.2, 0.1]);
        assert!(loaded.chunks[1].section.is_none());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SaveFormat::from_path(Path::new("a.json")), SaveFormat::Json);
        assert_eq!(SaveFormat::from_path(Path::new("a.bin")), SaveFormat::Bincode);
        assert_eq!(
            SaveFormat::from_path(Path::new("a.bincode")),
            SaveFormat::Bincode
        );
        assert_eq!(SaveFormat::from_path(Path::new("a")), SaveFormat::Json);
    }

    #[test]
    fn test_load_missing_index() {
        let result = load_chunks(Path::new("/nonexistent/chunks.json"));
        assert!(matches!(result, Err(EvalError::ChunkIndexNotFound(_))));
    }

    #[test]
    fn test_report_path_format() {
        let at = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        let path = report_path(Path::new("reports"), "rag_eval", at);
        assert_eq!(path, Path::new("reports/rag_eval_2025-03-09T14-05-07.json"));
    }

    #[test]
    fn test_save_report_creates_directory() {
        let dir = TempDir::new().unwrap();
        let reports = dir.path().join("reports");

        let path = save_report(&serde_json::json!({"summary": {"mrr": 0.5}}), &reports, "test")
            .unwrap();

        assert!(path.starts_with(&reports));
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("test_") && file_name.ends_with(".json"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"mrr\": 0.5"));
    }
}
