//! Persisted index record.
//!
//! Stored as JSON at a fixed location under the vault root. The file is
//! written atomically (temp file + rename) and is assumed to be owned by a
//! single process. Anything that cannot be read back (missing, unparseable,
//! unknown version) counts as "no index" and triggers a rebuild upstream.

use crate::graph::GraphStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use vaultlink_core::prelude::*;

/// Current on-disk format version
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Serialized form of a [`GraphStore`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub version: u32,
    pub forward_links: BTreeMap<DocPath, BTreeSet<DocPath>>,
    pub back_links: BTreeMap<DocPath, Vec<DocPath>>,
    pub link_details: Vec<LinkDetailRecord>,
    pub aliases: BTreeMap<String, DocPath>,
    pub file_timestamps: BTreeMap<DocPath, f64>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_full_scan: Option<DateTime<Utc>>,
}

/// Detail records for one (source, target) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDetailRecord {
    pub source: DocPath,
    pub target: DocPath,
    pub links: Vec<Link>,
}

/// Bookkeeping stored next to the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub last_updated: DateTime<Utc>,
    pub last_full_scan: Option<DateTime<Utc>>,
}

impl GraphStore {
    /// Snapshot the graph into its persisted form
    pub fn to_record(&self, last_full_scan: Option<DateTime<Utc>>) -> PersistedIndex {
        let mut link_details: Vec<LinkDetailRecord> = self
            .link_details
            .iter()
            .map(|((source, target), links)| LinkDetailRecord {
                source: source.clone(),
                target: target.clone(),
                links: links.clone(),
            })
            .collect();
        link_details.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

        PersistedIndex {
            version: INDEX_FORMAT_VERSION,
            forward_links: self
                .forward_links
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
            back_links: self
                .back_links
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            link_details,
            aliases: self
                .aliases
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            file_timestamps: self
                .file_timestamps
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            last_updated: Utc::now(),
            last_full_scan,
        }
    }

    /// Rebuild a graph from its persisted form
    pub fn from_record(record: PersistedIndex) -> Result<Self> {
        if record.version != INDEX_FORMAT_VERSION {
            return Err(Error::index_corruption(format!(
                "unsupported index version {} (expected {})",
                record.version, INDEX_FORMAT_VERSION
            )));
        }

        let mut graph = GraphStore {
            forward_links: record
                .forward_links
                .into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect(),
            back_links: record.back_links.into_iter().collect(),
            link_details: record
                .link_details
                .into_iter()
                .map(|r| ((r.source, r.target), r.links))
                .collect(),
            aliases: record.aliases.into_iter().collect(),
            file_timestamps: HashMap::new(),
            stems: HashMap::new(),
        };
        for (path, modified) in record.file_timestamps {
            graph.register_document(&path, modified);
        }

        Ok(graph)
    }

    /// Write the index atomically to `path`
    pub async fn save(&self, path: &Path, last_full_scan: Option<DateTime<Utc>>) -> Result<()> {
        let record = self.to_record(last_full_scan);
        let json = serde_json::to_vec_pretty(&record)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, path).await?;

        log::debug!(
            "Saved link index ({} documents) to {}",
            record.file_timestamps.len(),
            path.display()
        );
        Ok(())
    }

    /// Read an index back from `path`.
    ///
    /// Returns `None` when there is no usable index; the reason is logged.
    pub async fn load(path: &Path) -> Option<(Self, IndexMetadata)> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Cannot read link index {}: {}", path.display(), e);
                return None;
            }
        };

        match Self::decode(&bytes) {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                log::warn!("Ignoring link index {}: {}", path.display(), e);
                None
            }
        }
    }

    fn decode(bytes: &[u8]) -> Result<(Self, IndexMetadata)> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::index_corruption(e.to_string()))?;

        // Check the version before the shape, so a newer format is reported as such
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| Error::index_corruption("missing version tag"))?;
        if version != u64::from(INDEX_FORMAT_VERSION) {
            return Err(Error::index_corruption(format!(
                "unsupported index version {}",
                version
            )));
        }

        let record: PersistedIndex = serde_json::from_value(value)
            .map_err(|e| Error::index_corruption(e.to_string()))?;
        let meta = IndexMetadata {
            last_updated: record.last_updated,
            last_full_scan: record.last_full_scan,
        };
        Ok((Self::from_record(record)?, meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(path: &str) -> DocPath {
        DocPath::new(path).unwrap()
    }

    fn sample_graph() -> GraphStore {
        let mut graph = GraphStore::new();
        let docs = [
            ("A.md", "---\naliases: [Alpha]\n---\n[[B]] [[B|b]] [c](sub/C.md)", 1.25),
            ("B.md", "![[A#Top]]", 1700000000.123456),
            ("sub/C.md", "[[Missing]]", 3.0),
        ];
        for (path, _, modified) in docs {
            graph.register_document(&doc(path), modified);
        }
        for (path, text, modified) in docs {
            graph.index_document(&doc(path), text, modified);
        }
        graph
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".vaultlink").join("link-index.json");
        let graph = sample_graph();

        graph.save(&path, Some(Utc::now())).await.unwrap();
        let (loaded, meta) = GraphStore::load(&path).await.unwrap();

        assert_eq!(loaded, graph);
        assert!(meta.last_full_scan.is_some());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_index_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(GraphStore::load(&temp.path().join("nope.json")).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_index_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("link-index.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        assert!(GraphStore::load(&path).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_version_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("link-index.json");
        let mut record = sample_graph().to_record(None);
        record.version = 99;
        tokio::fs::write(&path, serde_json::to_vec(&record).unwrap())
            .await
            .unwrap();

        assert!(GraphStore::load(&path).await.is_none());
        assert!(GraphStore::from_record(record).is_err());
    }

    #[test]
    fn test_record_is_sorted() {
        let record = sample_graph().to_record(None);
        let keys: Vec<_> = record.forward_links.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["A.md", "B.md", "sub/C.md"]);
        assert_eq!(record.link_details[0].source, doc("A.md"));
    }
}
