use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use crate::tree::Node;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("failed to list checkpoints in {dir}: {source}")]
    List {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove checkpoint {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid checkpoint json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Numbered snapshots of the partial command tree.
///
/// Files are named `<stem>_tmp_<NNN>.json` next to the template; the zero
/// padding makes the lexicographic sort of the directory listing numeric, so
/// the last candidate is always the freshest one.
pub struct CheckpointStore {
    dir: PathBuf,
    stem: String,
    next_seq: u32,
}

impl CheckpointStore {
    pub fn new(template_path: &Path) -> Self {
        let dir = template_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let stem = template_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("smartir")
            .to_string();
        Self {
            dir,
            stem,
            next_seq: 0,
        }
    }

    fn checkpoint_path(&self, seq: u32) -> PathBuf {
        self.dir.join(format!("{}_tmp_{:03}.json", self.stem, seq))
    }

    /// Sorted checkpoint candidates for this base name.
    fn candidates(&self) -> Result<Vec<PathBuf>, CheckpointError> {
        let prefix = format!("{}_tmp_", self.stem);
        let entries = fs::read_dir(&self.dir).map_err(|source| CheckpointError::List {
            dir: self.dir.clone(),
            source,
        })?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        found.sort();
        Ok(found)
    }

    /// Writes the next numbered snapshot and returns the sequence number used.
    pub fn save(&mut self, commands: &IndexMap<String, Node>) -> Result<u32, CheckpointError> {
        let seq = self.next_seq;
        let path = self.checkpoint_path(seq);
        let json = serde_json::to_string_pretty(commands).map_err(|source| {
            CheckpointError::Json {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, json).map_err(|source| CheckpointError::Write {
            path: path.clone(),
            source,
        })?;
        debug!("wrote checkpoint {}", path.display());
        self.next_seq = seq + 1;
        Ok(seq)
    }

    /// Loads the freshest snapshot, if any, and restores the sequence counter
    /// so later saves continue numbering after it.
    pub fn load_latest(
        &mut self,
    ) -> Result<Option<(IndexMap<String, Node>, u32)>, CheckpointError> {
        let prefix = format!("{}_tmp_", self.stem);
        let last = self
            .candidates()?
            .into_iter()
            .filter_map(|path| {
                let seq = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix(&prefix))
                    .and_then(|n| n.strip_suffix(".json"))
                    .and_then(|n| n.parse::<u32>().ok())?;
                Some((path, seq))
            })
            .last();

        let Some((path, seq)) = last else {
            return Ok(None);
        };

        let file = File::open(&path).map_err(|source| CheckpointError::Read {
            path: path.clone(),
            source,
        })?;
        let commands = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            CheckpointError::Json {
                path: path.clone(),
                source,
            }
        })?;
        self.next_seq = seq + 1;
        Ok(Some((commands, seq)))
    }

    /// Deletes every checkpoint for this base name. Only called after the
    /// final output file has been written successfully.
    pub fn purge(&self) -> Result<(), CheckpointError> {
        for path in self.candidates()? {
            fs::remove_file(&path).map_err(|source| CheckpointError::Remove { path, source })?;
        }
        Ok(())
    }
}
