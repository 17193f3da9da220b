use crate::record::OrganizationRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Serialize, Deserialize)]
struct Entry {
    hash: String,
    record: OrganizationRecord,
}

/// Append-only JSON-lines log of finished records, keyed by the hash of the
/// source record, so an interrupted batch resumes where it stopped.
pub struct Checkpoint {
    path: PathBuf,
    done: HashMap<String, OrganizationRecord>,
}

impl Checkpoint {
    pub fn open(path: &Path) -> Result<Self> {
        let mut done = HashMap::new();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("failed to open checkpoint {}", path.display()))?;
            for (line_no, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Entry>(&line) {
                    Ok(entry) => {
                        done.insert(entry.hash, entry.record);
                    }
                    // A crash mid-write leaves a torn last line.
                    Err(e) => warn!(line = line_no + 1, error = %e, "Skipping unreadable checkpoint line"),
                }
            }
            info!(path = %path.display(), records = done.len(), "Resuming from checkpoint");
        }
        Ok(Self {
            path: path.to_path_buf(),
            done,
        })
    }

    pub fn get(&self, hash: &str) -> Option<&OrganizationRecord> {
        self.done.get(hash)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn append(&mut self, hash: &str, record: &OrganizationRecord) -> Result<()> {
        let entry = Entry {
            hash: hash.to_string(),
            record: record.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open checkpoint {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        self.done.insert(entry.hash, entry.record);
        Ok(())
    }

    pub fn remove(self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove checkpoint {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// SHA-256 of the record as read from the source file, hex encoded. Any
/// edit to the source record invalidates its checkpoint entry.
pub fn record_hash(record: &OrganizationRecord) -> Result<String> {
    let digest = Sha256::digest(serde_json::to_vec(record)?);
    Ok(hex::encode(digest))
}
