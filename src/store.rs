use crate::record::{Dataset, OrganizationRecord, EMBEDDING_DIMENSION};
use crate::search::normalize::normalize_text;
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[\]}])").expect("static regex"))
}

/// Removes commas that directly precede a closing bracket or brace.
pub fn strip_trailing_commas(raw: &str) -> Cow<'_, str> {
    trailing_comma_re().replace_all(raw, "$1")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DataFile {
    Records(Vec<OrganizationRecord>),
    Document(Dataset),
}

/// Per-record text, normalized once at load.
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub text: String,
    pub name: String,
    pub company_type: String,
    pub specialties: String,
}

impl IndexedRecord {
    fn build(record: &OrganizationRecord) -> Self {
        Self {
            text: normalize_text(&record.searchable_text()),
            name: normalize_text(&record.company_name),
            company_type: normalize_text(record.company_type.as_str()),
            specialties: normalize_text(&record.specialty_text()),
        }
    }
}

/// Read-only record set. Order is the dataset order and is the tie-break for
/// every ranking.
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<OrganizationRecord>,
    index: Vec<IndexedRecord>,
    embedding_dimension: Option<usize>,
}

/// Reads a data file in either accepted form and checks record ids and
/// embedding lengths.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    parse_dataset(&raw).with_context(|| format!("failed to load data file {}", path.display()))
}

pub fn parse_dataset(raw: &str) -> Result<Dataset> {
    let cleaned = strip_trailing_commas(raw);
    if matches!(cleaned, Cow::Owned(_)) {
        debug!("Stripped trailing commas from data file");
    }
    let parsed: DataFile =
        serde_json::from_str(&cleaned).context("data file is not a valid record array or dataset")?;
    let mut dataset = match parsed {
        DataFile::Records(records) => Dataset::from_records(records),
        DataFile::Document(dataset) => dataset,
    };
    check_records(&mut dataset.companies)?;
    Ok(dataset)
}

/// Rejects duplicate ids and mixed embedding lengths, turns empty embeddings
/// into `None` and returns the shared embedding length.
fn check_records(records: &mut [OrganizationRecord]) -> Result<Option<usize>> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut embedding_dimension: Option<usize> = None;

    for record in records.iter_mut() {
        if !seen.insert(record.id) {
            bail!("duplicate record id {}", record.id);
        }
        if record.embedding.as_ref().is_some_and(Vec::is_empty) {
            record.embedding = None;
        }
        if let Some(embedding) = &record.embedding {
            match embedding_dimension {
                None => embedding_dimension = Some(embedding.len()),
                Some(dim) if dim != embedding.len() => bail!(
                    "record {} has embedding length {}, expected {}",
                    record.id,
                    embedding.len(),
                    dim
                ),
                Some(_) => {}
            }
        }
    }
    Ok(embedding_dimension)
}

impl RecordStore {
    pub fn load(path: &Path) -> Result<Self> {
        let store = Self::from_records(load_dataset(path)?.companies)?;
        info!(
            path = %path.display(),
            records = store.len(),
            embeddings = store.embedded_count(),
            "Loaded record store"
        );
        Ok(store)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Self::from_records(parse_dataset(raw)?.companies)
    }

    pub fn from_records(mut records: Vec<OrganizationRecord>) -> Result<Self> {
        let embedding_dimension = check_records(&mut records)?;
        if let Some(dim) = embedding_dimension.filter(|d| *d != EMBEDDING_DIMENSION) {
            warn!(dimension = dim, expected = EMBEDDING_DIMENSION, "Unexpected embedding dimension");
        }

        let index = records.iter().map(IndexedRecord::build).collect();
        Ok(Self {
            records,
            index,
            embedding_dimension,
        })
    }

    pub fn records(&self) -> &[OrganizationRecord] {
        &self.records
    }

    pub fn index(&self) -> &[IndexedRecord] {
        &self.index
    }

    pub fn get(&self, position: usize) -> Option<&OrganizationRecord> {
        self.records.get(position)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn embedding_dimension(&self) -> Option<usize> {
        self.embedding_dimension
    }

    pub fn embedded_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_embedding()).count()
    }

    pub fn has_embeddings(&self) -> bool {
        self.embedding_dimension.is_some()
    }

    pub fn fully_embedded(&self) -> bool {
        !self.records.is_empty() && self.embedded_count() == self.records.len()
    }
}
