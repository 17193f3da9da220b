// orgmap/src/enrich/mod.rs
pub mod checkpoint;

use crate::ai::{AiBackend, AiError};
use crate::config::Settings;
use crate::record::{CompanyType, Dataset, DatasetMetadata, OrganizationRecord, Region};
use anyhow::{Context, Result};
use checkpoint::{record_hash, Checkpoint};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Serialize)]
pub struct EnrichmentReport {
    pub total: usize,
    pub enriched: usize,
    pub resumed: usize,
    pub description_failures: usize,
    pub embedding_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordStatus {
    pub described: bool,
    pub embedded: bool,
}

async fn with_retries<T, F, Fut>(retries: u32, delay: Duration, mut call: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(attempt, error = %e, "Retrying API call");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn checkpoint_path(output: &Path) -> PathBuf {
    output.with_extension("checkpoint.jsonl")
}

/// Sequential enrichment batch: one record at a time with a fixed delay
/// between records. Per-record API failures never abort the batch.
pub struct Enricher<'a, B: AiBackend> {
    backend: &'a B,
    settings: &'a Settings,
}

impl<'a, B: AiBackend> Enricher<'a, B> {
    pub fn new(backend: &'a B, settings: &'a Settings) -> Self {
        Self { backend, settings }
    }

    /// Replaces any previous enrichment on `source`. A failed description
    /// leaves the enrichment fields null; a failed embedding leaves
    /// `embedding` null.
    pub async fn enrich_record(&self, source: &OrganizationRecord) -> (OrganizationRecord, RecordStatus) {
        let mut record = strip_enrichment(source);
        let retries = self.settings.enrichment_retries;
        let delay = self.settings.enrichment_delay;

        let described = match with_retries(retries, delay, || self.backend.describe_company(source)).await {
            Ok(profile) => {
                record.ai_description = Some(profile.ai_description);
                record.project_types = profile.project_types;
                record.architect_specialties = profile.architect_specialties;
                record.complexity = profile.complexity;
                record.typical_scale = profile.typical_scale;
                record.collaboration_style = profile.collaboration_style;
                record.market_trends = profile.market_trends;
                record.searchable_text = Some(record.compose_searchable_text());
                true
            }
            Err(e) => {
                warn!(id = source.id, name = %source.company_name, error = %e, "Description failed, keeping record without enrichment");
                record.searchable_text = Some(format!(
                    "{} {} {}",
                    record.company_name,
                    record.company_type.as_str(),
                    record.region.as_str()
                ));
                false
            }
        };

        let text = record.searchable_text();
        let embedded = match with_retries(retries, delay, || self.backend.embed(&text)).await {
            Ok(vector) => {
                record.embedding = Some(vector);
                true
            }
            Err(e) => {
                warn!(id = source.id, name = %source.company_name, error = %e, "Embedding failed, leaving it empty");
                false
            }
        };

        (record, RecordStatus { described, embedded })
    }

    /// Enriches the first `limit` records (all when `None`) and rewrites
    /// `output` with the full result. Finished records are checkpointed next
    /// to `output` and reused by a rerun over the same input.
    pub async fn run(&self, mut dataset: Dataset, output: &Path, limit: Option<usize>) -> Result<EnrichmentReport> {
        let sources: Vec<OrganizationRecord> = match limit {
            Some(n) => dataset.companies.into_iter().take(n).collect(),
            None => dataset.companies,
        };
        let mut checkpoint = Checkpoint::open(&checkpoint_path(output))?;
        let mut report = EnrichmentReport {
            total: sources.len(),
            ..Default::default()
        };
        info!(total = report.total, "Starting enrichment");

        let mut enriched = Vec::with_capacity(sources.len());
        let mut called_api = false;
        for (i, source) in sources.iter().enumerate() {
            let hash = record_hash(source)?;
            if let Some(done) = checkpoint.get(&hash) {
                enriched.push(done.clone());
                report.resumed += 1;
                continue;
            }

            if called_api {
                tokio::time::sleep(self.settings.enrichment_delay).await;
            }
            called_api = true;

            let (record, status) = self.enrich_record(source).await;
            if !status.described {
                report.description_failures += 1;
            }
            if !status.embedded {
                report.embedding_failures += 1;
            }
            report.enriched += 1;
            checkpoint.append(&hash, &record)?;
            enriched.push(record);
            info!(done = i + 1, total = report.total, id = source.id, "Enriched record");
        }

        if dataset.regions.is_empty() {
            dataset.regions = Region::ALL.to_vec();
        }
        if dataset.company_types.is_empty() {
            dataset.company_types = CompanyType::ALL.to_vec();
        }
        dataset.metadata = Some(DatasetMetadata {
            total_companies: enriched.len(),
            rag_enhanced: true,
            embedding_model: self.backend.embedding_model().to_string(),
            processed_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        dataset.companies = enriched;

        write_dataset(output, &dataset)?;
        checkpoint.remove()?;
        info!(
            output = %output.display(),
            enriched = report.enriched,
            resumed = report.resumed,
            description_failures = report.description_failures,
            embedding_failures = report.embedding_failures,
            "Enhanced data saved"
        );
        Ok(report)
    }
}

fn strip_enrichment(source: &OrganizationRecord) -> OrganizationRecord {
    let mut record = OrganizationRecord::new(
        source.id,
        &source.company_name,
        source.company_type,
        source.region,
    );
    record.phone = source.phone.clone();
    record.website = source.website.clone();
    record.comment = source.comment.clone();
    record
}

/// Full rewrite through a sibling temp file, so readers never see a partial
/// dataset.
pub fn write_dataset(output: &Path, dataset: &Dataset) -> Result<()> {
    let tmp = output.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(dataset)?;
    std::fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, output)
        .with_context(|| format!("failed to replace {}", output.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CompanyProfile, QueryInterpretation};
    use crate::record::Complexity;
    use crate::store::RecordStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Describes every record except ids in `fail_describe`; embeds every
    /// text except when `fail_embed` is set.
    struct ScriptedBackend {
        fail_describe: Vec<u64>,
        fail_embed: bool,
        describe_calls: AtomicUsize,
        flaky_first: bool,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                fail_describe: Vec::new(),
                fail_embed: false,
                describe_calls: AtomicUsize::new(0),
                flaky_first: false,
            }
        }
    }

    impl AiBackend for ScriptedBackend {
        async fn interpret_query(&self, _query: &str) -> Result<QueryInterpretation, AiError> {
            Ok(QueryInterpretation::default())
        }

        async fn describe_company(&self, record: &OrganizationRecord) -> Result<CompanyProfile, AiError> {
            let call = self.describe_calls.fetch_add(1, Ordering::SeqCst);
            if self.flaky_first && call == 0 {
                return Err(AiError::Status { status: 429, body: "slow down".to_string() });
            }
            if self.fail_describe.contains(&record.id) {
                return Err(AiError::Parse("not json".to_string()));
            }
            Ok(CompanyProfile {
                ai_description: format!("תיאור עבור {}", record.company_name),
                project_types: vec!["מבני ציבור".to_string()],
                architect_specialties: vec!["תכנון עירוני".to_string()],
                complexity: Some(Complexity::Medium),
                ..Default::default()
            })
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
            if self.fail_embed {
                return Err(AiError::Timeout(10));
            }
            Ok(vec![text.chars().count() as f32, 1.0, 0.5])
        }

        fn embedding_model(&self) -> &str {
            "scripted-embedding"
        }
    }

    fn settings() -> Settings {
        Settings {
            enrichment_delay: Duration::from_millis(1),
            ..Settings::default()
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            OrganizationRecord::new(1, "עיריית רעננה", CompanyType::Municipality, Region::Center),
            OrganizationRecord::new(2, "נתיבי ישראל", CompanyType::GovernmentCompany, Region::Jerusalem),
            OrganizationRecord::new(3, "מקורות", CompanyType::WaterCorporation, Region::North),
        ])
    }

    #[tokio::test]
    async fn enriches_every_record_and_writes_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("map-enhanced.json");
        let backend = ScriptedBackend::new();
        let settings = settings();

        let report = Enricher::new(&backend, &settings)
            .run(dataset(), &output, None)
            .await
            .unwrap();
        assert_eq!(report.enriched, 3);
        assert_eq!(report.description_failures, 0);

        let store = RecordStore::load(&output).unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.fully_embedded());
        assert_eq!(store.embedding_dimension(), Some(3));
        let first = &store.records()[0];
        assert_eq!(first.ai_description.as_deref(), Some("תיאור עבור עיריית רעננה"));
        assert!(first.searchable_text().contains("תכנון עירוני"));
        assert!(!checkpoint_path(&output).exists());

        let raw: Dataset = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let meta = raw.metadata.unwrap();
        assert_eq!(meta.total_companies, 3);
        assert!(meta.rag_enhanced);
        assert_eq!(meta.embedding_model, "scripted-embedding");
    }

    #[tokio::test]
    async fn description_failure_keeps_record_with_null_fields() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let backend = ScriptedBackend {
            fail_describe: vec![2],
            ..ScriptedBackend::new()
        };
        let settings = settings();

        let report = Enricher::new(&backend, &settings)
            .run(dataset(), &output, None)
            .await
            .unwrap();
        assert_eq!(report.description_failures, 1);

        let store = RecordStore::load(&output).unwrap();
        let failed = store.records().iter().find(|r| r.id == 2).unwrap();
        assert!(failed.ai_description.is_none());
        assert!(failed.project_types.is_empty());
        assert!(failed.complexity.is_none());
        assert_eq!(failed.searchable_text(), "נתיבי ישראל חברה ממשלתית ירושלים");
        assert!(failed.has_embedding());
    }

    #[tokio::test]
    async fn embedding_failure_leaves_embedding_null() {
        let backend = ScriptedBackend {
            fail_embed: true,
            ..ScriptedBackend::new()
        };
        let settings = settings();
        let source = OrganizationRecord::new(9, "אוניברסיטת חיפה", CompanyType::EducationInstitution, Region::Haifa);
        let (record, status) = Enricher::new(&backend, &settings).enrich_record(&source).await;
        assert!(status.described);
        assert!(!status.embedded);
        assert!(record.embedding.is_none());
    }

    #[tokio::test]
    async fn failed_call_is_retried_when_configured() {
        let backend = ScriptedBackend {
            flaky_first: true,
            ..ScriptedBackend::new()
        };
        let settings = Settings {
            enrichment_retries: 1,
            ..settings()
        };
        let source = OrganizationRecord::new(4, "תיאטרון הבימה", CompanyType::CultureInstitution, Region::Center);
        let (record, status) = Enricher::new(&backend, &settings).enrich_record(&source).await;
        assert!(status.described);
        assert!(record.ai_description.is_some());
        assert_eq!(backend.describe_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let backend = ScriptedBackend {
            flaky_first: true,
            ..ScriptedBackend::new()
        };
        let settings = settings();
        let source = OrganizationRecord::new(4, "תיאטרון הבימה", CompanyType::CultureInstitution, Region::Center);
        let (_, status) = Enricher::new(&backend, &settings).enrich_record(&source).await;
        assert!(!status.described);
        assert_eq!(backend.describe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn limit_processes_only_first_records() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("trial.json");
        let backend = ScriptedBackend::new();
        let settings = settings();
        let report = Enricher::new(&backend, &settings)
            .run(dataset(), &output, Some(2))
            .await
            .unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(RecordStore::load(&output).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rerun_resumes_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("map-enhanced.json");
        let settings = settings();

        // Simulate an interrupted run that finished record 1.
        let first = dataset().companies[0].clone();
        let backend = ScriptedBackend::new();
        let (done, _) = Enricher::new(&backend, &settings).enrich_record(&first).await;
        let mut cp = Checkpoint::open(&checkpoint_path(&output)).unwrap();
        cp.append(&record_hash(&first).unwrap(), &done).unwrap();

        let backend = ScriptedBackend::new();
        let report = Enricher::new(&backend, &settings)
            .run(dataset(), &output, None)
            .await
            .unwrap();
        assert_eq!(report.resumed, 1);
        assert_eq!(report.enriched, 2);
        assert_eq!(backend.describe_calls.load(Ordering::SeqCst), 2);
        assert_eq!(RecordStore::load(&output).unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_runs_between_records_only() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("map-enhanced.json");
        let backend = ScriptedBackend::new();
        let settings = Settings {
            enrichment_delay: Duration::from_millis(500),
            ..Settings::default()
        };

        let started = tokio::time::Instant::now();
        Enricher::new(&backend, &settings)
            .run(dataset(), &output, None)
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn resumed_records_add_no_delay() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("map-enhanced.json");
        let settings = Settings {
            enrichment_delay: Duration::from_millis(500),
            ..Settings::default()
        };

        let backend = ScriptedBackend::new();
        let mut cp = Checkpoint::open(&checkpoint_path(&output)).unwrap();
        for source in dataset().companies.iter().take(2) {
            let (done, _) = Enricher::new(&backend, &settings).enrich_record(source).await;
            cp.append(&record_hash(source).unwrap(), &done).unwrap();
        }

        let backend = ScriptedBackend::new();
        let started = tokio::time::Instant::now();
        let report = Enricher::new(&backend, &settings)
            .run(dataset(), &output, None)
            .await
            .unwrap();
        assert_eq!(report.resumed, 2);
        assert_eq!(report.enriched, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn previous_enrichment_is_replaced() {
        let backend = ScriptedBackend::new();
        let settings = settings();
        let mut source = OrganizationRecord::new(5, "עיריית אילת", CompanyType::Municipality, Region::South);
        source.market_trends = Some("ישן".to_string());
        source.searchable_text = Some("ישן".to_string());
        let (record, _) = Enricher::new(&backend, &settings).enrich_record(&source).await;
        assert!(record.market_trends.is_none());
        assert_ne!(record.searchable_text.as_deref(), Some("ישן"));
    }
}
