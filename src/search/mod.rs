// orgmap/src/search/mod.rs
pub mod assist;
pub mod debounce;
pub mod keyword;
pub mod normalize;
pub mod semantic;

use crate::ai::{AiError, QueryInterpretation};
use crate::config::Settings;
use crate::record::{CompanyType, OrganizationRecord, Region};
use crate::store::{IndexedRecord, RecordStore};
use normalize::{normalize_query, normalize_text};
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    #[default]
    Keyword,
    Semantic,
    Hybrid,
}

impl FromStr for SearchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown strategy '{other}' (keyword, semantic, hybrid)")),
        }
    }
}

/// The ranking that actually produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    Keyword,
    AiAssisted,
    Semantic,
    Hybrid,
}

/// Why an AI-assisted input was not used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NotRequested,
    MissingApiKey,
    Network(String),
    RateLimited,
    ApiStatus(u16),
    BadResponse(String),
    Timeout,
    NoEmbeddings,
    PartialEmbeddings,
    DimensionMismatch { query: usize, store: usize },
}

impl From<AiError> for FallbackReason {
    fn from(err: AiError) -> Self {
        match err {
            AiError::MissingApiKey => Self::MissingApiKey,
            AiError::Http(e) if e.is_timeout() => Self::Timeout,
            AiError::Http(e) => Self::Network(e.to_string()),
            e @ AiError::Status { .. } if e.is_rate_limit() => Self::RateLimited,
            AiError::Status { status, .. } => Self::ApiStatus(status),
            AiError::Parse(msg) => Self::BadResponse(msg),
            AiError::Timeout(_) => Self::Timeout,
        }
    }
}

/// Result of an optional external step, consumed as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    Unavailable(FallbackReason),
}

impl<T> Outcome<T> {
    pub fn from_result<E: Into<FallbackReason>>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ready(value),
            Err(err) => Self::Unavailable(err.into()),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }
}

/// AI interpretation of the query, normalized for matching against records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiContext {
    pub company_types: Vec<CompanyType>,
    pub regions: Vec<Region>,
    pub keywords: Vec<String>,
}

impl AiContext {
    pub fn from_interpretation(interpretation: QueryInterpretation) -> Self {
        Self {
            company_types: interpretation.company_types,
            regions: interpretation.regions,
            keywords: interpretation
                .keywords
                .iter()
                .map(|k| normalize_text(k))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn corroborates(&self, record: &OrganizationRecord, indexed: &IndexedRecord) -> bool {
        self.company_types.contains(&record.company_type)
            || self.regions.contains(&record.region)
            || self.keywords.iter().any(|k| indexed.text.contains(k.as_str()))
    }
}

/// Optional inputs gathered before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Assist {
    pub context: Outcome<AiContext>,
    pub query_embedding: Outcome<Vec<f32>>,
}

impl Assist {
    pub fn local() -> Self {
        Self {
            context: Outcome::Unavailable(FallbackReason::NotRequested),
            query_embedding: Outcome::Unavailable(FallbackReason::NotRequested),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedRecord {
    pub id: u64,
    pub company_name: String,
    pub company_type: CompanyType,
    pub region: Region,
    pub phone: String,
    pub website: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl RankedRecord {
    fn new(record: &OrganizationRecord, keyword_score: Option<u32>, similarity: Option<f64>) -> Self {
        Self {
            id: record.id,
            company_name: record.company_name.clone(),
            company_type: record.company_type,
            region: record.region,
            phone: record.phone.clone(),
            website: record.website.clone(),
            ai_description: record.ai_description.clone(),
            keyword_score,
            similarity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub strategy: SearchStrategy,
    pub path: SearchPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
    pub results: Vec<RankedRecord>,
}

impl SearchResponse {
    pub fn ids(&self) -> Vec<u64> {
        self.results.iter().map(|r| r.id).collect()
    }
}

pub struct SearchEngine<'a> {
    store: &'a RecordStore,
    settings: &'a Settings,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a RecordStore, settings: &'a Settings) -> Self {
        Self { store, settings }
    }

    /// Single decision point between keyword, AI-assisted keyword, semantic
    /// and hybrid ranking. Every unavailable input degrades to keyword search.
    pub fn search(
        &self,
        query: &str,
        strategy: SearchStrategy,
        limit: Option<usize>,
        assist: &Assist,
    ) -> SearchResponse {
        let limit = limit.unwrap_or(self.settings.default_search_limit);
        let normalized = normalize_query(query);
        let respond = |path, fallback, results| SearchResponse {
            query: query.to_string(),
            strategy,
            path,
            fallback,
            results,
        };

        if normalized.is_empty() {
            return respond(SearchPath::Keyword, None, Vec::new());
        }

        let context = assist.context.ready();
        let context_fallback = assist
            .context
            .reason()
            .filter(|r| **r != FallbackReason::NotRequested)
            .cloned();

        let embedding = match strategy {
            SearchStrategy::Keyword => None,
            SearchStrategy::Semantic | SearchStrategy::Hybrid => {
                match (&assist.query_embedding, self.store.has_embeddings()) {
                    (_, false) => Some(Err(FallbackReason::NoEmbeddings)),
                    (Outcome::Unavailable(reason), true) => Some(Err(reason.clone())),
                    (Outcome::Ready(vector), true)
                        if Some(vector.len()) != self.store.embedding_dimension() =>
                    {
                        Some(Err(FallbackReason::DimensionMismatch {
                            query: vector.len(),
                            store: self.store.embedding_dimension().unwrap_or_default(),
                        }))
                    }
                    (Outcome::Ready(vector), true) => Some(Ok(vector.as_slice())),
                }
            }
        };

        match embedding {
            Some(Ok(vector)) => {
                if strategy == SearchStrategy::Hybrid && self.store.fully_embedded() {
                    let results = self.hybrid(&normalized, context, vector, limit);
                    respond(SearchPath::Hybrid, context_fallback, results)
                } else {
                    let fallback = (strategy == SearchStrategy::Hybrid)
                        .then_some(FallbackReason::PartialEmbeddings);
                    respond(SearchPath::Semantic, fallback, self.semantic(vector, limit))
                }
            }
            Some(Err(reason)) => {
                debug!(?reason, "Semantic ranking unavailable, using keyword ranking");
                let (path, results) = self.keyword(&normalized, context, limit);
                respond(path, Some(reason), results)
            }
            None => {
                let (path, results) = self.keyword(&normalized, context, limit);
                respond(path, context_fallback, results)
            }
        }
    }

    fn keyword(
        &self,
        query: &normalize::NormalizedQuery,
        context: Option<&AiContext>,
        limit: usize,
    ) -> (SearchPath, Vec<RankedRecord>) {
        let path = if context.is_some() {
            SearchPath::AiAssisted
        } else {
            SearchPath::Keyword
        };
        let results = keyword::rank(self.store, query, context, limit)
            .into_iter()
            .map(|hit| RankedRecord::new(&self.store.records()[hit.position], Some(hit.score), None))
            .collect();
        (path, results)
    }

    fn semantic(&self, embedding: &[f32], limit: usize) -> Vec<RankedRecord> {
        let cap = limit.min(self.settings.semantic_limit);
        semantic::semantic_rank(self.store, embedding, self.settings.semantic_threshold, cap)
            .into_iter()
            .map(|hit| RankedRecord::new(&self.store.records()[hit.position], None, Some(hit.similarity)))
            .collect()
    }

    /// Keyword hits in keyword order, then semantic-only hits in similarity
    /// order. Scores are reported side by side, never blended.
    fn hybrid(
        &self,
        query: &normalize::NormalizedQuery,
        context: Option<&AiContext>,
        embedding: &[f32],
        limit: usize,
    ) -> Vec<RankedRecord> {
        let keyword_hits = keyword::rank(self.store, query, context, limit);
        let semantic_hits = semantic::semantic_rank(
            self.store,
            embedding,
            self.settings.semantic_threshold,
            self.settings.semantic_limit,
        );

        let similarity_of = |position: usize| {
            semantic_hits
                .iter()
                .find(|h| h.position == position)
                .map(|h| h.similarity)
        };

        let mut seen: HashSet<usize> = HashSet::new();
        let mut results = Vec::with_capacity(limit);
        for hit in &keyword_hits {
            seen.insert(hit.position);
            results.push(RankedRecord::new(
                &self.store.records()[hit.position],
                Some(hit.score),
                similarity_of(hit.position),
            ));
        }
        for hit in &semantic_hits {
            if results.len() >= limit {
                break;
            }
            if seen.insert(hit.position) {
                results.push(RankedRecord::new(
                    &self.store.records()[hit.position],
                    None,
                    Some(hit.similarity),
                ));
            }
        }
        results.truncate(limit);
        results
    }
}
