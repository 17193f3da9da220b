use crate::config::Settings;
use crate::record::{CompanyType, Complexity, OrganizationRecord, Region, Scale};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),
}

impl AiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::Status { status: 429, .. })
    }
}

/// The model's reading of a free-text query: which organization kinds,
/// regions and terms the user most likely means.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryInterpretation {
    pub company_types: Vec<CompanyType>,
    pub regions: Vec<Region>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInterpretation {
    #[serde(default)]
    company_types: Vec<String>,
    #[serde(default)]
    regions: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

impl From<RawInterpretation> for QueryInterpretation {
    fn from(raw: RawInterpretation) -> Self {
        Self {
            company_types: raw
                .company_types
                .iter()
                .filter_map(|t| CompanyType::parse_str(t))
                .collect(),
            regions: raw.regions.iter().filter_map(|r| Region::parse_str(r)).collect(),
            keywords: raw.keywords,
        }
    }
}

/// Generated description and tags for one organization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub ai_description: String,
    #[serde(default)]
    pub project_types: Vec<String>,
    #[serde(default)]
    pub architect_specialties: Vec<String>,
    #[serde(default, deserialize_with = "lenient_complexity")]
    pub complexity: Option<Complexity>,
    #[serde(default, deserialize_with = "lenient_scale")]
    pub typical_scale: Option<Scale>,
    #[serde(default)]
    pub collaboration_style: Option<String>,
    #[serde(default)]
    pub market_trends: Option<String>,
}

// Unrecognised tags drop only the tag, never the rest of the profile.
fn lenient_tag<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_complexity<'de, D>(deserializer: D) -> Result<Option<Complexity>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_tag(deserializer)?.and_then(|s| Complexity::parse_str(&s)))
}

fn lenient_scale<'de, D>(deserializer: D) -> Result<Option<Scale>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_tag(deserializer)?.and_then(|s| Scale::parse_str(&s)))
}

/// Generative and embedding calls the search and enrichment paths depend on.
pub trait AiBackend: Sync {
    fn interpret_query(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<QueryInterpretation, AiError>> + Send;

    fn describe_company(
        &self,
        record: &OrganizationRecord,
    ) -> impl Future<Output = Result<CompanyProfile, AiError>> + Send;

    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, AiError>> + Send;

    fn embedding_model(&self) -> &str;
}

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    api_base: String,
    chat_model: String,
    embedding_model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, AiError> {
        let api_key = settings.api_key.clone().ok_or(AiError::MissingApiKey)?;
        Ok(Self {
            api_key,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            client: reqwest::Client::new(),
        })
    }

    async fn chat_json(&self, prompt: &str, max_tokens: u32) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": self.chat_model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.3,
            "max_tokens": max_tokens,
        });
        debug!(model = %self.chat_model, "Calling chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| extract_json_object(&content).to_string())
            .ok_or_else(|| AiError::Parse("empty completion".to_string()))
    }
}

impl AiBackend for OpenAiClient {
    async fn interpret_query(&self, query: &str) -> Result<QueryInterpretation, AiError> {
        let content = self.chat_json(&interpretation_prompt(query), 300).await?;
        let raw: RawInterpretation =
            serde_json::from_str(&content).map_err(|e| AiError::Parse(e.to_string()))?;
        Ok(raw.into())
    }

    async fn describe_company(&self, record: &OrganizationRecord) -> Result<CompanyProfile, AiError> {
        let content = self.chat_json(&profile_prompt(record), 1000).await?;
        serde_json::from_str(&content).map_err(|e| AiError::Parse(e.to_string()))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let url = format!("{}/embeddings", self.api_base);
        let body = json!({ "model": self.embedding_model, "input": text });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AiError::Parse("no embedding in response".to_string()))
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

/// Models sometimes wrap the JSON in prose or a code fence; keep the outermost
/// object.
fn extract_json_object(content: &str) -> &str {
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content.trim(),
    }
}

fn interpretation_prompt(query: &str) -> String {
    let types = CompanyType::ALL.map(|t| t.as_str()).join(", ");
    let regions = Region::ALL.map(|r| r.as_str()).join(", ");
    format!(
        "A user is searching a directory of Israeli organizations that commission \
         architectural work. Query: \"{query}\"\n\n\
         Organization types: {types}\n\
         Regions: {regions}\n\n\
         Reply with JSON only:\n\
         {{\"companyTypes\": [types from the list], \"regions\": [regions from the list], \
         \"keywords\": [short Hebrew search terms]}}"
    )
}

fn profile_prompt(record: &OrganizationRecord) -> String {
    let comment = if record.comment.trim().is_empty() {
        "N/A"
    } else {
        record.comment.as_str()
    };
    format!(
        "Organization: {name}\nType: {kind}\nRegion: {region}\nComment: {comment}\n\n\
         This Israeli organization may commission architectural work. In Hebrew, describe \
         the architectural projects it likely needs, the architect specializations that \
         matter to it, typical complexity and scale, how architects usually work with it, \
         and current market trends for its sector.\n\n\
         Reply with JSON only:\n\
         {{\"aiDescription\": \"...\", \"projectTypes\": [\"...\"], \
         \"architectSpecialties\": [\"...\"], \"complexity\": \"low|medium|high\", \
         \"typicalScale\": \"small|medium|large\", \"collaborationStyle\": \"...\", \
         \"marketTrends\": \"...\"}}",
        name = record.company_name,
        kind = record.company_type.as_str(),
        region = record.region.as_str(),
    )
}
