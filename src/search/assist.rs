use crate::ai::{AiBackend, AiError};
use crate::config::Settings;
use crate::search::{AiContext, Assist, FallbackReason, Outcome, SearchStrategy};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, AiError>
where
    F: Future<Output = Result<T, AiError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(AiError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Collects the AI interpretation and, for semantic strategies, the query
/// embedding. Never fails: every error becomes a `FallbackReason` and the
/// two calls run concurrently under `ai_timeout`.
pub async fn gather<B: AiBackend>(
    backend: Option<&B>,
    query: &str,
    strategy: SearchStrategy,
    settings: &Settings,
) -> Assist {
    let Some(backend) = backend else {
        info!("No API key configured, searching locally");
        return Assist {
            context: Outcome::Unavailable(FallbackReason::MissingApiKey),
            query_embedding: Outcome::Unavailable(FallbackReason::MissingApiKey),
        };
    };

    if query.trim().is_empty() {
        return Assist::local();
    }

    let wants_embedding = strategy != SearchStrategy::Keyword;
    let context_call = bounded(settings.ai_timeout, backend.interpret_query(query));
    let embedding_call = async {
        if wants_embedding {
            Some(bounded(settings.ai_timeout, backend.embed(query)).await)
        } else {
            None
        }
    };
    let (context, embedding) = tokio::join!(context_call, embedding_call);

    let context = match context {
        Ok(interpretation) => Outcome::Ready(AiContext::from_interpretation(interpretation)),
        Err(e) => {
            warn!(error = %e, "Query interpretation failed, falling back to local ranking");
            Outcome::Unavailable(e.into())
        }
    };

    let query_embedding = match embedding {
        None => Outcome::Unavailable(FallbackReason::NotRequested),
        Some(result) => {
            if let Err(e) = &result {
                warn!(error = %e, "Query embedding failed, falling back to keyword ranking");
            }
            Outcome::from_result(result)
        }
    };

    Assist {
        context,
        query_embedding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CompanyProfile, QueryInterpretation};
    use crate::record::{OrganizationRecord, Region};

    /// In-process backend with scripted replies.
    struct FakeBackend {
        interpretation: Option<QueryInterpretation>,
        embedding: Option<Vec<f32>>,
        delay: Duration,
    }

    impl AiBackend for FakeBackend {
        async fn interpret_query(&self, _query: &str) -> Result<QueryInterpretation, AiError> {
            tokio::time::sleep(self.delay).await;
            self.interpretation
                .clone()
                .ok_or(AiError::Status { status: 503, body: "down".to_string() })
        }

        async fn describe_company(&self, _record: &OrganizationRecord) -> Result<CompanyProfile, AiError> {
            Err(AiError::Parse("not scripted".to_string()))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, AiError> {
            tokio::time::sleep(self.delay).await;
            self.embedding.clone().ok_or(AiError::MissingApiKey)
        }

        fn embedding_model(&self) -> &str {
            "fake"
        }
    }

    fn settings(timeout_ms: u64) -> Settings {
        Settings {
            ai_timeout: Duration::from_millis(timeout_ms),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn missing_backend_is_local_only() {
        let assist = gather::<FakeBackend>(None, "עירייה", SearchStrategy::Semantic, &settings(100)).await;
        assert_eq!(assist.context.reason(), Some(&FallbackReason::MissingApiKey));
        assert_eq!(assist.query_embedding.reason(), Some(&FallbackReason::MissingApiKey));
    }

    #[tokio::test]
    async fn keyword_strategy_skips_embedding() {
        let backend = FakeBackend {
            interpretation: Some(QueryInterpretation {
                regions: vec![Region::North],
                ..Default::default()
            }),
            embedding: Some(vec![1.0]),
            delay: Duration::ZERO,
        };
        let assist = gather(Some(&backend), "צפון", SearchStrategy::Keyword, &settings(100)).await;
        assert_eq!(assist.context.ready().unwrap().regions, vec![Region::North]);
        assert_eq!(assist.query_embedding.reason(), Some(&FallbackReason::NotRequested));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = FakeBackend {
            interpretation: Some(QueryInterpretation::default()),
            embedding: Some(vec![1.0]),
            delay: Duration::from_millis(500),
        };
        let assist = gather(Some(&backend), "צפון", SearchStrategy::Semantic, &settings(20)).await;
        assert_eq!(assist.context.reason(), Some(&FallbackReason::Timeout));
        assert_eq!(assist.query_embedding.reason(), Some(&FallbackReason::Timeout));
    }

    #[tokio::test]
    async fn failed_interpretation_keeps_embedding() {
        let backend = FakeBackend {
            interpretation: None,
            embedding: Some(vec![0.5, 0.5]),
            delay: Duration::ZERO,
        };
        let assist = gather(Some(&backend), "בתי ספר", SearchStrategy::Semantic, &settings(100)).await;
        assert_eq!(assist.context.reason(), Some(&FallbackReason::ApiStatus(503)));
        assert_eq!(assist.query_embedding.ready(), Some(&vec![0.5, 0.5]));
    }
}
