use crate::store::RecordStore;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticHit {
    pub position: usize,
    pub similarity: f64,
}

/// dot(a, b) / (|a| |b|). Zero when the lengths differ, a vector is empty or
/// either norm is zero.
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> f64 {
    if lhs.len() != rhs.len() || lhs.is_empty() {
        return 0.0;
    }
    let (dot, norm_l, norm_r) = lhs.iter().zip(rhs.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, nl, nr), (a, b)| {
            let (a, b) = (*a as f64, *b as f64);
            (dot + a * b, nl + a * a, nr + b * b)
        },
    );
    if norm_l < f64::EPSILON || norm_r < f64::EPSILON {
        return 0.0;
    }
    (dot / (norm_l.sqrt() * norm_r.sqrt())).clamp(-1.0, 1.0)
}

/// Records whose stored embedding exceeds `threshold` against the query
/// embedding, best first, at most `limit`. Records without an embedding are
/// skipped.
pub fn semantic_rank(
    store: &RecordStore,
    query_embedding: &[f32],
    threshold: f64,
    limit: usize,
) -> Vec<SemanticHit> {
    if query_embedding.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<SemanticHit> = store
        .records()
        .par_iter()
        .enumerate()
        .filter_map(|(position, record)| {
            let embedding = record.embedding.as_deref()?;
            let similarity = cosine_similarity(query_embedding, embedding);
            (similarity > threshold).then_some(SemanticHit {
                position,
                similarity,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}
