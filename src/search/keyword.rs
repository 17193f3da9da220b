// orgmap/src/search/keyword.rs
use crate::record::OrganizationRecord;
use crate::search::normalize::{architecture_terms, NormalizedQuery};
use crate::search::AiContext;
use crate::store::{IndexedRecord, RecordStore};
use rayon::prelude::*;

pub const PHRASE_BONUS: u32 = 100;
pub const TOKEN_BONUS: u32 = 10;
pub const NAME_BONUS: u32 = 20;
pub const TYPE_BONUS: u32 = 15;
pub const SPECIALTY_BONUS: u32 = 25;
pub const AI_CONTEXT_BONUS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordHit {
    /// Position of the record in the store.
    pub position: usize,
    pub score: u32,
}

/// Additive point score of one record. Zero means no match.
pub fn score_record(
    query: &NormalizedQuery,
    record: &OrganizationRecord,
    indexed: &IndexedRecord,
    context: Option<&AiContext>,
) -> u32 {
    if query.is_empty() {
        return 0;
    }

    let mut score = 0;
    if !query.phrase.is_empty() && indexed.text.contains(&query.phrase) {
        score += PHRASE_BONUS;
    }

    for token in &query.tokens {
        if indexed.text.contains(token.as_str()) {
            score += TOKEN_BONUS;
        }
        if indexed.name.contains(token.as_str()) {
            score += NAME_BONUS;
        }
        if indexed.company_type.contains(token.as_str()) {
            score += TYPE_BONUS;
        }
        if let Some(terms) = architecture_terms(token) {
            if terms.iter().any(|term| indexed.specialties.contains(term)) {
                score += SPECIALTY_BONUS;
            }
        }
    }

    // The AI signal only corroborates an existing match.
    if score > 0 && context.is_some_and(|ctx| ctx.corroborates(record, indexed)) {
        score += AI_CONTEXT_BONUS;
    }
    score
}

/// Scores every record, drops zero scores, orders by descending score with
/// dataset order breaking ties, and keeps at most `limit` hits.
pub fn rank(
    store: &RecordStore,
    query: &NormalizedQuery,
    context: Option<&AiContext>,
    limit: usize,
) -> Vec<KeywordHit> {
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<KeywordHit> = store
        .records()
        .par_iter()
        .zip(store.index().par_iter())
        .enumerate()
        .map(|(position, (record, indexed))| KeywordHit {
            position,
            score: score_record(query, record, indexed, context),
        })
        .filter(|hit| hit.score > 0)
        .collect();

    // `sort_by` is stable, so equal scores keep dataset order.
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CompanyType, Region};
    use crate::search::normalize::normalize_query;

    fn store(records: Vec<OrganizationRecord>) -> RecordStore {
        RecordStore::from_records(records).unwrap()
    }

    fn record(id: u64, name: &str, company_type: CompanyType, region: Region) -> OrganizationRecord {
        OrganizationRecord::new(id, name, company_type, region)
    }

    #[test]
    fn empty_query_returns_nothing() {
        let s = store(vec![record(1, "עיריית חיפה", CompanyType::Municipality, Region::Haifa)]);
        assert!(rank(&s, &normalize_query(""), None, 50).is_empty());
        assert!(rank(&s, &normalize_query("  ,. "), None, 50).is_empty());
    }

    #[test]
    fn single_token_bonuses_add_up() {
        // "חיפה" hits the phrase, the text and the name; not the type.
        let s = store(vec![record(1, "עיריית חיפה", CompanyType::Municipality, Region::Haifa)]);
        let q = normalize_query("חיפה");
        let score = score_record(&q, &s.records()[0], &s.index()[0], None);
        assert_eq!(score, PHRASE_BONUS + TOKEN_BONUS + NAME_BONUS);
    }

    #[test]
    fn type_bonus_applies_to_company_type_field() {
        let s = store(vec![record(1, "הדסה", CompanyType::Hospital, Region::Jerusalem)]);
        let q = normalize_query("חולים");
        let score = score_record(&q, &s.records()[0], &s.index()[0], None);
        assert_eq!(score, PHRASE_BONUS + TOKEN_BONUS + TYPE_BONUS);
    }

    #[test]
    fn specialty_bonus_uses_architecture_table() {
        let mut r = record(1, "קבוצת אלון", CompanyType::RealEstateDeveloper, Region::Center);
        r.architect_specialties = vec!["תכנון עירוני".to_string()];
        let s = store(vec![r]);
        let q = normalize_query("אדריכלים");
        let score = score_record(&q, &s.records()[0], &s.index()[0], None);
        // "אדריכל" is absent from the text but maps to "תכנון".
        assert_eq!(score, SPECIALTY_BONUS);
    }

    #[test]
    fn ai_context_bonus_requires_a_match() {
        let s = store(vec![
            record(1, "עיריית עכו", CompanyType::Municipality, Region::North),
            record(2, "תאגיד מי רמת גן", CompanyType::WaterCorporation, Region::Center),
        ]);
        let ctx = AiContext {
            company_types: vec![CompanyType::Municipality, CompanyType::WaterCorporation],
            ..Default::default()
        };
        let q = normalize_query("עכו");
        assert_eq!(
            score_record(&q, &s.records()[0], &s.index()[0], Some(&ctx)),
            PHRASE_BONUS + TOKEN_BONUS + NAME_BONUS + AI_CONTEXT_BONUS
        );
        assert_eq!(score_record(&q, &s.records()[1], &s.index()[1], Some(&ctx)), 0);
    }

    #[test]
    fn zero_scores_are_excluded() {
        let s = store(vec![
            record(1, "עיריית אילת", CompanyType::Municipality, Region::South),
            record(2, "בית החולים סורוקה", CompanyType::Hospital, Region::South),
        ]);
        let hits = rank(&s, &normalize_query("סורוקה"), None, 50);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 1);
    }

    #[test]
    fn ties_keep_dataset_order() {
        let records = (1..=6)
            .map(|i| record(i, &format!("מועצה {i}"), CompanyType::RegionalCouncil, Region::South))
            .collect();
        let s = store(records);
        let hits = rank(&s, &normalize_query("דרום"), None, 50);
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4, 5]);
        assert!(hits.windows(2).all(|w| w[0].score == w[1].score));
    }

    #[test]
    fn output_never_exceeds_limit() {
        let records = (1..=80)
            .map(|i| record(i, &format!("עירייה {i}"), CompanyType::Municipality, Region::Center))
            .collect();
        let s = store(records);
        let q = normalize_query("עירייה");
        assert_eq!(rank(&s, &q, None, 50).len(), 50);
        assert_eq!(rank(&s, &q, None, 3).len(), 3);
        assert!(rank(&s, &q, None, 0).is_empty());
    }

    #[test]
    fn phrase_match_outranks_same_tokens_without_phrase() {
        let mut scattered = record(1, "מרכז ספורט", CompanyType::MunicipalCompany, Region::South);
        scattered.comment = "תכנון אזורי".to_string();
        let mut exact = record(2, "חברה לפיתוח", CompanyType::MunicipalCompany, Region::South);
        exact.comment = "מרכז תכנון".to_string();
        let s = store(vec![scattered, exact]);
        let hits = rank(&s, &normalize_query("מרכז תכנון"), None, 50);
        assert_eq!(hits[0].position, 1);
        assert!(hits[0].score >= PHRASE_BONUS);
    }

    #[test]
    fn architect_in_the_north() {
        let mut firm = record(1, "סטודיו גבעון", CompanyType::ArchitectureFirm, Region::South);
        firm.architect_specialties = vec!["אדריכלות ציבורית".to_string()];
        let s = store(vec![
            record(2, "בית החולים אסותא", CompanyType::Hospital, Region::Center),
            firm,
            record(3, "מועצה אזורית גליל עליון", CompanyType::RegionalCouncil, Region::North),
            record(4, "חברת החשמל", CompanyType::InfrastructureCompany, Region::Haifa),
        ]);
        let hits = rank(&s, &normalize_query("אדריכל בצפון"), None, 50);
        let ids: Vec<u64> = hits.iter().map(|h| s.records()[h.position].id).collect();
        assert_eq!(ids, vec![1, 3]);
        for hit in &hits {
            let r = &s.records()[hit.position];
            assert!(r.region == Region::North || r.company_type == CompanyType::ArchitectureFirm);
        }
    }
}
