/// Colloquial or inflected query terms and the canonical form they are
/// searched as. Phrases are matched on whole words.
const SYNONYMS: &[(&str, &str)] = &[
    // architecture
    ("אדריכלים", "אדריכל"),
    ("אדריכלית", "אדריכל"),
    ("אדריכליות", "אדריכל"),
    ("architect", "אדריכל"),
    ("architects", "אדריכל"),
    ("architecture", "אדריכלות"),
    ("מתכנן", "תכנון"),
    ("מתכננים", "תכנון"),
    ("planning", "תכנון"),
    ("מעצב", "עיצוב"),
    ("מעצבת", "עיצוב"),
    ("design", "עיצוב"),
    ("נוף", "אדריכלות נוף"),
    ("landscape", "אדריכלות נוף"),
    // organization kinds
    ("עיריות", "עירייה"),
    ("עירית", "עירייה"),
    ("municipality", "עירייה"),
    ("מועצות", "מועצה"),
    ("בתי חולים", "בית חולים"),
    ("hospital", "בית חולים"),
    ("בתי ספר", "חינוך"),
    ("בית ספר", "חינוך"),
    ("school", "חינוך"),
    ("מוסדות תרבות", "תרבות"),
    ("פרויקטי תשתית", "תשתיות"),
    ("תשתית", "תשתיות"),
    ("יזמים", "יזם"),
    ("קבלנים", "בנייה"),
    ("קבלן", "בנייה"),
    ("בניה", "בנייה"),
    // regions, with the locative prefix
    ("בצפון", "צפון"),
    ("north", "צפון"),
    ("בחיפה", "חיפה"),
    ("haifa", "חיפה"),
    ("במרכז", "מרכז"),
    ("center", "מרכז"),
    ("בירושלים", "ירושלים"),
    ("jerusalem", "ירושלים"),
    ("בדרום", "דרום"),
    ("south", "דרום"),
];

/// Canonical architecture tokens and the specialty terms each one stands for.
pub const ARCHITECTURE_TERMS: &[(&str, &[&str])] = &[
    ("אדריכל", &["אדריכל", "תכנון", "עיצוב", "בינוי"]),
    ("אדריכלות", &["אדריכל", "תכנון", "עיצוב", "בינוי"]),
    ("תכנון", &["תכנון", "אדריכל", "תבע"]),
    ("עיצוב", &["עיצוב", "עיצוב פנים"]),
    ("שימור", &["שימור", "שיפוץ"]),
    ("נוף", &["נוף", "פיתוח"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedQuery {
    /// Lower-cased query with punctuation removed, before synonym mapping.
    pub phrase: String,
    /// Words after synonym mapping, in query order, without repeats.
    pub tokens: Vec<String>,
}

impl NormalizedQuery {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Lower-cases, drops quote marks and Hebrew points, turns other punctuation
/// into spaces and collapses whitespace. Record text goes through the same
/// function so both sides compare equal.
pub fn normalize_text(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' | '\'' | '\u{05F3}' | '\u{05F4}' | '`' => {}
            '\u{0591}'..='\u{05C7}' => {}
            c if c.is_alphanumeric() => cleaned.extend(c.to_lowercase()),
            _ => cleaned.push(' '),
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn apply_synonyms(normalized: &str) -> String {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let mut mapped: Vec<&str> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        match synonym_at(&words[i..]) {
            Some((consumed, canonical)) => {
                mapped.push(canonical);
                i += consumed;
            }
            None => {
                mapped.push(words[i]);
                i += 1;
            }
        }
    }
    mapped.join(" ")
}

/// Longest synonym key at the head of `words`, with the number of words it
/// covers.
fn synonym_at(words: &[&str]) -> Option<(usize, &'static str)> {
    SYNONYMS
        .iter()
        .filter_map(|(from, to)| {
            let n = from.split(' ').count();
            (words.len() >= n && words[..n].join(" ") == *from).then_some((n, *to))
        })
        .max_by_key(|(n, _)| *n)
}

pub fn normalize_query(query: &str) -> NormalizedQuery {
    let phrase = normalize_text(query);
    let mapped = apply_synonyms(&phrase);
    let mut tokens: Vec<String> = Vec::new();
    for word in mapped.split_whitespace() {
        if !tokens.iter().any(|t| t == word) {
            tokens.push(word.to_string());
        }
    }
    NormalizedQuery { phrase, tokens }
}

/// Specialty terms for a canonical token, if it is an architecture term.
pub fn architecture_terms(token: &str) -> Option<&'static [&'static str]> {
    ARCHITECTURE_TERMS
        .iter()
        .find(|(key, _)| *key == token)
        .map(|(_, terms)| *terms)
}
