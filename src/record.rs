// orgmap/src/record.rs
use serde::{Deserialize, Serialize};

/// Length of a `text-embedding-3-small` vector.
pub const EMBEDDING_DIMENSION: usize = 1536;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Region {
    #[serde(rename = "צפון")]
    North,
    #[serde(rename = "חיפה")]
    Haifa,
    #[serde(rename = "מרכז")]
    Center,
    #[serde(rename = "ירושלים")]
    Jerusalem,
    #[serde(rename = "דרום")]
    South,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Self::North,
        Self::Haifa,
        Self::Center,
        Self::Jerusalem,
        Self::South,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::North => "צפון",
            Self::Haifa => "חיפה",
            Self::Center => "מרכז",
            Self::Jerusalem => "ירושלים",
            Self::South => "דרום",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s.trim())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CompanyType {
    #[serde(rename = "עירייה")]
    Municipality,
    #[serde(rename = "מועצה אזורית")]
    RegionalCouncil,
    #[serde(rename = "משרד ממשלתי")]
    GovernmentMinistry,
    #[serde(rename = "חברה ממשלתית")]
    GovernmentCompany,
    #[serde(rename = "חברה כלכלית")]
    MunicipalCompany,
    #[serde(rename = "יזם נדל\"ן")]
    RealEstateDeveloper,
    #[serde(rename = "חברת בנייה")]
    ConstructionCompany,
    #[serde(rename = "בית חולים")]
    Hospital,
    #[serde(rename = "מוסד חינוך")]
    EducationInstitution,
    #[serde(rename = "מוסד תרבות")]
    CultureInstitution,
    #[serde(rename = "חברת תשתיות")]
    InfrastructureCompany,
    #[serde(rename = "תאגיד מים")]
    WaterCorporation,
    #[serde(rename = "משרד אדריכלים")]
    ArchitectureFirm,
}

impl CompanyType {
    pub const ALL: [CompanyType; 13] = [
        Self::Municipality,
        Self::RegionalCouncil,
        Self::GovernmentMinistry,
        Self::GovernmentCompany,
        Self::MunicipalCompany,
        Self::RealEstateDeveloper,
        Self::ConstructionCompany,
        Self::Hospital,
        Self::EducationInstitution,
        Self::CultureInstitution,
        Self::InfrastructureCompany,
        Self::WaterCorporation,
        Self::ArchitectureFirm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Municipality => "עירייה",
            Self::RegionalCouncil => "מועצה אזורית",
            Self::GovernmentMinistry => "משרד ממשלתי",
            Self::GovernmentCompany => "חברה ממשלתית",
            Self::MunicipalCompany => "חברה כלכלית",
            Self::RealEstateDeveloper => "יזם נדל\"ן",
            Self::ConstructionCompany => "חברת בנייה",
            Self::Hospital => "בית חולים",
            Self::EducationInstitution => "מוסד חינוך",
            Self::CultureInstitution => "מוסד תרבות",
            Self::InfrastructureCompany => "חברת תשתיות",
            Self::WaterCorporation => "תאגיד מים",
            Self::ArchitectureFirm => "משרד אדריכלים",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s.trim())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Accepts the English tag in any case and the Hebrew adjectives.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "נמוכה" | "נמוך" => Some(Self::Low),
            "medium" | "בינונית" | "בינוני" => Some(Self::Medium),
            "high" | "גבוהה" | "גבוה" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Small,
    Medium,
    Large,
}

impl Scale {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "small" | "קטן" | "קטנה" => Some(Self::Small),
            "medium" | "בינוני" | "בינונית" => Some(Self::Medium),
            "large" | "גדול" | "גדולה" => Some(Self::Large),
            _ => None,
        }
    }
}

/// One organization entry. Enrichment fields are absent on hand-authored data
/// and null when the enrichment call for the record failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRecord {
    pub id: u64,
    pub region: Region,
    pub company_type: CompanyType,
    pub company_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub comment: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub project_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architect_specialties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typical_scale: Option<Scale>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaboration_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_trends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl OrganizationRecord {
    pub fn new(id: u64, name: &str, company_type: CompanyType, region: Region) -> Self {
        Self {
            id,
            region,
            company_type,
            company_name: name.to_string(),
            phone: String::new(),
            website: String::new(),
            comment: String::new(),
            ai_description: None,
            project_types: Vec::new(),
            architect_specialties: Vec::new(),
            complexity: None,
            typical_scale: None,
            collaboration_style: None,
            market_trends: None,
            searchable_text: None,
            embedding: None,
        }
    }

    /// Text used for keyword matching and for the embedding input. Prefers the
    /// stored `searchableText`, otherwise joins the identifying and enrichment
    /// fields.
    pub fn searchable_text(&self) -> String {
        if let Some(text) = self.searchable_text.as_deref() {
            if !text.trim().is_empty() {
                return text.to_string();
            }
        }
        self.compose_searchable_text()
    }

    pub fn compose_searchable_text(&self) -> String {
        let mut parts: Vec<&str> = vec![
            self.company_name.as_str(),
            self.company_type.as_str(),
            self.region.as_str(),
            self.comment.as_str(),
        ];
        if let Some(desc) = &self.ai_description {
            parts.push(desc);
        }
        parts.extend(self.project_types.iter().map(String::as_str));
        parts.extend(self.architect_specialties.iter().map(String::as_str));
        if let Some(style) = &self.collaboration_style {
            parts.push(style);
        }
        if let Some(trends) = &self.market_trends {
            parts.push(trends);
        }
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Specialty-bearing fields: project types, architect specialties and the
    /// company type label.
    pub fn specialty_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.company_type.as_str()];
        parts.extend(self.project_types.iter().map(String::as_str));
        parts.extend(self.architect_specialties.iter().map(String::as_str));
        parts.join(" ")
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetMetadata {
    pub total_companies: usize,
    pub rag_enhanced: bool,
    pub embedding_model: String,
    pub processed_at: String,
}

/// Document form of the data file: the record array plus the closed
/// enumerations and, for enhanced files, generation metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub company_types: Vec<CompanyType>,
    pub companies: Vec<OrganizationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DatasetMetadata>,
}

impl Dataset {
    pub fn from_records(companies: Vec<OrganizationRecord>) -> Self {
        Self {
            regions: Region::ALL.to_vec(),
            company_types: CompanyType::ALL.to_vec(),
            companies,
            metadata: None,
        }
    }
}
