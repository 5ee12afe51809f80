/*!
 * Data type definitions for IDSS records
 *
 * This module contains the canonical, type-safe representation of one
 * operator-year row of the IDSS (Índice de Desempenho da Saúde Suplementar)
 * dataset, plus the small enums used to name score and category fields.
 */

use serde::Serialize;
use std::collections::HashMap;

/// One raw row as delivered by a source: header name -> cell value
pub type RawRow = HashMap<String, serde_json::Value>;

/// Size classification derived from the beneficiary count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    /// Beneficiary count missing
    #[default]
    Unknown,
}

impl SizeClass {
    /// Classify a beneficiary count. Tier bounds are inclusive on the lower tier.
    pub fn from_beneficiaries(count: Option<i64>) -> Self {
        match count {
            None => SizeClass::Unknown,
            Some(n) if n <= crate::constants::SMALL_SIZE_MAX => SizeClass::Small,
            Some(n) if n <= crate::constants::MEDIUM_SIZE_MAX => SizeClass::Medium,
            Some(_) => SizeClass::Large,
        }
    }

    /// Label used in filter sets and option lists (`""` for unknown)
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Small => "Small",
            SizeClass::Medium => "Medium",
            SizeClass::Large => "Large",
            SizeClass::Unknown => "",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Small" => Some(SizeClass::Small),
            "Medium" => Some(SizeClass::Medium),
            "Large" => Some(SizeClass::Large),
            "" => Some(SizeClass::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named score columns of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ScoreField {
    /// IDSS, the headline index
    Composite,
    /// IDQS
    Quality,
    /// IDGA
    AccessGuarantee,
    /// IDSM
    MarketSustainability,
    /// IDGR
    ProcessManagement,
    LegacyIdas,
    LegacyIdef,
    LegacyIdeo,
    LegacyIdsb,
}

impl ScoreField {
    /// The four structural sub-indices feeding the composite
    pub const STRUCTURAL: [ScoreField; 4] = [
        ScoreField::Quality,
        ScoreField::AccessGuarantee,
        ScoreField::MarketSustainability,
        ScoreField::ProcessManagement,
    ];

    /// Composite followed by the structural sub-indices, in display order
    pub const INDICATORS: [ScoreField; 5] = [
        ScoreField::Composite,
        ScoreField::Quality,
        ScoreField::AccessGuarantee,
        ScoreField::MarketSustainability,
        ScoreField::ProcessManagement,
    ];

    /// Short regulator code for the field
    pub fn code(&self) -> &'static str {
        match self {
            ScoreField::Composite => "IDSS",
            ScoreField::Quality => "IDQS",
            ScoreField::AccessGuarantee => "IDGA",
            ScoreField::MarketSustainability => "IDSM",
            ScoreField::ProcessManagement => "IDGR",
            ScoreField::LegacyIdas => "IDAS",
            ScoreField::LegacyIdef => "IDEF",
            ScoreField::LegacyIdeo => "IDEO",
            ScoreField::LegacyIdsb => "IDSB",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let upper = code.trim().to_ascii_uppercase();
        [
            ScoreField::Composite,
            ScoreField::Quality,
            ScoreField::AccessGuarantee,
            ScoreField::MarketSustainability,
            ScoreField::ProcessManagement,
            ScoreField::LegacyIdas,
            ScoreField::LegacyIdef,
            ScoreField::LegacyIdeo,
            ScoreField::LegacyIdsb,
        ]
        .into_iter()
        .find(|field| field.code() == upper)
    }
}

impl std::fmt::Display for ScoreField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Categorical columns a record can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CategoryField {
    OperatorModality,
    IndexModality,
    Size,
    GroupFlag,
    State,
    Year,
}

impl CategoryField {
    pub fn label(&self) -> &'static str {
        match self {
            CategoryField::OperatorModality => "Modality",
            CategoryField::IndexModality => "Index modality",
            CategoryField::Size => "Size",
            CategoryField::GroupFlag => "Group",
            CategoryField::State => "State",
            CategoryField::Year => "Year",
        }
    }
}

/// Canonical IDSS record: one operator in one evaluation year
///
/// Records are immutable once built. The beneficiary count and the size class
/// are only reachable through getters so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorRecord {
    // Identity
    pub registry_number: String,
    pub tax_id: String,
    pub legal_name: String,
    pub year: String,

    // Scores, each None or within [0, 1]
    pub composite: Option<f64>,
    pub quality: Option<f64>,
    pub access_guarantee: Option<f64>,
    pub market_sustainability: Option<f64>,
    pub process_management: Option<f64>,
    pub legacy_idas: Option<f64>,
    pub legacy_idef: Option<f64>,
    pub legacy_ideo: Option<f64>,
    pub legacy_idsb: Option<f64>,

    // Classification
    pub index_modality: String,
    pub operator_modality: String,
    pub city: String,
    pub state: String,
    pub group_flag: String,

    beneficiary_count: Option<i64>,
    size: SizeClass,
}

impl OperatorRecord {
    /// Start building a record; used by the normalizer and by tests
    pub fn builder(registry_number: impl Into<String>, year: impl Into<String>) -> OperatorRecordBuilder {
        OperatorRecordBuilder::new(registry_number, year)
    }

    pub fn beneficiary_count(&self) -> Option<i64> {
        self.beneficiary_count
    }

    pub fn size(&self) -> SizeClass {
        self.size
    }

    /// Read a score by name
    pub fn score(&self, field: ScoreField) -> Option<f64> {
        match field {
            ScoreField::Composite => self.composite,
            ScoreField::Quality => self.quality,
            ScoreField::AccessGuarantee => self.access_guarantee,
            ScoreField::MarketSustainability => self.market_sustainability,
            ScoreField::ProcessManagement => self.process_management,
            ScoreField::LegacyIdas => self.legacy_idas,
            ScoreField::LegacyIdef => self.legacy_idef,
            ScoreField::LegacyIdeo => self.legacy_ideo,
            ScoreField::LegacyIdsb => self.legacy_idsb,
        }
    }

    /// Read a categorical value by name
    pub fn category(&self, field: CategoryField) -> &str {
        match field {
            CategoryField::OperatorModality => &self.operator_modality,
            CategoryField::IndexModality => &self.index_modality,
            CategoryField::Size => self.size.as_str(),
            CategoryField::GroupFlag => &self.group_flag,
            CategoryField::State => &self.state,
            CategoryField::Year => &self.year,
        }
    }

    /// Whether any structural sub-index is strictly positive
    pub fn has_scored_sub_index(&self) -> bool {
        ScoreField::STRUCTURAL
            .iter()
            .any(|field| self.score(*field).map(|v| v > 0.0).unwrap_or(false))
    }

    /// Composite used for ordering (missing counts as zero)
    pub fn composite_or_zero(&self) -> f64 {
        self.composite.unwrap_or(0.0)
    }

    /// "registry — legal name" label used by search pickers
    pub fn picker_label(&self) -> String {
        format!("{} {} {}", self.registry_number, crate::constants::PICKER_SEPARATOR, self.legal_name)
    }

    /// First two words of the legal name, for chart labels
    pub fn short_name(&self) -> String {
        self.legal_name
            .split_whitespace()
            .take(2)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builder for [`OperatorRecord`]; derives the size class on `build`
#[derive(Debug, Clone, Default)]
pub struct OperatorRecordBuilder {
    registry_number: String,
    tax_id: String,
    legal_name: String,
    year: String,
    scores: HashMap<ScoreField, f64>,
    index_modality: String,
    operator_modality: String,
    city: String,
    state: String,
    group_flag: String,
    beneficiary_count: Option<i64>,
}

impl OperatorRecordBuilder {
    pub fn new(registry_number: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            registry_number: registry_number.into(),
            year: year.into(),
            ..Default::default()
        }
    }

    pub fn tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.tax_id = tax_id.into();
        self
    }

    pub fn legal_name(mut self, name: impl Into<String>) -> Self {
        self.legal_name = name.into();
        self
    }

    /// Set a score; `None` leaves it missing. Values are clamped into [0, 1].
    pub fn score(mut self, field: ScoreField, value: Option<f64>) -> Self {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                self.scores.insert(field, v.clamp(0.0, 1.0));
            }
            None => {
                self.scores.remove(&field);
            }
        }
        self
    }

    pub fn composite(self, value: Option<f64>) -> Self {
        self.score(ScoreField::Composite, value)
    }

    pub fn index_modality(mut self, modality: impl Into<String>) -> Self {
        self.index_modality = modality.into();
        self
    }

    pub fn operator_modality(mut self, modality: impl Into<String>) -> Self {
        self.operator_modality = modality.into();
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn group_flag(mut self, flag: impl Into<String>) -> Self {
        self.group_flag = flag.into();
        self
    }

    pub fn beneficiary_count(mut self, count: Option<i64>) -> Self {
        self.beneficiary_count = count;
        self
    }

    pub fn build(self) -> OperatorRecord {
        let score = |field: ScoreField| self.scores.get(&field).copied();
        OperatorRecord {
            composite: score(ScoreField::Composite),
            quality: score(ScoreField::Quality),
            access_guarantee: score(ScoreField::AccessGuarantee),
            market_sustainability: score(ScoreField::MarketSustainability),
            process_management: score(ScoreField::ProcessManagement),
            legacy_idas: score(ScoreField::LegacyIdas),
            legacy_idef: score(ScoreField::LegacyIdef),
            legacy_ideo: score(ScoreField::LegacyIdeo),
            legacy_idsb: score(ScoreField::LegacyIdsb),
            size: SizeClass::from_beneficiaries(self.beneficiary_count),
            beneficiary_count: self.beneficiary_count,
            registry_number: self.registry_number,
            tax_id: self.tax_id,
            legal_name: self.legal_name,
            year: self.year,
            index_modality: self.index_modality,
            operator_modality: self.operator_modality,
            city: self.city,
            state: self.state,
            group_flag: self.group_flag,
        }
    }
}
