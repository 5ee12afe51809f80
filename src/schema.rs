/*!
 * Column schema for IDSS data files
 *
 * The same dataset circulates with several header spellings (accented or
 * not, upper or lower case, spaces or underscores). This module holds the
 * ordered candidate-key table per canonical field and the deterministic
 * resolver that maps a concrete header set onto it.
 */

use std::collections::HashMap;

use crate::data_types::RawRow;

/// Canonical fields of an [`OperatorRecord`](crate::data_types::OperatorRecord)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    RegistryNumber,
    TaxId,
    LegalName,
    Year,
    Composite,
    Quality,
    AccessGuarantee,
    MarketSustainability,
    ProcessManagement,
    LegacyIdas,
    LegacyIdef,
    LegacyIdeo,
    LegacyIdsb,
    IndexModality,
    OperatorModality,
    City,
    State,
    BeneficiaryCount,
    GroupFlag,
}

impl CanonicalField {
    /// Every canonical field, in record order
    pub const ALL: [CanonicalField; 19] = [
        CanonicalField::RegistryNumber,
        CanonicalField::TaxId,
        CanonicalField::LegalName,
        CanonicalField::Year,
        CanonicalField::Composite,
        CanonicalField::Quality,
        CanonicalField::AccessGuarantee,
        CanonicalField::MarketSustainability,
        CanonicalField::ProcessManagement,
        CanonicalField::LegacyIdas,
        CanonicalField::LegacyIdef,
        CanonicalField::LegacyIdeo,
        CanonicalField::LegacyIdsb,
        CanonicalField::IndexModality,
        CanonicalField::OperatorModality,
        CanonicalField::City,
        CanonicalField::State,
        CanonicalField::BeneficiaryCount,
        CanonicalField::GroupFlag,
    ];

    /// Fields without which a file is almost certainly not an IDSS export
    pub const IDENTITY: [CanonicalField; 2] = [CanonicalField::RegistryNumber, CanonicalField::Year];

    /// Raw header spellings, tried in order
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::RegistryNumber => &["REG_ANS", "reg_ans", "REG_INS", "reg_ins"],
            CanonicalField::TaxId => &["CNPJ", "cnpj"],
            CanonicalField::LegalName => &["Razão Social", "razao_social", "Razao Social"],
            CanonicalField::Year => &["Ano", "ano"],
            CanonicalField::Composite => &["IDSS", "idss"],
            CanonicalField::Quality => &["IDQS", "idqs"],
            CanonicalField::AccessGuarantee => &["IDGA", "idga"],
            CanonicalField::MarketSustainability => &["IDSM", "idsm"],
            CanonicalField::ProcessManagement => &["IDGR", "idgr"],
            CanonicalField::LegacyIdas => &["IDAS", "idas"],
            CanonicalField::LegacyIdef => &["IDEF", "idef"],
            CanonicalField::LegacyIdeo => &["IDEO", "ideo"],
            CanonicalField::LegacyIdsb => &["IDSB", "idsb"],
            CanonicalField::IndexModality => &["modalidade_idss", "Modalidade IDSS"],
            CanonicalField::OperatorModality => &["Modalidade", "modalidade_operadora"],
            CanonicalField::City => &["Cidade", "cidade"],
            CanonicalField::State => &["UF", "uf"],
            CanonicalField::BeneficiaryCount => &["Qt_Beneficiários", "qt_beneficiarios", "Qt Beneficiarios"],
            CanonicalField::GroupFlag => &["Uniodonto", "uniodonto"],
        }
    }

    /// Canonical snake_case name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::RegistryNumber => "registry_number",
            CanonicalField::TaxId => "tax_id",
            CanonicalField::LegalName => "legal_name",
            CanonicalField::Year => "year",
            CanonicalField::Composite => "composite",
            CanonicalField::Quality => "quality",
            CanonicalField::AccessGuarantee => "access_guarantee",
            CanonicalField::MarketSustainability => "market_sustainability",
            CanonicalField::ProcessManagement => "process_management",
            CanonicalField::LegacyIdas => "legacy_idas",
            CanonicalField::LegacyIdef => "legacy_idef",
            CanonicalField::LegacyIdeo => "legacy_ideo",
            CanonicalField::LegacyIdsb => "legacy_idsb",
            CanonicalField::IndexModality => "index_modality",
            CanonicalField::OperatorModality => "operator_modality",
            CanonicalField::City => "city",
            CanonicalField::State => "state",
            CanonicalField::BeneficiaryCount => "beneficiary_count",
            CanonicalField::GroupFlag => "group_flag",
        }
    }
}

/// Fold a header for tolerant comparison: lower case, Portuguese accents
/// removed, and runs of spaces/underscores/hyphens collapsed to one `_`.
pub fn fold_header(header: &str) -> String {
    let mut folded = String::with_capacity(header.len());
    let mut pending_separator = false;

    for ch in header.trim().trim_start_matches('\u{feff}').chars() {
        if ch == ' ' || ch == '_' || ch == '-' || ch == '\t' {
            pending_separator = !folded.is_empty();
            continue;
        }
        if pending_separator {
            folded.push('_');
            pending_separator = false;
        }
        for lower in ch.to_lowercase() {
            folded.push(strip_accent(lower));
        }
    }

    folded
}

fn strip_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Resolved mapping from canonical field to the concrete header carrying it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    columns: HashMap<CanonicalField, String>,
}

impl ColumnMap {
    /// Resolve a header set against the candidate table.
    ///
    /// For each field the first candidate present verbatim wins. Otherwise
    /// the first candidate whose folded form matches a folded header wins,
    /// and among several such headers the lexicographically smallest is used.
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut headers: Vec<String> = headers.into_iter().map(|h| h.as_ref().to_string()).collect();
        headers.sort();
        headers.dedup();

        let folded: Vec<(String, &String)> = headers.iter().map(|h| (fold_header(h), h)).collect();
        let mut columns = HashMap::new();

        for field in CanonicalField::ALL {
            let exact = field
                .candidates()
                .iter()
                .find(|candidate| headers.iter().any(|h| h.as_str() == **candidate));

            if let Some(candidate) = exact {
                columns.insert(field, candidate.to_string());
                continue;
            }

            let tolerant = field.candidates().iter().find_map(|candidate| {
                let target = fold_header(candidate);
                folded.iter().find(|(f, _)| *f == target).map(|(_, h)| (*h).clone())
            });

            if let Some(header) = tolerant {
                columns.insert(field, header);
            }
        }

        Self { columns }
    }

    /// Resolve the header set of one raw row
    pub fn from_row(row: &RawRow) -> Self {
        Self::from_headers(row.keys())
    }

    /// The concrete header for a field, if the source carries it
    pub fn header(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(|s| s.as_str())
    }

    /// Look a field up in a row through this mapping
    pub fn lookup<'a>(&self, row: &'a RawRow, field: CanonicalField) -> Option<&'a serde_json::Value> {
        self.header(field).and_then(|header| row.get(header))
    }

    /// Canonical fields with no matching header
    pub fn missing_fields(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|field| !self.columns.contains_key(field))
            .collect()
    }

    /// Whether the identity columns (registry number and year) were found
    pub fn has_identity_columns(&self) -> bool {
        CanonicalField::IDENTITY.iter().all(|field| self.columns.contains_key(field))
    }
}
