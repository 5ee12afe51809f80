/*!
 * Record normalizer
 *
 * Turns one heterogeneous raw row into a canonical [`OperatorRecord`].
 * Parsing never fails: unreadable cells become `None` or `""` and the record
 * is still produced.
 *
 * Score cells come in two locale conventions (`0.8523`, `85,23`) and in
 * several magnitudes (fractions, percentages, values scaled by 1000). The
 * decimal separator is whichever of `.`/`,` appears last; the parsed value is
 * then divided by ten until it falls into `[0, 1]`.
 */

use serde_json::Value;

use crate::data_types::{OperatorRecord, RawRow, ScoreField, SizeClass};
use crate::schema::{CanonicalField, ColumnMap};

/// Normalize one raw row, resolving its own header set
pub fn normalize(row: &RawRow) -> OperatorRecord {
    normalize_with(row, &ColumnMap::from_row(row))
}

/// Normalize a batch of rows; rows sharing a header set reuse one resolution
pub fn normalize_batch(rows: &[RawRow]) -> Vec<OperatorRecord> {
    let mut cached: Option<(Vec<&String>, ColumnMap)> = None;

    rows.iter()
        .map(|row| {
            let mut keys: Vec<&String> = row.keys().collect();
            keys.sort();

            let reuse = matches!(&cached, Some((cached_keys, _)) if *cached_keys == keys);
            if !reuse {
                let map = ColumnMap::from_headers(keys.iter().map(|k| k.as_str()));
                cached = Some((keys, map));
            }

            match &cached {
                Some((_, map)) => normalize_with(row, map),
                None => normalize(row),
            }
        })
        .collect()
}

/// Normalize one raw row through an already-resolved column map
pub fn normalize_with(row: &RawRow, columns: &ColumnMap) -> OperatorRecord {
    let text = |field: CanonicalField| columns.lookup(row, field).map(normalize_text).unwrap_or_default();
    let score = |field: CanonicalField| columns.lookup(row, field).and_then(parse_score);

    let beneficiaries = columns
        .lookup(row, CanonicalField::BeneficiaryCount)
        .and_then(parse_integer);

    OperatorRecord::builder(text(CanonicalField::RegistryNumber), text(CanonicalField::Year))
        .tax_id(text(CanonicalField::TaxId))
        .legal_name(text(CanonicalField::LegalName))
        .score(ScoreField::Composite, score(CanonicalField::Composite))
        .score(ScoreField::Quality, score(CanonicalField::Quality))
        .score(ScoreField::AccessGuarantee, score(CanonicalField::AccessGuarantee))
        .score(ScoreField::MarketSustainability, score(CanonicalField::MarketSustainability))
        .score(ScoreField::ProcessManagement, score(CanonicalField::ProcessManagement))
        .score(ScoreField::LegacyIdas, score(CanonicalField::LegacyIdas))
        .score(ScoreField::LegacyIdef, score(CanonicalField::LegacyIdef))
        .score(ScoreField::LegacyIdeo, score(CanonicalField::LegacyIdeo))
        .score(ScoreField::LegacyIdsb, score(CanonicalField::LegacyIdsb))
        .index_modality(text(CanonicalField::IndexModality))
        .operator_modality(text(CanonicalField::OperatorModality))
        .city(text(CanonicalField::City))
        .state(text(CanonicalField::State))
        .group_flag(text(CanonicalField::GroupFlag))
        .beneficiary_count(beneficiaries)
        .build()
}

/// Render a cell as trimmed text; null becomes `""`
pub fn normalize_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Parse a score cell into `[0, 1]`
pub fn parse_score(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => parse_score_str(s),
        // Native numbers go through the same textual rule so every source
        // lands in the same interval.
        Value::Number(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .and_then(|v| parse_score_str(&v.to_string())),
        _ => None,
    }
}

/// Parse a score written with either decimal convention
pub fn parse_score_str(text: &str) -> Option<f64> {
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }

    let separator = match (raw.rfind(','), raw.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => ',',
        (Some(_), None) => ',',
        _ => '.',
    };

    let numeral: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == separator)
        .collect();
    if !numeral.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let parsed: f64 = numeral.replacen(separator, ".", 1).parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }

    Some(scale_into_unit(parsed))
}

/// Divide by ten until the value is at most one
pub fn scale_into_unit(value: f64) -> f64 {
    let mut scaled = value;
    while scaled > 1.0 {
        scaled /= 10.0;
    }
    scaled
}

/// Parse an integer cell: `.` is a thousands separator, `,` a decimal one,
/// and the result is truncated toward zero.
pub fn parse_integer(value: &Value) -> Option<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let raw = s.trim();
            if raw.is_empty() {
                return None;
            }
            raw.replace('.', "").replacen(',', ".", 1).parse::<f64>().ok()
        }
        _ => None,
    }?;

    if parsed.is_finite() {
        Some(parsed.trunc() as i64)
    } else {
        None
    }
}

/// Size class for a beneficiary count
pub fn compute_size(beneficiary_count: Option<i64>) -> SizeClass {
    SizeClass::from_beneficiaries(beneficiary_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|v| (v - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_score_decimal_conventions() {
        assert!(approx(parse_score_str("0.75"), 0.75));
        assert!(approx(parse_score_str("85,23"), 0.8523));
        assert!(approx(parse_score_str("123"), 0.123));
        assert!(approx(parse_score_str("1.234,56"), 0.123456));
        assert!(approx(parse_score_str("0,5"), 0.5));
        assert!(approx(parse_score_str("1"), 1.0));
        assert!(approx(parse_score_str("100"), 1.0));
    }

    #[test]
    fn test_score_unparseable() {
        assert_eq!(parse_score_str(""), None);
        assert_eq!(parse_score_str("   "), None);
        assert_eq!(parse_score_str("n/a"), None);
        // Two dots survive stripping and make an invalid decimal
        assert_eq!(parse_score_str("1.234.567"), None);
        assert_eq!(parse_score(&Value::Null), None);
        assert_eq!(parse_score(&json!(true)), None);
    }

    #[test]
    fn test_score_native_numbers() {
        assert!(approx(parse_score(&json!(0.42)), 0.42));
        assert!(approx(parse_score(&json!(85.23)), 0.8523));
        assert!(approx(parse_score(&json!(7)), 0.7));
    }

    #[test]
    fn test_integer_parsing() {
        assert_eq!(parse_integer(&json!("12.345")), Some(12_345));
        assert_eq!(parse_integer(&json!("1.234,9")), Some(1_234));
        assert_eq!(parse_integer(&json!(" 87 ")), Some(87));
        assert_eq!(parse_integer(&json!(1500.7)), Some(1_500));
        assert_eq!(parse_integer(&json!("")), None);
        assert_eq!(parse_integer(&json!("abc")), None);
        assert_eq!(parse_integer(&Value::Null), None);
    }

    #[test]
    fn test_compute_size() {
        assert_eq!(compute_size(Some(19_999)), SizeClass::Small);
        assert_eq!(compute_size(Some(20_000)), SizeClass::Medium);
        assert_eq!(compute_size(Some(99_999)), SizeClass::Medium);
        assert_eq!(compute_size(Some(100_000)), SizeClass::Large);
        assert_eq!(compute_size(None), SizeClass::Unknown);
    }

    #[test]
    fn test_normalize_row() {
        let mut row = RawRow::new();
        row.insert("REG_ANS".into(), json!(" 301949 "));
        row.insert("CNPJ".into(), json!("00.000.000/0001-00"));
        row.insert("Razão Social".into(), json!("ODONTO EXEMPLO LTDA"));
        row.insert("Ano".into(), json!(2024));
        row.insert("IDSS".into(), json!("0,8123"));
        row.insert("IDQS".into(), json!("75,5"));
        row.insert("IDGA".into(), Value::Null);
        row.insert("Modalidade".into(), json!("Odontologia de Grupo"));
        row.insert("Qt_Beneficiários".into(), json!("25.000"));
        row.insert("Coluna Extra".into(), json!("ignored"));

        let record = normalize(&row);
        assert_eq!(record.registry_number, "301949");
        assert_eq!(record.year, "2024");
        assert!(approx(record.composite, 0.8123));
        assert!(approx(record.quality, 0.755));
        assert_eq!(record.access_guarantee, None);
        assert_eq!(record.group_flag, "");
        assert_eq!(record.beneficiary_count(), Some(25_000));
        assert_eq!(record.size(), SizeClass::Medium);
    }

    #[test]
    fn test_normalize_batch_mixed_headers() {
        let mut upper = RawRow::new();
        upper.insert("REG_ANS".into(), json!("1"));
        upper.insert("IDSS".into(), json!("0.5"));
        let mut lower = RawRow::new();
        lower.insert("reg_ans".into(), json!("2"));
        lower.insert("idss".into(), json!("0.6"));

        let records = normalize_batch(&[upper.clone(), lower, upper]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].registry_number, "2");
        assert!(approx(records[1].composite, 0.6));
        assert_eq!(records[2].registry_number, "1");
    }
}
