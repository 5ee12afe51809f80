/*!
 * Remote tabular source
 *
 * Reads a whole IDSS table from a PostgREST-style endpoint in a single GET.
 * The HTTP part needs the `remote` feature; response classification and JSON
 * decoding are plain functions so they work (and are tested) without it.
 */

#[cfg(feature = "remote")]
use std::time::Duration;

use serde_json::Value;
#[cfg(feature = "remote")]
use tracing::{debug, info};

use crate::data_types::RawRow;
use crate::error::{IdssError, IngestionFailure, Result};
use crate::reader::RowSource;

/// PostgREST error code for a rejected JWT / role
pub const PGRST_PERMISSION_CODE: &str = "PGRST301";

/// One table behind a PostgREST endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTableSource {
    pub base_url: String,
    pub table: String,
    pub api_key: String,
    /// Column sorted descending on the server; unordered when `None`
    pub order_column: Option<String>,
    pub limit: Option<usize>,
    pub timeout_seconds: u64,
}

impl RemoteTableSource {
    pub fn new(base_url: impl Into<String>, table: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            table: table.into(),
            api_key: api_key.into(),
            order_column: Some("Ano".to_string()),
            limit: None,
            timeout_seconds: 60,
        }
    }

    pub fn with_order_column(mut self, column: Option<String>) -> Self {
        self.order_column = column;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Full request URL
    pub fn request_url(&self) -> String {
        let mut url = format!(
            "{}/rest/v1/{}?select=*",
            self.base_url.trim_end_matches('/'),
            self.table
        );
        if let Some(column) = &self.order_column {
            url.push_str(&format!("&order={}.desc", column));
        }
        if let Some(limit) = self.limit {
            url.push_str(&format!("&limit={}", limit));
        }
        url
    }

    #[cfg(feature = "remote")]
    fn fetch(&self) -> Result<Vec<RawRow>> {
        let url = self.request_url();
        debug!(url = %url, "querying remote table");

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .user_agent(format!("idss-rust/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IdssError::Custom {
                message: format!("Failed to create HTTP client: {}", e),
                suggestion: Some("Check your network configuration".to_string()),
            })?;

        let response = client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| IdssError::unreachable(self.describe(), e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| IdssError::unreachable(self.describe(), e))?;

        let rows = interpret_response(&self.describe(), &self.table, status, &body)?;
        info!(table = %self.table, rows = rows.len(), "fetched remote table");
        Ok(rows)
    }
}

impl RowSource for RemoteTableSource {
    fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        #[cfg(feature = "remote")]
        {
            self.fetch()
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(IdssError::feature_required("remote"))
        }
    }

    fn describe(&self) -> String {
        format!("remote table {}", self.table)
    }
}

/// Turn a status code and body into rows or a classified ingestion error
pub fn interpret_response(source: &str, table: &str, status: u16, body: &str) -> Result<Vec<RawRow>> {
    if (200..300).contains(&status) {
        let rows = parse_json_rows(body)?;
        if rows.is_empty() {
            return Err(IdssError::empty_source(source));
        }
        return Ok(rows);
    }

    let detail = error_detail(body);
    if status == 401 || status == 403 || is_permission_error(body) {
        return Err(IdssError::permission_denied(source, &detail, table));
    }

    Err(IdssError::Ingestion {
        reason: IngestionFailure::HttpStatus(status),
        source_description: source.to_string(),
        message: detail,
        suggestion: Some("Check the table name and the endpoint URL, then reload.".to_string()),
    })
}

/// Decode a JSON array of objects
pub fn parse_json_rows(body: &str) -> Result<Vec<RawRow>> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(items) = value else {
        return Err(IdssError::Ingestion {
            reason: IngestionFailure::MalformedPayload,
            source_description: "JSON payload".to_string(),
            message: "expected a JSON array of rows".to_string(),
            suggestion: None,
        });
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map.into_iter().collect::<RawRow>()),
            _ => None,
        })
        .collect())
}

fn is_permission_error(body: &str) -> bool {
    let code_matches = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(|c| c == PGRST_PERMISSION_CODE))
        .unwrap_or(false);
    let lowered = body.to_lowercase();
    code_matches || lowered.contains("permission") || lowered.contains("policy")
}

/// The `message` field of a PostgREST error body, else the raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(|m| m.to_string()))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url() {
        let source = RemoteTableSource::new("https://db.example.org/", "IDSS_2012_2025", "key").with_limit(Some(5000));
        assert_eq!(
            source.request_url(),
            "https://db.example.org/rest/v1/IDSS_2012_2025?select=*&order=Ano.desc&limit=5000"
        );
    }

    #[test]
    fn test_success_rows() {
        let rows = interpret_response("t", "t", 200, r#"[{"REG_ANS":"1","IDSS":0.5},{"REG_ANS":"2"}]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("IDSS"), Some(&serde_json::json!(0.5)));
    }

    #[test]
    fn test_empty_array_is_empty_result() {
        let err = interpret_response("t", "t", 200, "[]").unwrap_err();
        assert!(matches!(err, IdssError::Ingestion { reason: IngestionFailure::EmptyResult, .. }));
    }

    #[test]
    fn test_permission_classification() {
        let body = r#"{"code":"PGRST301","message":"JWT expired"}"#;
        let err = interpret_response("t", "idss", 400, body).unwrap_err();
        assert!(matches!(err, IdssError::Ingestion { reason: IngestionFailure::PermissionDenied, .. }));
        assert!(err.user_message().contains("CREATE POLICY"));

        let forbidden = interpret_response("t", "idss", 403, "").unwrap_err();
        assert!(matches!(forbidden, IdssError::Ingestion { reason: IngestionFailure::PermissionDenied, .. }));
    }

    #[test]
    fn test_other_status() {
        let err = interpret_response("t", "t", 404, r#"{"message":"relation does not exist"}"#).unwrap_err();
        match err {
            IdssError::Ingestion { reason, message, .. } => {
                assert_eq!(reason, IngestionFailure::HttpStatus(404));
                assert_eq!(message, "relation does not exist");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payload() {
        let err = parse_json_rows(r#"{"not":"an array"}"#).unwrap_err();
        assert!(matches!(err, IdssError::Ingestion { reason: IngestionFailure::MalformedPayload, .. }));
        assert!(parse_json_rows("not json").is_err());
    }

    #[cfg(not(feature = "remote"))]
    #[test]
    fn test_feature_gate() {
        let source = RemoteTableSource::new("https://db.example.org", "t", "k");
        assert!(matches!(source.fetch_rows(), Err(IdssError::FeatureNotEnabled { .. })));
    }
}
