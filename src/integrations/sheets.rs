//! Google Sheets Source
//!
//! Reads the latest sample of each segment from its own spreadsheet through
//! the Sheets v4 `values` endpoint.

use super::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Google Sheets reading source
pub struct SheetsSource {
    client: Client,
    config: SheetsConfig,
}

/// Configuration for the Sheets source
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// API root, e.g. "https://sheets.googleapis.com"
    pub base_url: String,
    /// One spreadsheet ID per segment, in segment order
    pub segment_spreadsheet_ids: Vec<String>,
    /// A1 range holding the samples
    pub range: String,
    /// API key for publicly readable sheets
    pub api_key: Option<String>,
    /// Pre-issued OAuth access token
    pub access_token: Option<String>,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com".to_string(),
            segment_spreadsheet_ids: Vec::new(),
            range: "A2:S5001".to_string(),
            api_key: None,
            access_token: None,
            request_timeout_secs: 15,
        }
    }
}

/// Body of a `spreadsheets.values.get` response
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl SheetsSource {
    /// Create a new Sheets source
    pub fn new(config: SheetsConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("bms-bot/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SheetsConfig {
        &self.config
    }

    fn values_url(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(&self.config.range)
        )
    }

    /// Fetch every row of the configured range
    async fn fetch_rows(&self, spreadsheet_id: &str) -> Result<Vec<Vec<String>>, FetchError> {
        let mut request = self.client.get(self.values_url(spreadsheet_id));

        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorEnvelope>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

/// Sheets returns formatted strings by default but may send raw numbers
fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ReadingSource for SheetsSource {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn fetch_segment(
        &self,
        segment_index: usize,
        cell_count: usize,
    ) -> Result<SegmentSnapshot, FetchError> {
        let spreadsheet_id = self
            .config
            .segment_spreadsheet_ids
            .get(segment_index)
            .ok_or(FetchError::SegmentNotConfigured(segment_index))?;

        tracing::debug!(segment = segment_index, spreadsheet = %spreadsheet_id, "Fetching segment sheet");

        let rows = self.fetch_rows(spreadsheet_id).await?;
        let row = last_non_empty_row(&rows).ok_or(FetchError::NoData(segment_index))?;

        Ok(SegmentSnapshot::from_row(row, cell_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SheetsSource {
        SheetsSource::new(SheetsConfig {
            segment_spreadsheet_ids: vec!["sheet-a".to_string()],
            ..SheetsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_values_url_encodes_range() {
        let url = source().values_url("sheet-a");
        assert_eq!(
            url,
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-a/values/A2%3AS5001"
        );
    }

    #[test]
    fn test_value_range_parsing() {
        let json = r#"{
            "range": "Sheet1!A2:S5001",
            "majorDimension": "ROWS",
            "values": [["12:00 2017-03-01", "3900", 4100], ["12:30 2017-03-01", "3910", null]]
        }"#;
        let body: ValueRange = serde_json::from_str(json).unwrap();
        let rows: Vec<Vec<String>> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect();

        assert_eq!(rows[0], vec!["12:00 2017-03-01", "3900", "4100"]);
        assert_eq!(rows[1][2], "");
    }

    #[test]
    fn test_empty_value_range() {
        let body: ValueRange = serde_json::from_str(r#"{"range": "A2:S5001"}"#).unwrap();
        assert!(body.values.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_segment() {
        let result = source().fetch_segment(3, 18).await;
        assert!(matches!(result, Err(FetchError::SegmentNotConfigured(3))));
    }
}
