//! PostgREST insert store (as exposed by Supabase).

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use examiner_core::error::PersistError;
use examiner_core::model::ResultRecord;
use examiner_core::traits::ResultPersister;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Inserts each record as a row of `table` via `POST {base}/rest/v1/{table}`.
pub struct RestStore {
    base_url: String,
    api_key: String,
    table: String,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

#[async_trait]
impl ResultPersister for RestStore {
    fn name(&self) -> &str {
        "rest"
    }

    #[instrument(skip(self, record), fields(table = %self.table, id = %record.id))]
    async fn persist(&self, record: &ResultRecord) -> Result<(), PersistError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| PersistError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistError::Backend(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_record;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn inserts_one_row() {
        let server = MockServer::start().await;
        let record = sample_record("GC-24015", "7/10");

        Mock::given(method("POST"))
            .and(path("/rest/v1/results"))
            .and(header("apikey", "anon-key"))
            .and(header("Authorization", "Bearer anon-key"))
            .and(header("Prefer", "return=minimal"))
            .and(body_partial_json(serde_json::json!({
                "student_id": "GC-24015",
                "score": "7/10",
                "duration_seconds": 754,
                "track": "literary"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let store = RestStore::new(&format!("{}/", server.uri()), "anon-key", "results");
        store.persist(&record).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_insert_is_a_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let store = RestStore::new(&server.uri(), "anon-key", "results");
        let err = store
            .persist(&sample_record("GC-24015", "7/10"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Backend(ref m) if m.contains("409") && m.contains("duplicate")));
    }
}
