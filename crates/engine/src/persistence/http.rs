use shared::{LocationPatch, LocationRecord, NewLocation, Page};

use super::store::RemoteStore;
use crate::error::StoreError;

const PAGE_SIZE: usize = 100;
/// Guard against a server that keeps handing out `next` links
const MAX_PAGES: usize = 1000;

/// Store backed by the ramp server's REST API
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/api/parking-locations", self.base_url)
    }

    fn record_url(&self, id: i64) -> String {
        format!("{}/api/parking-locations/{}", self.base_url, id)
    }
}

/// Map non-success statuses to errors
async fn check(response: reqwest::Response, id: Option<i64>) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(StoreError::NotFound(id));
        }
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

impl RemoteStore for HttpStore {
    async fn list_records(&self) -> Result<Vec<LocationRecord>, StoreError> {
        let mut records = Vec::new();
        let mut url = format!("{}?page=1&page_size={}", self.collection_url(), PAGE_SIZE);
        for _ in 0..MAX_PAGES {
            let response = check(self.client.get(&url).send().await?, None).await?;
            let page: Page<LocationRecord> = response.json().await?;
            records.extend(page.results);
            match page.next {
                Some(next) => url = next,
                None => return Ok(records),
            }
        }
        tracing::warn!("Stopped listing after {} pages", MAX_PAGES);
        Ok(records)
    }

    async fn create_record(&self, fields: NewLocation) -> Result<LocationRecord, StoreError> {
        let response = self
            .client
            .post(self.collection_url())
            .json(&fields)
            .send()
            .await?;
        Ok(check(response, None).await?.json().await?)
    }

    async fn update_record(
        &self,
        id: i64,
        patch: LocationPatch,
    ) -> Result<LocationRecord, StoreError> {
        let response = self
            .client
            .patch(self.record_url(id))
            .json(&patch)
            .send()
            .await?;
        Ok(check(response, Some(id)).await?.json().await?)
    }

    async fn delete_record(&self, id: i64) -> Result<(), StoreError> {
        let response = self.client.delete(self.record_url(id)).send().await?;
        check(response, Some(id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let store = HttpStore::new("http://localhost:3001/");
        assert_eq!(store.base_url(), "http://localhost:3001");
        assert_eq!(
            store.record_url(7),
            "http://localhost:3001/api/parking-locations/7"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        // Port 9 (discard) is not expected to serve HTTP
        let store = HttpStore::new("http://127.0.0.1:9");
        assert!(matches!(store.list_records().await, Err(StoreError::Http(_))));
    }
}
