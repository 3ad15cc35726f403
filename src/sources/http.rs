use serde_json::Value;

use crate::{Row, collector::RowSource};

/// Polls a monitoring endpoint that answers with JSON.
///
/// - A JSON array becomes one row per element
/// - Any other JSON value becomes a single row
/// - Non-2xx responses fail the fetch
pub struct HttpJsonSource {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl HttpJsonSource {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            url: reqwest::Url::parse(url)?,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl RowSource for HttpJsonSource {
    async fn fetch(&self) -> anyhow::Result<Vec<Row>> {
        let body: Value = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rows_from_body(body))
    }
}

pub fn rows_from_body(body: Value) -> Vec<Row> {
    match body {
        Value::Array(rows) => rows,
        other => vec![other],
    }
}
