use crate::error::StoreError;
use crate::row::LogRow;
use crate::store::LogStore;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Configuration for [`ClickHouseStore`].
///
/// The store talks to ClickHouse over HTTP using the `JSONEachRow` format.
#[derive(Clone, Debug)]
pub struct ClickHouseConfig {
    /// Base URL without query, e.g. "http://127.0.0.1:8123"
    pub url: String,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// ClickHouse implementation of [`LogStore`] using the HTTP interface.
///
/// Each batch is sent as one `INSERT ... FORMAT JSONEachRow` request,
/// which ClickHouse applies as a single block.
pub struct ClickHouseStore {
    client: Client,
    config: ClickHouseConfig,
}

impl ClickHouseStore {
    /// Construct a new store using the provided configuration.
    ///
    /// **Parameters**
    /// - `config`: [`ClickHouseConfig`] describing target URL, database,
    ///   table and optional authentication settings.
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    fn auth_query(&self) -> String {
        let mut query = String::new();
        if let Some(user) = &self.config.user {
            query.push_str(&format!("&user={}", urlencoding::encode(user)));
        }
        if let Some(password) = &self.config.password {
            query.push_str(&format!("&password={}", urlencoding::encode(password)));
        }
        query
    }

    fn insert_endpoint(&self) -> String {
        format!(
            "{}/?database={}&query={}{}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.database),
            urlencoding::encode(&format!(
                "INSERT INTO {} FORMAT JSONEachRow",
                self.config.table
            )),
            self.auth_query()
        )
    }

    fn ping_endpoint(&self) -> String {
        format!(
            "{}/?query={}{}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode("SELECT 1"),
            self.auth_query()
        )
    }

    fn body(rows: &[LogRow]) -> Result<String, serde_json::Error> {
        let mut body = String::new();
        for row in rows {
            body.push_str(&serde_json::to_string(&ClickHouseRow::from(row))?);
            body.push('\n');
        }
        Ok(body)
    }
}

#[derive(Serialize)]
struct ClickHouseRow<'a> {
    timestamp: String,
    level: &'a str,
    logger_name: &'a str,
    message: &'a str,
    module: Option<&'a str>,
    function: Option<&'a str>,
    line_number: Option<i32>,
    thread_id: i64,
    thread_name: Option<&'a str>,
    process_id: i32,
    exception: Option<&'a str>,
    extra_data: Option<&'a str>,
    environment: Option<&'a str>,
    hostname: Option<&'a str>,
}

impl<'a> From<&'a LogRow> for ClickHouseRow<'a> {
    fn from(row: &'a LogRow) -> Self {
        ClickHouseRow {
            // DateTime64(6) parses this layout
            timestamp: row.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            level: &row.level,
            logger_name: &row.logger_name,
            message: &row.message,
            module: row.module.as_deref(),
            function: row.function.as_deref(),
            line_number: row.line_number,
            thread_id: row.thread_id,
            thread_name: row.thread_name.as_deref(),
            process_id: row.process_id,
            exception: row.exception.as_deref(),
            extra_data: row.extra_data.as_deref(),
            environment: row.environment.as_deref(),
            hostname: row.hostname.as_deref(),
        }
    }
}

#[async_trait]
impl LogStore for ClickHouseStore {
    async fn connect(&mut self) -> Result<(), StoreError> {
        let resp = self
            .client
            .get(self.ping_endpoint())
            .send()
            .await
            .map_err(|e| StoreError::Connect(Box::new(e)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Connect(
                format!("ClickHouse ping failed with status {}", resp.status()).into(),
            ))
        }
    }

    async fn insert_batch(&mut self, rows: &[LogRow]) -> Result<(), StoreError> {
        let body = Self::body(rows).map_err(|e| StoreError::Insert(Box::new(e)))?;
        let resp = self
            .client
            .post(self.insert_endpoint())
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Insert(Box::new(e)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(StoreError::Insert(
                format!("ClickHouse insert failed with status {}: {}", status, text).into(),
            ))
        }
    }

    fn describe(&self) -> String {
        format!(
            "clickhouse {} ({}.{})",
            self.config.url, self.config.database, self.config.table
        )
    }
}
