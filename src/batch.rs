//! One daily collection run: fetch, persist, extract, persist, filter, publish.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::auth::ClientCredentials;
use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::logging::JobLog;
use crate::publish::Publisher;
use crate::sources::openfda::{FetchTermination, OpenFdaEventClient};
use crate::storage::{ArtifactStore, LocalFileStore, PROCESSED_ARTIFACT, RAW_ARTIFACT};
use crate::transform::extract::EventExtractor;
use crate::transform::filter::FilterChain;
use crate::utils::date::business_date;

const LOG_TAG: &str = "Batch Processor";

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub report_date: OffsetDateTime,
    pub pages_fetched: usize,
    pub upstream_exhausted: bool,
    pub records_fetched: usize,
    pub records_extracted: usize,
    pub records_published: usize,
}

pub struct BatchJob {
    fetcher: OpenFdaEventClient,
    extractor: EventExtractor,
    filters: FilterChain,
    store: Arc<dyn ArtifactStore>,
    publisher: Publisher,
    publish_url: String,
    log: Arc<dyn JobLog>,
}

impl BatchJob {
    pub fn new(
        fetcher: OpenFdaEventClient,
        extractor: EventExtractor,
        filters: FilterChain,
        store: Arc<dyn ArtifactStore>,
        publisher: Publisher,
        publish_url: impl Into<String>,
        log: Arc<dyn JobLog>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            filters,
            store,
            publisher,
            publish_url: publish_url.into(),
            log,
        }
    }

    /// Wires the production collaborators from `config`, sharing one HTTP
    /// client between the fetcher, token exchange and publisher.
    pub fn from_config(
        config: &CollectorConfig,
        log: Arc<dyn JobLog>,
    ) -> Result<Self, CollectorError> {
        let http = crate::sources::http_client(&config.openfda_base)?;
        let tokens = ClientCredentials::new(
            http.clone(),
            config.token_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.demo_mode,
            log.clone(),
        );

        Ok(Self::new(
            OpenFdaEventClient::new(
                http.clone(),
                config.openfda_base.clone(),
                config.openfda_api_key.clone(),
                log.clone(),
            ),
            EventExtractor::new(log.clone()),
            FilterChain::standard(),
            Arc::new(LocalFileStore::new(config.data_dir.clone())),
            Publisher::new(http, Arc::new(tokens), log.clone()),
            config.publish_url.clone(),
            log,
        ))
    }

    pub async fn run(&self) -> Result<RunSummary, CollectorError> {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    /// Runs the batch as if invoked at `now`. The first failing step aborts
    /// the run; artifacts already written stay on disk.
    pub async fn run_at(&self, now: OffsetDateTime) -> Result<RunSummary, CollectorError> {
        self.log.info(LOG_TAG, "Batch processing started");
        match self.execute(now).await {
            Ok(summary) => {
                self.log
                    .info(LOG_TAG, "Batch processing completed successfully");
                Ok(summary)
            }
            Err(err) => {
                self.log.error(LOG_TAG, "Batch processing error", &err);
                Err(err)
            }
        }
    }

    async fn execute(&self, now: OffsetDateTime) -> Result<RunSummary, CollectorError> {
        self.step_started("business date");
        let report_date = business_date(now)?;
        let day = report_date.date();
        self.step_completed("business date");

        self.step_started("fetch");
        let dataset = self.fetcher.fetch_all(report_date).await?;
        let raw = dataset.to_json()?;
        self.step_completed("fetch");

        self.step_started("persist raw");
        self.store.save(RAW_ARTIFACT, day, &raw).await?;
        self.step_completed("persist raw");

        self.step_started("extract");
        let batch = self.extractor.extract(&raw, report_date)?;
        let records_extracted = batch.total_records;
        self.step_completed("extract");

        self.step_started("persist processed");
        let processed = serde_json::to_string(&batch)?;
        self.store.save(PROCESSED_ARTIFACT, day, &processed).await?;
        self.step_completed("persist processed");

        self.step_started("filter");
        let filtered = self.filters.apply(batch);
        self.step_completed("filter");

        self.step_started("publish");
        let payload = serde_json::to_string(&filtered)?;
        self.publisher.publish(&self.publish_url, &payload).await?;
        self.step_completed("publish");

        Ok(RunSummary {
            report_date,
            pages_fetched: dataset.pages,
            upstream_exhausted: dataset.termination == FetchTermination::Exhausted,
            records_fetched: dataset.len(),
            records_extracted,
            records_published: filtered.total_records,
        })
    }

    fn step_started(&self, step: &str) {
        self.log.info(LOG_TAG, &format!("{step}: started"));
    }

    fn step_completed(&self, step: &str) {
        self.log.info(LOG_TAG, &format!("{step}: completed"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::event::EventBatch;
    use crate::logging::testing::{Level, RecordingLog};
    use crate::publish::testing::StaticToken;
    use crate::storage::testing::scratch_dir;
    use serde_json::json;
    use time::macros::{date, datetime};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: OffsetDateTime = datetime!(2024-03-24 01:00 UTC);

    async fn mount_events(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/drug/event.json"))
            .and(query_param("search", "receivedate:20230323"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_publish(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/publish"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(server)
            .await;
    }

    /// Writes through to disk but refuses one artifact prefix.
    struct RefusingStore {
        inner: LocalFileStore,
        refused: &'static str,
    }

    #[async_trait::async_trait]
    impl ArtifactStore for RefusingStore {
        async fn save(
            &self,
            prefix: &str,
            date: time::Date,
            content: &str,
        ) -> Result<std::path::PathBuf, CollectorError> {
            if prefix == self.refused {
                return Err(CollectorError::Storage {
                    path: self.inner.artifact_path(prefix, date)?,
                    source: std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
                });
            }
            self.inner.save(prefix, date, content).await
        }

        async fn load(&self, prefix: &str, date: time::Date) -> Result<String, CollectorError> {
            self.inner.load(prefix, date).await
        }
    }

    fn job(server: &MockServer, store: LocalFileStore, log: Arc<RecordingLog>) -> BatchJob {
        job_with_store(server, Arc::new(store), log)
    }

    fn job_with_store(
        server: &MockServer,
        store: Arc<dyn ArtifactStore>,
        log: Arc<RecordingLog>,
    ) -> BatchJob {
        let http = crate::sources::http_client("https://api.fda.gov").unwrap();
        BatchJob::new(
            OpenFdaEventClient::new(http.clone(), server.uri(), None, log.clone()),
            EventExtractor::new(log.clone()),
            FilterChain::standard(),
            store,
            Publisher::new(http, Arc::new(StaticToken("tkn")), log.clone()),
            format!("{}/publish", server.uri()),
            log,
        )
    }

    async fn published_batch(server: &MockServer) -> EventBatch {
        let requests = server.received_requests().await.unwrap();
        let post = requests
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .expect("publish request");
        serde_json::from_slice(&post.body).expect("published batch")
    }

    #[tokio::test]
    async fn run_persists_snapshots_and_publishes_filtered_batch() {
        let server = MockServer::start().await;
        mount_events(
            &server,
            json!({
                "meta": {"results": {"total": 4}},
                "results": [
                    {"patient": {"patientonsetage": "72", "patientsex": "2"}},
                    {"patient": {"patientonsetage": "45", "patientsex": "1"}},
                    {"patient": {"patientonsetage": "30", "patientsex": "2"}},
                    {"patient": {"patientonsetage": "55", "patientsex": "2"}}
                ]
            }),
        )
        .await;
        mount_publish(&server, 200).await;

        let dir = scratch_dir("batch");
        let store = LocalFileStore::new(&dir);
        let log = Arc::new(RecordingLog::default());
        let summary = job(&server, store.clone(), log.clone())
            .run_at(NOW)
            .await
            .unwrap();

        assert_eq!(summary.report_date, datetime!(2023-03-23 01:00 UTC));
        assert_eq!(summary.records_fetched, 4);
        assert_eq!(summary.records_extracted, 4);
        assert_eq!(summary.records_published, 3);

        let day = date!(2023 - 03 - 23);
        let raw: serde_json::Value =
            serde_json::from_str(&store.load(RAW_ARTIFACT, day).await.unwrap()).unwrap();
        assert_eq!(raw["meta"]["results"]["total"], 4);

        let processed: EventBatch =
            serde_json::from_str(&store.load(PROCESSED_ARTIFACT, day).await.unwrap()).unwrap();
        assert_eq!(processed.total_records, 4);

        let published = published_batch(&server).await;
        assert_eq!(published.total_records, 3);
        assert!(
            published
                .patients
                .unwrap()
                .iter()
                .all(|p| p.sex.as_deref() == Some("2"))
        );
        assert!(log.entries(Level::Error).is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn empty_day_publishes_batch_with_null_patients() {
        let server = MockServer::start().await;
        mount_events(&server, json!({"meta": {"results": {"total": 0}}, "results": []})).await;
        mount_publish(&server, 200).await;

        let dir = scratch_dir("batch-empty");
        let log = Arc::new(RecordingLog::default());
        let summary = job(&server, LocalFileStore::new(&dir), log)
            .run_at(NOW)
            .await
            .unwrap();
        assert_eq!(summary.records_published, 0);

        let requests = server.received_requests().await.unwrap();
        let post = requests
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .expect("publish request");
        let body: serde_json::Value = serde_json::from_slice(&post.body).unwrap();
        assert_eq!(body["TotalRecords"], 0);
        assert!(body["Patients"].is_null());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn publish_failure_keeps_snapshots_and_propagates() {
        let server = MockServer::start().await;
        mount_events(
            &server,
            json!({
                "meta": {"results": {"total": 1}},
                "results": [{"patient": {"patientsex": "2"}}]
            }),
        )
        .await;
        mount_publish(&server, 500).await;

        let dir = scratch_dir("batch-fail");
        let store = LocalFileStore::new(&dir);
        let log = Arc::new(RecordingLog::default());
        let err = job(&server, store.clone(), log.clone())
            .run_at(NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectorError::Transport { .. }));
        let day = date!(2023 - 03 - 23);
        assert!(store.load(RAW_ARTIFACT, day).await.is_ok());
        assert!(store.load(PROCESSED_ARTIFACT, day).await.is_ok());
        // Logged by the publisher, then once more by the run.
        assert_eq!(log.entries(Level::Error).len(), 2);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn processed_snapshot_failure_keeps_raw_and_skips_publish() {
        let server = MockServer::start().await;
        mount_events(
            &server,
            json!({
                "meta": {"results": {"total": 1}},
                "results": [{"patient": {"patientsex": "2"}}]
            }),
        )
        .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = scratch_dir("batch-processed-fail");
        let inner = LocalFileStore::new(&dir);
        let store = RefusingStore {
            inner: inner.clone(),
            refused: PROCESSED_ARTIFACT,
        };
        let log = Arc::new(RecordingLog::default());
        let err = job_with_store(&server, Arc::new(store), log.clone())
            .run_at(NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectorError::Storage { .. }));
        let day = date!(2023 - 03 - 23);
        assert!(dir.join("raw_03232023.json").exists());
        assert!(inner.load(RAW_ARTIFACT, day).await.is_ok());
        assert!(inner.load(PROCESSED_ARTIFACT, day).await.is_err());

        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.method.as_str() != "POST"));
        assert_eq!(log.entries(Level::Error).len(), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drug/event.json"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let dir = scratch_dir("batch-fetch");
        let log = Arc::new(RecordingLog::default());
        let err = job(&server, LocalFileStore::new(&dir), log)
            .run_at(NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectorError::Transport { .. }));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn every_step_logs_start_and_end_markers() {
        let server = MockServer::start().await;
        mount_events(&server, json!({"meta": {"results": {"total": 0}}, "results": []})).await;
        mount_publish(&server, 204).await;

        let dir = scratch_dir("batch-markers");
        let log = Arc::new(RecordingLog::default());
        job(&server, LocalFileStore::new(&dir), log.clone())
            .run_at(NOW)
            .await
            .unwrap();

        let infos: Vec<String> = log
            .entries(Level::Info)
            .into_iter()
            .filter(|e| e.tag == LOG_TAG)
            .map(|e| e.message)
            .collect();
        for step in [
            "business date",
            "fetch",
            "persist raw",
            "extract",
            "persist processed",
            "filter",
            "publish",
        ] {
            assert!(infos.contains(&format!("{step}: started")), "{step} start");
            assert!(infos.contains(&format!("{step}: completed")), "{step} end");
        }

        let _ = std::fs::remove_dir_all(dir);
    }
}
