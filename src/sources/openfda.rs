use std::sync::Arc;

use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::error::CollectorError;
use crate::logging::JobLog;
use crate::utils::date::query_date;

pub const PAGE_SIZE: usize = 100;
const EVENTS_PATH: &str = "drug/event.json";
const LOG_TAG: &str = "openFDA Fetcher";

/// Why the page loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTermination {
    /// The page offset reached the upstream `meta.results.total`.
    Exhausted,
    /// A response carried no `meta`/`results` sections (or was openFDA's
    /// "no matches" 404). Records gathered before that page are kept.
    NoData,
}

/// Every record fetched for one run, in page order.
#[derive(Debug, Clone)]
pub struct CombinedDataset {
    pub results: Vec<Value>,
    pub pages: usize,
    pub termination: FetchTermination,
}

impl CombinedDataset {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Renders the dataset as one openFDA-shaped document. The meta block is
    /// rebuilt from the accumulated count, not from any upstream total.
    pub fn to_document(&self) -> Value {
        let count = self.results.len();
        json!({
            "meta": {
                "results": {
                    "total": count,
                    "limit": count,
                    "skip": 0,
                }
            },
            "results": self.results,
        })
    }

    pub fn to_json(&self) -> Result<String, CollectorError> {
        Ok(serde_json::to_string(&self.to_document())?)
    }
}

enum PageOutcome {
    Page { total: usize, results: Vec<Value> },
    NoData,
}

pub struct OpenFdaEventClient {
    client: ClientWithMiddleware,
    base: String,
    api_key: Option<String>,
    log: Arc<dyn JobLog>,
}

impl OpenFdaEventClient {
    pub fn new(
        client: ClientWithMiddleware,
        base: impl Into<String>,
        api_key: Option<String>,
        log: Arc<dyn JobLog>,
    ) -> Self {
        Self {
            client,
            base: base.into(),
            api_key: api_key
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            log,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), EVENTS_PATH)
    }

    /// Fetches every page of events received on `report_date`'s day.
    ///
    /// Pages are requested one after another with `skip` advancing by
    /// [`PAGE_SIZE`] until it reaches the upstream total. Any failed page
    /// aborts the whole fetch.
    pub async fn fetch_all(
        &self,
        report_date: OffsetDateTime,
    ) -> Result<CombinedDataset, CollectorError> {
        let day = query_date(report_date)?;
        self.log
            .info(LOG_TAG, &format!("Fetching all data for date: {day}"));

        let mut results: Vec<Value> = Vec::new();
        let mut pages = 0;
        let mut skip = 0;

        let termination = loop {
            let outcome = match self.fetch_page(&day, skip).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.log.error(LOG_TAG, "HTTP error fetching data", &err);
                    return Err(err);
                }
            };

            match outcome {
                PageOutcome::NoData => {
                    self.log.info(LOG_TAG, "No data found in response.");
                    break FetchTermination::NoData;
                }
                PageOutcome::Page {
                    total,
                    results: page,
                } => {
                    pages += 1;
                    self.log.info(
                        LOG_TAG,
                        &format!(
                            "Fetched {} records, skip={skip}, total={total}",
                            page.len()
                        ),
                    );
                    results.extend(page);
                    skip += PAGE_SIZE;
                    if skip >= total {
                        break FetchTermination::Exhausted;
                    }
                }
            }
        };

        self.log.info(
            LOG_TAG,
            &format!("Total records fetched: {}", results.len()),
        );
        Ok(CombinedDataset {
            results,
            pages,
            termination,
        })
    }

    async fn fetch_page(&self, day: &str, skip: usize) -> Result<PageOutcome, CollectorError> {
        let search = format!("receivedate:{day}");
        let limit = PAGE_SIZE.to_string();
        let skip_value = skip.to_string();
        let endpoint = self.endpoint();
        let mut url = Url::parse_with_params(
            &endpoint,
            &[
                ("search", search.as_str()),
                ("limit", limit.as_str()),
                ("skip", skip_value.as_str()),
            ],
        )
        .map_err(|err| CollectorError::InvalidArgument(format!("Invalid openFDA URL {endpoint}: {err}")))?;
        let display_url = url.to_string();
        self.log.info(LOG_TAG, &format!("Requesting: {display_url}"));

        if let Some(key) = self.api_key.as_deref() {
            url.query_pairs_mut().append_pair("api_key", key);
        }

        let (status, bytes) = crate::sources::send(self.client.get(url), &display_url).await?;

        // Only the first page may report an empty day.
        if skip == 0 && status.as_u16() == 404 && is_not_found_body(&bytes) {
            return Ok(PageOutcome::NoData);
        }
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(CollectorError::transport(
                &display_url,
                format!("HTTP {status}: {excerpt}"),
            ));
        }

        let value: Value =
            serde_json::from_slice(&bytes).map_err(|source| CollectorError::MalformedDocument {
                context: format!("openFDA page at skip={skip}"),
                source,
            })?;
        Ok(parse_page(value))
    }
}

fn parse_page(mut value: Value) -> PageOutcome {
    let Some(meta) = value.pointer("/meta/results") else {
        return PageOutcome::NoData;
    };
    let total = meta
        .get("total")
        .and_then(Value::as_u64)
        .map(|t| t as usize)
        .unwrap_or(0);

    match value.get_mut("results").map(Value::take) {
        Some(Value::Array(results)) => PageOutcome::Page { total, results },
        _ => PageOutcome::NoData,
    }
}

// openFDA answers a search with no matches with 404 and an `error` object.
fn is_not_found_body(bytes: &[u8]) -> bool {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v.get("error").cloned())
        .is_some()
}
