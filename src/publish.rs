use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;

use crate::auth::TokenProvider;
use crate::error::CollectorError;
use crate::logging::JobLog;

const LOG_TAG: &str = "Batch Publisher";

/// Posts the filtered batch to the downstream endpoint with a bearer token.
pub struct Publisher {
    client: ClientWithMiddleware,
    tokens: Arc<dyn TokenProvider>,
    log: Arc<dyn JobLog>,
}

impl Publisher {
    pub fn new(
        client: ClientWithMiddleware,
        tokens: Arc<dyn TokenProvider>,
        log: Arc<dyn JobLog>,
    ) -> Self {
        Self {
            client,
            tokens,
            log,
        }
    }

    pub async fn publish(&self, url: &str, payload: &str) -> Result<(), CollectorError> {
        if payload.is_empty() {
            let err = CollectorError::InvalidArgument("payload must not be null or empty".into());
            self.log.error(LOG_TAG, "JSON payload is null or empty", &err);
            return Err(err);
        }

        // Token failures are logged by the provider itself.
        let token = self.tokens.bearer_token().await?;

        self.log.info(LOG_TAG, &format!("Streaming data to {url}"));
        let req = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string());

        let result = match crate::sources::send(req, url).await {
            Ok((status, bytes)) if status.is_success() => Ok(bytes.len()),
            Ok((status, bytes)) => Err(CollectorError::transport(
                url,
                format!("HTTP {status}: {}", crate::sources::body_excerpt(&bytes)),
            )),
            Err(err) => Err(err),
        };

        match result {
            Ok(len) => {
                self.log.info(
                    LOG_TAG,
                    &format!("Post successful. Response body length: {len}"),
                );
                Ok(())
            }
            Err(err) => {
                self.log
                    .error(LOG_TAG, &format!("Failed to post results: {url}"), &err);
                Err(err)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticToken;
    use super::*;
    use crate::logging::testing::{Level, RecordingLog};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher(log: Arc<RecordingLog>) -> Publisher {
        let http = crate::sources::http_client("https://api.fda.gov").unwrap();
        Publisher::new(http, Arc::new(StaticToken("tkn")), log)
    }

    #[tokio::test]
    async fn posts_payload_with_bearer_token_and_json_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .and(header("authorization", "Bearer tkn"))
            .and(header("content-type", "application/json"))
            .and(body_string("{\"TotalRecords\":0}"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{\"id\":\"1\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let log = Arc::new(RecordingLog::default());
        let url = format!("{}/events", server.uri());
        publisher(log.clone())
            .publish(&url, "{\"TotalRecords\":0}")
            .await
            .unwrap();
        assert!(log.entries(Level::Error).is_empty());
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_before_any_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let log = Arc::new(RecordingLog::default());
        let url = format!("{}/events", server.uri());
        let err = publisher(log.clone()).publish(&url, "").await.unwrap_err();

        assert!(matches!(err, CollectorError::InvalidArgument(_)));
        assert!(err.to_string().contains("payload"));
        assert_eq!(log.entries(Level::Error).len(), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error_logged_with_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .expect(1)
            .mount(&server)
            .await;

        let log = Arc::new(RecordingLog::default());
        let url = format!("{}/events", server.uri());
        let err = publisher(log.clone()).publish(&url, "{}").await.unwrap_err();

        assert!(matches!(err, CollectorError::Transport { .. }));
        let errors = log.entries(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains(&url));
    }
}
