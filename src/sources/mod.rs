//! Outbound HTTP client and shared response helpers.

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};

use crate::error::CollectorError;

pub mod openfda;
pub(crate) mod rate_limit;

const ERROR_BODY_MAX_BYTES: usize = 2048;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the outbound client shared by page fetches, the token exchange and
/// the publish call. No retry middleware: a failed request fails the run.
pub fn http_client(openfda_base: &str) -> Result<ClientWithMiddleware, CollectorError> {
    let base_client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("fda-event-collector/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(CollectorError::HttpClientInit)?;

    Ok(ClientBuilder::new(base_client)
        .with(rate_limit::SpacingMiddleware::new(
            rate_limit::RequestSpacer::for_openfda(openfda_base),
        ))
        .build())
}

/// Sends a request and reads its body, mapping every failure to a
/// [`CollectorError::Transport`] for `url`.
pub(crate) async fn send(
    req: RequestBuilder,
    url: &str,
) -> Result<(reqwest::StatusCode, Vec<u8>), CollectorError> {
    let resp = req
        .send()
        .await
        .map_err(|err| CollectorError::transport(url, err.to_string()))?;
    let status = resp.status();
    let bytes = read_limited_body(resp, url).await?;
    Ok((status, bytes))
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    url: &str,
) -> Result<Vec<u8>, CollectorError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|err| CollectorError::transport(url, err.to_string()))?
    {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(CollectorError::transport(
                url,
                format!("Response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"),
            ));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
