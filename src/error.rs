use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum CollectorError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed JSON document ({context}): {source}")]
    MalformedDocument {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {index} could not be decoded: {source}")]
    RecordDecode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Token exchange failed: {0}")]
    Auth(String),

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Configuration error: {0}\n\nSet the variable, or pass --demo to use the demonstration endpoints."
    )]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollectorError {
    pub(crate) fn transport(url: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: message.into(),
        }
    }
}
