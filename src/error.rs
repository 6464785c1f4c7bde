use thiserror::Error;

/// Failure while talking to the screening API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{url} returned a payload that does not match the expected shape")]
    Contract {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("query parameter `{name}` must be a finite number, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Self::Contract { .. } | Self::InvalidParameter { .. } => false,
        }
    }

    /// Short category label, e.g. for a progress line.
    pub fn kind(&self) -> String {
        match self {
            Self::Transport { .. } => "network error".to_string(),
            Self::Status { status, .. } => format!("HTTP {}", status.as_u16()),
            Self::Contract { .. } => "unexpected payload".to_string(),
            Self::InvalidParameter { .. } => "invalid parameter".to_string(),
        }
    }
}

/// Flatten an error and its causes into one line.
pub fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = Some(error);
    let mut idx = 0;
    while let Some(cause) = current {
        let text = cause.to_string();
        if !text.is_empty() {
            if idx == 0 {
                pieces.push(text);
            } else {
                pieces.push(format!("caused by {text}"));
            }
        }
        current = cause.source();
        idx += 1;
    }

    if pieces.is_empty() {
        format!("{error:?}")
    } else {
        pieces.join(" | ")
    }
}
