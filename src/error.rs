use thiserror::Error;

/// Process exit code carried out of a command without being reported as a failure.
///
/// Produced by `pipeline watch --exit-status`; `main` translates it into the
/// process exit code and prints nothing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("exit status {code}")]
pub struct ExitError {
    pub code: i32,
}

impl ExitError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

#[derive(Error, Debug)]
pub enum GfError {
    #[error("authentication required: run `gf auth login`")]
    Unauthorized,

    #[error("permission denied")]
    Forbidden,

    #[error("token is invalid or expired")]
    TokenInvalid,

    #[error("not found")]
    NotFound,

    #[error("method not allowed for this resource")]
    MethodNotAllowed,

    #[error("network error: {0}")]
    Network(String),

    #[error("request blocked by anti-bot protection")]
    AntiBotBlock,

    #[error("{}", api_error_message(*status, message.as_deref(), request_id.as_deref()))]
    Api {
        status: u16,
        message: Option<String>,
        request_id: Option<String>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server returned an empty body")]
    EmptyBody,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Exit(#[from] ExitError),
}

fn api_error_message(status: u16, message: Option<&str>, request_id: Option<&str>) -> String {
    let mut text = format!("API error (HTTP {status})");
    if let Some(message) = message {
        text.push_str(": ");
        text.push_str(message);
    }
    if let Some(id) = request_id {
        text.push_str(&format!(" [request id: {id}]"));
    }
    text
}

impl GfError {
    #[cfg(test)]
    pub fn api(status: u16, message: Option<String>) -> Self {
        GfError::Api {
            status,
            message,
            request_id: None,
        }
    }

    #[cfg(test)]
    /// HTTP status this error stands for, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GfError::Unauthorized => Some(401),
            GfError::Forbidden | GfError::TokenInvalid | GfError::AntiBotBlock => Some(403),
            GfError::NotFound => Some(404),
            GfError::MethodNotAllowed => Some(405),
            GfError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn api_status(&self) -> Option<u16> {
        match self {
            GfError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GfError::Unauthorized) || self.api_status() == Some(401)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, GfError::Forbidden) || self.api_status() == Some(403)
    }

    pub fn is_token_invalid(&self) -> bool {
        matches!(self, GfError::TokenInvalid)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GfError::NotFound) || self.api_status() == Some(404)
    }

    pub fn is_method_not_allowed(&self) -> bool {
        matches!(self, GfError::MethodNotAllowed) || self.api_status() == Some(405)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, GfError::Network(_))
    }

    pub fn is_anti_bot_block(&self) -> bool {
        matches!(self, GfError::AntiBotBlock)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GfError::Cancelled)
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, GfError::DeadlineExceeded)
    }

    /// Conditions under which the server is not believed to have seen the request.
    pub fn is_retriable(&self) -> bool {
        self.is_network() || self.is_anti_bot_block()
    }
}

impl From<reqwest::Error> for GfError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return GfError::Network(format!("failed to read response body: {err}"));
        }
        GfError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GfError>;

/// Finds the first taxonomy error in a wrapped error chain.
pub fn find(err: &anyhow::Error) -> Option<&GfError> {
    err.chain().find_map(|cause| cause.downcast_ref::<GfError>())
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    find(err).is_some_and(GfError::is_not_found)
}

pub fn is_token_invalid(err: &anyhow::Error) -> bool {
    find(err).is_some_and(GfError::is_token_invalid)
}

pub fn is_unauthorized(err: &anyhow::Error) -> bool {
    find(err).is_some_and(GfError::is_unauthorized)
}

pub fn is_forbidden(err: &anyhow::Error) -> bool {
    find(err).is_some_and(GfError::is_forbidden)
}

pub fn is_method_not_allowed(err: &anyhow::Error) -> bool {
    find(err).is_some_and(GfError::is_method_not_allowed)
}

/// Exit code requested by a command, looked up through any wrapping.
pub fn exit_code(err: &anyhow::Error) -> Option<i32> {
    err.chain().find_map(|cause| {
        if let Some(exit) = cause.downcast_ref::<ExitError>() {
            return Some(exit.code);
        }
        match cause.downcast_ref::<GfError>() {
            Some(GfError::Exit(exit)) => Some(exit.code),
            _ => None,
        }
    })
}
