use thiserror::Error;

/// failures of one request/response cycle. none of them end the session.
///
/// the display text is what ends up in the placeholder bubble.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("브라우저에서 API 키를 찾지 못했습니다.")]
    MissingCredential,
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("ChatGPT 응답이 비어 있습니다.")]
    EmptyReply,
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Decode(String),
}

impl ChatError {
    /// synthesized message for a non-2xx status without a structured error body.
    pub fn http_status(status: u16) -> Self {
        Self::Http {
            status,
            message: format!("OpenAI 응답 오류 ({status})"),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
