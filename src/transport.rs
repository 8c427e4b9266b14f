//! http transports for the completion call.
//!
//! a transport only moves bytes: it posts a json body with a bearer token and
//! hands back status + body text. interpreting the status is `wire::extract_reply`'s job.
//!
//! - native: blocking `ureq` agent, run under `tokio::task::spawn_blocking`.
//! - wasm: `gloo-net` fetch, awaited on the browser event loop.

use std::sync::Arc;

use async_trait::async_trait;
use bevy::log::debug;

use crate::error::ChatError;
use crate::wire::HttpReply;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CompletionTransport: Send + Sync {
    /// `POST url` with `Content-Type: application/json` and `Authorization: Bearer <bearer>`.
    async fn post_json(&self, url: &str, bearer: &str, body: String) -> Result<HttpReply, ChatError>;
}

/// the platform's default transport.
pub fn default_transport() -> Arc<dyn CompletionTransport> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(UreqTransport::default())
    }
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(GlooTransport)
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::UreqTransport;

#[cfg(target_arch = "wasm32")]
pub use web::GlooTransport;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;

    /// ureq agent that reports 4xx/5xx as ordinary responses so the error body can be read.
    #[derive(Clone)]
    pub struct UreqTransport {
        agent: ureq::Agent,
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .into();
            Self { agent }
        }
    }

    impl UreqTransport {
        fn post_blocking(agent: &ureq::Agent, url: &str, bearer: &str, body: String) -> Result<HttpReply, ChatError> {
            let res = agent
                .post(url)
                .header("content-type", "application/json")
                .header("authorization", &format!("Bearer {}", bearer))
                .send(body)
                .map_err(|e| ChatError::Transport(e.to_string()))?;
            let status = res.status().as_u16();
            // ureq 3.1: read body via Body::read_to_string()
            let text = res
                .into_body()
                .read_to_string()
                .map_err(|e| ChatError::Transport(e.to_string()))?;
            Ok(HttpReply { status, body: text })
        }
    }

    #[async_trait]
    impl CompletionTransport for UreqTransport {
        async fn post_json(&self, url: &str, bearer: &str, body: String) -> Result<HttpReply, ChatError> {
            debug!(target: "dinner_chat", "ureq post -> {} (body_len={})", url, body.len());
            let agent = self.agent.clone();
            let url = url.to_string();
            let bearer = bearer.to_string();
            // ureq is blocking; keep it off the async workers
            tokio::task::spawn_blocking(move || UreqTransport::post_blocking(&agent, &url, &bearer, body))
                .await
                .map_err(|e| ChatError::Transport(e.to_string()))?
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use super::*;
    use gloo_net::http::Request;

    #[derive(Clone, Copy, Default)]
    pub struct GlooTransport;

    #[async_trait(?Send)]
    impl CompletionTransport for GlooTransport {
        async fn post_json(&self, url: &str, bearer: &str, body: String) -> Result<HttpReply, ChatError> {
            debug!(target: "dinner_chat", "fetch post -> {} (body_len={})", url, body.len());
            let resp = Request::post(url)
                .header("content-type", "application/json")
                .header("authorization", &format!("Bearer {}", bearer))
                .body(body)
                .map_err(|e| ChatError::Transport(e.to_string()))?
                .send()
                .await
                .map_err(|e| ChatError::Transport(e.to_string()))?;
            let status = resp.status();
            let text = resp.text().await.map_err(|e| ChatError::Transport(e.to_string()))?;
            Ok(HttpReply { status, body: text })
        }
    }
}
