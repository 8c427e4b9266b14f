//! chat configuration: endpoint, model, sampling and the fixed widget texts.
//!
//! the credential is captured at build time (`OPENAI_API_KEY`), the same way a
//! bundled web page bakes its env in. `LLM_BASE_URL` / `LLM_MODEL` override the
//! endpoint base and model at build time too.

use bevy::prelude::Resource;
use serde::Deserialize;

use crate::status::ApiStatus;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.8;
pub const DEFAULT_MAX_TOKENS: u32 = 320;

pub const SYSTEM_PROMPT: &str = concat!(
    "당신은 저녁 메뉴를 추천하는 셰프이자 소믈리에입니다. ",
    "추천은 한국어로 작성하고, 2~3개의 메인 메뉴와 가벼운 곁들임/음료를 짧게 제안하세요. ",
    "기온, 날씨, 기분과 같은 맥락을 반영하고, 각 메뉴에 간단한 이유를 덧붙이세요.",
);
pub const USER_PREFIX: &str = "요청 내용: ";
pub const GREETING: &str = "원하는 분위기나 재료를 알려주시면 메뉴를 추천해 드릴게요!";
pub const THINKING: &str = "메뉴 아이디어를 가다듬는 중이에요...";
pub const GENERIC_FAILURE: &str = "추천을 불러오지 못했습니다.";

/// provider requires base to include `/v1`.
pub fn normalize_oai_base(base: &str) -> String {
    let b = base.trim().trim_end_matches('/');
    if b.ends_with("/v1") {
        b.to_string()
    } else {
        format!("{}/v1", b)
    }
}

/// chat completions endpoint is `{base-with-/v1}/chat/completions`.
pub fn chat_completions_url(base: &str) -> String {
    format!("{}/chat/completions", normalize_oai_base(base))
}

/// status indicator labels, one per status value.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusLabels {
    pub idle: String,
    pub checking: String,
    pub ready: String,
    pub missing: String,
    pub error: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            idle: "API 키 감지 완료 · 테스트 대기 중".into(),
            checking: "ChatGPT와 통신 중...".into(),
            ready: "API 키 정상 작동 · 최신 추천 완료".into(),
            missing: ".env 파일에서 OPENAI_API_KEY를 확인하세요".into(),
            error: "API 통신 중 문제가 발생했습니다. 키와 네트워크를 확인하세요.".into(),
        }
    }
}

impl StatusLabels {
    pub fn for_status(&self, status: ApiStatus) -> &str {
        match status {
            ApiStatus::Idle => &self.idle,
            ApiStatus::Checking => &self.checking,
            ApiStatus::Ready => &self.ready,
            ApiStatus::Missing => &self.missing,
            ApiStatus::Error => &self.error,
        }
    }
}

/// everything a session needs to talk to the completion endpoint.
///
/// all fields default to the dinner-menu widget's values, so a json override
/// only needs the keys it changes.
#[derive(Resource, Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// full chat completions url.
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// bearer token; `None` (or empty) means the widget runs in `missing` state.
    pub api_key: Option<String>,
    pub system_prompt: String,
    /// prepended to every user message before transmission.
    pub user_prefix: String,
    pub greeting: String,
    pub thinking: String,
    pub generic_failure: String,
    pub labels: StatusLabels,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: chat_completions_url(DEFAULT_BASE_URL),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_key: None,
            system_prompt: SYSTEM_PROMPT.into(),
            user_prefix: USER_PREFIX.into(),
            greeting: GREETING.into(),
            thinking: THINKING.into(),
            generic_failure: GENERIC_FAILURE.into(),
            labels: StatusLabels::default(),
        }
    }
}

impl ChatConfig {
    /// defaults plus whatever was present in the build environment.
    pub fn from_build_env() -> Self {
        Self::from_values(
            option_env!("OPENAI_API_KEY"),
            option_env!("LLM_BASE_URL"),
            option_env!("LLM_MODEL"),
        )
    }

    fn from_values(api_key: Option<&str>, base_url: Option<&str>, model: Option<&str>) -> Self {
        let mut cfg = Self::default().with_api_key(api_key);
        if let Some(base) = base_url.map(str::trim).filter(|b| !b.is_empty()) {
            cfg.endpoint = chat_completions_url(base);
        }
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            cfg.model = model.to_string();
        }
        cfg
    }

    /// parse a json override on top of the defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_api_key<S: AsRef<str>>(mut self, key: Option<S>) -> Self {
        self.api_key = key
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }

    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization() {
        assert_eq!(normalize_oai_base("https://api.openai.com"), "https://api.openai.com/v1");
        assert_eq!(normalize_oai_base("https://api.openai.com/v1/"), "https://api.openai.com/v1");
        assert_eq!(
            chat_completions_url("http://localhost:1234/"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn defaults_match_widget() {
        let cfg = ChatConfig::default();
        assert_eq!(cfg.endpoint, "https://api.openai.com/v1/chat/completions");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.temperature, 0.8);
        assert_eq!(cfg.max_tokens, 320);
        assert!(!cfg.has_credential());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let cfg = ChatConfig::default().with_api_key(Some("   "));
        assert!(!cfg.has_credential());
        let cfg = ChatConfig::default().with_api_key(Some("sk-test"));
        assert_eq!(cfg.credential(), Some("sk-test"));
    }

    #[test]
    fn build_values_override_endpoint_and_model() {
        let cfg = ChatConfig::from_values(Some("k"), Some("http://localhost:1234"), Some("local"));
        assert_eq!(cfg.endpoint, "http://localhost:1234/v1/chat/completions");
        assert_eq!(cfg.model, "local");
        assert!(cfg.has_credential());

        let cfg = ChatConfig::from_values(None, Some(""), None);
        assert_eq!(cfg, ChatConfig::default());
    }

    #[test]
    fn json_override_keeps_other_defaults() {
        let cfg = ChatConfig::from_json(r#"{"model":"gpt-4o","labels":{"ready":"ok"}}"#).unwrap();
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.labels.ready, "ok");
        assert_eq!(cfg.labels.idle, StatusLabels::default().idle);
        assert_eq!(cfg.max_tokens, 320);
    }
}
