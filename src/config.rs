//! Engine construction (§4.12, ambient).
//!
//! Mirrors the teacher crate's `ExecCtxBuilder` idiom: a builder that bundles
//! the session transport, default retry configuration/policy, and the
//! `User-Agent` string into an [`Engine`].

use reqwest::Client;

use crate::retry::{Engine, RetryConfig, RetryPolicy};
use crate::transport::{default_user_agent, Session};

/// Builder for an [`Engine`] plus its default call configuration.
#[derive(Default)]
pub struct EngineConfigBuilder {
    client: Option<Client>,
    user_agent: Option<String>,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a pre-configured `reqwest::Client` instead of building a
    /// default one. The engine never mutates the client's pool settings
    /// after construction (§5).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_retry_config(mut self, cfg: RetryConfig) -> Self {
        self.retry_config = cfg;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Finish building. Validates `retry_config` per §3's unbounded-tries
    /// invariant before handing back the engine.
    pub fn build(self) -> crate::error::Result<EngineConfig> {
        self.retry_config.validate()?;
        let client = self.client.unwrap_or_default();
        let mut session = Session::new(client);
        if let Some(ua) = self.user_agent {
            session = session.with_user_agent(ua);
        } else {
            session = session.with_user_agent(default_user_agent());
        }
        Ok(EngineConfig {
            engine: Engine::new(session),
            retry_config: self.retry_config,
            retry_policy: self.retry_policy,
        })
    }
}

/// A constructed engine plus the default retry configuration/policy calls
/// should use unless they override them per-call.
pub struct EngineConfig {
    pub engine: Engine,
    pub retry_config: RetryConfig,
    pub retry_policy: RetryPolicy,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}
