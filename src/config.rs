use std::{net::SocketAddr, str::FromStr};

use anyhow::{Context, Result, anyhow};

use crate::upstream::DEFAULT_BASE_URL;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// What a feed endpoint answers when the upstream fetch or decode fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the error and serve an empty document with status 201.
    #[default]
    Lenient,
    /// Answer 502 for upstream failures and 500 for undecodable feeds.
    Strict,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(FailurePolicy::Lenient),
            "strict" => Ok(FailurePolicy::Strict),
            other => Err(anyhow!(
                "unknown failure policy {:?}, expected \"lenient\" or \"strict\"",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub upstream_url: String,
    pub failure_policy: FailurePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = lookup("CBRF_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("Invalid CBRF_LISTEN_ADDR")?;
        let upstream_url =
            lookup("CBRF_UPSTREAM_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let failure_policy = match lookup("CBRF_FAILURE_POLICY") {
            Some(policy) => policy
                .parse::<FailurePolicy>()
                .context("Invalid CBRF_FAILURE_POLICY")?,
            None => FailurePolicy::default(),
        };

        Ok(Config {
            listen_addr,
            upstream_url,
            failure_policy,
        })
    }
}
