//!
//! projdash configuration
//! ----------------------
//! Built-in defaults, optionally layered with a JSON file, environment
//! variables and command-line flags (later sources win). Intervals and
//! timeouts travel as milliseconds everywhere outside the process.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::identity::{order_backends, IdentityBackend};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REVALIDATE_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_POLL_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub const ENV_CONFIG: &str = "PROJDASH_CONFIG";
pub const ENV_API_URL: &str = "PROJDASH_API_URL";
pub const ENV_HOST: &str = "PROJDASH_HOST";
pub const ENV_POLL_MS: &str = "PROJDASH_POLL_MS";
pub const ENV_REVALIDATE_MS: &str = "PROJDASH_REVALIDATE_MS";
pub const ENV_PROBE_TIMEOUT_MS: &str = "PROJDASH_PROBE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(with = "serde_url")]
    pub api_base: Url,
    /// Identity backends in ascending priority order.
    pub backends: Vec<IdentityBackend>,
    #[serde(rename = "revalidate_ms", with = "serde_ms")]
    pub revalidate_interval: Duration,
    #[serde(rename = "poll_ms", with = "serde_ms")]
    pub poll_interval: Duration,
    /// Transport-level bound for collection, nested and write requests.
    #[serde(rename = "request_timeout_ms", with = "serde_ms")]
    pub request_timeout: Duration,
}

/// The two session systems a dashboard deployment sits behind. Each serves a
/// session probe and a login page on the same host.
pub fn default_backends(host: &str, timeout: Duration) -> AppResult<Vec<IdentityBackend>> {
    let systems = [("laravel11", 1, "/v2/api/session/validate", "/v2/login"), ("laravel9", 2, "/api/session/validate", "/login")];
    let mut out = Vec::with_capacity(systems.len());
    for (name, priority, probe, login) in systems {
        let probe_url = parse_url(&format!("http://{}{}", host, probe))?;
        let login_url = parse_url(&format!("http://{}{}", host, login))?;
        out.push(IdentityBackend::new(name, priority, probe_url, timeout).with_login_url(login_url));
    }
    Ok(out)
}

fn parse_url(s: &str) -> AppResult<Url> {
    Url::parse(s).map_err(|e| AppError::config("bad_url", format!("'{}': {}", s, e).as_str()))
}

impl DashboardConfig {
    /// Built-in defaults with the identity backends on `host`.
    pub fn for_host(host: &str) -> AppResult<Self> {
        Ok(Self {
            api_base: parse_url(DEFAULT_API_BASE)?,
            backends: default_backends(host, Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS))?,
            revalidate_interval: Duration::from_millis(DEFAULT_REVALIDATE_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        })
    }

    pub fn defaults() -> AppResult<Self> { Self::for_host(DEFAULT_HOST) }

    /// Full layering: defaults, then `--config`/`PROJDASH_CONFIG`, then the
    /// environment, then flags. The result is sorted and validated.
    pub fn load(args: &[String]) -> AppResult<Self> {
        Self::load_with(args, |name| std::env::var(name).ok())
    }

    /// `load` with an injectable environment lookup.
    pub fn load_with(args: &[String], env: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut cfg = Self::defaults()?;
        if let Some(path) = arg_value(args, "--config").or_else(|| env(ENV_CONFIG)) {
            cfg.merge_file(ConfigFile::read(Path::new(&path))?)?;
        }
        cfg.apply(&ConfigOverrides::from_env_with(&env))?;
        cfg.apply(&ConfigOverrides::from_args(args))?;
        order_backends(&mut cfg.backends);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn merge_file(&mut self, file: ConfigFile) -> AppResult<()> {
        if let Some(backends) = file.backends {
            self.backends = backends;
        }
        let overrides = ConfigOverrides {
            api_base: file.api_base,
            host: file.host,
            poll_ms: file.poll_ms,
            revalidate_ms: file.revalidate_ms,
            probe_timeout_ms: file.probe_timeout_ms,
        };
        self.apply(&overrides)?;
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn apply(&mut self, o: &ConfigOverrides) -> AppResult<()> {
        if let Some(api) = &o.api_base {
            self.api_base = parse_url(api)?;
        }
        if let Some(host) = &o.host {
            self.retarget_host(host)?;
        }
        if let Some(ms) = o.poll_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = o.revalidate_ms {
            self.revalidate_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = o.probe_timeout_ms {
            for b in &mut self.backends {
                b.timeout = Duration::from_millis(ms);
            }
        }
        Ok(())
    }

    /// Point every backend's probe and login URL at `host`, keeping paths.
    pub fn retarget_host(&mut self, host: &str) -> AppResult<()> {
        for b in &mut self.backends {
            set_host(&mut b.probe_endpoint, host)?;
            if let Some(login) = b.login_url.as_mut() {
                set_host(login, host)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.backends.is_empty() {
            return Err(AppError::config("no_backends", "at least one identity backend is required"));
        }
        if self.poll_interval.is_zero() || self.revalidate_interval.is_zero() || self.request_timeout.is_zero() {
            return Err(AppError::config("zero_interval", "intervals and timeouts must be greater than zero"));
        }
        let mut seen: Vec<u32> = Vec::with_capacity(self.backends.len());
        for b in &self.backends {
            if b.timeout.is_zero() {
                return Err(AppError::config("zero_timeout", format!("backend '{}' has a zero timeout", b.name).as_str()));
            }
            if seen.contains(&b.priority) {
                return Err(AppError::config("duplicate_priority", format!("priority {} used more than once", b.priority).as_str()));
            }
            seen.push(b.priority);
        }
        Ok(())
    }
}

fn set_host(url: &mut Url, host: &str) -> AppResult<()> {
    url.set_host(Some(host)).map_err(|e| AppError::config("bad_host", format!("'{}': {}", host, e).as_str()))
}

/// On-disk shape; every field optional so a file only states what it changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub api_base: Option<String>,
    pub host: Option<String>,
    pub backends: Option<Vec<IdentityBackend>>,
    pub poll_ms: Option<u64>,
    pub revalidate_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::config("config_read", format!("{}: {}", path.display(), e).as_str()))?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::config("config_parse", format!("{}: {}", path.display(), e).as_str()))
    }
}

/// Scalar overrides shared by the environment and flag layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub api_base: Option<String>,
    pub host: Option<String>,
    pub poll_ms: Option<u64>,
    pub revalidate_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    pub fn from_env_with(env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_base: env(ENV_API_URL),
            host: env(ENV_HOST),
            poll_ms: env(ENV_POLL_MS).as_deref().and_then(parse_ms),
            revalidate_ms: env(ENV_REVALIDATE_MS).as_deref().and_then(parse_ms),
            probe_timeout_ms: env(ENV_PROBE_TIMEOUT_MS).as_deref().and_then(parse_ms),
        }
    }

    pub fn from_args(args: &[String]) -> Self {
        Self {
            api_base: arg_value(args, "--api"),
            host: arg_value(args, "--host"),
            poll_ms: arg_value(args, "--poll-ms").as_deref().and_then(parse_ms),
            revalidate_ms: arg_value(args, "--revalidate-ms").as_deref().and_then(parse_ms),
            probe_timeout_ms: arg_value(args, "--probe-timeout-ms").as_deref().and_then(parse_ms),
        }
    }
}

fn parse_ms(v: &str) -> Option<u64> {
    v.trim().parse::<u64>().ok()
}

/// Value following `flag`, if both are present.
pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

pub(crate) mod serde_url {
    use reqwest::Url;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(url: &Url, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(url.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Url, D::Error> {
        let raw = String::deserialize(d)?;
        Url::parse(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod serde_opt_url {
    use reqwest::Url;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(url: &Option<Url>, s: S) -> Result<S::Ok, S::Error> {
        match url {
            Some(u) => s.serialize_some(u.as_str()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Url>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => Url::parse(&raw).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

pub(crate) mod serde_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
