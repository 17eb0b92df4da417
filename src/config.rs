use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use lazy_static::lazy_static;
use regex::Regex;

const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Signing settings for issued bearer tokens.
#[derive(Clone)]
pub struct JwtConfig {
    /// `None` when `JWT_SECRET` is unset or empty; the token issuer refuses to start.
    pub secret: Option<String>,
    pub issuer: String,
    pub ttl: Duration,
    pub leeway_seconds: u64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

/// Argon2 work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            m_cost: argon2::Params::DEFAULT_M_COST,
            t_cost: argon2::Params::DEFAULT_T_COST,
            p_cost: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_var(&lookup, "APP_PORT", 8080)?;
        let listen_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid APP_HOST {host:?}"))?;

        let ttl = match lookup("JWT_EXPIRE_TIME") {
            Some(raw) => parse_duration(&raw)
                .with_context(|| format!("invalid JWT_EXPIRE_TIME {raw:?}"))?,
            None => DEFAULT_TOKEN_TTL,
        };

        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "gitforge-auth".into()),
            ttl,
            leeway_seconds: parse_var(&lookup, "JWT_LEEWAY_SECONDS", 0)?,
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            m_cost: parse_var(&lookup, "ARGON2_M_COST", defaults.m_cost)?,
            t_cost: parse_var(&lookup, "ARGON2_T_COST", defaults.t_cost)?,
            p_cost: parse_var(&lookup, "ARGON2_P_COST", defaults.p_cost)?,
        };

        Ok(Self {
            listen_addr,
            database_url,
            jwt,
            hash,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid {key} {raw:?}")),
        None => Ok(default),
    }
}

/// Parses `24h`, `90m`, `1h30m`, `45s` style lifetimes.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    lazy_static! {
        static ref DURATION_RE: Regex =
            Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("duration regex is valid");
    }
    let raw = raw.trim();
    let caps = match DURATION_RE.captures(raw) {
        Some(caps) if !raw.is_empty() => caps,
        _ => bail!("expected a duration like 24h, 90m or 1h30m"),
    };

    let mut secs: u64 = 0;
    for (idx, unit) in [(1, 3600u64), (2, 60), (3, 1)] {
        if let Some(m) = caps.get(idx) {
            let n: u64 = m.as_str().parse().context("duration component out of range")?;
            secs = n
                .checked_mul(unit)
                .and_then(|v| secs.checked_add(v))
                .context("duration out of range")?;
        }
    }
    if secs == 0 {
        bail!("token lifetime must be positive");
    }
    Ok(Duration::from_secs(secs))
}
