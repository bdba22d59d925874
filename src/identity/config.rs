use chrono::TimeDelta;
use std::{fmt, str::FromStr};
use url::Url;

pub const DEFAULT_SESSION_TTL_SECONDS: u32 = 20 * 60;
pub const DEFAULT_PASSWORD_CHANGE_TTL_SECONDS: u32 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("invalid mode: {value}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    public_url: Url,
    mode: Mode,
    session_ttl_seconds: u32,
    password_change_ttl_seconds: u32,
}

impl IdentityConfig {
    /// `public_url` is the base for links sent by mail.
    #[must_use]
    pub fn new(public_url: Url) -> Self {
        Self {
            public_url,
            mode: Mode::default(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            password_change_ttl_seconds: DEFAULT_PASSWORD_CHANGE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u32) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_change_ttl_seconds(mut self, seconds: u32) -> Self {
        self.password_change_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn session_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.session_ttl_seconds))
    }

    #[must_use]
    pub fn password_change_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.password_change_ttl_seconds))
    }
}
