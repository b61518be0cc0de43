//! Server and room configuration
//!
//! Values come from the command line and environment variables:
//! - bind address: first CLI argument, else `CHAT_ADDR`, else `127.0.0.1:8080`
//! - `CHAT_MESSAGE_TTL_SECS`: default message ttl (`0` or `off` disables expiry)
//! - `CHAT_TICK_MILLIS`: expiry scheduler cadence

use std::time::Duration;

use crate::error::AppError;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default lifetime of a message posted without an explicit ttl
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_secs(30);

/// Default expiry tick cadence
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Room code attempts before giving up on creation
pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 64;

/// Channel buffer size for room session commands
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Per-room behaviour shared by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Scheduler cadence
    pub tick_interval: Duration,
    /// Ttl applied when a post gives none; `None` keeps messages forever
    pub default_ttl: Option<Duration>,
    pub max_code_attempts: usize,
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            default_ttl: Some(DEFAULT_MESSAGE_TTL),
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub room: RoomConfig,
}

impl ServerConfig {
    /// Load from process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_sources(std::env::args().nth(1), |key| std::env::var(key).ok())
    }

    /// Load from an optional address argument and a variable lookup
    pub fn from_sources<F>(addr_arg: Option<String>, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = addr_arg
            .or_else(|| var("CHAT_ADDR"))
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let mut room = RoomConfig::default();

        if let Some(raw) = var("CHAT_MESSAGE_TTL_SECS") {
            room.default_ttl = parse_ttl(&raw)?;
        }

        if let Some(raw) = var("CHAT_TICK_MILLIS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("CHAT_TICK_MILLIS: '{}' is not a number", raw)))?;
            if millis == 0 {
                return Err(AppError::Config("CHAT_TICK_MILLIS must be positive".to_string()));
            }
            room.tick_interval = Duration::from_millis(millis);
        }

        Ok(Self { addr, room })
    }
}

fn parse_ttl(raw: &str) -> Result<Option<Duration>, AppError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let secs: u64 = raw
        .parse()
        .map_err(|_| AppError::Config(format!("CHAT_MESSAGE_TTL_SECS: '{}' is not a number", raw)))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
