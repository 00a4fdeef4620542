use std::time::Duration;

use pcsx2ipc_frame::{FrameConfig, Limits};
use pcsx2ipc_transport::{Endpoint, DEFAULT_SLOT};

use crate::error::{IpcError, Result};

/// Default round-trip timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable selecting the IPC slot.
pub const ENV_SLOT: &str = "PCSX2_IPC_SLOT";

/// Environment variable overriding the endpoint (`unix:<path>`, `tcp:<addr>`, or a path).
pub const ENV_SOCKET: &str = "PCSX2_IPC_SOCKET";

/// Environment variable setting the timeout: a bare millisecond count, or
/// a duration like `250ms` or `5s`. `0` disables it.
pub const ENV_TIMEOUT_MS: &str = "PCSX2_IPC_TIMEOUT_MS";

/// Parse a timeout written as `5s`, `250ms`, or a bare millisecond count.
pub fn parse_timeout(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IpcError::InvalidArgument("duration must not be empty".into()));
    }

    let (number, scale) = if let Some(num) = input.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, 1000)
    } else {
        (input, 1)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| IpcError::InvalidArgument(format!("invalid duration value: {input}")))?;
    Ok(Duration::from_millis(value.saturating_mul(scale)))
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Where the emulator listens.
    pub endpoint: Endpoint,
    /// Bound on each round trip, send and reply together. `None` blocks forever.
    pub timeout: Option<Duration>,
    /// Request and reply size ceilings.
    pub limits: Limits,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::for_slot(DEFAULT_SLOT)
    }
}

impl ConnectionConfig {
    /// Configuration for the emulator listening on `slot`.
    pub fn for_slot(slot: u16) -> Self {
        Self {
            endpoint: Endpoint::for_slot(slot),
            timeout: Some(DEFAULT_TIMEOUT),
            limits: Limits::default(),
        }
    }

    /// Override the endpoint.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Override the timeout. A zero duration disables it, like `None`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|timeout| !timeout.is_zero());
        self
    }

    /// Override the size ceilings.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Build configuration from `PCSX2_IPC_SLOT`, `PCSX2_IPC_SOCKET` and
    /// `PCSX2_IPC_TIMEOUT_MS`.
    ///
    /// An explicit socket wins over the slot. Unset variables keep defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match env(ENV_SLOT) {
            Some(raw) => {
                let slot = raw.trim().parse::<u16>().map_err(|_| {
                    IpcError::InvalidArgument(format!("{ENV_SLOT}={raw:?} is not a slot number"))
                })?;
                Self::for_slot(slot)
            }
            None => Self::default(),
        };

        if let Some(raw) = env(ENV_SOCKET) {
            config.endpoint = raw.trim().parse()?;
        }

        if let Some(raw) = env(ENV_TIMEOUT_MS) {
            let timeout = parse_timeout(&raw).map_err(|_| {
                IpcError::InvalidArgument(format!("{ENV_TIMEOUT_MS}={raw:?} is not a duration"))
            })?;
            config = config.with_timeout(Some(timeout));
        }

        Ok(config)
    }

    /// Frame reader/writer configuration derived from this config.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            limits: self.limits,
            read_timeout: self.timeout,
            write_timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = ConnectionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ConnectionConfig::default());
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(config.limits, Limits::default());
    }

    #[test]
    fn slot_from_env() {
        let config = ConnectionConfig::from_lookup(lookup(&[(ENV_SLOT, "28012")])).unwrap();
        assert_eq!(config.endpoint, Endpoint::for_slot(28012));
    }

    #[test]
    fn socket_overrides_slot() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            (ENV_SLOT, "28012"),
            (ENV_SOCKET, "tcp:127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(
            config.endpoint,
            Endpoint::Tcp(SocketAddr::from(([127, 0, 0, 1], 9000)))
        );

        let config =
            ConnectionConfig::from_lookup(lookup(&[(ENV_SOCKET, "/run/emu/pcsx2.sock")])).unwrap();
        assert_eq!(
            config.endpoint,
            Endpoint::Unix(PathBuf::from("/run/emu/pcsx2.sock"))
        );
    }

    #[test]
    fn timeout_from_env() {
        let config = ConnectionConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "250")])).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));

        let config = ConnectionConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "0")])).unwrap();
        assert_eq!(config.timeout, None);

        let config = ConnectionConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "5s")])).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));

        let config = ConnectionConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "40ms")])).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(40)));
    }

    #[test]
    fn timeouts_default_to_millis() {
        assert_eq!(parse_timeout("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_timeout(" 750 ").unwrap(), Duration::from_millis(750));
        assert_eq!(parse_timeout("0").unwrap(), Duration::ZERO);
        assert!(parse_timeout("soon").is_err());
        assert!(parse_timeout("").is_err());
    }

    #[test]
    fn zero_timeout_means_none() {
        let config = ConnectionConfig::default().with_timeout(Some(Duration::ZERO));
        assert_eq!(config.timeout, None);
        assert_eq!(config.frame_config().read_timeout, None);

        let config = ConnectionConfig::default().with_timeout(Some(Duration::from_millis(1)));
        assert_eq!(config.timeout, Some(Duration::from_millis(1)));
    }

    #[test]
    fn invalid_env_values_rejected() {
        let err = ConnectionConfig::from_lookup(lookup(&[(ENV_SLOT, "seventy")])).unwrap_err();
        assert!(matches!(err, IpcError::InvalidArgument(_)));

        let err = ConnectionConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "-1")])).unwrap_err();
        assert!(matches!(err, IpcError::InvalidArgument(_)));

        let err = ConnectionConfig::from_lookup(lookup(&[(ENV_SOCKET, "tcp:nowhere")])).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidArgument);
    }

    #[test]
    fn frame_config_carries_timeout_and_limits() {
        let limits = Limits {
            max_batch_commands: 10,
            ..Limits::default()
        };
        let config = ConnectionConfig::default()
            .with_timeout(Some(Duration::from_millis(40)))
            .with_limits(limits);
        let frame = config.frame_config();
        assert_eq!(frame.limits, limits);
        assert_eq!(frame.read_timeout, Some(Duration::from_millis(40)));
        assert_eq!(frame.write_timeout, Some(Duration::from_millis(40)));
    }
}
