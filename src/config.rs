//! Application configuration and the board defaults.

use core::net::Ipv4Addr;

use smoltcp::time::Duration;

use crate::error::ConfigError;

/// Host pinged when nothing else is configured.
pub const DEFAULT_TARGET: Ipv4Addr = Ipv4Addr::new(216, 58, 213, 195);
pub const DEFAULT_LAUNCH_INTERVAL: Duration = Duration::from_millis(4000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_IDENT: u16 = 0x5050;
pub const DEFAULT_PAYLOAD_LEN: usize = 32;
pub const DEFAULT_BAUDRATE: u32 = 921_600;
/// Locally administered unicast address.
pub const DEFAULT_MAC: [u8; 6] = [0x02, 0x00, 0x11, 0x22, 0x33, 0x44];

/// How the launch task decides that the interface can originate traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Readiness {
    /// The stack reports an applied IPv4 configuration. This is the
    /// default, and it ignores the gateway: a lease without a router
    /// (gateway 0.0.0.0) still counts as ready.
    Configured,
    /// The first octet of the gateway address is non-zero. Never sends
    /// without a gateway, even on a configured interface.
    GatewayOctet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingConfig {
    pub target: Ipv4Addr,
    pub launch_interval: Duration,
    pub poll_interval: Duration,
    /// `None` waits for a reply forever.
    pub timeout: Option<Duration>,
    pub readiness: Readiness,
    pub ident: u16,
    pub payload_len: usize,
    /// Period of the interface report, disabled when `None`.
    pub debug_interval: Option<Duration>,
}

impl PingConfig {
    pub const fn new() -> Self {
        Self {
            target: DEFAULT_TARGET,
            launch_interval: DEFAULT_LAUNCH_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_TIMEOUT),
            readiness: Readiness::Configured,
            ident: DEFAULT_IDENT,
            payload_len: DEFAULT_PAYLOAD_LEN,
            debug_interval: None,
        }
    }

    pub const fn with_target(mut self, target: Ipv4Addr) -> Self {
        self.target = target;
        self
    }

    pub const fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn with_debug_interval(mut self, interval: Option<Duration>) -> Self {
        self.debug_interval = interval;
        self
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Static IPv4 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Settings {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv4Mode {
    Dhcp,
    Static(Ipv4Settings),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    pub mac: [u8; 6],
    pub mode: Ipv4Mode,
    pub random_seed: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            mac: DEFAULT_MAC,
            mode: Ipv4Mode::Dhcp,
            random_seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub baudrate: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUDRATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub ping: PingConfig,
    pub net: NetConfig,
    pub console: ConsoleConfig,
}

/// Parses a dotted-quad ping target such as `"192.168.1.1"`.
pub fn parse_target(s: &str) -> Result<Ipv4Addr, ConfigError> {
    let addr: Ipv4Addr = s.trim().parse().map_err(|_| ConfigError::InvalidAddress)?;
    if addr.is_unspecified() {
        return Err(ConfigError::UnspecifiedTarget);
    }
    Ok(addr)
}
