//! Network collaborators used by the ping workflow.
//!
//! The workflow only talks to these traits; [`NetStack`] implements them on
//! top of smoltcp, tests implement them with scripted fakes.

use core::net::Ipv4Addr;

use smoltcp::phy::Device;
use smoltcp::time::{Duration, Instant};

use crate::error::PingError;
use crate::ping::PingResult;

mod echo;
mod stack;

pub use echo::EchoTracker;
pub use stack::{NetResources, NetStack};

/// Snapshot of the interface addresses. All-zero until configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddresses {
    pub local: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl InterfaceAddresses {
    pub const UNCONFIGURED: Self = Self {
        local: Ipv4Addr::UNSPECIFIED,
        gateway: Ipv4Addr::UNSPECIFIED,
    };
}

impl Default for InterfaceAddresses {
    fn default() -> Self {
        Self::UNCONFIGURED
    }
}

pub trait NetInterface {
    fn addresses(&self) -> InterfaceAddresses;

    /// True once an IPv4 configuration (DHCP lease or static) is applied.
    fn is_configured(&self) -> bool;
}

pub trait EchoClient {
    /// Queues one echo request. Success means "sent", not "answered".
    fn send_echo_request(&mut self, target: Ipv4Addr) -> Result<(), PingError>;

    /// Takes the next completed result, [`PingError::NotReady`] if none.
    fn fetch_echo_result(&mut self) -> Result<PingResult, PingError>;
}

/// Moves packets between the device and the protocol layers.
pub trait PacketPump {
    fn pump<D: Device>(&mut self, now: Instant, device: &mut D);

    /// How long the pump may sleep before it has to run again.
    fn poll_delay(&mut self, now: Instant) -> Option<Duration>;
}
