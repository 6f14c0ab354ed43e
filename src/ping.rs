//! Ping workflow: the launch and poll tasks and what they print.
//!
//! Both tasks are plain functions over an explicitly owned [`PingContext`].
//! The scheduler re-arms them; they never schedule anything themselves and
//! never fail: every error is reported where it is detected.

use core::fmt::Write;
use core::net::Ipv4Addr;

use crate::config::{PingConfig, Readiness};
use crate::error::PingError;
use crate::net::{EchoClient, NetInterface};

/// What came back for an echo request. The discriminant is the code
/// printed for non-reply outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PingOutcome {
    EchoReply = 0,
    DestinationUnreachable = 1,
    TimeExceeded = 2,
    Timeout = 3,
}

impl PingOutcome {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResult {
    pub outcome: PingOutcome,
    /// Host that answered, or the target for a timeout.
    pub responder: Ipv4Addr,
    pub rtt_ms: u32,
}

pub struct PingContext<N, W> {
    pub net: N,
    pub console: W,
    pub config: PingConfig,
}

impl<N, W> PingContext<N, W>
where
    N: NetInterface + EchoClient,
    W: Write,
{
    pub fn new(net: N, console: W, config: PingConfig) -> Self {
        Self {
            net,
            console,
            config,
        }
    }

    /// Whether the interface can originate traffic under the configured
    /// readiness rule.
    pub fn interface_ready(&self) -> bool {
        match self.config.readiness {
            Readiness::Configured => self.net.is_configured(),
            Readiness::GatewayOctet => self.net.addresses().gateway.octets()[0] != 0,
        }
    }
}

/// Launch task: sends one echo request to the configured target if the
/// interface is ready, otherwise does nothing this cycle.
pub fn launch_ping<N, W>(ctx: &mut PingContext<N, W>)
where
    N: NetInterface + EchoClient,
    W: Write,
{
    if !ctx.interface_ready() {
        trace!("interface not ready, skipping ping");
        return;
    }

    let target = ctx.config.target;
    let _ = writeln!(ctx.console, "Starting to ping IP: {}.", target);
    debug!("sending echo request to {}", target.octets());

    if let Err(err) = ctx.net.send_echo_request(target) {
        warn!("echo request failed: {}", err);
        let _ = writeln!(
            ctx.console,
            "Error while sending ping: {} ({})",
            err.code(),
            err
        );
    }
}

/// Poll task: reports at most one completed result per invocation.
pub fn poll_ping_result<N, W>(ctx: &mut PingContext<N, W>)
where
    N: NetInterface + EchoClient,
    W: Write,
{
    match ctx.net.fetch_echo_result() {
        Ok(result) => report_result(&mut ctx.console, &result),
        Err(PingError::NotReady) => {}
        Err(err) => warn!("fetching ping result failed: {}", err),
    }
}

pub fn report_result<W: Write>(console: &mut W, result: &PingResult) {
    match result.outcome {
        PingOutcome::EchoReply => {
            info!(
                "reply from {} in {} ms",
                result.responder.octets(),
                result.rtt_ms
            );
            let _ = writeln!(
                console,
                "Good ping from {} {} ms",
                result.responder, result.rtt_ms
            );
        }
        outcome => {
            info!("ping failed: {}", outcome);
            let _ = writeln!(console, "Bad ping err {}", outcome.code());
        }
    }
}

/// Debug task: prints the current interface addresses.
pub fn report_interface<N, W>(ctx: &mut PingContext<N, W>)
where
    N: NetInterface + EchoClient,
    W: Write,
{
    let addrs = ctx.net.addresses();
    let _ = writeln!(
        ctx.console,
        "Ethernet own IP: {}. gateway: {}.",
        addrs.local, addrs.gateway
    );
}
