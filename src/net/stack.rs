//! smoltcp-backed network stack: one Ethernet interface, a DHCPv4 client
//! (or static addressing) and an ICMP socket for echo traffic.

use core::net::Ipv4Addr;

use smoltcp::iface::{Config, Interface, SocketHandle, SocketSet, SocketStorage};
use smoltcp::phy::Device;
use smoltcp::socket::{dhcpv4, icmp};
use smoltcp::time::{Duration, Instant};
use smoltcp::wire::{EthernetAddress, HardwareAddress, IpAddress, IpCidr, Ipv4Cidr};

use super::echo::EchoTracker;
use super::{EchoClient, InterfaceAddresses, NetInterface, PacketPump};
use crate::config::{Ipv4Mode, Ipv4Settings, NetConfig, PingConfig};
use crate::error::PingError;
use crate::ping::PingResult;

/// DHCP client and ICMP socket.
const SOCKET_COUNT: usize = 2;
const ICMP_PACKETS: usize = 4;
const ICMP_BUFFER: usize = 512;

/// Backing storage for the sockets. Must outlive the stack, so on target
/// it lives in a `StaticCell`.
pub struct NetResources<'a> {
    sockets: [SocketStorage<'a>; SOCKET_COUNT],
    icmp_rx_meta: [icmp::PacketMetadata; ICMP_PACKETS],
    icmp_rx_payload: [u8; ICMP_BUFFER],
    icmp_tx_meta: [icmp::PacketMetadata; ICMP_PACKETS],
    icmp_tx_payload: [u8; ICMP_BUFFER],
}

impl NetResources<'_> {
    pub const fn new() -> Self {
        Self {
            sockets: [SocketStorage::EMPTY; SOCKET_COUNT],
            icmp_rx_meta: [icmp::PacketMetadata::EMPTY; ICMP_PACKETS],
            icmp_rx_payload: [0; ICMP_BUFFER],
            icmp_tx_meta: [icmp::PacketMetadata::EMPTY; ICMP_PACKETS],
            icmp_tx_payload: [0; ICMP_BUFFER],
        }
    }
}

impl Default for NetResources<'_> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct NetStack<'a> {
    iface: Interface,
    sockets: SocketSet<'a>,
    dhcp: Option<SocketHandle>,
    icmp: SocketHandle,
    echo: EchoTracker,
    configured: bool,
    gateway: Option<Ipv4Addr>,
    /// Time of the last pump, used to stamp outgoing requests.
    now: Instant,
}

enum DhcpChange {
    Up(Ipv4Settings),
    Down,
}

impl<'a> NetStack<'a> {
    pub fn new<D: Device + ?Sized>(
        net: &NetConfig,
        ping: &PingConfig,
        device: &mut D,
        resources: &'a mut NetResources<'a>,
        now: Instant,
    ) -> Self {
        let mut config = Config::new(HardwareAddress::Ethernet(EthernetAddress(net.mac)));
        config.random_seed = net.random_seed;
        let iface = Interface::new(config, device, now);

        let NetResources {
            sockets,
            icmp_rx_meta,
            icmp_rx_payload,
            icmp_tx_meta,
            icmp_tx_payload,
        } = resources;
        let mut sockets = SocketSet::new(&mut sockets[..]);

        let mut icmp_socket = icmp::Socket::new(
            icmp::PacketBuffer::new(&mut icmp_rx_meta[..], &mut icmp_rx_payload[..]),
            icmp::PacketBuffer::new(&mut icmp_tx_meta[..], &mut icmp_tx_payload[..]),
        );
        if icmp_socket.bind(icmp::Endpoint::Ident(ping.ident)).is_err() {
            error!("binding ICMP socket to ident {} failed", ping.ident);
        }
        let icmp = sockets.add(icmp_socket);

        let dhcp = match net.mode {
            Ipv4Mode::Dhcp => Some(sockets.add(dhcpv4::Socket::new())),
            Ipv4Mode::Static(_) => None,
        };

        let mut stack = Self {
            iface,
            sockets,
            dhcp,
            icmp,
            echo: EchoTracker::new(ping.ident, ping.payload_len, ping.timeout),
            configured: false,
            gateway: None,
            now,
        };
        if let Ipv4Mode::Static(settings) = net.mode {
            stack.configure(&settings);
        }
        stack
    }

    /// Applies an IPv4 address and default route.
    pub fn configure(&mut self, settings: &Ipv4Settings) {
        let cidr = Ipv4Cidr::new(settings.address, settings.prefix_len);
        self.iface.update_ip_addrs(|addrs| {
            addrs.clear();
            // Cleared just above, so there is room for one entry.
            let _ = addrs.push(IpCidr::Ipv4(cidr));
        });
        match settings.gateway {
            Some(router) => {
                if self.iface.routes_mut().add_default_ipv4_route(router).is_err() {
                    warn!("route table full, no default route");
                }
            }
            None => {
                self.iface.routes_mut().remove_default_ipv4_route();
            }
        }
        self.gateway = settings.gateway;
        self.configured = true;
        info!(
            "IPv4 configured: {}/{}",
            settings.address.octets(),
            settings.prefix_len
        );
    }

    pub fn deconfigure(&mut self) {
        self.iface.update_ip_addrs(|addrs| addrs.clear());
        self.iface.routes_mut().remove_default_ipv4_route();
        self.gateway = None;
        self.configured = false;
        info!("IPv4 deconfigured");
    }

    fn process_dhcp(&mut self) {
        let Some(handle) = self.dhcp else {
            return;
        };
        let change = match self.sockets.get_mut::<dhcpv4::Socket>(handle).poll() {
            None => return,
            Some(dhcpv4::Event::Configured(config)) => DhcpChange::Up(Ipv4Settings {
                address: config.address.address(),
                prefix_len: config.address.prefix_len(),
                gateway: config.router,
            }),
            Some(dhcpv4::Event::Deconfigured) => DhcpChange::Down,
        };
        match change {
            DhcpChange::Up(settings) => self.configure(&settings),
            DhcpChange::Down => self.deconfigure(),
        }
    }

    fn process_icmp(&mut self, now: Instant) {
        let socket = self.sockets.get_mut::<icmp::Socket>(self.icmp);
        while socket.can_recv() {
            let Ok((data, from)) = socket.recv() else {
                break;
            };
            #[allow(irrefutable_let_patterns)]
            if let IpAddress::Ipv4(from) = from {
                self.echo.on_packet(from, data, now);
            }
        }
    }
}

impl NetInterface for NetStack<'_> {
    fn addresses(&self) -> InterfaceAddresses {
        if !self.configured {
            return InterfaceAddresses::UNCONFIGURED;
        }
        InterfaceAddresses {
            local: self.iface.ipv4_addr().unwrap_or(Ipv4Addr::UNSPECIFIED),
            gateway: self.gateway.unwrap_or(Ipv4Addr::UNSPECIFIED),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

impl EchoClient for NetStack<'_> {
    fn send_echo_request(&mut self, target: Ipv4Addr) -> Result<(), PingError> {
        if !self.configured {
            return Err(PingError::NotConfigured);
        }
        let len = self.echo.request_len();
        if len > ICMP_BUFFER {
            return Err(PingError::BufferTooSmall);
        }
        let socket = self.sockets.get_mut::<icmp::Socket>(self.icmp);
        if !socket.can_send() {
            return Err(PingError::Busy);
        }
        let buf = socket
            .send(len, IpAddress::Ipv4(target))
            .map_err(|err| match err {
                icmp::SendError::Unaddressable => PingError::Unaddressable,
                _ => PingError::Busy,
            })?;
        self.echo.start(target, self.now, buf)
    }

    fn fetch_echo_result(&mut self) -> Result<PingResult, PingError> {
        self.echo.take_result()
    }
}

impl PacketPump for NetStack<'_> {
    fn pump<D: Device>(&mut self, now: Instant, device: &mut D) {
        self.now = now;
        let _ = self.iface.poll(now, device, &mut self.sockets);
        self.process_dhcp();
        self.process_icmp(now);
        self.echo.check_timeout(now);
    }

    fn poll_delay(&mut self, now: Instant) -> Option<Duration> {
        let stack = self.iface.poll_delay(now, &self.sockets);
        let echo = self.echo.deadline().map(|deadline| {
            if deadline > now {
                deadline - now
            } else {
                Duration::ZERO
            }
        });
        match (stack, echo) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
