//! Exposes an embassy Ethernet driver as a smoltcp device.
//!
//! The adapter only lives for one pump: it borrows the task `Context`, so a
//! driver that has no frame ready registers the task waker and the next
//! received frame wakes the pump loop.

use core::task::Context;

use embassy_net_driver::{Driver, LinkState};
use smoltcp::phy::{self, Checksum, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

pub struct DriverAdapter<'d, 'c, D: Driver> {
    cx: &'d mut Context<'c>,
    inner: &'d mut D,
}

impl<'d, 'c, D: Driver> DriverAdapter<'d, 'c, D> {
    pub fn new(cx: &'d mut Context<'c>, inner: &'d mut D) -> Self {
        Self { cx, inner }
    }

    pub fn link_up(&mut self) -> bool {
        self.inner.link_state(self.cx) == LinkState::Up
    }
}

fn checksum(c: embassy_net_driver::Checksum) -> Checksum {
    match c {
        embassy_net_driver::Checksum::Both => Checksum::Both,
        embassy_net_driver::Checksum::Tx => Checksum::Tx,
        embassy_net_driver::Checksum::Rx => Checksum::Rx,
        embassy_net_driver::Checksum::None => Checksum::None,
    }
}

impl<D: Driver> phy::Device for DriverAdapter<'_, '_, D> {
    type RxToken<'a>
        = RxTokenAdapter<D::RxToken<'a>>
    where
        Self: 'a;
    type TxToken<'a>
        = TxTokenAdapter<D::TxToken<'a>>
    where
        Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        self.inner
            .receive(self.cx)
            .map(|(rx, tx)| (RxTokenAdapter(rx), TxTokenAdapter(tx)))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        self.inner.transmit(self.cx).map(TxTokenAdapter)
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let caps = self.inner.capabilities();
        let mut out = DeviceCapabilities::default();
        out.medium = Medium::Ethernet;
        out.max_transmission_unit = caps.max_transmission_unit;
        out.max_burst_size = caps.max_burst_size;
        out.checksum.ipv4 = checksum(caps.checksum.ipv4);
        out.checksum.udp = checksum(caps.checksum.udp);
        out.checksum.tcp = checksum(caps.checksum.tcp);
        out.checksum.icmpv4 = checksum(caps.checksum.icmpv4);
        out
    }
}

pub struct RxTokenAdapter<T>(T);

impl<T: embassy_net_driver::RxToken> phy::RxToken for RxTokenAdapter<T> {
    fn consume<R, F>(self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        self.0.consume(|buf| f(buf))
    }
}

pub struct TxTokenAdapter<T>(T);

impl<T: embassy_net_driver::TxToken> phy::TxToken for TxTokenAdapter<T> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        self.0.consume(len, f)
    }
}
