//! ICMP echo bookkeeping: one outstanding request, reply matching,
//! timeouts, and the queue of completed results.

use core::net::Ipv4Addr;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use smoltcp::phy::ChecksumCapabilities;
use smoltcp::time::{Duration, Instant};
use smoltcp::wire::{Icmpv4Message, Icmpv4Packet, Icmpv4Repr, IpProtocol};

use crate::error::PingError;
use crate::ping::{PingOutcome, PingResult};

/// Completed results waiting for the consumer.
const RESULT_DEPTH: usize = 2;
/// Type, code, checksum, identifier, sequence number.
const ECHO_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    target: Ipv4Addr,
    seq: u16,
    sent_at: Instant,
}

pub struct EchoTracker {
    ident: u16,
    payload_len: usize,
    timeout: Option<Duration>,
    next_seq: u16,
    outstanding: Option<Outstanding>,
    results: Channel<NoopRawMutex, PingResult, RESULT_DEPTH>,
}

impl EchoTracker {
    pub const fn new(ident: u16, payload_len: usize, timeout: Option<Duration>) -> Self {
        Self {
            ident,
            payload_len,
            timeout,
            next_seq: 0,
            outstanding: None,
            results: Channel::new(),
        }
    }

    pub fn ident(&self) -> u16 {
        self.ident
    }

    /// Size of the ICMP message produced by [`start`](Self::start).
    pub fn request_len(&self) -> usize {
        ECHO_HEADER_LEN + self.payload_len
    }

    /// Writes an echo request for `target` into `buf` and makes it the
    /// outstanding request. An unanswered earlier request is dropped.
    pub fn start(&mut self, target: Ipv4Addr, now: Instant, buf: &mut [u8]) -> Result<(), PingError> {
        if buf.len() < self.request_len() {
            return Err(PingError::BufferTooSmall);
        }
        let seq = self.next_seq;
        let mut packet = Icmpv4Packet::new_unchecked(&mut buf[..self.request_len()]);
        packet.set_msg_type(Icmpv4Message::EchoRequest);
        packet.set_msg_code(0);
        packet.set_echo_ident(self.ident);
        packet.set_echo_seq_no(seq);
        for (i, byte) in packet.data_mut().iter_mut().enumerate() {
            *byte = i as u8;
        }
        packet.fill_checksum();

        if let Some(old) = self.outstanding.take() {
            debug!("echo seq {} superseded without answer", old.seq);
        }
        self.outstanding = Some(Outstanding {
            target,
            seq,
            sent_at: now,
        });
        self.next_seq = self.next_seq.wrapping_add(1);
        Ok(())
    }

    /// Classifies an ICMP message received from `from`.
    ///
    /// Only messages that answer the outstanding request complete it;
    /// everything else (echo requests, stale replies) is ignored.
    pub fn on_packet(&mut self, from: Ipv4Addr, data: &[u8], now: Instant) {
        let Some(pending) = self.outstanding else {
            return;
        };
        let Ok(packet) = Icmpv4Packet::new_checked(data) else {
            trace!("dropping malformed ICMP packet");
            return;
        };
        let Ok(repr) = Icmpv4Repr::parse(&packet, &ChecksumCapabilities::default()) else {
            trace!("dropping unparsable ICMP packet");
            return;
        };

        let outcome = match repr {
            Icmpv4Repr::EchoReply { ident, seq_no, .. }
                if ident == self.ident && seq_no == pending.seq && from == pending.target =>
            {
                PingOutcome::EchoReply
            }
            Icmpv4Repr::DstUnreachable { header, data, .. }
                if header.next_header == IpProtocol::Icmp && self.quotes(data, pending.seq) =>
            {
                PingOutcome::DestinationUnreachable
            }
            Icmpv4Repr::TimeExceeded { header, data, .. }
                if header.next_header == IpProtocol::Icmp && self.quotes(data, pending.seq) =>
            {
                PingOutcome::TimeExceeded
            }
            _ => return,
        };

        self.outstanding = None;
        let rtt = now - pending.sent_at;
        self.complete(PingResult {
            outcome,
            responder: from,
            rtt_ms: rtt.total_millis().min(u64::from(u32::MAX)) as u32,
        });
    }

    /// True if `quoted` starts with the header of our echo request `seq`.
    fn quotes(&self, quoted: &[u8], seq: u16) -> bool {
        let Ok(packet) = Icmpv4Packet::new_checked(quoted) else {
            return false;
        };
        packet.msg_type() == Icmpv4Message::EchoRequest
            && packet.echo_ident() == self.ident
            && packet.echo_seq_no() == seq
    }

    /// Completes the outstanding request with a timeout once it expired.
    pub fn check_timeout(&mut self, now: Instant) {
        let (Some(pending), Some(deadline)) = (self.outstanding, self.deadline()) else {
            return;
        };
        if now < deadline {
            return;
        }
        self.outstanding = None;
        debug!("echo seq {} timed out", pending.seq);
        self.complete(PingResult {
            outcome: PingOutcome::Timeout,
            responder: pending.target,
            rtt_ms: 0,
        });
    }

    /// When the outstanding request times out, if it can.
    pub fn deadline(&self) -> Option<Instant> {
        match (self.outstanding, self.timeout) {
            (Some(pending), Some(timeout)) => Some(pending.sent_at + timeout),
            _ => None,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    fn complete(&mut self, result: PingResult) {
        if self.results.try_send(result).is_err() {
            warn!("ping result queue full, dropping result");
        }
    }

    pub fn take_result(&mut self) -> Result<PingResult, PingError> {
        self.results.try_receive().map_err(|_| PingError::NotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smoltcp::wire::{Icmpv4DstUnreachable, Ipv4Repr};

    const TARGET: Ipv4Addr = Ipv4Addr::new(216, 58, 213, 195);

    fn ms(v: i64) -> Instant {
        Instant::from_millis(v)
    }

    fn reply(ident: u16, seq_no: u16) -> Vec<u8> {
        let payload = [0u8; 4];
        let repr = Icmpv4Repr::EchoReply {
            ident,
            seq_no,
            data: &payload,
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(
            &mut Icmpv4Packet::new_unchecked(&mut buf[..]),
            &ChecksumCapabilities::default(),
        );
        buf
    }

    fn started(tracker: &mut EchoTracker, at: i64) -> Vec<u8> {
        let mut buf = vec![0u8; tracker.request_len()];
        tracker.start(TARGET, ms(at), &mut buf).unwrap();
        buf
    }

    #[test]
    fn request_is_a_valid_echo_request() {
        let mut tracker = EchoTracker::new(0x1234, 32, None);
        let buf = started(&mut tracker, 0);

        let packet = Icmpv4Packet::new_checked(&buf[..]).unwrap();
        assert!(packet.verify_checksum());
        match Icmpv4Repr::parse(&packet, &ChecksumCapabilities::default()).unwrap() {
            Icmpv4Repr::EchoRequest { ident, seq_no, data } => {
                assert_eq!(ident, 0x1234);
                assert_eq!(seq_no, 0);
                assert_eq!(data.len(), 32);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(tracker.is_outstanding());
    }

    #[test]
    fn start_rejects_short_buffer() {
        let mut tracker = EchoTracker::new(1, 32, None);
        let mut buf = [0u8; 8];
        assert_eq!(
            tracker.start(TARGET, ms(0), &mut buf),
            Err(PingError::BufferTooSmall)
        );
        assert!(!tracker.is_outstanding());
    }

    #[test]
    fn matching_reply_completes_with_rtt() {
        let mut tracker = EchoTracker::new(7, 16, None);
        started(&mut tracker, 1000);

        tracker.on_packet(TARGET, &reply(7, 0), ms(1037));

        let result = tracker.take_result().unwrap();
        assert_eq!(result.outcome, PingOutcome::EchoReply);
        assert_eq!(result.responder, TARGET);
        assert_eq!(result.rtt_ms, 37);
        assert!(!tracker.is_outstanding());
        assert_eq!(tracker.take_result(), Err(PingError::NotReady));
    }

    #[test]
    fn foreign_and_stale_replies_are_ignored() {
        let mut tracker = EchoTracker::new(7, 16, None);
        started(&mut tracker, 0);
        started(&mut tracker, 4000);

        tracker.on_packet(TARGET, &reply(8, 1), ms(4010));
        tracker.on_packet(TARGET, &reply(7, 0), ms(4010));
        tracker.on_packet(TARGET, &[0xff, 0x00], ms(4010));

        assert_eq!(tracker.take_result(), Err(PingError::NotReady));
        assert!(tracker.is_outstanding());
    }

    #[test]
    fn destination_unreachable_quoting_our_request() {
        let mut tracker = EchoTracker::new(7, 16, None);
        let request = started(&mut tracker, 0);
        let router = Ipv4Addr::new(192, 168, 1, 1);
        let header = Ipv4Repr {
            src_addr: Ipv4Addr::new(192, 168, 1, 50),
            dst_addr: TARGET,
            next_header: IpProtocol::Icmp,
            payload_len: 8,
            hop_limit: 64,
        };
        let repr = Icmpv4Repr::DstUnreachable {
            reason: Icmpv4DstUnreachable::HostUnreachable,
            header,
            data: &request[..8],
        };
        let mut buf = vec![0u8; repr.buffer_len()];
        repr.emit(
            &mut Icmpv4Packet::new_unchecked(&mut buf[..]),
            &ChecksumCapabilities::default(),
        );

        tracker.on_packet(router, &buf, ms(20));

        let result = tracker.take_result().unwrap();
        assert_eq!(result.outcome, PingOutcome::DestinationUnreachable);
        assert_eq!(result.responder, router);
    }

    #[test]
    fn timeout_fires_once() {
        let mut tracker = EchoTracker::new(7, 16, Some(Duration::from_millis(3000)));
        started(&mut tracker, 4000);
        assert_eq!(tracker.deadline(), Some(ms(7000)));

        tracker.check_timeout(ms(6999));
        assert_eq!(tracker.take_result(), Err(PingError::NotReady));

        tracker.check_timeout(ms(7000));
        tracker.check_timeout(ms(7100));
        let result = tracker.take_result().unwrap();
        assert_eq!(result.outcome, PingOutcome::Timeout);
        assert_eq!(result.responder, TARGET);
        assert_eq!(tracker.take_result(), Err(PingError::NotReady));
    }

    #[test]
    fn no_timeout_means_waiting_forever() {
        let mut tracker = EchoTracker::new(7, 16, None);
        started(&mut tracker, 0);
        tracker.check_timeout(ms(1_000_000));
        assert!(tracker.is_outstanding());
        assert_eq!(tracker.deadline(), None);
    }
}
