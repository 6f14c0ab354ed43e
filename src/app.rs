//! The pump: network I/O plus the deferred tasks of the ping workflow.

use core::fmt::Write;

use smoltcp::phy::Device;
use smoltcp::time::{Duration, Instant};

use crate::error::SchedulerError;
use crate::net::{EchoClient, NetInterface, PacketPump};
use crate::ping::{PingContext, launch_ping, poll_ping_result, report_interface};
use crate::scheduler::{Scheduler, TaskId};

/// Launch, poll and the optional interface report.
pub const TASK_SLOTS: usize = 4;

/// Upper bound for one idle period of the pump loop.
pub const MAX_IDLE: Duration = Duration::from_millis(1000);

pub struct PingApp<N, W> {
    scheduler: Scheduler<PingContext<N, W>, TASK_SLOTS>,
    ctx: PingContext<N, W>,
    launch: TaskId,
    poll: TaskId,
}

impl<N, W> PingApp<N, W>
where
    N: NetInterface + EchoClient + PacketPump,
    W: Write,
{
    /// Seeds the workflow tasks relative to `now`.
    pub fn new(ctx: PingContext<N, W>, now: Instant) -> Result<Self, SchedulerError> {
        let cfg = ctx.config;
        let mut scheduler = Scheduler::new();
        let launch = scheduler.schedule_every(
            now,
            cfg.launch_interval,
            cfg.launch_interval,
            launch_ping::<N, W>,
        )?;
        let poll = scheduler.schedule_every(
            now,
            cfg.poll_interval,
            cfg.poll_interval,
            poll_ping_result::<N, W>,
        )?;
        if let Some(interval) = cfg.debug_interval {
            scheduler.schedule_every(now, interval, interval, report_interface::<N, W>)?;
        }
        info!(
            "ping workflow seeded: launch every {} ms, poll every {} ms",
            cfg.launch_interval.total_millis(),
            cfg.poll_interval.total_millis()
        );

        Ok(Self {
            scheduler,
            ctx,
            launch,
            poll,
        })
    }

    /// One pass: service the device, fire due tasks, and tell the caller
    /// how long it may wait before the next pass.
    pub fn pump_once<D: Device>(&mut self, now: Instant, device: &mut D) -> Duration {
        self.ctx.net.pump(now, device);
        let fired = self.scheduler.run_due(now, &mut self.ctx);
        if fired > 0 {
            trace!("{} deferred tasks fired", fired);
        }

        let timers = self.scheduler.delay_until_next(now);
        let net = self.ctx.net.poll_delay(now);
        [timers, net].into_iter().flatten().fold(MAX_IDLE, Duration::min)
    }

    pub fn context(&self) -> &PingContext<N, W> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut PingContext<N, W> {
        &mut self.ctx
    }

    pub fn next_launch(&self) -> Option<Instant> {
        self.scheduler.deadline_of(self.launch)
    }

    pub fn next_poll(&self) -> Option<Instant> {
        self.scheduler.deadline_of(self.poll)
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PingConfig, Readiness};
    use crate::error::PingError;
    use crate::net::InterfaceAddresses;
    use crate::ping::{PingOutcome, PingResult};
    use core::net::Ipv4Addr;
    use smoltcp::phy::{self, DeviceCapabilities};

    struct NullDevice;

    struct NullToken;

    impl phy::RxToken for NullToken {
        fn consume<R, F: FnOnce(&[u8]) -> R>(self, f: F) -> R {
            f(&[])
        }
    }

    impl phy::TxToken for NullToken {
        fn consume<R, F: FnOnce(&mut [u8]) -> R>(self, len: usize, f: F) -> R {
            f(&mut vec![0u8; len])
        }
    }

    impl Device for NullDevice {
        type RxToken<'a>
            = NullToken
        where
            Self: 'a;
        type TxToken<'a>
            = NullToken
        where
            Self: 'a;

        fn receive(&mut self, _: Instant) -> Option<(NullToken, NullToken)> {
            None
        }

        fn transmit(&mut self, _: Instant) -> Option<NullToken> {
            None
        }

        fn capabilities(&self) -> DeviceCapabilities {
            DeviceCapabilities::default()
        }
    }

    #[derive(Default)]
    struct FakeNet {
        configured: bool,
        pumps: usize,
        hint: Option<Duration>,
        sent: usize,
        queued: Option<PingResult>,
    }

    impl NetInterface for FakeNet {
        fn addresses(&self) -> InterfaceAddresses {
            InterfaceAddresses::UNCONFIGURED
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    impl EchoClient for FakeNet {
        fn send_echo_request(&mut self, _: Ipv4Addr) -> Result<(), PingError> {
            self.sent += 1;
            Ok(())
        }

        fn fetch_echo_result(&mut self) -> Result<PingResult, PingError> {
            self.queued.take().ok_or(PingError::NotReady)
        }
    }

    impl PacketPump for FakeNet {
        fn pump<D: Device>(&mut self, _: Instant, _: &mut D) {
            self.pumps += 1;
        }

        fn poll_delay(&mut self, _: Instant) -> Option<Duration> {
            self.hint
        }
    }

    fn app(config: PingConfig) -> PingApp<FakeNet, String> {
        let ctx = PingContext::new(FakeNet::default(), String::new(), config);
        PingApp::new(ctx, Instant::ZERO).unwrap()
    }

    fn ms(v: i64) -> Instant {
        Instant::from_millis(v)
    }

    #[test]
    fn seeds_launch_and_poll() {
        let app = app(PingConfig::new());
        assert_eq!(app.pending_tasks(), 2);
        assert_eq!(app.next_launch(), Some(ms(4000)));
        assert_eq!(app.next_poll(), Some(ms(100)));
    }

    #[test]
    fn debug_report_is_optional() {
        let app = app(PingConfig::new().with_debug_interval(Some(Duration::from_secs(5))));
        assert_eq!(app.pending_tasks(), 3);
    }

    #[test]
    fn pump_returns_time_to_next_deadline() {
        let mut app = app(PingConfig::new());
        let delay = app.pump_once(ms(30), &mut NullDevice);
        assert_eq!(delay, Duration::from_millis(70));
        assert_eq!(app.context().net.pumps, 1);
    }

    #[test]
    fn network_hint_shortens_the_wait() {
        let mut app = app(PingConfig::new());
        app.context_mut().net.hint = Some(Duration::from_millis(5));
        assert_eq!(app.pump_once(ms(0), &mut NullDevice), Duration::from_millis(5));
    }

    #[test]
    fn idle_wait_is_capped() {
        let config = PingConfig {
            launch_interval: Duration::from_secs(10),
            poll_interval: Duration::from_secs(10),
            ..PingConfig::new()
        };
        let mut app = app(config);
        assert_eq!(app.pump_once(ms(0), &mut NullDevice), MAX_IDLE);
    }

    #[test]
    fn due_tasks_fire_and_rearm() {
        let mut app = app(PingConfig::new().with_readiness(Readiness::Configured));
        app.context_mut().net.configured = true;
        app.context_mut().net.queued = Some(PingResult {
            outcome: PingOutcome::EchoReply,
            responder: Ipv4Addr::new(216, 58, 213, 195),
            rtt_ms: 12,
        });

        app.pump_once(ms(4000), &mut NullDevice);

        assert_eq!(app.context().net.sent, 1);
        assert_eq!(app.next_launch(), Some(ms(8000)));
        assert_eq!(app.next_poll(), Some(ms(4100)));
        assert!(
            app.context()
                .console
                .contains("Good ping from 216.58.213.195 12 ms")
        );
    }

    #[test]
    fn late_pass_launches_once() {
        let mut app = app(PingConfig::new());
        app.context_mut().net.configured = true;

        app.pump_once(ms(0), &mut NullDevice);
        app.pump_once(ms(12_000), &mut NullDevice);

        assert_eq!(app.context().net.sent, 1);
        assert_eq!(app.next_launch(), Some(ms(16_000)));
        assert_eq!(app.next_poll(), Some(ms(12_100)));
    }
}
