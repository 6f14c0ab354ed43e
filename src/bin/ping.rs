//! STM32F407 Ethernet Ping Demo
//! =============================================================================================
//!
//! Brings up the clock tree, a UART console and the Ethernet MAC, then pings a
//! fixed host forever and prints every result on the console.
//!
//! Hardware Connections:
//!   Console (USART1, 921600 8N1):
//!      TX   -> PA9
//!      RX   -> PA10
//!
//!   RMII PHY (LAN8720, address 0):
//!      REF_CLK -> PA1     MDIO -> PA2     MDC  -> PC1
//!      CRS_DV  -> PA7     RXD0 -> PC4     RXD1 -> PC5
//!      TX_EN   -> PB11    TXD0 -> PB12    TXD1 -> PB13
//!
//!   Heartbeat LED -> PD12
//!
//! Behaviour:
//! 1. DHCP configures the interface (static addressing is a `NetConfig` switch)
//! 2. Every 4 s one echo request goes to the target (`PING_TARGET` at build time)
//! 3. Every 100 ms a completed result, if any, is printed
//!
//!==============================================================================================

#![no_std]
#![no_main]

use core::future::{Future, poll_fn};
use core::pin::pin;
use core::task::{Context, Poll, Waker};

use embassy_executor::Spawner;
use embassy_stm32::{
    bind_interrupts,
    eth::{self, Ethernet, PacketQueue, generic_smi::GenericSMI},
    gpio::{Level, Output, Speed},
    mode::Blocking,
    peripherals::ETH,
    usart::{self, Uart, UartTx},
};
use embassy_time::{Ticker, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use eth_ping::{
    AppConfig, NetResources, NetStack, PingApp, PingContext,
    config::parse_target,
    hardware::{DriverAdapter, SerialConsole},
};

bind_interrupts!(struct Irqs {
    ETH => eth::InterruptHandler;
});

type Eth = Ethernet<'static, ETH, GenericSMI>;
type Console = SerialConsole<UartTx<'static, Blocking>>;
type App = PingApp<NetStack<'static>, Console>;

static PACKETS: StaticCell<PacketQueue<4, 4>> = StaticCell::new();
static RESOURCES: StaticCell<NetResources<'static>> = StaticCell::new();

fn now() -> smoltcp::time::Instant {
    smoltcp::time::Instant::from_micros(embassy_time::Instant::now().as_micros() as i64)
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::*;
        // HSI 16 MHz / 8 * 168 / 2 = 168 MHz, USB/SDIO clock 84 MHz
        config.rcc.hsi = true;
        config.rcc.pll_src = PllSource::HSI;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV8,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2),
            divq: Some(PllQDiv::DIV4),
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
    }
    let p = embassy_stm32::init(config);

    let app_config = AppConfig::default();
    defmt::info!("eth-ping starting");

    let mut uart_config = usart::Config::default();
    uart_config.baudrate = app_config.console.baudrate;
    let uart = defmt::unwrap!(Uart::new_blocking(p.USART1, p.PA10, p.PA9, uart_config));
    let (tx, _rx) = uart.split();
    let console = SerialConsole::new(tx);

    let mut eth = Ethernet::new(
        PACKETS.init(PacketQueue::new()),
        p.ETH,
        Irqs,
        p.PA1,
        p.PA2,
        p.PC1,
        p.PA7,
        p.PC4,
        p.PC5,
        p.PB12,
        p.PB13,
        p.PB11,
        GenericSMI::new(0),
        app_config.net.mac,
    );

    let ping_config = match option_env!("PING_TARGET") {
        Some(s) => app_config.ping.with_target(defmt::unwrap!(parse_target(s))),
        None => app_config.ping,
    };

    // Interface setup only reads the device capabilities, no waker needed yet.
    let mut cx = Context::from_waker(Waker::noop());
    let stack = NetStack::new(
        &app_config.net,
        &ping_config,
        &mut DriverAdapter::new(&mut cx, &mut eth),
        RESOURCES.init(NetResources::new()),
        now(),
    );

    let ctx = PingContext::new(stack, console, ping_config);
    let app = defmt::unwrap!(PingApp::new(ctx, now()));

    spawner.spawn(net_task(eth, app)).unwrap();

    // Heartbeat
    let mut led = Output::new(p.PD12, Level::Low, Speed::Low);
    let mut ticker = Ticker::every(embassy_time::Duration::from_millis(500));
    loop {
        led.toggle();
        ticker.next().await;
    }
}

/// Network pump
///
/// Services the MAC and the deferred ping tasks, then sleeps until a frame
/// arrives or the earliest deadline is due. Link changes are logged.
#[embassy_executor::task]
async fn net_task(mut eth: Eth, mut app: App) {
    let mut link_up = false;
    poll_fn(|cx| {
        let delay = {
            let mut device = DriverAdapter::new(cx, &mut eth);
            let up = device.link_up();
            if up != link_up {
                link_up = up;
                if up {
                    defmt::info!("ethernet link up");
                } else {
                    defmt::warn!("ethernet link down");
                }
            }
            app.pump_once(now(), &mut device)
        };

        let timer = pin!(Timer::after(embassy_time::Duration::from_micros(
            delay.total_micros()
        )));
        if timer.poll(cx).is_ready() {
            cx.waker().wake_by_ref();
        }
        Poll::<()>::Pending
    })
    .await
}
