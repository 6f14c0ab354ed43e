//! Board-facing glue between embassy peripherals and the portable core.

pub mod console;
pub mod eth;

pub use console::SerialConsole;
pub use eth::DriverAdapter;
