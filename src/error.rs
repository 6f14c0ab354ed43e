//! Error types

use core::fmt;

/// Failures reported by the echo client.
///
/// The numeric [`code`](PingError::code) is what ends up on the serial
/// console, so the values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PingError {
    /// No completed result is queued. Not a failure for the poll task.
    NotReady,
    /// The interface has no IPv4 configuration yet.
    NotConfigured,
    /// The ICMP socket has no room for another packet right now.
    Busy,
    /// The stack refused the target address.
    Unaddressable,
    /// The echo payload does not fit into the socket buffer.
    BufferTooSmall,
}

impl PingError {
    pub const fn code(self) -> i8 {
        match self {
            Self::NotReady => 1,
            Self::NotConfigured => 2,
            Self::Busy => 3,
            Self::Unaddressable => 4,
            Self::BufferTooSmall => 5,
        }
    }
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "no result available"),
            Self::NotConfigured => write!(f, "interface not configured"),
            Self::Busy => write!(f, "socket busy"),
            Self::Unaddressable => write!(f, "target unaddressable"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    /// Every slot of the timer queue is taken.
    Full,
    /// A periodic entry needs a non-zero period.
    ZeroPeriod,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "timer queue full"),
            Self::ZeroPeriod => write!(f, "periodic entry with zero period"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Not a dotted-quad IPv4 address.
    InvalidAddress,
    /// 0.0.0.0 cannot be pinged.
    UnspecifiedTarget,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "invalid IPv4 address"),
            Self::UnspecifiedTarget => write!(f, "unspecified target address"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_error_codes_are_distinct() {
        let all = [
            PingError::NotReady,
            PingError::NotConfigured,
            PingError::Busy,
            PingError::Unaddressable,
            PingError::BufferTooSmall,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(PingError::Busy.to_string(), "socket busy");
        assert_eq!(SchedulerError::Full.to_string(), "timer queue full");
    }
}
