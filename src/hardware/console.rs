use core::fmt;

use embedded_io::Write;

/// Line-oriented text console on top of a blocking byte sink (the UART).
pub struct SerialConsole<W> {
    port: W,
}

impl<W: Write> SerialConsole<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> W {
        self.port
    }
}

impl<W: Write> fmt::Write for SerialConsole<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.port.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
