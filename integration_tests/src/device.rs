//! Virtual COM port handling.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

/// Find the two virtual COM ports of the bridge.
///
/// Both ports belong to one composite device, so the first two CDC-ACM ports
/// in name order are taken: the lower one is the first virtual port.
pub fn find_port_pair() -> Result<(String, String)> {
    let mut ports: Vec<String> = serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .filter(|name| name.contains("ttyACM") || name.contains("usbmodem"))
        .collect();
    ports.sort();

    if ports.len() < 2 {
        anyhow::bail!(
            "Need both bridge ports, found {}. Ports: {:?}",
            ports.len(),
            ports
        );
    }
    Ok((ports[0].clone(), ports[1].clone()))
}

/// Resolve the two port arguments, auto-detecting when both are "auto".
pub fn resolve_port_pair(port_a: &str, port_b: &str) -> Result<(String, String)> {
    match (port_a, port_b) {
        ("auto", "auto") => find_port_pair(),
        ("auto", _) | (_, "auto") => {
            anyhow::bail!("Give both ports or neither")
        }
        (a, b) => Ok((a.to_string(), b.to_string())),
    }
}

/// One virtual COM port of the bridge.
pub struct BridgePort {
    name: String,
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl BridgePort {
    /// Open a port. The baud rate is sent to the device as its line coding.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()?;

        Ok(Self {
            name: port_name.to_string(),
            port,
            timeout: Duration::from_secs(2),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the baud rate, which issues SET_LINE_CODING on the device.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port.set_baud_rate(baud_rate)?;
        Ok(())
    }

    /// Discard anything buffered on the host side.
    pub fn clear_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    /// Read and discard until the line has been quiet for a moment.
    pub fn drain(&mut self) -> Result<()> {
        let mut buf = [0u8; 256];
        let quiet = Duration::from_millis(100);
        let mut last_data = Instant::now();

        while last_data.elapsed() < quiet {
            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => last_data = Instant::now(),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read exactly `len` bytes or fail after the timeout.
    pub fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut received = Vec::with_capacity(len);
        let mut buf = [0u8; 256];
        let start = Instant::now();

        while received.len() < len {
            if start.elapsed() > self.timeout {
                anyhow::bail!(
                    "Timeout on {}: got {} of {} bytes",
                    self.name,
                    received.len(),
                    len
                );
            }

            let want = (len - received.len()).min(buf.len());
            match self.port.read(&mut buf[..want]) {
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(received)
    }

    /// Collect whatever arrives within `window`.
    pub fn read_for(&mut self, window: Duration) -> Result<Vec<u8>> {
        let mut received = Vec::new();
        let mut buf = [0u8; 256];
        let start = Instant::now();

        while start.elapsed() < window {
            match self.port.read(&mut buf) {
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(received)
    }
}
