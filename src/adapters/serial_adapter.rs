//! Serial line source for microcontrollers streaming one sample per line
//!
//! Wraps the serialport crate. Blocking port reads run on Tokio's blocking task
//! executor so the acquisition loop never stalls the runtime.

use super::LineSource;
use crate::config::SerialConfig;
use crate::error::{AppResult, DaqError};
use async_trait::async_trait;
use std::time::Duration;

#[cfg(feature = "instrument_serial")]
use super::strip_terminator;
#[cfg(feature = "instrument_serial")]
use serialport::SerialPort;
#[cfg(feature = "instrument_serial")]
use std::sync::Arc;
#[cfg(feature = "instrument_serial")]
use tokio::sync::Mutex;
#[cfg(feature = "instrument_serial")]
use tracing::debug;

/// Internal per-read timeout of the port; the line timeout is enforced on top of it.
#[cfg(feature = "instrument_serial")]
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial [`LineSource`] for RS-232 / USB-serial devices
pub struct SerialLineSource {
    /// Port name (e.g., "/dev/ttyUSB0", "COM7")
    port_name: String,

    /// Baud rate (e.g., 9600, 115200)
    baud_rate: u32,

    /// Upper bound for reading one complete line
    timeout: Duration,

    #[cfg(feature = "instrument_serial")]
    port: Option<Arc<Mutex<Box<dyn SerialPort>>>>,
}

impl SerialLineSource {
    /// Create a closed source with a one second line timeout.
    ///
    /// # Arguments
    /// * `port_name` - Serial port path (e.g., "/dev/ttyUSB0", "COM7")
    /// * `baud_rate` - Communication speed (e.g., 9600, 115200)
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            timeout: Duration::from_secs(1),
            #[cfg(feature = "instrument_serial")]
            port: None,
        }
    }

    /// Build from the `[serial]` configuration section.
    pub fn from_config(config: &SerialConfig) -> Self {
        Self::new(config.port.clone(), config.baud_rate)
            .with_timeout(Duration::from_millis(config.timeout_ms))
    }

    /// Set the line read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open the port.
    #[cfg(feature = "instrument_serial")]
    pub async fn open(&mut self) -> AppResult<()> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| {
                DaqError::Serial(format!(
                    "Failed to open serial port '{}' at {} baud: {}",
                    self.port_name, self.baud_rate, e
                ))
            })?;
        self.port = Some(Arc::new(Mutex::new(port)));
        debug!(
            port = %self.port_name,
            baud = self.baud_rate,
            "Serial port opened"
        );
        Ok(())
    }

    #[cfg(not(feature = "instrument_serial"))]
    pub async fn open(&mut self) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("instrument_serial".into()))
    }

    /// Close the port. Closing a closed source is a no-op.
    pub fn close(&mut self) {
        #[cfg(feature = "instrument_serial")]
        if self.port.take().is_some() {
            debug!(port = %self.port_name, "Serial port closed");
        }
    }

    /// Whether the port is open.
    pub fn is_open(&self) -> bool {
        #[cfg(feature = "instrument_serial")]
        {
            self.port.is_some()
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            false
        }
    }

    #[cfg(feature = "instrument_serial")]
    fn port(&self) -> AppResult<Arc<Mutex<Box<dyn SerialPort>>>> {
        self.port.clone().ok_or(DaqError::SerialPortNotConnected)
    }
}

#[cfg(feature = "instrument_serial")]
#[async_trait]
impl LineSource for SerialLineSource {
    async fn has_data(&mut self) -> AppResult<bool> {
        let port = self.port()?;
        let waiting = port.lock().await.bytes_to_read()?;
        Ok(waiting > 0)
    }

    async fn read_line(&mut self) -> AppResult<Vec<u8>> {
        let port = self.port()?;
        let timeout = self.timeout;

        let raw = tokio::task::spawn_blocking(move || -> AppResult<Vec<u8>> {
            use std::io::Read;

            let mut guard = port.blocking_lock();
            let mut line = Vec::new();
            let mut byte = [0u8; 1];
            let start = std::time::Instant::now();

            loop {
                if start.elapsed() > timeout {
                    return Err(DaqError::Serial(format!(
                        "Serial read timeout after {:?}",
                        timeout
                    )));
                }

                match guard.read(&mut byte) {
                    Ok(0) => {
                        return Err(DaqError::Serial("Unexpected EOF from serial port".into()));
                    }
                    Ok(_) => {
                        line.push(byte[0]);
                        if byte[0] == b'\n' {
                            return Ok(line);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => return Err(DaqError::Io(e)),
                }
            }
        })
        .await
        .map_err(|e| DaqError::Serial(format!("Serial I/O task panicked: {e}")))??;

        Ok(strip_terminator(raw))
    }

    async fn reset_buffers(&mut self) -> AppResult<()> {
        let port = self.port()?;
        port.lock().await.clear(serialport::ClearBuffer::All)?;
        debug!(port = %self.port_name, "Serial buffers cleared");
        Ok(())
    }

    fn info(&self) -> String {
        format!(
            "SerialLineSource({} @ {} baud)",
            self.port_name, self.baud_rate
        )
    }
}

#[cfg(not(feature = "instrument_serial"))]
#[async_trait]
impl LineSource for SerialLineSource {
    async fn has_data(&mut self) -> AppResult<bool> {
        Err(DaqError::FeatureNotEnabled("instrument_serial".into()))
    }

    async fn read_line(&mut self) -> AppResult<Vec<u8>> {
        Err(DaqError::FeatureNotEnabled("instrument_serial".into()))
    }

    async fn reset_buffers(&mut self) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("instrument_serial".into()))
    }

    fn info(&self) -> String {
        format!(
            "SerialLineSource({} @ {} baud, disabled)",
            self.port_name, self.baud_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_source_creation() {
        let source = SerialLineSource::new("/dev/ttyUSB0".to_string(), 9600);
        assert!(!source.is_open());
        assert_eq!(source.port_name, "/dev/ttyUSB0");
        assert_eq!(source.baud_rate, 9600);
        assert_eq!(source.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_from_config() {
        let config = SerialConfig {
            port: "COM7".into(),
            baud_rate: 115200,
            timeout_ms: 250,
        };
        let source = SerialLineSource::from_config(&config);
        assert_eq!(source.timeout, Duration::from_millis(250));
        assert!(source.info().contains("COM7"));
        assert!(source.info().contains("115200"));
    }

    #[tokio::test]
    async fn test_unopened_source_reports_not_connected() {
        let mut source = SerialLineSource::new("/dev/ttyUSB0".to_string(), 9600);
        assert!(source.has_data().await.is_err());
        assert!(source.read_line().await.is_err());
        source.close();
        assert!(!source.is_open());
    }
}
