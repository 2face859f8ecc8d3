//! Serial driver for low-level line I/O with UDIN boards
//!
//! Commands go out terminated by CR; everything the board sends back is a
//! CR LF terminated line. Reads are bounded: the driver polls the port in
//! short slices until a full line is buffered or [`READ_DEADLINE`] passes.

use async_trait::async_trait;
use relaybank_core::{RelayError, Result, UdinSerial};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout, Instant};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, warn};

/// Longest time a single line read may take
pub const READ_DEADLINE: Duration = Duration::from_secs(1);

/// Pause between read attempts while waiting for the board
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);

const COMMAND_TERMINATOR: &str = "\r";
const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Trait for serial transport abstraction
///
/// This trait enables testing of `UdinController` without real hardware
/// by allowing mock implementations.
#[async_trait]
pub trait SerialTransport: Send {
    /// Send one command token followed by CR
    async fn send_line(&mut self, token: &str) -> Result<()>;

    /// Read one CR LF terminated line, returned without its terminator
    async fn read_line(&mut self) -> Result<String>;

    /// Discard any buffered input
    fn clear_input_buffer(&mut self) -> Result<()>;

    /// Get the port path for logging and reinitialization
    fn port_path(&self) -> Option<&str>;
}

/// Remove the first complete line from `buf`.
///
/// Returns `None` while no CR LF has been seen; bytes after the terminator
/// stay buffered for the next call.
pub fn split_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf
        .windows(LINE_TERMINATOR.len())
        .position(|window| window == LINE_TERMINATOR)?;
    let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
    buf.drain(..pos + LINE_TERMINATOR.len());
    Some(line)
}

/// Serial driver for hardware communication
///
/// Generic over the port so tests can substitute an in-memory stream; real
/// hardware uses [`SerialStream`].
pub struct SerialDriver<P = SerialStream> {
    port: P,
    port_path: String,
    pending: Vec<u8>,
    debug_uart: bool,
}

impl SerialDriver<SerialStream> {
    /// Open a serial device with the fixed UDIN framing
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyUSB0")
    /// * `debug_uart` - Log every line sent and received
    pub fn open(port_path: &str, debug_uart: bool) -> Result<Self> {
        debug!(
            "Opening serial port: {} ({} baud)",
            port_path,
            UdinSerial::BAUD_RATE
        );

        let port = tokio_serial::new(port_path, UdinSerial::BAUD_RATE)
            .timeout(READ_DEADLINE)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_path, e);
                RelayError::Serial(format!("Failed to open serial port {}: {}", port_path, e))
            })?;

        // Anything already queued predates us and would break the first echo
        if let Err(e) = port.clear(tokio_serial::ClearBuffer::Input) {
            warn!("Failed to clear input buffer on {}: {}", port_path, e);
        }

        debug!("Serial port opened successfully");

        Ok(Self::with_port(port, port_path, debug_uart))
    }
}

impl<P> SerialDriver<P>
where
    P: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open port
    pub fn with_port(port: P, port_path: &str, debug_uart: bool) -> Self {
        if debug_uart {
            debug!("UART debug logging enabled for {}", port_path);
        }

        Self {
            port,
            port_path: port_path.to_string(),
            pending: Vec::new(),
            debug_uart,
        }
    }

    async fn send(&mut self, token: &str) -> Result<()> {
        let framed = format!("{}{}", token, COMMAND_TERMINATOR);

        if self.debug_uart {
            debug!("TX: {:?}", framed);
        }

        timeout(READ_DEADLINE, self.port.write_all(framed.as_bytes()))
            .await
            .map_err(|_| {
                error!("Write timeout");
                RelayError::Timeout("Write operation timed out".to_string())
            })?
            .map_err(|e| {
                error!("Write failed: {}", e);
                RelayError::Serial(format!("Write failed: {}", e))
            })?;

        timeout(READ_DEADLINE, self.port.flush())
            .await
            .map_err(|_| RelayError::Timeout("Flush operation timed out".to_string()))?
            .map_err(|e| RelayError::Serial(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    async fn receive_line(&mut self) -> Result<String> {
        let deadline = Instant::now() + READ_DEADLINE;
        let mut chunk = [0u8; 64];

        loop {
            if let Some(line) = split_line(&mut self.pending) {
                if self.debug_uart {
                    debug!("RX: {:?}", line);
                }
                return Ok(line);
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = READ_POLL_INTERVAL.min(deadline - now);

            match timeout(slice, self.port.read(&mut chunk)).await {
                // Nothing arrived in this slice, try again
                Err(_) => continue,
                Ok(Ok(0)) => {
                    warn!("Serial port returned EOF - device may have been disconnected");
                    return Err(RelayError::DeviceDisconnected(
                        "Serial port returned EOF - device may have been unplugged".to_string(),
                    ));
                }
                Ok(Ok(n)) => self.pending.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => sleep(slice).await,
                Ok(Err(e)) => {
                    error!("Read error: {}", e);
                    return Err(RelayError::Serial(format!("Read error: {}", e)));
                }
            }
        }

        if self.pending.is_empty() {
            error!("Read timeout");
            return Err(RelayError::Timeout("No response from device".to_string()));
        }

        let partial = std::mem::take(&mut self.pending);
        warn!("Partial read from device: {:?}", partial);
        Err(RelayError::ShortRead(partial))
    }
}

#[async_trait]
impl<P> SerialTransport for SerialDriver<P>
where
    P: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_line(&mut self, token: &str) -> Result<()> {
        self.send(token).await
    }

    async fn read_line(&mut self) -> Result<String> {
        self.receive_line().await
    }

    fn clear_input_buffer(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            debug!("Discarding {} stale bytes", self.pending.len());
            self.pending.clear();
        }
        Ok(())
    }

    fn port_path(&self) -> Option<&str> {
        Some(&self.port_path)
    }
}

/// Determine if an error indicates device disconnection
///
/// Returns `true` if the error suggests the device has gone away (USB
/// unplugged, power loss) rather than a transient or protocol error.
pub fn is_disconnect_error(err: &RelayError) -> bool {
    match err {
        RelayError::DeviceDisconnected(_) => true,
        RelayError::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
        ),
        RelayError::Serial(msg) => {
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("broken pipe")
                || msg_lower.contains("no such device")
                || msg_lower.contains("device disconnected")
                || msg_lower.contains("device not configured")
                || msg_lower.contains("input/output error")
        }
        // Timeouts and protocol errors leave the port usable
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn driver(mock: tokio_test::io::Mock) -> SerialDriver<tokio_test::io::Mock> {
        SerialDriver::with_port(mock, "/dev/mock", false)
    }

    #[test]
    fn test_split_line_waits_for_terminator() {
        let mut buf = b"s0\r".to_vec();
        assert_eq!(split_line(&mut buf), None);
        assert_eq!(buf, b"s0\r");

        buf.extend_from_slice(b"\n5\r\n");
        assert_eq!(split_line(&mut buf).as_deref(), Some("s0"));
        assert_eq!(split_line(&mut buf).as_deref(), Some("5"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_split_line_bare_lf_is_not_a_terminator() {
        let mut buf = b"UDIN\n".to_vec();
        assert_eq!(split_line(&mut buf), None);
    }

    #[test]
    fn test_split_line_empty_line() {
        let mut buf = b"\r\nrest".to_vec();
        assert_eq!(split_line(&mut buf).as_deref(), Some(""));
        assert_eq!(buf, b"rest");
    }

    #[tokio::test]
    async fn test_send_line_appends_cr() {
        let mock = Builder::new().write(b"n3\r").build();
        let mut drv = driver(mock);
        drv.send_line("n3").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_echo_and_response_in_one_chunk() {
        let mock = Builder::new()
            .write(b"?\r")
            .read(b"?\r\nUDIN-8R 8 x Relay V1.0\r\n")
            .build();
        let mut drv = driver(mock);

        drv.send_line("?").await.unwrap();
        assert_eq!(drv.read_line().await.unwrap(), "?");
        assert_eq!(drv.read_line().await.unwrap(), "UDIN-8R 8 x Relay V1.0");
    }

    #[tokio::test]
    async fn test_read_line_split_across_chunks() {
        let mock = Builder::new()
            .write(b"s0\r")
            .read(b"s0\r\n1")
            .read(b"3\r")
            .read(b"\n")
            .build();
        let mut drv = driver(mock);

        drv.send_line("s0").await.unwrap();
        assert_eq!(drv.read_line().await.unwrap(), "s0");
        assert_eq!(drv.read_line().await.unwrap(), "13");
    }

    #[tokio::test]
    async fn test_read_line_eof_is_disconnect() {
        let mock = Builder::new().read(b"s0").build();
        let mut drv = driver(mock);

        let err = drv.read_line().await.unwrap_err();
        assert!(matches!(err, RelayError::DeviceDisconnected(_)));
        assert!(is_disconnect_error(&err));
    }

    #[tokio::test]
    async fn test_read_line_error_aborts() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::Other, "framing"))
            .build();
        let mut drv = driver(mock);

        let err = drv.read_line().await.unwrap_err();
        assert!(matches!(err, RelayError::Serial(_)));
    }

    #[tokio::test]
    async fn test_read_line_partial_at_deadline_is_short_read() {
        let mock = Builder::new()
            .read(b"UDIN-8R")
            .wait(READ_DEADLINE * 2)
            .build();
        let mut drv = driver(mock);

        match drv.read_line().await {
            Err(RelayError::ShortRead(bytes)) => assert_eq!(bytes, b"UDIN-8R"),
            other => panic!("Expected ShortRead, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_line_silence_is_timeout() {
        let mock = Builder::new().wait(READ_DEADLINE * 2).build();
        let mut drv = driver(mock);

        let started = std::time::Instant::now();
        let err = drv.read_line().await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));
        assert!(started.elapsed() >= READ_DEADLINE);
        assert!(!is_disconnect_error(&err));
    }

    #[tokio::test]
    async fn test_clear_input_buffer_drops_leftovers() {
        let mock = Builder::new().read(b"stale\r\nhalf").build();
        let mut drv = driver(mock);

        assert_eq!(drv.read_line().await.unwrap(), "stale");
        drv.clear_input_buffer().unwrap();
        assert!(drv.pending.is_empty());
        assert_eq!(drv.port_path(), Some("/dev/mock"));
    }

    #[test]
    fn test_is_disconnect_error_classification() {
        assert!(is_disconnect_error(&RelayError::DeviceDisconnected("x".into())));
        assert!(is_disconnect_error(&RelayError::Serial("Broken pipe".into())));
        assert!(is_disconnect_error(&RelayError::Serial("No such device".into())));
        assert!(is_disconnect_error(&RelayError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "gone"
        ))));
        assert!(!is_disconnect_error(&RelayError::Timeout("read".into())));
        assert!(!is_disconnect_error(&RelayError::Protocol("echo".into())));
        assert!(!is_disconnect_error(&RelayError::Serial("Write failed: some other error".into())));
    }
}
