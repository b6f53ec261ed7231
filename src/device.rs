use std::io::{BufRead, BufReader, Read};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use bytes::Bytes;
use thiserror::Error;

use crate::codecs::{create_codec, Codec, CodecError, CodecType};

/// Default wall-clock budget for one capture attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The IR transceiver seam. `read_code` is a non-blocking poll: `Ok(None)`
/// means nothing has been captured yet, any `Err` is fatal for the attempt.
pub trait Transceiver {
    type Error;

    fn authenticate(&mut self) -> Result<bool, Self::Error>;
    fn enter_learning(&mut self) -> Result<(), Self::Error>;
    fn read_code(&mut self) -> Result<Option<Bytes>, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    /// Learn from a broadlink remote on the local network
    Broadlink { addr: Ipv4Addr },

    /// Read encoded code lines from stdin, useful for dry runs
    Lines { codec_type: CodecType },
}

impl FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let device_type = parts.next().unwrap_or_default();

        Ok(match device_type {
            "broadlink" => {
                let addr = parts
                    .next()
                    .ok_or_else(|| anyhow!("Missing device address"))?;
                DeviceType::Broadlink {
                    addr: Ipv4Addr::from_str(addr)?,
                }
            }
            "lines" => {
                let codec_type = parts.next().ok_or_else(|| anyhow!("Missing codec type"))?;
                DeviceType::Lines {
                    codec_type: CodecType::from_str(codec_type)?,
                }
            }
            _ => return Err(anyhow!("unknown device type: {}", device_type)),
        })
    }
}

pub fn create_device(ty: DeviceType) -> Box<dyn Transceiver<Error = DeviceError>> {
    match ty {
        DeviceType::Broadlink { addr } => {
            use rbroadlink::Device;
            let device = Device::from_ip(addr, None).unwrap();
            Box::new(device)
        }
        DeviceType::Lines { codec_type } => {
            Box::new(Lines::new(codec_type, Box::new(std::io::stdin())))
        }
    }
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("this device wasn't a remote")]
    NotARemote,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EOF")]
    Eof,
}

impl Transceiver for rbroadlink::Device {
    type Error = DeviceError;

    fn authenticate(&mut self) -> Result<bool, Self::Error> {
        // rbroadlink authenticates while connecting, so a constructed device
        // is ready; the only thing left to check is that it can learn at all
        Ok(matches!(self, rbroadlink::Device::Remote { .. }))
    }

    fn enter_learning(&mut self) -> Result<(), Self::Error> {
        // learn_ir drives the device's learning mode itself
        Ok(())
    }

    fn read_code(&mut self) -> Result<Option<Bytes>, Self::Error> {
        let device = match self {
            rbroadlink::Device::Remote { remote } => remote,
            _ => return Err(DeviceError::NotARemote),
        };

        // rbroadlink doesn't actually surface errors and calls `.expect()`
        // underneath, so the process already crashes if this fails
        let msg = device.learn_ir().unwrap();
        Ok(Some(Bytes::from(msg)))
    }
}

/// Line-oriented transceiver: each code arrives as one encoded line. A blank
/// line counts as "nothing captured yet", end of input is fatal.
pub struct Lines {
    codec: Box<dyn Codec<Error = CodecError>>,
    reader: BufReader<Box<dyn Read>>,
}

impl Lines {
    pub fn new(codec_type: CodecType, reader: Box<dyn Read>) -> Self {
        Self {
            codec: create_codec(codec_type),
            reader: BufReader::new(reader),
        }
    }
}

impl Transceiver for Lines {
    type Error = DeviceError;

    fn authenticate(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn enter_learning(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read_code(&mut self) -> Result<Option<Bytes>, Self::Error> {
        let mut input = String::new();
        match self.reader.read_line(&mut input) {
            Ok(0) => Err(DeviceError::Eof),
            Ok(_) if input.trim_end().is_empty() => Ok(None),
            Ok(_) => Ok(Some(self.codec.decode(input.trim_end())?)),
            Err(e) => Err(DeviceError::Io(e)),
        }
    }
}

/// Drives one bounded capture attempt against a transceiver.
///
/// Puts the device into learning mode once, then polls every second until a
/// code shows up or the timeout elapses. A timeout is not an error: the
/// captured code comes back as `Some(base64)`, a timeout as `None`.
pub struct CodeCapture {
    device: Box<dyn Transceiver<Error = DeviceError>>,
    timeout: Duration,
    poll_interval: Duration,
}

impl CodeCapture {
    pub fn new(device: Box<dyn Transceiver<Error = DeviceError>>, timeout: Duration) -> Self {
        Self {
            device,
            timeout,
            poll_interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn authenticate(&mut self) -> Result<bool, DeviceError> {
        self.device.authenticate()
    }

    pub fn capture_one(&mut self) -> Result<Option<String>, DeviceError> {
        println!("Listening...");
        self.device.enter_learning()?;
        let deadline = Instant::now() + self.timeout;
        while Instant::now() < deadline {
            std::thread::sleep(self.poll_interval);
            if let Some(code) = self.device.read_code()? {
                return Ok(Some(base64::encode(&code)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn lines_capture(input: &str, codec: CodecType, timeout: Duration) -> CodeCapture {
        let device = Lines::new(codec, Box::new(Cursor::new(input.to_string())));
        CodeCapture::new(Box::new(device), timeout).with_poll_interval(Duration::ZERO)
    }

    #[test]
    fn captures_one_base64_line() {
        let line = base64::encode(b"code-bytes");
        let mut capture = lines_capture(&format!("{line}\n"), CodecType::Base64, DEFAULT_TIMEOUT);
        let code = capture.capture_one().unwrap().unwrap();
        assert_eq!(code, base64::encode(b"code-bytes"));
    }

    #[test]
    fn hex_lines_come_back_as_base64() {
        let mut capture = lines_capture("636f6465\n", CodecType::Hex, DEFAULT_TIMEOUT);
        let code = capture.capture_one().unwrap().unwrap();
        assert_eq!(code, base64::encode(b"code"));
    }

    #[test]
    fn blank_lines_are_polled_through() {
        let line = base64::encode(b"late");
        let mut capture = lines_capture(&format!("\n\n{line}\n"), CodecType::Base64, DEFAULT_TIMEOUT);
        let code = capture.capture_one().unwrap().unwrap();
        assert_eq!(code, base64::encode(b"late"));
    }

    #[test]
    fn zero_timeout_returns_none() {
        let mut capture = lines_capture("unread\n", CodecType::Base64, Duration::ZERO);
        assert!(capture.capture_one().unwrap().is_none());
    }

    #[test]
    fn exhausted_input_is_fatal() {
        let mut capture = lines_capture("", CodecType::Base64, DEFAULT_TIMEOUT);
        assert!(matches!(capture.capture_one(), Err(DeviceError::Eof)));
    }

    #[test]
    fn device_type_parses_specifiers() {
        assert_eq!(
            DeviceType::from_str("broadlink:192.168.1.1").unwrap(),
            DeviceType::Broadlink {
                addr: Ipv4Addr::new(192, 168, 1, 1)
            }
        );
        assert_eq!(
            DeviceType::from_str("lines:hex").unwrap(),
            DeviceType::Lines {
                codec_type: CodecType::Hex
            }
        );
        assert!(DeviceType::from_str("serial:/dev/ttyUSB0").is_err());
    }
}
