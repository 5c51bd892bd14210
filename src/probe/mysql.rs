//! MySQL probe implementation using the raw server handshake.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use super::{resolve_with_retry, Probe, ProbeError, ProbeKind, ProbeOutcome, ProbeSettings};

const DEFAULT_PORT: u16 = 3306;
const PROTOCOL_V10: u8 = 0x0a;
const ERR_PACKET: u8 = 0xff;

/// Parse a `.mysql` definition into a `host:port` address.
///
/// Accepts either a bare `host[:port]` or a DSN such as
/// `user:pass@tcp(db.internal:3306)/app`.
pub fn parse_mysql_definition(content: &str) -> Result<String, String> {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| "empty definition".to_string())?;

    let address = match line.find("tcp(") {
        Some(start) => {
            let rest = &line[start + 4..];
            let end = rest
                .find(')')
                .ok_or_else(|| format!("unterminated address in {:?}", line))?;
            &rest[..end]
        }
        None => line,
    };

    if address.is_empty() {
        return Err(format!("missing address in {:?}", line));
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| format!("invalid port {:?}", port))?;
            Ok(format!("{}:{}", host, port))
        }
        None => Ok(format!("{}:{}", address, DEFAULT_PORT)),
    }
}

/// Probe that checks a MySQL server answers with its initial handshake.
pub struct MysqlProbe {
    address: String,
    settings: ProbeSettings,
}

impl MysqlProbe {
    pub fn new(address: impl Into<String>, settings: ProbeSettings) -> Self {
        Self {
            address: address.into(),
            settings,
        }
    }

    async fn handshake(&self) -> Result<(), ProbeError> {
        let timeout = self.settings.timeout;
        tokio::time::timeout(timeout, self.read_greeting())
            .await
            .map_err(|_| ProbeError::Timeout(timeout))?
    }

    async fn read_greeting(&self) -> Result<(), ProbeError> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| ProbeError::Network(format!("failed to connect: {}", e)))?;

        // Packet header: 3-byte little-endian payload length, 1-byte sequence id
        let mut header = [0u8; 4];
        stream
            .read_exact(&mut header)
            .await
            .map_err(|e| ProbeError::Network(format!("failed to read greeting: {}", e)))?;

        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        if len == 0 {
            return Err(ProbeError::Protocol("empty greeting packet".to_string()));
        }

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| ProbeError::Network(format!("failed to read greeting: {}", e)))?;

        match payload[0] {
            PROTOCOL_V10 => Ok(()),
            ERR_PACKET => Err(ProbeError::Protocol(error_message(&payload))),
            other => Err(ProbeError::Protocol(format!(
                "unexpected protocol version {}",
                other
            ))),
        }
    }
}

/// Extract the human readable message from an error packet payload.
fn error_message(payload: &[u8]) -> String {
    // 0xff, 2-byte error code, optional '#' + 5-byte SQL state, message
    let mut rest = payload.get(3..).unwrap_or_default();
    if rest.first() == Some(&b'#') {
        rest = rest.get(6..).unwrap_or_default();
    }

    let code = payload
        .get(1..3)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .unwrap_or_default();

    format!("server error {}: {}", code, String::from_utf8_lossy(rest))
}

#[async_trait]
impl Probe for MysqlProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Mysql
    }

    async fn resolve(&self) -> ProbeOutcome {
        resolve_with_retry(self.kind(), self.settings.retry_delay, || self.handshake()).await
    }
}
