use std::net::{Ipv4Addr, SocketAddrV4, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::DeviceStream;

/// TCP port defined by the eISCP protocol.
pub const DEFAULT_PORT: u16 = 60128;

/// Parse `host` as a literal IPv4 address and pair it with `port`.
///
/// Host names are rejected; eISCP devices are addressed by IP only.
pub fn device_addr(host: &str, port: u16) -> Result<SocketAddrV4> {
    let ip: Ipv4Addr = host
        .trim()
        .parse()
        .map_err(|_| TransportError::InvalidAddress {
            host: host.to_string(),
        })?;
    Ok(SocketAddrV4::new(ip, port))
}

/// Connect to a device (blocking).
///
/// No retry is attempted; a refused or unreachable device is reported as
/// [`TransportError::Connect`].
pub fn connect(host: &str, port: u16) -> Result<DeviceStream> {
    let addr = device_addr(host, port)?;
    let stream =
        TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;
    finish_connect(stream, addr)
}

/// Connect to a device, giving up after `timeout`.
pub fn connect_timeout(host: &str, port: u16, timeout: Duration) -> Result<DeviceStream> {
    let addr = device_addr(host, port)?;
    let stream = TcpStream::connect_timeout(&addr.into(), timeout)
        .map_err(|source| TransportError::Connect { addr, source })?;
    finish_connect(stream, addr)
}

fn finish_connect(stream: TcpStream, addr: SocketAddrV4) -> Result<DeviceStream> {
    // Commands are tiny; do not let Nagle hold them back.
    stream.set_nodelay(true)?;
    debug!(%addr, "connected to device");
    Ok(DeviceStream::from_tcp(stream))
}

/// Connect to a device from async code.
#[cfg(feature = "async")]
pub async fn connect_async(addr: SocketAddrV4) -> Result<tokio::net::TcpStream> {
    let stream = tokio::net::TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect { addr, source })?;
    stream.set_nodelay(true)?;
    debug!(%addr, "connected to device");
    Ok(stream)
}
