//! Socket level checks for non-HTTP stream protocols

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use socket2::{Domain, Protocol, Socket, Type};
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tracing::debug;
use url::{Host, Url};

use crate::utils::error::ProbeError;

/// Largest datagram read while waiting for the first packet
const DATAGRAM_BUFFER: usize = 2048;

/// Check a connection oriented stream by opening a TCP connection
///
/// Every resolved address is tried in turn; the first successful connect
/// wins and the connection is closed immediately.
///
/// # Errors
///
/// Returns `ProbeError::Unreachable` if the host does not resolve and
/// `ProbeError::Io` with the last connect error otherwise
pub async fn check_tcp(url: &Url, default_port: u16) -> Result<Duration, ProbeError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProbeError::InvalidUrl(format!("missing host in {url}")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url.port().unwrap_or(default_port);

    let started = Instant::now();
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| ProbeError::Unreachable(format!("DNS resolution failed: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(ProbeError::Unreachable(format!(
            "DNS resolution failed: no addresses for {host}"
        )));
    }

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(_stream) => {
                debug!(%addr, "TCP connect succeeded");
                return Ok(started.elapsed());
            }
            Err(e) => {
                debug!(%addr, error = %e, "TCP connect failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .map(ProbeError::Io)
        .unwrap_or_else(|| ProbeError::Unreachable("no address could be connected".to_string())))
}

/// Check a datagram stream by waiting for its first packet
///
/// Binds the stream port locally and joins the group when the address is
/// multicast. The port is bound with address reuse so that channels sharing
/// a port can be checked at the same time. The wait is unbounded; callers
/// cap it with the probe timeout.
///
/// # Errors
///
/// Returns `ProbeError::InvalidUrl` if the URL has no usable host or port
/// and `ProbeError::Io` if the socket cannot be set up
pub async fn check_datagram(url: &Url) -> Result<Duration, ProbeError> {
    let port = url
        .port()
        .ok_or_else(|| ProbeError::InvalidUrl(format!("missing port in {url}")))?;

    let group = match url.host() {
        Some(Host::Ipv4(addr)) => Some(IpAddr::V4(addr)),
        Some(Host::Ipv6(addr)) => Some(IpAddr::V6(addr)),
        Some(Host::Domain(_)) => None,
        None => return Err(ProbeError::InvalidUrl(format!("missing host in {url}"))),
    };

    let bind_ip = match group {
        Some(ip) if ip.is_multicast() => group_bind_ip(ip),
        Some(IpAddr::V6(_)) => Ipv6Addr::UNSPECIFIED.into(),
        Some(IpAddr::V4(_)) | None => Ipv4Addr::UNSPECIFIED.into(),
    };
    let socket = bind_shared(SocketAddr::new(bind_ip, port))?;

    match group {
        Some(IpAddr::V4(addr)) if addr.is_multicast() => {
            socket.join_multicast_v4(addr, Ipv4Addr::UNSPECIFIED)?;
        }
        Some(IpAddr::V6(addr)) if addr.is_multicast() => {
            socket.join_multicast_v6(&addr, 0)?;
        }
        _ => {}
    }

    let started = Instant::now();
    let mut buf = [0u8; DATAGRAM_BUFFER];
    let (len, from) = socket.recv_from(&mut buf).await?;
    debug!(%from, bytes = len, "Received first datagram");

    Ok(started.elapsed())
}

/// Local address to bind for a multicast group
///
/// Binding the group itself keeps other groups on the same port out of the
/// socket. Only unix accepts a multicast bind address.
fn group_bind_ip(group: IpAddr) -> IpAddr {
    if cfg!(unix) {
        group
    } else if group.is_ipv6() {
        Ipv6Addr::UNSPECIFIED.into()
    } else {
        Ipv4Addr::UNSPECIFIED.into()
    }
}

/// Bind a UDP socket that other checks may bind to as well
fn bind_shared(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}
