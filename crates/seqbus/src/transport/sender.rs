// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast egress socket.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Seam between message producers and the wire.
///
/// `McastSender` is the production implementation; tests substitute a
/// recording sender.
pub trait DatagramSender: Send + Sync {
    /// Send one datagram. Succeeds only if the OS accepted every byte.
    fn send(&self, data: &[u8]) -> io::Result<()>;

    /// Send one datagram with a TTL override, restoring the configured
    /// TTL afterwards.
    fn send_with_ttl(&self, data: &[u8], ttl: u32) -> io::Result<()>;
}

/// UDP socket configured for multicast egress.
///
/// Loopback is enabled so subscribers co-located with the sender still
/// receive the group traffic. The socket is single-threaded as far as
/// TTL overrides are concerned; external serialization is the caller's
/// responsibility.
pub struct McastSender {
    socket: UdpSocket,
    dest: SocketAddr,
    ttl: u32,
}

impl McastSender {
    pub fn new(group: Ipv4Addr, port: u16, ttl: u32) -> io::Result<Self> {
        if !group.is_multicast() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a multicast group", group),
            ));
        }

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_multicast_ttl_v4(ttl)?;
        socket.set_multicast_loop_v4(true)?;
        socket.bind(&SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).into())?;

        let dest = SocketAddr::from(SocketAddrV4::new(group, port));
        log::debug!("[MCAST-TX] sender ready dest={} ttl={}", dest, ttl);

        Ok(Self {
            socket: socket.into(),
            dest,
            ttl,
        })
    }

    #[must_use]
    pub fn dest(&self) -> SocketAddr {
        self.dest
    }
}

impl DatagramSender for McastSender {
    fn send(&self, data: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(data, self.dest)?;
        if sent != data.len() {
            return Err(io::Error::other(format!(
                "partial datagram send: {} of {} bytes",
                sent,
                data.len()
            )));
        }
        Ok(())
    }

    fn send_with_ttl(&self, data: &[u8], ttl: u32) -> io::Result<()> {
        self.socket.set_multicast_ttl_v4(ttl)?;
        let result = self.send(data);
        if let Err(err) = self.socket.set_multicast_ttl_v4(self.ttl) {
            log::warn!("[MCAST-TX] failed to restore TTL {}: {}", self.ttl, err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_multicast_group() {
        let result = McastSender::new(Ipv4Addr::new(192, 168, 1, 10), 30001, 1);
        assert!(result.is_err());
        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(io::ErrorKind::InvalidInput)
        );
    }

    #[test]
    #[ignore = "requires UDP socket, flaky in CI"]
    fn sends_full_datagram() {
        let sender = McastSender::new(Ipv4Addr::new(239, 255, 0, 1), 31001, 1)
            .expect("sender creation should succeed");
        sender
            .send(b"seqbus test datagram")
            .expect("send should succeed");
        sender
            .send_with_ttl(b"seqbus ttl override", 2)
            .expect("ttl override send should succeed");
    }
}
