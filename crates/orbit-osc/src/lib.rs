//! OSC network sinks for Orbit
//!
//! Two renderer dialects are supported:
//!
//! - [`AddressedOscSink`]: one UDP target, one message per parameter at
//!   `/<prefix>/<channel>/azimuth|elevation|radius|width|order`
//! - [`PortOffsetOscSink`]: one UDP port per channel (`port + channel`),
//!   azimuth and elevation bundled together, no width support
//!
//! Channel numbers on the wire are 1-based.

mod addressed;
mod config;
mod port_offset;

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use orbit_core::{SinkError, SpatialSink};
use rosc::OscPacket;

pub use addressed::AddressedOscSink;
pub use config::{BackendConfig, OscFlavor};
pub use port_offset::PortOffsetOscSink;

/// Build the sink selected by `config`
pub fn build_sink(config: &BackendConfig) -> Result<Box<dyn SpatialSink>, SinkError> {
    log::info!(
        "Connecting {:?} OSC backend at {}:{}",
        config.flavor,
        config.host,
        config.port
    );
    Ok(match config.flavor {
        OscFlavor::Addressed => Box::new(AddressedOscSink::new(config)?),
        OscFlavor::PortOffset => Box::new(PortOffsetOscSink::new(config)?),
    })
}

/// UDP socket plus encoder shared by both dialects
struct OscSocket {
    socket: UdpSocket,
}

impl OscSocket {
    fn bind() -> Result<Self, SinkError> {
        Ok(Self {
            socket: UdpSocket::bind("0.0.0.0:0")?,
        })
    }

    fn send(&self, packet: &OscPacket, target: SocketAddr) -> Result<(), SinkError> {
        let buf = rosc::encoder::encode(packet).map_err(|e| SinkError::Encode(e.to_string()))?;
        self.socket.send_to(&buf, target)?;
        Ok(())
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, SinkError> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address for {}:{}", host, port),
        ))
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::UdpSocket;
    use std::time::Duration;

    use rosc::OscPacket;

    /// Local UDP listener standing in for a renderer
    pub struct Receiver {
        pub socket: UdpSocket,
    }

    impl Receiver {
        pub fn bind() -> Self {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            Self { socket }
        }

        pub fn port(&self) -> u16 {
            self.socket.local_addr().unwrap().port()
        }

        pub fn recv(&self) -> OscPacket {
            let mut buf = [0u8; 1024];
            let (len, _) = self.socket.recv_from(&mut buf).unwrap();
            let (_, packet) = rosc::decoder::decode_udp(&buf[..len]).unwrap();
            packet
        }
    }
}
