//! Port-per-channel dialect
//!
//! Channel `n` listens on `port + n`. Azimuth and elevation travel together
//! in one immediate bundle so the renderer never sees half a move. The
//! dialect has no width parameter.

use std::net::SocketAddr;

use orbit_core::{Position, SinkError, SpatialSink};
use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};

use crate::config::BackendConfig;
use crate::{resolve, OscSocket};

/// OSC "execute immediately" time tag
const IMMEDIATE: OscTime = OscTime {
    seconds: 0,
    fractional: 1,
};

pub struct PortOffsetOscSink {
    socket: OscSocket,
    base: SocketAddr,
    prefix: String,
}

impl PortOffsetOscSink {
    pub fn new(config: &BackendConfig) -> Result<Self, SinkError> {
        Ok(Self {
            socket: OscSocket::bind()?,
            base: resolve(&config.host, config.port)?,
            prefix: config.address_prefix.trim_matches('/').to_string(),
        })
    }

    fn target(&self, channel: usize) -> Result<SocketAddr, SinkError> {
        let port = u16::try_from(channel)
            .ok()
            .and_then(|offset| self.base.port().checked_add(offset))
            .ok_or_else(|| SinkError::Encode(format!("no port for channel {}", channel)))?;
        let mut target = self.base;
        target.set_port(port);
        Ok(target)
    }

    fn message(&self, parameter: &str, value: OscType) -> OscMessage {
        OscMessage {
            addr: format!("/{}/{}", self.prefix, parameter),
            args: vec![value],
        }
    }
}

impl SpatialSink for PortOffsetOscSink {
    fn send_position(&mut self, channel: usize, position: Position) -> Result<(), SinkError> {
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: IMMEDIATE,
            content: vec![
                OscPacket::Message(self.message("azimuth", OscType::Float(position.azimuth()))),
                OscPacket::Message(
                    self.message("elevation", OscType::Float(position.elevation())),
                ),
            ],
        });
        self.socket.send(&bundle, self.target(channel)?)
    }

    fn send_width(&mut self, _channel: usize, _width: f32) -> Result<(), SinkError> {
        Err(SinkError::NotImplemented("width"))
    }

    fn send_ambisonics_order(&mut self, channel: usize, order: u32) -> Result<(), SinkError> {
        let packet = OscPacket::Message(self.message("order", OscType::Int(order as i32)));
        self.socket.send(&packet, self.target(channel)?)
    }

    fn name(&self) -> &str {
        "osc-port-offset"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Receiver;

    fn sink_at(port: u16) -> PortOffsetOscSink {
        PortOffsetOscSink::new(&BackendConfig {
            port,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_position_is_one_bundle() {
        let receiver = Receiver::bind();
        let mut sink = sink_at(receiver.port());
        sink.send_position(0, Position::from_spherical(30.0, 45.0, 1.0))
            .unwrap();

        match receiver.recv() {
            OscPacket::Bundle(bundle) => {
                assert_eq!(bundle.content.len(), 2);
                let addrs: Vec<_> = bundle
                    .content
                    .iter()
                    .map(|p| match p {
                        OscPacket::Message(m) => m.addr.clone(),
                        OscPacket::Bundle(_) => String::new(),
                    })
                    .collect();
                assert_eq!(addrs, vec!["/orbit/azimuth", "/orbit/elevation"]);
            }
            OscPacket::Message(m) => panic!("expected bundle, got {}", m.addr),
        }
    }

    #[test]
    fn test_channel_selects_port() {
        let receiver = Receiver::bind();
        let port = receiver.port();
        // Channel 2 of a backend whose base port sits two below the receiver
        let mut sink = sink_at(port - 2);
        sink.send_ambisonics_order(2, 4).unwrap();
        match receiver.recv() {
            OscPacket::Message(m) => {
                assert_eq!(m.addr, "/orbit/order");
                assert_eq!(m.args, vec![OscType::Int(4)]);
            }
            OscPacket::Bundle(_) => panic!("expected message"),
        }
    }

    #[test]
    fn test_width_not_implemented() {
        let mut sink = sink_at(9000);
        assert!(matches!(
            sink.send_width(0, 0.5),
            Err(SinkError::NotImplemented("width"))
        ));
    }
}
