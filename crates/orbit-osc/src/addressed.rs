//! Single-port dialect with the channel in the address

use std::net::SocketAddr;

use orbit_core::{Position, SinkError, SpatialSink};
use rosc::{OscMessage, OscPacket, OscType};

use crate::config::BackendConfig;
use crate::{resolve, OscSocket};

/// Sends `/<prefix>/<channel>/<parameter>` messages to one target
pub struct AddressedOscSink {
    socket: OscSocket,
    target: SocketAddr,
    prefix: String,
}

impl AddressedOscSink {
    pub fn new(config: &BackendConfig) -> Result<Self, SinkError> {
        Ok(Self {
            socket: OscSocket::bind()?,
            target: resolve(&config.host, config.port)?,
            prefix: config.address_prefix.trim_matches('/').to_string(),
        })
    }

    fn address(&self, channel: usize, parameter: &str) -> String {
        format!("/{}/{}/{}", self.prefix, channel + 1, parameter)
    }

    fn send(&self, channel: usize, parameter: &str, value: OscType) -> Result<(), SinkError> {
        let packet = OscPacket::Message(OscMessage {
            addr: self.address(channel, parameter),
            args: vec![value],
        });
        self.socket.send(&packet, self.target)
    }
}

impl SpatialSink for AddressedOscSink {
    fn send_position(&mut self, channel: usize, position: Position) -> Result<(), SinkError> {
        let (azimuth, elevation, radius) = position.to_spherical();
        self.send(channel, "azimuth", OscType::Float(azimuth))?;
        self.send(channel, "elevation", OscType::Float(elevation))?;
        self.send(channel, "radius", OscType::Float(radius))
    }

    fn send_width(&mut self, channel: usize, width: f32) -> Result<(), SinkError> {
        self.send(channel, "width", OscType::Float(width))
    }

    fn send_ambisonics_order(&mut self, channel: usize, order: u32) -> Result<(), SinkError> {
        self.send(channel, "order", OscType::Int(order as i32))
    }

    fn name(&self) -> &str {
        "osc-addressed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Receiver;

    fn message(packet: OscPacket) -> OscMessage {
        match packet {
            OscPacket::Message(msg) => msg,
            OscPacket::Bundle(_) => panic!("expected a message"),
        }
    }

    fn sink_for(receiver: &Receiver) -> AddressedOscSink {
        AddressedOscSink::new(&BackendConfig {
            port: receiver.port(),
            address_prefix: "/spat/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_position_sends_three_messages() {
        let receiver = Receiver::bind();
        let mut sink = sink_for(&receiver);
        sink.send_position(0, Position::from_spherical(90.0, 0.0, 2.0))
            .unwrap();

        let azimuth = message(receiver.recv());
        assert_eq!(azimuth.addr, "/spat/1/azimuth");
        match azimuth.args[0] {
            OscType::Float(v) => assert!((v - 90.0).abs() < 1e-3),
            ref other => panic!("unexpected arg {:?}", other),
        }
        assert_eq!(message(receiver.recv()).addr, "/spat/1/elevation");
        let radius = message(receiver.recv());
        assert_eq!(radius.addr, "/spat/1/radius");
        assert_eq!(radius.args.len(), 1);
    }

    #[test]
    fn test_width_and_order() {
        let receiver = Receiver::bind();
        let mut sink = sink_for(&receiver);
        sink.send_width(4, 0.25).unwrap();
        sink.send_ambisonics_order(4, 3).unwrap();

        let width = message(receiver.recv());
        assert_eq!(width.addr, "/spat/5/width");
        assert_eq!(width.args, vec![OscType::Float(0.25)]);
        let order = message(receiver.recv());
        assert_eq!(order.addr, "/spat/5/order");
        assert_eq!(order.args, vec![OscType::Int(3)]);
    }
}
