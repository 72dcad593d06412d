// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! MQTT v5.0 wire codec: Variable Byte Integers, the 28 property types, and
//! the 15 control packets.

mod ack;
mod auth;
mod connack;
mod connect;
mod disconnect;
mod packet;
mod ping;
mod primitives;
mod property;
mod publish;
mod reason;
mod suback;
mod subscribe;
mod unsuback;
mod unsubscribe;

pub use ack::{AckKind, AckPacket};
pub use auth::AuthPacket;
pub use connack::ConnectAckPacket;
pub use connect::{ConnectPacket, Will};
pub use disconnect::DisconnectPacket;
pub use packet::{FixedHeader, PacketId, PacketType, QoS};
pub use ping::{PingRequestPacket, PingResponsePacket};
pub use primitives::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, VarInt};
pub use property::{PropertyId, Properties};
pub use publish::PublishPacket;
pub use reason::ReasonCode;
pub use suback::SubscribeAckPacket;
pub use subscribe::{RetainHandling, SubscribeOptions, Subscription, SubscribePacket};
pub use unsuback::UnsubscribeAckPacket;
pub use unsubscribe::UnsubscribePacket;

/// Any decoded MQTT v5 control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnectAck(ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(AckPacket),
    PublishReceived(AckPacket),
    PublishRelease(AckPacket),
    PublishComplete(AckPacket),
    Subscribe(SubscribePacket),
    SubscribeAck(SubscribeAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    PingRequest(PingRequestPacket),
    PingResponse(PingResponsePacket),
    Disconnect(DisconnectPacket),
    Auth(AuthPacket),
}

impl Packet {
    /// Decode a single packet from a buffer that holds at least one complete
    /// packet (fixed header plus `remaining_length` bytes). The transport
    /// layer is responsible for framing; this only parses.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let fixed_header = {
            let mut peek = ByteArray::new(data);
            FixedHeader::decode(&mut peek)?
        };
        match fixed_header.packet_type() {
            PacketType::Connect => {
                let mut ba = ByteArray::new(data);
                let _ = FixedHeader::decode(&mut ba)?;
                Ok(Self::Connect(ConnectPacket::decode(&mut ba)?))
            }
            PacketType::ConnectAck => {
                let mut ba = ByteArray::new(data);
                let _ = FixedHeader::decode(&mut ba)?;
                Ok(Self::ConnectAck(ConnectAckPacket::decode(&mut ba)?))
            }
            PacketType::Publish { .. } => Ok(Self::Publish(PublishPacket::decode(&mut ByteArray::new(data))?)),
            PacketType::PublishAck => Ok(Self::PublishAck(AckPacket::decode(&mut ByteArray::new(data))?)),
            PacketType::PublishReceived => {
                Ok(Self::PublishReceived(AckPacket::decode(&mut ByteArray::new(data))?))
            }
            PacketType::PublishRelease => {
                Ok(Self::PublishRelease(AckPacket::decode(&mut ByteArray::new(data))?))
            }
            PacketType::PublishComplete => {
                Ok(Self::PublishComplete(AckPacket::decode(&mut ByteArray::new(data))?))
            }
            PacketType::Subscribe => Ok(Self::Subscribe(SubscribePacket::decode(&mut ByteArray::new(data))?)),
            PacketType::SubscribeAck => {
                Ok(Self::SubscribeAck(SubscribeAckPacket::decode(&mut ByteArray::new(data))?))
            }
            PacketType::Unsubscribe => {
                Ok(Self::Unsubscribe(UnsubscribePacket::decode(&mut ByteArray::new(data))?))
            }
            PacketType::UnsubscribeAck => Ok(Self::UnsubscribeAck(UnsubscribeAckPacket::decode(
                &mut ByteArray::new(data),
            )?)),
            PacketType::PingRequest => {
                Ok(Self::PingRequest(PingRequestPacket::decode(&mut ByteArray::new(data))?))
            }
            PacketType::PingResponse => Ok(Self::PingResponse(PingResponsePacket::decode(
                &mut ByteArray::new(data),
            )?)),
            PacketType::Disconnect => Ok(Self::Disconnect(DisconnectPacket::decode(&mut ByteArray::new(data))?)),
            PacketType::Auth => Ok(Self::Auth(AuthPacket::decode(&mut ByteArray::new(data))?)),
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        match self {
            Self::Connect(p) => p.encode(buf),
            Self::ConnectAck(p) => p.encode(buf),
            Self::Publish(p) => p.encode(buf),
            Self::PublishAck(p) | Self::PublishReceived(p) | Self::PublishRelease(p) | Self::PublishComplete(p) => {
                p.encode(buf)
            }
            Self::Subscribe(p) => p.encode(buf),
            Self::SubscribeAck(p) => p.encode(buf),
            Self::Unsubscribe(p) => p.encode(buf),
            Self::UnsubscribeAck(p) => p.encode(buf),
            Self::PingRequest(p) => p.encode(buf),
            Self::PingResponse(p) => p.encode(buf),
            Self::Disconnect(p) => p.encode(buf),
            Self::Auth(p) => p.encode(buf),
        }
    }
}
