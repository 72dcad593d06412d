// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use super::primitives::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, VarInt};

pub type PacketId = u16;

/// Quality of Service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            _ => Err(DecodeError::InvalidQoS),
        }
    }
}

/// Anything that can appear after a fixed header knows its own packet type
/// and its own encoded length.
pub trait Packet: Send {
    fn packet_type(&self) -> PacketType;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect,
    ConnectAck,
    Publish { dup: bool, qos: QoS, retain: bool },
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
    Auth,
}

impl PacketType {
    #[must_use]
    pub const fn bytes() -> usize {
        1
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits: u8 = match packet_type {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::PublishReceived => 5,
            PacketType::PublishRelease => 6,
            PacketType::PublishComplete => 7,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::Unsubscribe => 10,
            PacketType::UnsubscribeAck => 11,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
            PacketType::Auth => 15,
        };

        let flags_bits: u8 = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b0000_1000 } else { 0 };
                let qos = match qos {
                    QoS::AtMostOnce => 0b0000_0000,
                    QoS::AtLeastOnce => 0b0000_0010,
                    QoS::ExactlyOnce => 0b0000_0100,
                };
                let retain = if retain { 0b0000_0001 } else { 0 };
                dup | qos | retain
            }
            PacketType::PublishRelease | PacketType::Subscribe | PacketType::Unsubscribe => {
                0b0000_0010
            }
            _ => 0,
        };
        (type_bits << 4) | flags_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0b1111_0000) >> 4;
        let flag = v & 0b0000_1111;
        match type_bits {
            1 if flag == 0 => Ok(Self::Connect),
            2 if flag == 0 => Ok(Self::ConnectAck),
            3 => {
                let dup = (flag & 0b0000_1000) != 0;
                let retain = (flag & 0b0000_0001) != 0;
                let qos = match flag & 0b0000_0110 {
                    0b0000_0000 => QoS::AtMostOnce,
                    0b0000_0010 => QoS::AtLeastOnce,
                    0b0000_0100 => QoS::ExactlyOnce,
                    _ => return Err(DecodeError::InvalidQoS),
                };
                Ok(Self::Publish { dup, retain, qos })
            }
            4 if flag == 0 => Ok(Self::PublishAck),
            5 if flag == 0 => Ok(Self::PublishReceived),
            6 if flag == 0b0000_0010 => Ok(Self::PublishRelease),
            7 if flag == 0 => Ok(Self::PublishComplete),
            8 if flag == 0b0000_0010 => Ok(Self::Subscribe),
            9 if flag == 0 => Ok(Self::SubscribeAck),
            10 if flag == 0b0000_0010 => Ok(Self::Unsubscribe),
            11 if flag == 0 => Ok(Self::UnsubscribeAck),
            12 if flag == 0 => Ok(Self::PingRequest),
            13 if flag == 0 => Ok(Self::PingResponse),
            14 if flag == 0 => Ok(Self::Disconnect),
            15 if flag == 0 => Ok(Self::Auth),
            1..=15 => {
                log::error!("packet: invalid flags {flag:#06b} for type {type_bits}");
                Err(DecodeError::InvalidPacketFlags)
            }
            t => {
                log::error!("packet: invalid type bits {t:#06b}");
                Err(DecodeError::InvalidPacketType)
            }
        }
    }
}

/// Fixed header present on every control packet: one type/flags byte
/// followed by a Variable Byte Integer remaining length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    packet_type: PacketType,
    remaining_length: VarInt,
}

impl FixedHeader {
    /// # Errors
    /// Returns an error if `remaining_length` exceeds the four-byte VBI
    /// range.
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, EncodeError> {
        let remaining_length = VarInt::from(remaining_length).map_err(|_| EncodeError::InvalidVarInt)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }

    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.remaining_length.value()
    }
}

impl DecodePacket for FixedHeader {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flag = ba.read_byte()?;
        let packet_type = PacketType::try_from(flag)?;
        let remaining_length = VarInt::decode(ba)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl EncodePacket for FixedHeader {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let type_byte: u8 = self.packet_type.into();
        buf.push(type_byte);
        let n = self.remaining_length.encode(buf)?;
        Ok(PacketType::bytes() + n)
    }
}
