// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! PUBACK, PUBREC, PUBREL and PUBCOMP share an identical variable header
//! shape in MQTT v5 (packet id, optional reason code, optional properties).
//! One encoder/decoder is parameterized by packet type rather than
//! duplicated four times.

use super::packet::{FixedHeader, Packet, PacketId, PacketType};
use super::primitives::{write_u16, ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};
use super::property::Properties;
use super::reason::ReasonCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
}

impl AckKind {
    const fn packet_type(self) -> PacketType {
        match self {
            Self::PublishAck => PacketType::PublishAck,
            Self::PublishReceived => PacketType::PublishReceived,
            Self::PublishRelease => PacketType::PublishRelease,
            Self::PublishComplete => PacketType::PublishComplete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckPacket {
    pub kind: AckKind,
    pub packet_id: PacketId,
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl AckPacket {
    #[must_use]
    pub fn new(kind: AckKind, packet_id: PacketId) -> Self {
        Self {
            kind,
            packet_id,
            reason_code: ReasonCode::Success,
            properties: Properties::new(),
        }
    }
}

impl Packet for AckPacket {
    fn packet_type(&self) -> PacketType {
        self.kind.packet_type()
    }
}

impl EncodePacket for AckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        // Reason code and properties may be omitted entirely when the
        // reason is Success and there are no properties, per MQTT-3.4.2-1
        // and its siblings for PUBREC/PUBREL/PUBCOMP.
        let terse = self.reason_code == ReasonCode::Success && self.properties.is_empty();
        let remaining_length = if terse {
            2
        } else {
            let mut props_buf = Vec::new();
            self.properties.encode(&mut props_buf)?;
            2 + 1 + props_buf.len()
        };

        FixedHeader::new(self.kind.packet_type(), remaining_length)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)?;
        write_u16(buf, self.packet_id);
        if !terse {
            buf.push(self.reason_code.into());
            self.properties.encode(buf)?;
        }
        Ok(buf.len())
    }
}

impl AckPacket {
    pub fn decode_with_kind(ba: &mut ByteArray, kind: AckKind, remaining_length: usize) -> Result<Self, DecodeError> {
        let packet_id = ba.read_u16()?;
        if remaining_length == 2 {
            return Ok(Self {
                kind,
                packet_id,
                reason_code: ReasonCode::Success,
                properties: Properties::new(),
            });
        }
        let reason_code = ReasonCode::decode(ba)?;
        let properties = if remaining_length > 3 {
            Properties::decode(ba)?
        } else {
            Properties::new()
        };
        Ok(Self {
            kind,
            packet_id,
            reason_code,
            properties,
        })
    }
}

impl DecodePacket for AckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let kind = match fixed_header.packet_type() {
            PacketType::PublishAck => AckKind::PublishAck,
            PacketType::PublishReceived => AckKind::PublishReceived,
            PacketType::PublishRelease => AckKind::PublishRelease,
            PacketType::PublishComplete => AckKind::PublishComplete,
            _ => return Err(DecodeError::InvalidPacketType),
        };
        Self::decode_with_kind(ba, kind, fixed_header.remaining_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terse_ack_round_trip() {
        let pkt = AckPacket::new(AckKind::PublishAck, 7);
        let mut buf = Vec::new();
        pkt.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 4); // fixed header (2) + packet id (2)
        let mut ba = ByteArray::new(&buf);
        let decoded = AckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_id, 7);
        assert_eq!(decoded.reason_code, ReasonCode::Success);
    }

    #[test]
    fn ack_with_failure_reason_round_trip() {
        let mut pkt = AckPacket::new(AckKind::PublishRelease, 9);
        pkt.reason_code = ReasonCode::PacketIdentifierNotFound;
        let mut buf = Vec::new();
        pkt.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = AckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.reason_code, ReasonCode::PacketIdentifierNotFound);
    }
}
