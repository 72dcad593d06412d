// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::packet::{FixedHeader, Packet, PacketId, PacketType};
use super::primitives::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};
use super::property::Properties;
use super::reason::ReasonCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeAckPacket {
    pub packet_id: PacketId,
    pub properties: Properties,
    pub reason_codes: Vec<ReasonCode>,
}

impl Packet for SubscribeAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::SubscribeAck
    }
}

impl EncodePacket for SubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut props_buf = Vec::new();
        self.properties.encode(&mut props_buf)?;
        let remaining_length = 2 + props_buf.len() + self.reason_codes.len();
        FixedHeader::new(PacketType::SubscribeAck, remaining_length)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)?;
        super::primitives::write_u16(buf, self.packet_id);
        buf.extend_from_slice(&props_buf);
        for rc in &self.reason_codes {
            rc.encode(buf)?;
        }
        Ok(buf.len())
    }
}

impl DecodePacket for SubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::SubscribeAck {
            return Err(DecodeError::InvalidPacketType);
        }
        let start = ba.offset();
        let packet_id = ba.read_u16()?;
        let properties = Properties::decode(ba)?;
        let end_offset = start + fixed_header.remaining_length();
        let mut reason_codes = Vec::new();
        while ba.offset() < end_offset {
            reason_codes.push(ReasonCode::decode(ba)?);
        }
        Ok(Self {
            packet_id,
            properties,
            reason_codes,
        })
    }
}
