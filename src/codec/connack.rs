// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::packet::{FixedHeader, Packet, PacketType};
use super::primitives::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};
use super::property::Properties;
use super::reason::ReasonCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectAckPacket {
    pub session_present: bool,
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl Packet for ConnectAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::ConnectAck
    }
}

impl EncodePacket for ConnectAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut props_buf = Vec::new();
        self.properties.encode(&mut props_buf)?;
        let remaining_length = 1 + 1 + props_buf.len();
        FixedHeader::new(PacketType::ConnectAck, remaining_length)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)?;
        buf.push(u8::from(self.session_present));
        buf.push(self.reason_code.into());
        buf.extend_from_slice(&props_buf);
        Ok(buf.len())
    }
}

impl DecodePacket for ConnectAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flags = ba.read_byte()?;
        if flags & 0b1111_1110 != 0 {
            return Err(DecodeError::InvalidPacketFlags);
        }
        let session_present = flags & 0b0000_0001 != 0;
        let reason_code = ReasonCode::decode(ba)?;
        let properties = Properties::decode(ba)?;
        Ok(Self {
            session_present,
            reason_code,
            properties,
        })
    }
}
