// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::packet::{FixedHeader, Packet, PacketType};
use super::primitives::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};
use super::property::Properties;
use super::reason::ReasonCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectPacket {
    pub reason_code: ReasonCode,
    pub properties: Properties,
}

impl DisconnectPacket {
    #[must_use]
    pub fn normal() -> Self {
        Self {
            reason_code: ReasonCode::NormalDisconnection,
            properties: Properties::new(),
        }
    }
}

impl Packet for DisconnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Disconnect
    }
}

impl EncodePacket for DisconnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let terse = self.reason_code == ReasonCode::NormalDisconnection && self.properties.is_empty();
        if terse {
            FixedHeader::new(PacketType::Disconnect, 0)
                .map_err(|_| EncodeError::InvalidVarInt)?
                .encode(buf)?;
            return Ok(buf.len());
        }
        let mut props_buf = Vec::new();
        self.properties.encode(&mut props_buf)?;
        let remaining_length = 1 + props_buf.len();
        FixedHeader::new(PacketType::Disconnect, remaining_length)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)?;
        buf.push(self.reason_code.into());
        buf.extend_from_slice(&props_buf);
        Ok(buf.len())
    }
}

impl DecodePacket for DisconnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Disconnect {
            return Err(DecodeError::InvalidPacketType);
        }
        if fixed_header.remaining_length() == 0 {
            return Ok(Self::normal());
        }
        let reason_code = ReasonCode::decode(ba)?;
        let properties = if fixed_header.remaining_length() > 1 {
            Properties::decode(ba)?
        } else {
            Properties::new()
        };
        Ok(Self {
            reason_code,
            properties,
        })
    }
}
