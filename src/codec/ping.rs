// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::packet::{FixedHeader, Packet, PacketType};
use super::primitives::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingRequestPacket;

impl Packet for PingRequestPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PingRequest
    }
}

impl EncodePacket for PingRequestPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        FixedHeader::new(PacketType::PingRequest, 0)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)
    }
}

impl DecodePacket for PingRequestPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::PingRequest {
            return Err(DecodeError::InvalidPacketType);
        }
        Ok(Self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingResponsePacket;

impl Packet for PingResponsePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PingResponse
    }
}

impl EncodePacket for PingResponsePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        FixedHeader::new(PacketType::PingResponse, 0)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)
    }
}

impl DecodePacket for PingResponsePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::PingResponse {
            return Err(DecodeError::InvalidPacketType);
        }
        Ok(Self)
    }
}
