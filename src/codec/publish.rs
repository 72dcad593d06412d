// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::packet::{FixedHeader, Packet, PacketId, PacketType, QoS};
use super::primitives::{write_string, ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};
use super::property::Properties;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    pub packet_id: Option<PacketId>,
    pub properties: Properties,
    pub payload: Vec<u8>,
}

impl PublishPacket {
    #[must_use]
    pub fn new(topic: &str, qos: QoS, payload: Vec<u8>) -> Self {
        Self {
            dup: false,
            qos,
            retain: false,
            topic: topic.to_string(),
            packet_id: None,
            properties: Properties::new(),
            payload,
        }
    }
}

impl Packet for PublishPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Publish {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        }
    }
}

impl EncodePacket for PublishPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        if self.dup && self.qos == QoS::AtMostOnce {
            log::error!("publish: dup set with QoS 0");
            return Err(EncodeError::TooManyData);
        }
        if self.qos != QoS::AtMostOnce && self.packet_id.is_none() {
            log::error!("publish: missing packet id for QoS > 0");
            return Err(EncodeError::TooManyData);
        }

        let mut props_buf = Vec::new();
        self.properties.encode(&mut props_buf)?;

        let packet_id_len = if self.qos == QoS::AtMostOnce { 0 } else { 2 };
        let remaining_length =
            2 + self.topic.len() + packet_id_len + props_buf.len() + self.payload.len();

        FixedHeader::new(self.packet_type(), remaining_length)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)?;

        write_string(buf, &self.topic)?;
        if let Some(packet_id) = self.packet_id {
            if self.qos != QoS::AtMostOnce {
                super::primitives::write_u16(buf, packet_id);
            }
        }
        buf.extend_from_slice(&props_buf);
        buf.extend_from_slice(&self.payload);
        Ok(buf.len())
    }
}

impl PublishPacket {
    /// Decode using the dup/qos/retain flags already extracted from the
    /// fixed header by the caller.
    pub fn decode_with_flags(
        ba: &mut ByteArray,
        dup: bool,
        qos: QoS,
        retain: bool,
        remaining_length: usize,
    ) -> Result<Self, DecodeError> {
        let start_offset = ba.offset();
        let topic = ba.read_string()?;
        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(ba.read_u16()?)
        };
        let properties = Properties::decode(ba)?;
        let consumed = ba.offset() - start_offset;
        if consumed > remaining_length {
            return Err(DecodeError::UnexpectedEof);
        }
        let payload_len = remaining_length - consumed;
        let payload = ba.read_bytes(payload_len)?;
        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            properties,
            payload,
        })
    }
}

impl DecodePacket for PublishPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        match fixed_header.packet_type() {
            PacketType::Publish { dup, qos, retain } => {
                Self::decode_with_flags(ba, dup, qos, retain, fixed_header.remaining_length())
            }
            _ => Err(DecodeError::InvalidPacketType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_qos0_round_trip() {
        let pkt = PublishPacket::new("a/b", QoS::AtMostOnce, b"hi".to_vec());
        let mut buf = Vec::new();
        pkt.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.topic, "a/b");
        assert_eq!(decoded.packet_id, None);
        assert_eq!(decoded.payload, b"hi");
    }

    #[test]
    fn publish_qos1_requires_packet_id() {
        let mut pkt = PublishPacket::new("a/b", QoS::AtLeastOnce, b"hi".to_vec());
        pkt.packet_id = None;
        let mut buf = Vec::new();
        assert!(pkt.encode(&mut buf).is_err());
        pkt.packet_id = Some(42);
        buf.clear();
        pkt.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_id, Some(42));
    }
}
