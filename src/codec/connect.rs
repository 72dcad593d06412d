// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::packet::{Packet, PacketType, QoS};
use super::primitives::{
    write_binary, write_string, write_u16, ByteArray, DecodeError, DecodePacket, EncodeError,
    EncodePacket,
};
use super::property::Properties;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub qos: QoS,
    pub retain: bool,
    pub properties: Properties,
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    pub clean_start: bool,
    pub keep_alive: u16,
    pub properties: Properties,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl ConnectPacket {
    #[must_use]
    pub fn new(client_id: &str, keep_alive: u16) -> Self {
        Self {
            clean_start: true,
            keep_alive,
            properties: Properties::new(),
            client_id: client_id.to_string(),
            will: None,
            username: None,
            password: None,
        }
    }

    fn connect_flags(&self) -> u8 {
        let mut flags = 0_u8;
        if self.username.is_some() {
            flags |= 0b1000_0000;
        }
        if self.password.is_some() {
            flags |= 0b0100_0000;
        }
        if let Some(ref will) = self.will {
            if will.retain {
                flags |= 0b0010_0000;
            }
            flags |= (u8::from(will.qos)) << 3;
            flags |= 0b0000_0100;
        }
        if self.clean_start {
            flags |= 0b0000_0010;
        }
        flags
    }

    fn variable_header_len(&self) -> usize {
        2 + PROTOCOL_NAME.len() + 1 + 1 + 2
    }

    fn payload_len(&self) -> usize {
        let mut n = 2 + self.client_id.len();
        if let Some(ref will) = self.will {
            n += will.properties.encode(&mut Vec::new()).unwrap_or(0);
            n += 2 + will.topic.len();
            n += 2 + will.payload.len();
        }
        if let Some(ref u) = self.username {
            n += 2 + u.len();
        }
        if let Some(ref p) = self.password {
            n += 2 + p.len();
        }
        n
    }
}

impl Packet for ConnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Connect
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        if self.client_id.is_empty() && !self.clean_start {
            log::error!("connect: empty client id requires clean_start");
            return Err(EncodeError::TooManyData);
        }

        let mut props_buf = Vec::new();
        self.properties.encode(&mut props_buf)?;
        let mut payload = Vec::new();
        write_string(&mut payload, &self.client_id)?;
        if let Some(ref will) = self.will {
            will.properties.encode(&mut payload)?;
            write_string(&mut payload, &will.topic)?;
            write_binary(&mut payload, &will.payload)?;
        }
        if let Some(ref u) = self.username {
            write_string(&mut payload, u)?;
        }
        if let Some(ref p) = self.password {
            write_binary(&mut payload, p)?;
        }

        let remaining_length =
            self.variable_header_len() + props_buf.len() + payload.len();
        super::packet::FixedHeader::new(PacketType::Connect, remaining_length)
            .map_err(|_| EncodeError::InvalidVarInt)?
            .encode(buf)?;

        write_string(buf, PROTOCOL_NAME)?;
        buf.push(PROTOCOL_LEVEL);
        buf.push(self.connect_flags());
        write_u16(buf, self.keep_alive);
        buf.extend_from_slice(&props_buf);
        buf.extend_from_slice(&payload);

        Ok(buf.len())
    }
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let protocol_name = ba.read_string()?;
        if protocol_name != PROTOCOL_NAME {
            return Err(DecodeError::InvalidProtocolName);
        }
        let protocol_level = ba.read_byte()?;
        if protocol_level != PROTOCOL_LEVEL {
            return Err(DecodeError::InvalidProtocolLevel);
        }
        let connect_flags = ba.read_byte()?;
        let username_flag = connect_flags & 0b1000_0000 != 0;
        let password_flag = connect_flags & 0b0100_0000 != 0;
        let will_retain = connect_flags & 0b0010_0000 != 0;
        let will_qos = (connect_flags & 0b0001_1000) >> 3;
        let will_flag = connect_flags & 0b0000_0100 != 0;
        let clean_start = connect_flags & 0b0000_0010 != 0;
        if connect_flags & 0b0000_0001 != 0 {
            return Err(DecodeError::InvalidClientId);
        }

        let keep_alive = ba.read_u16()?;
        let properties = Properties::decode(ba)?;
        let client_id = ba.read_string()?;
        if client_id.is_empty() && !clean_start {
            return Err(DecodeError::InvalidClientId);
        }

        let will = if will_flag {
            let will_properties = Properties::decode(ba)?;
            let topic = ba.read_string()?;
            let payload = ba.read_binary()?;
            Some(Will {
                qos: QoS::try_from(will_qos)?,
                retain: will_retain,
                properties: will_properties,
                topic,
                payload,
            })
        } else {
            None
        };

        let username = if username_flag { Some(ba.read_string()?) } else { None };
        let password = if password_flag { Some(ba.read_binary()?) } else { None };

        Ok(Self {
            clean_start,
            keep_alive,
            properties,
            client_id,
            will,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_round_trip() {
        let mut pkt = ConnectPacket::new("client-1", 60);
        pkt.username = Some("alice".to_string());
        pkt.password = Some(b"secret".to_vec());

        let mut buf = Vec::new();
        pkt.encode(&mut buf).unwrap();

        // Skip the fixed header to decode just the variable-header+payload.
        let mut ba = ByteArray::new(&buf);
        let _ = super::super::packet::FixedHeader::decode(&mut ba).unwrap();
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.client_id, "client-1");
        assert_eq!(decoded.keep_alive, 60);
        assert_eq!(decoded.username.as_deref(), Some("alice"));
        assert_eq!(decoded.password.as_deref(), Some(&b"secret"[..]));
    }
}
