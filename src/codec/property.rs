// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use super::packet::QoS;
use super::primitives::{
    write_string, write_string_pair, write_u16, write_u32, ByteArray, DecodeError, DecodePacket,
    EncodeError, EncodePacket, VarInt,
};

/// Numeric identifier of each MQTT v5 property, per the OASIS property
/// table (section 2.2.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyId {
    PayloadFormatIndicator = 0x01,
    MessageExpiryInterval = 0x02,
    ContentType = 0x03,
    ResponseTopic = 0x08,
    CorrelationData = 0x09,
    SubscriptionIdentifier = 0x0b,
    SessionExpiryInterval = 0x11,
    AssignedClientIdentifier = 0x12,
    ServerKeepAlive = 0x13,
    AuthenticationMethod = 0x15,
    AuthenticationData = 0x16,
    RequestProblemInformation = 0x17,
    WillDelayInterval = 0x18,
    RequestResponseInformation = 0x19,
    ResponseInformation = 0x1a,
    ServerReference = 0x1c,
    ReasonString = 0x1f,
    ReceiveMaximum = 0x21,
    TopicAliasMaximum = 0x22,
    TopicAlias = 0x23,
    MaximumQoS = 0x24,
    RetainAvailable = 0x25,
    UserProperty = 0x26,
    MaximumPacketSize = 0x27,
    WildcardSubscriptionAvailable = 0x28,
    SubscriptionIdentifierAvailable = 0x29,
    SharedSubscriptionAvailable = 0x2a,
}

impl TryFrom<u8> for PropertyId {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0x01 => Self::PayloadFormatIndicator,
            0x02 => Self::MessageExpiryInterval,
            0x03 => Self::ContentType,
            0x08 => Self::ResponseTopic,
            0x09 => Self::CorrelationData,
            0x0b => Self::SubscriptionIdentifier,
            0x11 => Self::SessionExpiryInterval,
            0x12 => Self::AssignedClientIdentifier,
            0x13 => Self::ServerKeepAlive,
            0x15 => Self::AuthenticationMethod,
            0x16 => Self::AuthenticationData,
            0x17 => Self::RequestProblemInformation,
            0x18 => Self::WillDelayInterval,
            0x19 => Self::RequestResponseInformation,
            0x1a => Self::ResponseInformation,
            0x1c => Self::ServerReference,
            0x1f => Self::ReasonString,
            0x21 => Self::ReceiveMaximum,
            0x22 => Self::TopicAliasMaximum,
            0x23 => Self::TopicAlias,
            0x24 => Self::MaximumQoS,
            0x25 => Self::RetainAvailable,
            0x26 => Self::UserProperty,
            0x27 => Self::MaximumPacketSize,
            0x28 => Self::WildcardSubscriptionAvailable,
            0x29 => Self::SubscriptionIdentifierAvailable,
            0x2a => Self::SharedSubscriptionAvailable,
            _ => return Err(DecodeError::InvalidPropertyType),
        })
    }
}

/// Flat record of every MQTT v5 property. Single-valued identifiers are
/// `Option` slots; `SubscriptionIdentifier` and `UserProperty` are the only
/// repeatable ones and keep wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pub payload_format_indicator: Option<bool>,
    pub message_expiry_interval: Option<u32>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Vec<u8>>,
    pub subscription_identifiers: Vec<usize>,
    pub session_expiry_interval: Option<u32>,
    pub assigned_client_identifier: Option<String>,
    pub server_keep_alive: Option<u16>,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Vec<u8>>,
    pub request_problem_information: Option<bool>,
    pub will_delay_interval: Option<u32>,
    pub request_response_information: Option<bool>,
    pub response_information: Option<String>,
    pub server_reference: Option<String>,
    pub reason_string: Option<String>,
    pub receive_maximum: Option<u16>,
    pub topic_alias_maximum: Option<u16>,
    pub topic_alias: Option<u16>,
    pub maximum_qos: Option<QoS>,
    pub retain_available: Option<bool>,
    pub user_properties: Vec<(String, String)>,
    pub maximum_packet_size: Option<u32>,
    pub wildcard_subscription_available: Option<bool>,
    pub subscription_identifier_available: Option<bool>,
    pub shared_subscription_available: Option<bool>,
}

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn encoded_len(&self) -> usize {
        let mut n = 0;
        macro_rules! scalar {
            ($field:expr, $size:expr) => {
                if $field.is_some() {
                    n += 1 + $size;
                }
            };
        }
        scalar!(self.payload_format_indicator, 1);
        scalar!(self.message_expiry_interval, 4);
        if let Some(ref s) = self.content_type {
            n += 1 + 2 + s.len();
        }
        if let Some(ref s) = self.response_topic {
            n += 1 + 2 + s.len();
        }
        if let Some(ref d) = self.correlation_data {
            n += 1 + 2 + d.len();
        }
        for id in &self.subscription_identifiers {
            n += 1 + VarInt::from(*id).map_or(1, VarInt::bytes);
        }
        scalar!(self.session_expiry_interval, 4);
        if let Some(ref s) = self.assigned_client_identifier {
            n += 1 + 2 + s.len();
        }
        scalar!(self.server_keep_alive, 2);
        if let Some(ref s) = self.authentication_method {
            n += 1 + 2 + s.len();
        }
        if let Some(ref d) = self.authentication_data {
            n += 1 + 2 + d.len();
        }
        scalar!(self.request_problem_information, 1);
        scalar!(self.will_delay_interval, 4);
        scalar!(self.request_response_information, 1);
        if let Some(ref s) = self.response_information {
            n += 1 + 2 + s.len();
        }
        if let Some(ref s) = self.server_reference {
            n += 1 + 2 + s.len();
        }
        if let Some(ref s) = self.reason_string {
            n += 1 + 2 + s.len();
        }
        scalar!(self.receive_maximum, 2);
        scalar!(self.topic_alias_maximum, 2);
        scalar!(self.topic_alias, 2);
        scalar!(self.maximum_qos, 1);
        scalar!(self.retain_available, 1);
        for (k, v) in &self.user_properties {
            n += 1 + 2 + k.len() + 2 + v.len();
        }
        scalar!(self.maximum_packet_size, 4);
        scalar!(self.wildcard_subscription_available, 1);
        scalar!(self.subscription_identifier_available, 1);
        scalar!(self.shared_subscription_available, 1);
        n
    }
}

impl DecodePacket for Properties {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = VarInt::decode(ba)?.value();
        let end_offset = ba.offset() + len;
        let mut props = Self::new();
        while ba.offset() < end_offset {
            let id_byte = ba.read_byte()?;
            let id = PropertyId::try_from(id_byte)?;
            match id {
                PropertyId::PayloadFormatIndicator => {
                    props.payload_format_indicator = Some(ba.read_byte()? != 0);
                }
                PropertyId::MessageExpiryInterval => {
                    props.message_expiry_interval = Some(ba.read_u32()?);
                }
                PropertyId::ContentType => {
                    props.content_type = Some(ba.read_string()?);
                }
                PropertyId::ResponseTopic => {
                    props.response_topic = Some(ba.read_string()?);
                }
                PropertyId::CorrelationData => {
                    props.correlation_data = Some(ba.read_binary()?);
                }
                PropertyId::SubscriptionIdentifier => {
                    let v = VarInt::decode(ba)?;
                    props.subscription_identifiers.push(v.value());
                }
                PropertyId::SessionExpiryInterval => {
                    props.session_expiry_interval = Some(ba.read_u32()?);
                }
                PropertyId::AssignedClientIdentifier => {
                    props.assigned_client_identifier = Some(ba.read_string()?);
                }
                PropertyId::ServerKeepAlive => {
                    props.server_keep_alive = Some(ba.read_u16()?);
                }
                PropertyId::AuthenticationMethod => {
                    props.authentication_method = Some(ba.read_string()?);
                }
                PropertyId::AuthenticationData => {
                    props.authentication_data = Some(ba.read_binary()?);
                }
                PropertyId::RequestProblemInformation => {
                    props.request_problem_information = Some(ba.read_byte()? != 0);
                }
                PropertyId::WillDelayInterval => {
                    props.will_delay_interval = Some(ba.read_u32()?);
                }
                PropertyId::RequestResponseInformation => {
                    props.request_response_information = Some(ba.read_byte()? != 0);
                }
                PropertyId::ResponseInformation => {
                    props.response_information = Some(ba.read_string()?);
                }
                PropertyId::ServerReference => {
                    props.server_reference = Some(ba.read_string()?);
                }
                PropertyId::ReasonString => {
                    props.reason_string = Some(ba.read_string()?);
                }
                PropertyId::ReceiveMaximum => {
                    props.receive_maximum = Some(ba.read_u16()?);
                }
                PropertyId::TopicAliasMaximum => {
                    props.topic_alias_maximum = Some(ba.read_u16()?);
                }
                PropertyId::TopicAlias => {
                    props.topic_alias = Some(ba.read_u16()?);
                }
                PropertyId::MaximumQoS => {
                    let byte = ba.read_byte()?;
                    if byte > 1 {
                        return Err(DecodeError::InvalidPropertyValue);
                    }
                    props.maximum_qos = Some(QoS::try_from(byte)?);
                }
                PropertyId::RetainAvailable => {
                    props.retain_available = Some(ba.read_byte()? != 0);
                }
                PropertyId::UserProperty => {
                    props.user_properties.push(ba.read_string_pair()?);
                }
                PropertyId::MaximumPacketSize => {
                    props.maximum_packet_size = Some(ba.read_u32()?);
                }
                PropertyId::WildcardSubscriptionAvailable => {
                    props.wildcard_subscription_available = Some(ba.read_byte()? != 0);
                }
                PropertyId::SubscriptionIdentifierAvailable => {
                    props.subscription_identifier_available = Some(ba.read_byte()? != 0);
                }
                PropertyId::SharedSubscriptionAvailable => {
                    props.shared_subscription_available = Some(ba.read_byte()? != 0);
                }
            }
        }
        Ok(props)
    }
}

impl EncodePacket for Properties {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let len = self.encoded_len();
        let var_len = VarInt::from(len).map_err(|_| EncodeError::InvalidVarInt)?;
        let mut n = var_len.encode(buf)?;

        macro_rules! put_bool {
            ($field:expr, $id:expr) => {
                if let Some(v) = $field {
                    buf.push($id as u8);
                    buf.push(u8::from(v));
                    n += 2;
                }
            };
        }
        macro_rules! put_u16 {
            ($field:expr, $id:expr) => {
                if let Some(v) = $field {
                    buf.push($id as u8);
                    write_u16(buf, v);
                    n += 3;
                }
            };
        }
        macro_rules! put_u32 {
            ($field:expr, $id:expr) => {
                if let Some(v) = $field {
                    buf.push($id as u8);
                    write_u32(buf, v);
                    n += 5;
                }
            };
        }
        macro_rules! put_str {
            ($field:expr, $id:expr) => {
                if let Some(ref v) = $field {
                    buf.push($id as u8);
                    n += 1 + write_string(buf, v)?;
                }
            };
        }

        put_bool!(self.payload_format_indicator, PropertyId::PayloadFormatIndicator);
        put_u32!(self.message_expiry_interval, PropertyId::MessageExpiryInterval);
        put_str!(self.content_type, PropertyId::ContentType);
        put_str!(self.response_topic, PropertyId::ResponseTopic);
        if let Some(ref d) = self.correlation_data {
            buf.push(PropertyId::CorrelationData as u8);
            n += 1 + super::primitives::write_binary(buf, d)?;
        }
        for id in &self.subscription_identifiers {
            buf.push(PropertyId::SubscriptionIdentifier as u8);
            let vi = VarInt::from(*id).map_err(|_| EncodeError::InvalidVarInt)?;
            n += 1 + vi.encode(buf)?;
        }
        put_u32!(self.session_expiry_interval, PropertyId::SessionExpiryInterval);
        put_str!(self.assigned_client_identifier, PropertyId::AssignedClientIdentifier);
        put_u16!(self.server_keep_alive, PropertyId::ServerKeepAlive);
        put_str!(self.authentication_method, PropertyId::AuthenticationMethod);
        if let Some(ref d) = self.authentication_data {
            buf.push(PropertyId::AuthenticationData as u8);
            n += 1 + super::primitives::write_binary(buf, d)?;
        }
        put_bool!(self.request_problem_information, PropertyId::RequestProblemInformation);
        put_u32!(self.will_delay_interval, PropertyId::WillDelayInterval);
        put_bool!(self.request_response_information, PropertyId::RequestResponseInformation);
        put_str!(self.response_information, PropertyId::ResponseInformation);
        put_str!(self.server_reference, PropertyId::ServerReference);
        put_str!(self.reason_string, PropertyId::ReasonString);
        put_u16!(self.receive_maximum, PropertyId::ReceiveMaximum);
        put_u16!(self.topic_alias_maximum, PropertyId::TopicAliasMaximum);
        put_u16!(self.topic_alias, PropertyId::TopicAlias);
        if let Some(qos) = self.maximum_qos {
            buf.push(PropertyId::MaximumQoS as u8);
            buf.push(qos.into());
            n += 2;
        }
        put_bool!(self.retain_available, PropertyId::RetainAvailable);
        for (k, v) in &self.user_properties {
            buf.push(PropertyId::UserProperty as u8);
            n += 1 + write_string_pair(buf, k, v)?;
        }
        put_u32!(self.maximum_packet_size, PropertyId::MaximumPacketSize);
        put_bool!(
            self.wildcard_subscription_available,
            PropertyId::WildcardSubscriptionAvailable
        );
        put_bool!(
            self.subscription_identifier_available,
            PropertyId::SubscriptionIdentifierAvailable
        );
        put_bool!(
            self.shared_subscription_available,
            PropertyId::SharedSubscriptionAvailable
        );

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_properties_round_trip() {
        let props = Properties::new();
        let mut buf = Vec::new();
        props.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0]);
        let mut ba = ByteArray::new(&buf);
        let decoded = Properties::decode(&mut ba).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn user_properties_preserve_order_and_duplicates() {
        let mut props = Properties::new();
        props.user_properties.push(("a".into(), "1".into()));
        props.user_properties.push(("a".into(), "2".into()));
        let mut buf = Vec::new();
        props.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = Properties::decode(&mut ba).unwrap();
        assert_eq!(
            decoded.user_properties,
            vec![("a".to_string(), "1".to_string()), ("a".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn rejects_invalid_maximum_qos() {
        let mut buf = Vec::new();
        buf.push(2); // length
        buf.push(PropertyId::MaximumQoS as u8);
        buf.push(2); // invalid: must be 0 or 1
        let mut ba = ByteArray::new(&buf);
        assert_eq!(Properties::decode(&mut ba), Err(DecodeError::InvalidPropertyValue));
    }
}
