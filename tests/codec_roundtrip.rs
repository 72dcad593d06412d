// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use mqtt5_session::codec::{
    AckKind, AckPacket, ConnectAckPacket, ConnectPacket, DecodePacket, EncodePacket, Packet,
    Properties, PublishPacket, QoS, ReasonCode, RetainHandling, SubscribeAckPacket, SubscribeOptions,
    SubscribePacket, Subscription, UnsubscribeAckPacket, UnsubscribePacket,
};

fn round_trip(packet: &Packet) -> Packet {
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode should succeed");
    Packet::decode(&buf).expect("decode should succeed")
}

#[test]
fn publish_qos2_round_trip_through_top_level_packet() {
    let mut publish = PublishPacket::new("sensors/temp", QoS::ExactlyOnce, b"21.5".to_vec());
    publish.packet_id = Some(1234);
    publish.properties.message_expiry_interval = Some(60);

    let decoded = round_trip(&Packet::Publish(publish.clone()));
    match decoded {
        Packet::Publish(p) => {
            assert_eq!(p.topic, "sensors/temp");
            assert_eq!(p.packet_id, Some(1234));
            assert_eq!(p.payload, b"21.5");
            assert_eq!(p.properties.message_expiry_interval, Some(60));
        }
        other => panic!("expected Publish, got {other:?}"),
    }
}

#[test]
fn connack_round_trip_carries_server_capabilities() {
    let mut properties = Properties::new();
    properties.receive_maximum = Some(100);
    properties.topic_alias_maximum = Some(16);
    properties.maximum_qos = Some(QoS::AtLeastOnce);

    let ack = ConnectAckPacket {
        session_present: true,
        reason_code: ReasonCode::Success,
        properties,
    };

    let decoded = round_trip(&Packet::ConnectAck(ack));
    match decoded {
        Packet::ConnectAck(a) => {
            assert!(a.session_present);
            assert_eq!(a.properties.receive_maximum, Some(100));
            assert_eq!(a.properties.topic_alias_maximum, Some(16));
            assert_eq!(a.properties.maximum_qos, Some(QoS::AtLeastOnce));
        }
        other => panic!("expected ConnectAck, got {other:?}"),
    }
}

#[test]
fn connect_packet_with_will_round_trips() {
    let mut connect = ConnectPacket::new("device-42", 30);
    connect.will = Some(mqtt5_session::codec::Will {
        qos: QoS::AtLeastOnce,
        retain: true,
        properties: Properties::new(),
        topic: "device-42/status".to_string(),
        payload: b"offline".to_vec(),
    });

    let decoded = round_trip(&Packet::Connect(connect));
    match decoded {
        Packet::Connect(c) => {
            assert_eq!(c.client_id, "device-42");
            let will = c.will.expect("will should survive round trip");
            assert_eq!(will.topic, "device-42/status");
            assert!(will.retain);
            assert_eq!(will.qos, QoS::AtLeastOnce);
        }
        other => panic!("expected Connect, got {other:?}"),
    }
}

#[test]
fn subscribe_and_suback_round_trip() {
    let subscribe = SubscribePacket {
        packet_id: 7,
        properties: Properties::new(),
        subscriptions: vec![
            Subscription {
                topic_filter: "a/#".to_string(),
                options: SubscribeOptions {
                    qos: QoS::ExactlyOnce,
                    no_local: true,
                    retain_as_published: false,
                    retain_handling: RetainHandling::DoNotSend,
                },
            },
            Subscription {
                topic_filter: "b/+".to_string(),
                options: SubscribeOptions::new(QoS::AtMostOnce),
            },
        ],
    };
    let decoded = round_trip(&Packet::Subscribe(subscribe));
    match decoded {
        Packet::Subscribe(s) => {
            assert_eq!(s.packet_id, 7);
            assert_eq!(s.subscriptions.len(), 2);
            assert_eq!(s.subscriptions[0].options.qos, QoS::ExactlyOnce);
            assert!(s.subscriptions[0].options.no_local);
            assert_eq!(s.subscriptions[1].topic_filter, "b/+");
        }
        other => panic!("expected Subscribe, got {other:?}"),
    }

    let suback = SubscribeAckPacket {
        packet_id: 7,
        properties: Properties::new(),
        reason_codes: vec![ReasonCode::GrantedQoS2, ReasonCode::UnspecifiedError],
    };
    let decoded = round_trip(&Packet::SubscribeAck(suback));
    match decoded {
        Packet::SubscribeAck(a) => {
            assert_eq!(a.reason_codes, vec![ReasonCode::GrantedQoS2, ReasonCode::UnspecifiedError]);
        }
        other => panic!("expected SubscribeAck, got {other:?}"),
    }
}

#[test]
fn unsubscribe_and_unsuback_round_trip() {
    let unsubscribe = UnsubscribePacket {
        packet_id: 3,
        properties: Properties::new(),
        topic_filters: vec!["a/#".to_string()],
    };
    let decoded = round_trip(&Packet::Unsubscribe(unsubscribe));
    match decoded {
        Packet::Unsubscribe(u) => assert_eq!(u.topic_filters, vec!["a/#".to_string()]),
        other => panic!("expected Unsubscribe, got {other:?}"),
    }

    let unsuback = UnsubscribeAckPacket {
        packet_id: 3,
        properties: Properties::new(),
        reason_codes: vec![ReasonCode::Success],
    };
    let decoded = round_trip(&Packet::UnsubscribeAck(unsuback));
    match decoded {
        Packet::UnsubscribeAck(a) => assert_eq!(a.reason_codes, vec![ReasonCode::Success]),
        other => panic!("expected UnsubscribeAck, got {other:?}"),
    }
}

#[test]
fn ack_packets_round_trip_for_every_kind() {
    for kind in [
        AckKind::PublishAck,
        AckKind::PublishReceived,
        AckKind::PublishRelease,
        AckKind::PublishComplete,
    ] {
        let ack = AckPacket::new(kind, 99);
        let mut buf = Vec::new();
        ack.encode(&mut buf).unwrap();
        let mut ba = mqtt5_session::codec::ByteArray::new(&buf);
        let decoded = AckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_id, 99);
        assert_eq!(decoded.kind, kind);
    }
}

#[test]
fn user_properties_preserve_order_across_full_packet() {
    let mut publish = PublishPacket::new("t", QoS::AtMostOnce, Vec::new());
    publish.properties.user_properties = vec![
        ("x".to_string(), "1".to_string()),
        ("x".to_string(), "2".to_string()),
        ("y".to_string(), "3".to_string()),
    ];
    let decoded = round_trip(&Packet::Publish(publish));
    match decoded {
        Packet::Publish(p) => assert_eq!(
            p.properties.user_properties,
            vec![
                ("x".to_string(), "1".to_string()),
                ("x".to_string(), "2".to_string()),
                ("y".to_string(), "3".to_string()),
            ]
        ),
        other => panic!("expected Publish, got {other:?}"),
    }
}
