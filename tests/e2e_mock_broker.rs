// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Scripted end-to-end scenarios against an in-process mock broker: a bare
//! `TcpListener` that speaks just enough of the wire protocol to drive the
//! session engine through each flow.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mqtt5_session::codec::{
    AckKind, AckPacket, ByteArray, ConnectAckPacket, DecodePacket, EncodePacket, FixedHeader,
    Packet, Properties, PublishPacket, QoS, ReasonCode, SubscribeAckPacket, Subscription,
    SubscribeOptions,
};
use mqtt5_session::{Client, ClientConfig};

async fn read_one_packet(socket: &mut TcpStream, scratch: &mut Vec<u8>) -> Packet {
    loop {
        let mut ba = ByteArray::new(scratch);
        if let Ok(header) = FixedHeader::decode(&mut ba) {
            let total = ba.offset() + header.remaining_length();
            if scratch.len() >= total {
                let frame: Vec<u8> = scratch[..total].to_vec();
                scratch.drain(..total);
                return Packet::decode(&frame).expect("mock broker received a malformed packet");
            }
        }
        let mut buf = [0_u8; 4096];
        let n = socket.read(&mut buf).await.expect("mock broker read failed");
        assert!(n > 0, "client closed the connection unexpectedly");
        scratch.extend_from_slice(&buf[..n]);
    }
}

async fn write_packet(socket: &mut TcpStream, packet: &Packet) {
    let mut buf = Vec::new();
    packet.encode(&mut buf).unwrap();
    socket.write_all(&buf).await.unwrap();
}

async fn accept_connect(socket: &mut TcpStream, scratch: &mut Vec<u8>, session_present: bool) {
    let packet = read_one_packet(socket, scratch).await;
    assert!(matches!(packet, Packet::Connect(_)));
    let ack = ConnectAckPacket {
        session_present,
        reason_code: ReasonCode::Success,
        properties: Properties::new(),
    };
    write_packet(socket, &Packet::ConnectAck(ack)).await;
}

async fn start_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn happy_path_qos0_publish() {
    let (listener, port) = start_listener().await;

    let broker = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut scratch = Vec::new();
        accept_connect(&mut socket, &mut scratch, false).await;

        let packet = read_one_packet(&mut socket, &mut scratch).await;
        match packet {
            Packet::Publish(p) => {
                assert_eq!(p.topic, "a/b");
                assert_eq!(p.qos, QoS::AtMostOnce);
                assert_eq!(p.payload, b"hello");
            }
            other => panic!("expected Publish, got {other:?}"),
        }
    });

    let config = ClientConfig::new("127.0.0.1", port, "qos0-client");
    let client = Client::connect(config).await.expect("connect failed");
    client
        .publish("a/b", b"hello".to_vec(), QoS::AtMostOnce, false)
        .await
        .expect("publish failed");

    broker.await.unwrap();
}

#[tokio::test]
async fn qos1_publish_is_acked_and_packet_id_increments() {
    let (listener, port) = start_listener().await;

    let broker = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut scratch = Vec::new();
        accept_connect(&mut socket, &mut scratch, false).await;

        let mut seen_ids = Vec::new();
        for _ in 0..2 {
            let packet = read_one_packet(&mut socket, &mut scratch).await;
            let Packet::Publish(p) = packet else {
                panic!("expected Publish");
            };
            let packet_id = p.packet_id.expect("QoS 1 publish must carry a packet id");
            seen_ids.push(packet_id);
            let ack = AckPacket::new(AckKind::PublishAck, packet_id);
            write_packet(&mut socket, &Packet::PublishAck(ack)).await;
        }
        assert_ne!(seen_ids[0], seen_ids[1], "packet ids must not repeat while in flight");
    });

    let config = ClientConfig::new("127.0.0.1", port, "qos1-client");
    let client = Client::connect(config).await.expect("connect failed");

    let r1 = client
        .publish("a/b", b"one".to_vec(), QoS::AtLeastOnce, false)
        .await
        .expect("first publish failed");
    assert_eq!(r1, ReasonCode::Success);

    let r2 = client
        .publish("a/b", b"two".to_vec(), QoS::AtLeastOnce, false)
        .await
        .expect("second publish failed");
    assert_eq!(r2, ReasonCode::Success);

    broker.await.unwrap();
}

#[tokio::test]
async fn qos2_full_handshake_completes() {
    let (listener, port) = start_listener().await;

    let broker = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut scratch = Vec::new();
        accept_connect(&mut socket, &mut scratch, false).await;

        let packet = read_one_packet(&mut socket, &mut scratch).await;
        let Packet::Publish(p) = packet else { panic!("expected Publish") };
        let packet_id = p.packet_id.unwrap();
        assert_eq!(p.qos, QoS::ExactlyOnce);

        let pubrec = AckPacket::new(AckKind::PublishReceived, packet_id);
        write_packet(&mut socket, &Packet::PublishReceived(pubrec)).await;

        let packet = read_one_packet(&mut socket, &mut scratch).await;
        let Packet::PublishRelease(rel) = packet else { panic!("expected PublishRelease") };
        assert_eq!(rel.packet_id, packet_id);

        let pubcomp = AckPacket::new(AckKind::PublishComplete, packet_id);
        write_packet(&mut socket, &Packet::PublishComplete(pubcomp)).await;
    });

    let config = ClientConfig::new("127.0.0.1", port, "qos2-client");
    let client = Client::connect(config).await.expect("connect failed");
    let reason = client
        .publish("a/b", b"exactly-once".to_vec(), QoS::ExactlyOnce, false)
        .await
        .expect("publish failed");
    assert_eq!(reason, ReasonCode::Success);

    broker.await.unwrap();
}

#[tokio::test]
async fn subscribe_returns_granted_qos() {
    let (listener, port) = start_listener().await;

    let broker = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut scratch = Vec::new();
        accept_connect(&mut socket, &mut scratch, false).await;

        let packet = read_one_packet(&mut socket, &mut scratch).await;
        let Packet::Subscribe(s) = packet else { panic!("expected Subscribe") };
        let ack = SubscribeAckPacket {
            packet_id: s.packet_id,
            properties: Properties::new(),
            reason_codes: vec![ReasonCode::GrantedQoS1],
        };
        write_packet(&mut socket, &Packet::SubscribeAck(ack)).await;
    });

    let config = ClientConfig::new("127.0.0.1", port, "sub-client");
    let client = Client::connect(config).await.expect("connect failed");
    let reasons = client
        .subscribe(vec![Subscription {
            topic_filter: "a/#".to_string(),
            options: SubscribeOptions::new(QoS::AtLeastOnce),
        }])
        .await
        .expect("subscribe failed");
    assert_eq!(reasons, vec![ReasonCode::GrantedQoS1]);

    broker.await.unwrap();
}

#[tokio::test]
async fn inbound_publish_is_delivered_to_message_stream() {
    let (listener, port) = start_listener().await;

    let broker = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut scratch = Vec::new();
        accept_connect(&mut socket, &mut scratch, false).await;

        let mut publish = PublishPacket::new("events/one", QoS::AtMostOnce, b"payload".to_vec());
        publish.retain = false;
        write_packet(&mut socket, &Packet::Publish(publish)).await;

        // Keep the socket open until the test below has read the message.
        let mut buf = [0_u8; 1];
        let _ = socket.read(&mut buf).await;
    });

    let config = ClientConfig::new("127.0.0.1", port, "inbound-client");
    let client = Client::connect(config).await.expect("connect failed");

    let message = tokio::time::timeout(std::time::Duration::from_secs(5), client.next_message())
        .await
        .expect("timed out waiting for inbound message")
        .expect("message channel closed");
    assert_eq!(message.topic, "events/one");
    assert_eq!(message.payload, b"payload");

    drop(client);
    let _ = broker.await;
}
