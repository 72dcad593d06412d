// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Connects, subscribes to a topic, publishes one message to it, waits for
//! the echo, then disconnects gracefully.

use mqtt5_session::{ClientConfig, QoS, Subscription};
use mqtt5_session::codec::SubscribeOptions;

#[tokio::main]
async fn main() {
    env_logger::init();

    let host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1883);

    let config = ClientConfig::new(&host, port, "pubsub-demo");
    let client = mqtt5_session::Client::connect(config)
        .await
        .expect("failed to connect");

    log::info!("connected as {}", client.client_id());

    client
        .subscribe(vec![Subscription {
            topic_filter: "demo/pubsub".to_string(),
            options: SubscribeOptions::new(QoS::AtLeastOnce),
        }])
        .await
        .expect("subscribe failed");

    client
        .publish("demo/pubsub", b"hello from the demo".to_vec(), QoS::AtLeastOnce, false)
        .await
        .expect("publish failed");

    if let Some(message) = client.next_message().await {
        log::info!(
            "received on {}: {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );
    }

    client.disconnect().await.expect("disconnect failed");
}
