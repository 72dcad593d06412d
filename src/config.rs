// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Client configuration surface. This is a plain builder struct, not a
//! loader: no file format, no environment-variable parsing, no CLI — those
//! belong to an application built on top of this crate.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::{QoS, Will};
use crate::reconnect::ReconnectStrategy;

/// Supplies credentials for MQTT v5 enhanced (challenge/response)
/// authentication. Implementations receive the broker's AUTH challenge data
/// and return the next AUTH packet's data.
pub trait Authentication: Send + Sync {
    fn method(&self) -> &str;
    fn initial_data(&self) -> Option<Vec<u8>>;
    fn next(&self, challenge: &[u8]) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Default)]
pub struct UserProperties(pub Vec<(String, String)>);

/// Every configurable option for establishing and maintaining a session,
/// following the builder-with-`&mut Self`-setters shape of the teacher's
/// `ConnectOptions`.
pub struct ClientConfig {
    host: String,
    port: u16,
    client_id: String,
    clean_start: bool,
    keep_alive: u16,
    session_expiry_interval: u32,
    receive_maximum: u16,
    maximum_packet_size: Option<u32>,
    topic_alias_maximum: u16,
    request_response_information: bool,
    request_problem_information: bool,
    user_properties: UserProperties,
    authentication: Option<Arc<dyn Authentication>>,
    username: Option<String>,
    password: Option<Vec<u8>>,
    use_tls: bool,
    will: Option<Will>,
    connect_timeout: Duration,
    auto_reconnect: bool,
    reconnect_strategy: Arc<dyn ReconnectStrategy>,
    offline_queue_capacity: usize,
}

impl ClientConfig {
    #[must_use]
    pub fn new(host: &str, port: u16, client_id: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            client_id: client_id.to_string(),
            clean_start: true,
            keep_alive: 60,
            session_expiry_interval: 0,
            receive_maximum: 65_535,
            maximum_packet_size: None,
            topic_alias_maximum: 0,
            request_response_information: false,
            request_problem_information: true,
            user_properties: UserProperties::default(),
            authentication: None,
            username: None,
            password: None,
            use_tls: false,
            will: None,
            connect_timeout: Duration::from_secs(30),
            auto_reconnect: true,
            reconnect_strategy: Arc::new(crate::reconnect::ExponentialBackoff {
                initial: Duration::from_millis(500),
                max: Duration::from_secs(60),
                max_attempts: None,
            }),
            offline_queue_capacity: 1000,
        }
    }

    pub fn set_clean_start(&mut self, clean_start: bool) -> &mut Self {
        self.clean_start = clean_start;
        self
    }

    pub fn set_keep_alive(&mut self, seconds: u16) -> &mut Self {
        self.keep_alive = seconds;
        self
    }

    pub fn set_session_expiry_interval(&mut self, seconds: u32) -> &mut Self {
        self.session_expiry_interval = seconds;
        self
    }

    pub fn set_receive_maximum(&mut self, max: u16) -> &mut Self {
        self.receive_maximum = max;
        self
    }

    pub fn set_maximum_packet_size(&mut self, max: u32) -> &mut Self {
        self.maximum_packet_size = Some(max);
        self
    }

    pub fn set_topic_alias_maximum(&mut self, max: u16) -> &mut Self {
        self.topic_alias_maximum = max;
        self
    }

    pub fn set_request_response_information(&mut self, value: bool) -> &mut Self {
        self.request_response_information = value;
        self
    }

    pub fn set_request_problem_information(&mut self, value: bool) -> &mut Self {
        self.request_problem_information = value;
        self
    }

    pub fn add_user_property(&mut self, key: &str, value: &str) -> &mut Self {
        self.user_properties.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn set_authentication(&mut self, auth: Arc<dyn Authentication>) -> &mut Self {
        self.authentication = Some(auth);
        self
    }

    pub fn set_credentials(&mut self, username: &str, password: &[u8]) -> &mut Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_vec());
        self
    }

    pub fn set_tls(&mut self, use_tls: bool) -> &mut Self {
        self.use_tls = use_tls;
        self
    }

    pub fn set_will(&mut self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> &mut Self {
        self.will = Some(Will {
            qos,
            retain,
            properties: crate::codec::Properties::new(),
            topic: topic.to_string(),
            payload,
        });
        self
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn set_auto_reconnect(&mut self, auto_reconnect: bool) -> &mut Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn set_reconnect_strategy(&mut self, strategy: Arc<dyn ReconnectStrategy>) -> &mut Self {
        self.reconnect_strategy = strategy;
        self
    }

    /// Convenience setter matching simpler client libraries that only take
    /// a fixed list of retry delays; internally adapted onto the same
    /// `ReconnectStrategy` trait used by everything else.
    pub fn set_legacy_reconnect_delays(&mut self, delays: Vec<Duration>) -> &mut Self {
        self.reconnect_strategy = Arc::new(LegacyDelayList(delays));
        self
    }

    pub fn set_offline_queue_capacity(&mut self, capacity: usize) -> &mut Self {
        self.offline_queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub const fn clean_start(&self) -> bool {
        self.clean_start
    }

    #[must_use]
    pub const fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    #[must_use]
    pub const fn session_expiry_interval(&self) -> u32 {
        self.session_expiry_interval
    }

    #[must_use]
    pub const fn receive_maximum(&self) -> u16 {
        self.receive_maximum
    }

    #[must_use]
    pub const fn topic_alias_maximum(&self) -> u16 {
        self.topic_alias_maximum
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> Option<&[u8]> {
        self.password.as_deref()
    }

    #[must_use]
    pub const fn use_tls(&self) -> bool {
        self.use_tls
    }

    #[must_use]
    pub fn will(&self) -> Option<&Will> {
        self.will.as_ref()
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub const fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    #[must_use]
    pub fn reconnect_strategy(&self) -> Arc<dyn ReconnectStrategy> {
        self.reconnect_strategy.clone()
    }

    #[must_use]
    pub const fn offline_queue_capacity(&self) -> usize {
        self.offline_queue_capacity
    }

    #[must_use]
    pub fn authentication(&self) -> Option<Arc<dyn Authentication>> {
        self.authentication.clone()
    }

    #[must_use]
    pub fn user_properties(&self) -> &[(String, String)] {
        &self.user_properties.0
    }

    #[must_use]
    pub const fn request_response_information(&self) -> bool {
        self.request_response_information
    }

    #[must_use]
    pub const fn request_problem_information(&self) -> bool {
        self.request_problem_information
    }

    #[must_use]
    pub const fn maximum_packet_size(&self) -> Option<u32> {
        self.maximum_packet_size
    }
}

struct LegacyDelayList(Vec<Duration>);

impl ReconnectStrategy for LegacyDelayList {
    fn next_delay(&self, attempt: u32, _cause: crate::reconnect::ReconnectCause) -> Option<Duration> {
        let index = usize::try_from(attempt.saturating_sub(1)).ok()?;
        self.0.get(index).copied().or_else(|| self.0.last().copied())
    }
}
