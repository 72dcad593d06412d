// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Session state owned by one session engine: pending-acknowledgement
//! tables (one-shot rendezvous completions, per the design note on
//! cooperative tasks), the active subscription set, the peer's advertised
//! capabilities, outbound flow-control quota, and the in-flight snapshot
//! used to retransmit on session resumption.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::codec::{PacketId, PublishPacket, QoS, ReasonCode, SubscribeOptions};

/// Connection/session lifecycle, per the spec's state diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Reconnecting,
}

/// A publish still awaiting its final acknowledgement, kept so it can be
/// retransmitted with the DUP flag set if the session is resumed before the
/// flow completes.
#[derive(Debug, Clone)]
pub struct InFlightPublish {
    pub packet: PublishPacket,
}

/// Completion handed back to a caller awaiting a PUBACK. This is the
/// caller's own reply channel, registered directly rather than awaited
/// inside the command handler, so the read loop stays free to dispatch the
/// ack that resolves it.
pub type PubAckWaiter = oneshot::Sender<crate::error::Result<ReasonCode>>;
/// Completion for an outbound QoS 2 publish, resolved on PUBCOMP.
pub type PubCompWaiter = oneshot::Sender<crate::error::Result<ReasonCode>>;
pub type SubAckWaiter = oneshot::Sender<crate::error::Result<Vec<ReasonCode>>>;
pub type UnsubAckWaiter = oneshot::Sender<crate::error::Result<Vec<ReasonCode>>>;

#[derive(Default)]
pub struct SessionState {
    pub connection_state: Option<ConnectionState>,

    /// QoS 1 publishes awaiting PUBACK.
    pub pending_puback: HashMap<PacketId, (InFlightPublish, PubAckWaiter)>,

    /// QoS 2 publishes we originated, awaiting PUBREC then PUBCOMP. The
    /// completion waiter itself lives in the engine's own `qos2_waiters`
    /// map, keyed the same way, since it is resolved only once the full
    /// round trip finishes rather than at either intermediate ack.
    pub pending_qos2_out: HashMap<PacketId, InFlightPublish>,

    /// Publishes snapshotted for DUP retransmission by `save_inflight_for_retry`,
    /// drained by the engine once the session resumes.
    pub retry_buffer: Vec<PublishPacket>,

    /// QoS 2 publishes we received, awaiting our own PUBREL/PUBCOMP round
    /// trip; tracked so a duplicate inbound PUBLISH with the same id is
    /// suppressed rather than delivered twice.
    pub pending_qos2_in: std::collections::HashSet<PacketId>,

    pub pending_suback: HashMap<PacketId, SubAckWaiter>,
    pub pending_unsuback: HashMap<PacketId, UnsubAckWaiter>,

    /// Active subscriptions, re-issued on reconnect when the broker did not
    /// resume a prior session.
    pub subscriptions: HashMap<String, SubscribeOptions>,

    pub server_receive_maximum: u16,
    pub server_topic_alias_maximum: u16,
    pub server_maximum_qos: QoS,
    pub server_retain_available: bool,
    pub server_keep_alive_override: Option<u16>,

    /// Remaining quota of un-acknowledged QoS 1/2 publishes we may have in
    /// flight, per the server's Receive Maximum.
    pub send_quota: u16,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connection_state: Some(ConnectionState::Disconnected),
            server_maximum_qos: QoS::ExactlyOnce,
            server_retain_available: true,
            send_quota: u16::MAX,
            ..Self::default_fields()
        }
    }

    fn default_fields() -> Self {
        Self {
            connection_state: None,
            pending_puback: HashMap::new(),
            pending_qos2_out: HashMap::new(),
            retry_buffer: Vec::new(),
            pending_qos2_in: std::collections::HashSet::new(),
            pending_suback: HashMap::new(),
            pending_unsuback: HashMap::new(),
            subscriptions: HashMap::new(),
            server_receive_maximum: u16::MAX,
            server_topic_alias_maximum: 0,
            server_maximum_qos: QoS::ExactlyOnce,
            server_retain_available: true,
            server_keep_alive_override: None,
            send_quota: u16::MAX,
        }
    }

    /// Snapshot everything still in flight into `retry_buffer`, DUP-flagged,
    /// ordered by packet id for a deterministic retransmit sequence. Does
    /// not touch `pending_puback`/`pending_qos2_out` themselves: those keep
    /// tracking the original waiters so the retransmitted packet's eventual
    /// ack still resolves the caller that issued it.
    pub fn save_inflight_for_retry(&mut self) {
        let mut packets: Vec<(PacketId, PublishPacket)> = self
            .pending_puback
            .iter()
            .map(|(id, (inflight, _))| (*id, inflight.packet.clone()))
            .chain(
                self.pending_qos2_out
                    .iter()
                    .map(|(id, inflight)| (*id, inflight.packet.clone())),
            )
            .collect();
        packets.sort_by_key(|(id, _)| *id);
        self.retry_buffer = packets
            .into_iter()
            .map(|(_, mut packet)| {
                packet.dup = true;
                packet
            })
            .collect();
    }

    /// Drain the snapshot taken by `save_inflight_for_retry`, for the
    /// engine to retransmit once the session resumes.
    pub fn take_retry_buffer(&mut self) -> Vec<PublishPacket> {
        std::mem::take(&mut self.retry_buffer)
    }

    /// Fail every pending SUBSCRIBE/UNSUBSCRIBE completion with `error` and
    /// clear their tracking maps. Unlike publishes, an in-flight SUBSCRIBE
    /// or UNSUBSCRIBE has no session-resumption story -- MQTT session state
    /// covers established subscriptions, not requests still in flight -- so
    /// the caller is told now instead of being left waiting across a
    /// reconnect that will never deliver the original SUBACK/UNSUBACK.
    pub fn fail_and_clear_pending(&mut self, error: &crate::error::Error) {
        for (_, waiter) in self.pending_suback.drain() {
            let _ = waiter.send(Err(error.clone()));
        }
        for (_, waiter) in self.pending_unsuback.drain() {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    /// Reset everything that is connection-scoped rather than
    /// session-scoped, called whenever a new network connection is
    /// established regardless of whether the broker resumed the session.
    pub fn reset_connection_scope(&mut self) {
        self.send_quota = self.server_receive_maximum;
    }

    /// Ahead of a reconnect attempt, drop session-scoped state if this
    /// attempt will request `clean_start`: the broker cannot resume the
    /// prior session regardless of what it reports, so there is nothing to
    /// wait for CONNACK to confirm.
    pub fn clear_for_reconnect(&mut self, clean_start: bool) {
        if clean_start {
            self.clear_session();
        }
    }

    /// Discard all session state, called when the broker does not resume a
    /// prior session (`session_present == false` on CONNACK, or a clean
    /// start was requested).
    pub fn clear_session(&mut self) {
        self.pending_puback.clear();
        self.pending_qos2_out.clear();
        self.retry_buffer.clear();
        self.pending_qos2_in.clear();
        self.pending_suback.clear();
        self.pending_unsuback.clear();
        self.subscriptions.clear();
    }
}
