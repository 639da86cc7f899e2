//! Outbound event queue: where `WebLog` records and rule-match notifications
//! go after a request finishes, for consumption by an external message queue
//! or SIEM pipeline.
//!
//! `EventQueue` is the seam a deployment plugs its own broker into (Kafka,
//! RabbitMQ, a managed log pipeline); [`BoundedMemoryQueue`] is the
//! self-contained default that ships with the engine.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::model::{RuleMessageInfo, WebLog};

/// Sink for access-log records and rule-match notifications produced while
/// handling requests.
pub trait EventQueue: Send + Sync {
    fn publish_weblog(&self, log: WebLog);
    fn publish_rule_message(&self, msg: RuleMessageInfo);
}

/// In-process bounded multi-producer multi-consumer queue. When full, the
/// oldest buffered item is dropped to make room for the new one rather than
/// blocking the request path or rejecting the publish.
pub struct BoundedMemoryQueue {
    weblogs: (Sender<Arc<WebLog>>, Receiver<Arc<WebLog>>),
    rule_messages: (Sender<Arc<RuleMessageInfo>>, Receiver<Arc<RuleMessageInfo>>),
}

impl BoundedMemoryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            weblogs: crossbeam_channel::bounded(capacity),
            rule_messages: crossbeam_channel::bounded(capacity),
        }
    }

    pub fn weblog_receiver(&self) -> Receiver<Arc<WebLog>> {
        self.weblogs.1.clone()
    }

    pub fn rule_message_receiver(&self) -> Receiver<Arc<RuleMessageInfo>> {
        self.rule_messages.1.clone()
    }
}

impl EventQueue for BoundedMemoryQueue {
    fn publish_weblog(&self, log: WebLog) {
        send_drop_oldest(&self.weblogs.0, &self.weblogs.1, Arc::new(log));
    }

    fn publish_rule_message(&self, msg: RuleMessageInfo) {
        send_drop_oldest(&self.rule_messages.0, &self.rule_messages.1, Arc::new(msg));
    }
}

fn send_drop_oldest<T>(sender: &Sender<T>, receiver: &Receiver<T>, item: T) {
    let mut item = item;
    loop {
        match sender.try_send(item) {
            Ok(()) => return,
            Err(TrySendError::Full(rejected)) => {
                let _ = receiver.try_recv();
                item = rejected;
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("event queue has no receivers, dropping event");
                return;
            }
        }
    }
}

/// Discards everything published to it. Useful for tests and deployments
/// with no downstream log consumer configured.
pub struct NoopEventQueue;

impl EventQueue for NoopEventQueue {
    fn publish_weblog(&self, _log: WebLog) {}
    fn publish_rule_message(&self, _msg: RuleMessageInfo) {}
}
