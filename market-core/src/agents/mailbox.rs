use std::sync::Arc;

use parking_lot::Mutex;

use crate::messages::Message;
use crate::types::TraderId;

/// Inbox owned by one participant. The auction house only ever holds a
/// `Weak` to it, so dropping the owner makes the mailbox undeliverable.
#[derive(Debug)]
pub struct Mailbox {
    owner: TraderId,
    messages: Mutex<Vec<Message>>,
}

impl Mailbox {
    pub fn new(owner: TraderId) -> Arc<Self> {
        Arc::new(Self {
            owner,
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn owner(&self) -> TraderId {
        self.owner
    }

    pub fn deliver(&self, message: Message) {
        self.messages.lock().push(message);
    }

    /// Take everything delivered so far, oldest first.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
