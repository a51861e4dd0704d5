use std::collections::HashMap;

use crate::messaging::destinations::Channel;
use crate::transport::types::ConversationId;

fn ordinal(id: &str) -> u64 {
    id.trim_start_matches("sub-").parse().unwrap_or(0)
}

/// Active subscriptions keyed by the client-generated subscription id.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    by_id: HashMap<String, Channel>,
    next_id: u64,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channel` and returns the id to subscribe it under.
    pub fn register(&mut self, channel: Channel) -> String {
        let id = format!("sub-{}", self.next_id);
        self.next_id += 1;
        self.by_id.insert(id.clone(), channel);
        id
    }

    pub fn channel(&self, id: &str) -> Option<Channel> {
        self.by_id.get(id).copied()
    }

    pub fn id_for(&self, channel: Channel) -> Option<&str> {
        self.by_id
            .iter()
            .find(|(_, existing)| **existing == channel)
            .map(|(id, _)| id.as_str())
    }

    pub fn is_subscribed(&self, channel: Channel) -> bool {
        self.id_for(channel).is_some()
    }

    /// Removes every channel of `conversation`, returning their ids sorted.
    pub fn remove_conversation(&mut self, conversation: ConversationId) -> Vec<String> {
        let mut ids = self
            .by_id
            .iter()
            .filter(|(_, channel)| channel.conversation() == Some(conversation))
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        ids.sort_by_key(|id| ordinal(id));
        for id in &ids {
            self.by_id.remove(id);
        }
        ids
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut entries = self.by_id.iter().collect::<Vec<_>>();
        entries.sort_by_key(|(id, _)| ordinal(id));
        entries.into_iter().map(|(_, channel)| *channel).collect()
    }
}
