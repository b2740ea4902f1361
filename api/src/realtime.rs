//! In-process fan-out of channel events, one broadcast channel per pair.

use std::collections::HashMap;
use std::sync::Arc;

use duet_common::types::{ChannelEvent, PairId};
use tokio::sync::{RwLock, broadcast};

#[derive(Clone)]
pub struct Hub {
    capacity: usize,
    channels: Arc<RwLock<HashMap<PairId, broadcast::Sender<ChannelEvent>>>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn subscribe(&self, pair_id: &PairId) -> broadcast::Receiver<ChannelEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(pair_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Delivers `event` to every current subscriber of the pair and returns how
    /// many there were. Nobody listening is not an error; the channel of a pair
    /// with no subscribers left is dropped.
    pub async fn publish(&self, pair_id: &PairId, event: ChannelEvent) -> usize {
        {
            let channels = self.channels.read().await;
            match channels.get(pair_id) {
                None => return 0,
                Some(tx) => {
                    if let Ok(n) = tx.send(event) {
                        return n;
                    }
                }
            }
        }

        let mut channels = self.channels.write().await;
        if channels
            .get(pair_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(pair_id);
            tracing::debug!(%pair_id, "dropped idle channel");
        }
        0
    }
}
