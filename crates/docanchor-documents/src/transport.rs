//! Peer delivery.
//!
//! The peer-to-peer layer is consumed through [`Transport`]; discovery
//! and routing live behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docanchor_core::IssuerId;

use crate::error::TransportError;
use crate::model::Document;

/// What gets delivered to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: IssuerId,
    pub document: Document,
    pub sent_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(sender: IssuerId, document: Document) -> Self {
        Self {
            sender,
            document,
            sent_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_to_peer(&self, peer: &IssuerId, envelope: &Envelope)
        -> Result<(), TransportError>;
}
