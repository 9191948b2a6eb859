use {
    crate::error::MalformedEventError,
    chrono::{DateTime, NaiveDateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Reserved payload that signals the end of a live stream
pub const STOP_SENTINEL: &str = "stop";

/// One token movement as served by the indexer
///
/// `amount` stays as the decimal text the indexer sent. It is only parsed
/// when aggregating, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub block_number: i64,
    pub transaction_hash: String,
    pub log_index: i32,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub contract_address: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Transfer {
    /// Schema checks applied before a streamed transfer enters the store
    pub fn validate(&self) -> Result<(), MalformedEventError> {
        if self.block_number < 0 {
            return Err(MalformedEventError::Schema {
                id: self.id,
                reason: "negative block number",
            });
        }
        if self.transaction_hash.trim().is_empty() {
            return Err(MalformedEventError::Schema {
                id: self.id,
                reason: "empty transaction hash",
            });
        }
        Ok(())
    }

    /// `created_at` as UTC, accepting RFC 3339 and the plain SQL timestamp layout
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// A single item pushed over the live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Transfer(Transfer),
    Stop,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WirePayload {
    Text(String),
    Transfer(Transfer),
}

impl StreamMessage {
    /// Decode one stream payload (JSON transfer, or the stop sentinel)
    pub fn decode(payload: &str) -> Result<Self, MalformedEventError> {
        let payload = payload.trim();
        if payload == STOP_SENTINEL {
            return Ok(StreamMessage::Stop);
        }

        match serde_json::from_str::<WirePayload>(payload) {
            Ok(WirePayload::Transfer(transfer)) => Ok(StreamMessage::Transfer(transfer)),
            Ok(WirePayload::Text(text)) if text == STOP_SENTINEL => Ok(StreamMessage::Stop),
            Ok(WirePayload::Text(text)) => Err(MalformedEventError::UnexpectedSentinel(text)),
            Err(e) => Err(MalformedEventError::Json(e.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_transfer(id: i64, block_number: i64, amount: &str) -> Transfer {
    Transfer {
        id,
        block_number,
        transaction_hash: format!("0xhash{id}"),
        log_index: 0,
        from_address: format!("0xfrom{id}"),
        to_address: format!("0xto{id}"),
        amount: amount.to_string(),
        contract_address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
        created_at: None,
    }
}
