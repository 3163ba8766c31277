//! Cache key encoding.
//!
//! All cache keys used by the core are built here so the formats live in
//! one place.

/// The list key holding queued like/unlike interactions.
pub const LIKE_QUEUE_KEY: &str = "queue:likes";

/// Key marking a webhook delivery as processed.
#[must_use]
pub fn webhook_marker_key(delivery_id: &str) -> String {
    format!("webhook:processed:{delivery_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_marker_key_format() {
        assert_eq!(
            webhook_marker_key("evt_abc123"),
            "webhook:processed:evt_abc123"
        );
    }
}
