//! Click event model for asynchronous click tracking.

use chrono::{DateTime, Utc};

/// A redirect that still has to be counted.
///
/// Created by the redirect handler and handed to the click worker through a
/// bounded channel, so the redirect response never waits on the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub code: String,
    pub clicked_at: DateTime<Utc>,
}

impl ClickEvent {
    /// Creates an event stamped with the current time.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            clicked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_event_creation() {
        let before = Utc::now();
        let event = ClickEvent::new("abc12345");

        assert_eq!(event.code, "abc12345");
        assert!(event.clicked_at >= before);
        assert!(event.clicked_at <= Utc::now());
    }
}
