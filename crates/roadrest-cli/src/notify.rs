//! Terminal notification sink.

use chrono::{DateTime, Local, Utc};

use roadrest_core::error::CoreError;
use roadrest_core::providers::NotificationSink;

pub struct ConsoleNotifier {
    enabled: bool,
}

impl ConsoleNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl NotificationSink for ConsoleNotifier {
    fn schedule(&self, at: DateTime<Utc>, title: &str, body: &str) -> Result<(), CoreError> {
        if !self.enabled {
            return Ok(());
        }
        let local = at.with_timezone(&Local);
        println!("[reminder {}] {title}", local.format("%H:%M"));
        println!("  {body}");
        Ok(())
    }
}
