//! Date/time tool: the current date and time in a fixed timezone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parley_core::tool::{Tool, ToolInvocationResult};

pub struct DateTimeTool {
    timezone: Tz,
}

impl DateTimeTool {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Render `instant` the way the tool reports it, e.g.
    /// `Tuesday 14 May 2024, 09:30:00 (Europe/Paris)`.
    pub fn render(&self, instant: DateTime<Utc>) -> String {
        let local = instant.with_timezone(&self.timezone);
        format!(
            "{} ({})",
            local.format("%A %d %B %Y, %H:%M:%S"),
            self.timezone.name()
        )
    }
}

impl Default for DateTimeTool {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Paris)
    }
}

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "datetime"
    }

    fn description(&self) -> &str {
        "Gives the current date and time. Takes no argument."
    }

    fn slash_command(&self) -> Option<&str> {
        Some("heure")
    }

    async fn execute(&self, _argument: &str) -> ToolInvocationResult {
        ToolInvocationResult::new(self.name(), self.render(Utc::now()))
    }
}
