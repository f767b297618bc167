use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{DuesError, Result};
use crate::types::{
    AssociationId, DueId, NotificationChannel, NotificationId, NotificationStatus, TemplateId,
};

/// placeholder names a template body may reference
pub const PLACEHOLDERS: [&str; 7] = [
    "resident_name",
    "unit_number",
    "association_name",
    "amount",
    "period",
    "due_date",
    "status",
];

/// data the engine exposes for rendering one due's notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub resident_name: String,
    pub resident_email: Option<String>,
    pub resident_phone: Option<String>,
    pub unit_number: String,
    pub association_name: String,
    pub amount: Money,
    pub period: String,
    pub due_date: NaiveDate,
    pub status: String,
}

impl NotificationContext {
    fn vars(&self) -> [(&'static str, String); 7] {
        [
            ("resident_name", self.resident_name.clone()),
            ("unit_number", self.unit_number.clone()),
            ("association_name", self.association_name.clone()),
            ("amount", self.amount.to_string()),
            ("period", self.period.clone()),
            ("due_date", self.due_date.format("%Y-%m-%d").to_string()),
            ("status", self.status.clone()),
        ]
    }
}

/// reusable notification template with `{{variable}}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: TemplateId,
    pub name: String,
    pub channel: NotificationChannel,
    pub subject: String,
    pub body: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationTemplate {
    pub fn new(
        name: String,
        channel: NotificationChannel,
        subject: String,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        validate_placeholders(&subject)?;
        validate_placeholders(&body)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            channel,
            subject,
            body,
            active: true,
            created_at: now,
        })
    }

    /// standard overdue reminder
    pub fn overdue_reminder(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "overdue_reminder".to_string(),
            channel: NotificationChannel::Email,
            subject: "Payment reminder - {{association_name}}".to_string(),
            body: "Hello {{resident_name}},\n\n\
                   The dues for unit {{unit_number}} ({{period}}) of {{amount}} \
                   were expected by {{due_date}} and are currently {{status}}.\n\n\
                   {{association_name}}"
                .to_string(),
            active: true,
            created_at: now,
        }
    }

    /// render subject and body against the context
    pub fn render(&self, context: &NotificationContext) -> (String, String) {
        let mut subject = self.subject.clone();
        let mut body = self.body.clone();
        for (name, value) in context.vars() {
            let token = format!("{{{{{name}}}}}");
            subject = subject.replace(&token, &value);
            body = body.replace(&token, &value);
        }
        (subject, body)
    }
}

/// reject unbalanced or unknown `{{...}}` placeholders at definition time,
/// so batch dispatch never renders half-filled bodies
fn validate_placeholders(text: &str) -> Result<()> {
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| DuesError::InvalidTemplate {
            message: "unclosed placeholder".to_string(),
        })?;
        let name = &after[..close];
        if !PLACEHOLDERS.contains(&name) {
            return Err(DuesError::InvalidTemplate {
                message: format!("unknown placeholder: {name}"),
            });
        }
        rest = &after[close + 2..];
    }
    Ok(())
}

/// journal entry for one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub id: NotificationId,
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: NotificationStatus,
    pub attempts: u32,
    pub error: Option<String>,
    pub association_id: Option<AssociationId>,
    pub due_id: Option<DueId>,
    pub sent_at: DateTime<Utc>,
}

impl NotificationLog {
    /// retry eligibility: failed and still under the attempt cap
    pub fn can_retry(&self, max_attempts: u32) -> bool {
        self.status == NotificationStatus::Error && self.attempts < max_attempts
    }
}

/// collaborator failure, recorded verbatim in the log
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchError {
    pub message: String,
}

/// delivery collaborator. The engine renders and journals; senders only move
/// bytes. Each recipient is attempted independently.
pub trait NotificationSender {
    fn send(
        &mut self,
        channel: NotificationChannel,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), DispatchError>;
}

/// sender that records deliveries in the process log only; useful for demos
#[derive(Debug, Default)]
pub struct LoggingSender;

impl NotificationSender for LoggingSender {
    fn send(
        &mut self,
        channel: NotificationChannel,
        recipient: &str,
        subject: &str,
        _body: &str,
    ) -> std::result::Result<(), DispatchError> {
        tracing::info!(?channel, recipient, subject, "notification dispatched");
        Ok(())
    }
}

/// outcome of one reminder batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReminderOutcome {
    pub attempted: u32,
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> NotificationContext {
        NotificationContext {
            resident_name: "Karim H".to_string(),
            resident_email: Some("karim@example.org".to_string()),
            resident_phone: None,
            unit_number: "A1".to_string(),
            association_name: "Les Oliviers".to_string(),
            amount: Money::from_major(3000),
            period: "2024-03".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            status: "overdue".to_string(),
        }
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let template = NotificationTemplate::overdue_reminder(Utc::now());
        let (subject, body) = template.render(&context());

        assert_eq!(subject, "Payment reminder - Les Oliviers");
        assert!(body.contains("Karim H"));
        assert!(body.contains("unit A1"));
        assert!(body.contains("3000"));
        assert!(body.contains("2024-04-10"));
        assert!(!body.contains("{{"));
    }

    #[test]
    fn test_unknown_placeholder_rejected_at_definition() {
        let result = NotificationTemplate::new(
            "bad".to_string(),
            NotificationChannel::Email,
            "Hello {{resident_nam}}".to_string(),
            "body".to_string(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DuesError::InvalidTemplate { .. })));
    }

    #[test]
    fn test_unclosed_placeholder_rejected() {
        let result = NotificationTemplate::new(
            "bad".to_string(),
            NotificationChannel::Email,
            "subject".to_string(),
            "Hello {{resident_name".to_string(),
            Utc::now(),
        );
        assert!(matches!(result, Err(DuesError::InvalidTemplate { .. })));
    }

    #[test]
    fn test_retry_eligibility() {
        let mut log = NotificationLog {
            id: Uuid::new_v4(),
            channel: NotificationChannel::Email,
            recipient: "karim@example.org".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
            status: NotificationStatus::Error,
            attempts: 1,
            error: Some("connection refused".to_string()),
            association_id: None,
            due_id: None,
            sent_at: Utc::now(),
        };

        assert!(log.can_retry(3));

        log.attempts = 3;
        assert!(!log.can_retry(3));

        log.attempts = 1;
        log.status = NotificationStatus::Sent;
        assert!(!log.can_retry(3));
    }
}
