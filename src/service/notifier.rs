//! Email notifications for booking events.
//!
//! A [`NotificationWorker`] subscribes to the event bus and turns each
//! event into customer and admin emails through a [`Mailer`]. Sends are
//! best-effort: a failure is logged and recorded in the
//! [`NotificationLog`], never surfaced to the booking that triggered it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::BookingEvent;

/// Why a mail send failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MailError {
    /// The HTTP request to the mail API did not complete.
    #[error("mail transport error: {0}")]
    Transport(String),
    /// The mail API answered with an error status.
    #[error("mail api rejected send: status {status}")]
    Api {
        /// HTTP status returned by the API.
        status: u16,
        /// Response body, for the logs.
        detail: String,
    },
}

/// One outbound plain-text email.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns a [`MailError`] when delivery fails; callers treat this
    /// as loggable, never fatal.
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Mailer that POSTs to a Brevo-compatible transactional mail API.
#[derive(Debug, Clone)]
pub struct HttpApiMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender_name: String,
    sender_email: String,
}

impl HttpApiMailer {
    /// Creates a mailer for the given API endpoint and sender identity.
    #[must_use]
    pub fn new(
        endpoint: String,
        api_key: String,
        sender_name: String,
        sender_email: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            sender_name,
            sender_email,
        }
    }
}

#[async_trait]
impl Mailer for HttpApiMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let payload = serde_json::json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": [ { "email": mail.to } ],
            "subject": mail.subject,
            "textContent": mail.body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(MailError::Api {
                status: status.as_u16(),
                detail,
            })
        }
    }
}

/// Mailer used when no API key is configured: drops mail, logs once per
/// message at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::debug!(to = %mail.to, subject = %mail.subject, "mail disabled, dropping message");
        Ok(())
    }
}

/// One entry in the notification log.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationRecord {
    /// Event that triggered the notification.
    pub event_type: String,
    /// Reservation code involved.
    pub code: String,
    /// Recipient address.
    pub recipient: String,
    /// Whether the send succeeded.
    pub sent: bool,
    /// Error text for failed sends.
    pub detail: Option<String>,
    /// When the attempt finished.
    pub at: DateTime<Utc>,
}

/// Bounded in-memory log of notification outcomes.
///
/// Surfaced by the system endpoint so operators can see notification
/// failures without grepping logs.
#[derive(Debug, Clone)]
pub struct NotificationLog {
    inner: Arc<Mutex<VecDeque<NotificationRecord>>>,
    capacity: usize,
}

impl NotificationLog {
    /// Creates a log keeping at most `capacity` recent records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends a record, evicting the oldest at capacity.
    pub fn record(&self, record: NotificationRecord) {
        let mut log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(record);
    }

    /// Returns the most recent records, newest last.
    #[must_use]
    pub fn recent(&self) -> Vec<NotificationRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Subscribes to booking events and emails customer and admin.
#[derive(Debug)]
pub struct NotificationWorker {
    mailer: Arc<dyn Mailer>,
    admin_email: String,
    log: NotificationLog,
}

impl NotificationWorker {
    /// Creates the worker.
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, admin_email: String, log: NotificationLog) -> Self {
        Self {
            mailer,
            admin_email,
            log,
        }
    }

    /// Spawns the worker loop on the runtime.
    ///
    /// The loop ends when the event bus is dropped. Lag (a full ring
    /// buffer) is logged and skipped, not fatal.
    pub fn spawn(self, mut rx: broadcast::Receiver<BookingEvent>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle(&event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "notification worker lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("notification worker stopped, event bus closed");
        })
    }

    async fn handle(&self, event: &BookingEvent) {
        for mail in compose(event, &self.admin_email) {
            let outcome = self.mailer.send(&mail).await;
            match &outcome {
                Ok(()) => {
                    tracing::info!(
                        to = %mail.to,
                        event = event.event_type_str(),
                        code = event.code(),
                        "notification sent"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        to = %mail.to,
                        event = event.event_type_str(),
                        code = event.code(),
                        error = %e,
                        "notification failed"
                    );
                }
            }
            self.log.record(NotificationRecord {
                event_type: event.event_type_str().to_string(),
                code: event.code().to_string(),
                recipient: mail.to,
                sent: outcome.is_ok(),
                detail: outcome.err().map(|e| e.to_string()),
                at: Utc::now(),
            });
        }
    }
}

/// Builds the outbound emails for one event.
fn compose(event: &BookingEvent, admin_email: &str) -> Vec<OutgoingMail> {
    let customer = event.customer();
    let code = event.code();
    match event {
        BookingEvent::ReservationCreated {
            event_date,
            event_address,
            lines,
            total,
            ..
        } => {
            let mut item_list = String::new();
            for line in lines {
                item_list.push_str(&format!(
                    "  - {} x{} ({})\n",
                    line.item_name, line.quantity, line.line_subtotal
                ));
            }
            vec![
                OutgoingMail {
                    to: customer.email.clone(),
                    subject: format!("Reservation received: {code}"),
                    body: format!(
                        "Hello {},\n\nwe received your reservation {code} for {event_date} \
                         at {event_address}.\n\nItems:\n{item_list}\nTotal: {total}\n\n\
                         We will confirm it as soon as your payment is verified.\n",
                        customer.first_name
                    ),
                },
                OutgoingMail {
                    to: admin_email.to_string(),
                    subject: format!(
                        "New reservation {code} from {} {}",
                        customer.first_name, customer.last_name
                    ),
                    body: format!(
                        "Reservation {code} for {event_date} at {event_address}.\n\n\
                         Items:\n{item_list}\nTotal: {total}\n"
                    ),
                },
            ]
        }
        BookingEvent::ReservationApproved { event_date, .. } => vec![
            OutgoingMail {
                to: customer.email.clone(),
                subject: format!("Reservation confirmed: {code}"),
                body: format!(
                    "Hello {},\n\nyour reservation {code} for {event_date} is confirmed. \
                     See you there!\n",
                    customer.first_name
                ),
            },
            OutgoingMail {
                to: admin_email.to_string(),
                subject: format!("Logistics: prepare order {code}"),
                body: format!("Reservation {code} was approved for {event_date}.\n"),
            },
        ],
        BookingEvent::ReservationVoided { .. } => vec![OutgoingMail {
            to: customer.email.clone(),
            subject: format!("Reservation voided: {code}"),
            body: format!(
                "Hello {},\n\nyour reservation {code} has been voided. If this was \
                 unexpected, please contact us.\n",
                customer.first_name
            ),
        }],
    }
}
