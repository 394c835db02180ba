//! Notifications
//!
//! Transactional email is best-effort. Business flows trigger it through a
//! [`Notifier`] and only log the outcome; the email endpoints render messages
//! and hand them to a [`Mailer`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{CoreError, Result};

/// Sender for receipts
pub const RECEIPT_SENDER: &str = "STL Prime <billing@resend.dev>";
/// Sender for onboarding mail
pub const WELCOME_SENDER: &str = "STL Prime <onboarding@resend.dev>";
/// Sender for social notifications
pub const NOTIFICATION_SENDER: &str = "STL Prime <notifications@resend.dev>";

/// One purchased item on a receipt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub title: String,
    pub author: String,
    /// Two-decimal price, e.g. "8.00"
    pub price: String,
}

/// Purchase receipt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptEmail {
    pub to: String,
    #[serde(default)]
    pub first_name: String,
    pub items: Vec<ReceiptLine>,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub order_id: String,
}

/// Sent after signup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeEmail {
    pub to: String,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// Sent to a creator when someone follows them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerEmail {
    pub creator_id: String,
    pub creator_name: String,
    pub follower_name: String,
    pub follower_username: String,
}

/// First word of the customer's name, or "Member"
pub fn first_name(full_name: Option<&str>) -> String {
    full_name
        .and_then(|n| n.split_whitespace().next())
        .unwrap_or("Member")
        .to_string()
}

/// Payment intent id when known, otherwise the last 8 characters of the
/// checkout session id
pub fn order_reference(payment_intent: Option<&str>, session_id: &str) -> String {
    if let Some(intent) = payment_intent.filter(|p| !p.is_empty()) {
        return intent.to_string();
    }
    let chars: Vec<char> = session_id.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars[start..].iter().collect()
}

/// Outcome of a notification attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Accepted by the email provider
    Sent { id: Option<String> },
    /// Email is not configured on this deployment
    Skipped,
}

/// Best-effort notification trigger
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_receipt(&self, email: &ReceiptEmail) -> Result<Delivery>;
    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<Delivery>;
    async fn send_new_follower(&self, email: &FollowerEmail) -> Result<Delivery>;
}

/// A notification captured by [`OutboxNotifier`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Receipt(ReceiptEmail),
    Welcome(WelcomeEmail),
    NewFollower(FollowerEmail),
}

/// Notifier that keeps messages in memory (for development and tests)
#[derive(Default)]
pub struct OutboxNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records nothing and fails every send
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    async fn push(&self, notification: Notification) -> Result<Delivery> {
        if self.fail {
            return Err(CoreError::Notification("outbox rejected message".into()));
        }
        self.sent.lock().await.push(notification);
        Ok(Delivery::Sent { id: None })
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send_receipt(&self, email: &ReceiptEmail) -> Result<Delivery> {
        self.push(Notification::Receipt(email.clone())).await
    }

    async fn send_welcome(&self, email: &WelcomeEmail) -> Result<Delivery> {
        self.push(Notification::Welcome(email.clone())).await
    }

    async fn send_new_follower(&self, email: &FollowerEmail) -> Result<Delivery> {
        self.push(Notification::NewFollower(email.clone())).await
    }
}

/// A rendered message ready for the email provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Provider acknowledgement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailReceipt {
    pub id: String,
}

/// Email provider
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<MailReceipt>;
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl ReceiptEmail {
    pub fn render(&self) -> OutgoingEmail {
        let lines: String = self
            .items
            .iter()
            .map(|item| {
                format!(
                    "<tr><td>{}</td><td>@{}</td><td>R$ {}</td></tr>",
                    escape_html(&item.title),
                    escape_html(&item.author),
                    escape_html(&item.price)
                )
            })
            .collect();

        let name = if self.first_name.is_empty() { "Member" } else { &self.first_name };
        let total = if self.total.is_empty() {
            String::new()
        } else {
            format!("<p><strong>Total: R$ {}</strong></p>", escape_html(&self.total))
        };
        let order = if self.order_id.is_empty() {
            String::new()
        } else {
            format!("<p>Order {}</p>", escape_html(&self.order_id))
        };

        OutgoingEmail {
            from: RECEIPT_SENDER.into(),
            to: vec![self.to.clone()],
            subject: if self.order_id.is_empty() {
                "Your STL Prime receipt".into()
            } else {
                format!("Your STL Prime receipt (order {})", self.order_id)
            },
            html: format!(
                "<p>Hi {},</p><p>Thanks for your purchase. Your files are ready in your dashboard.</p>\
                 <table>{}</table>{}{}",
                escape_html(name),
                lines,
                total,
                order
            ),
        }
    }
}

impl WelcomeEmail {
    pub fn render(&self) -> OutgoingEmail {
        let name = self.first_name.as_deref().unwrap_or("Member");
        OutgoingEmail {
            from: WELCOME_SENDER.into(),
            to: vec![self.to.clone()],
            subject: "Welcome to STL Prime!".into(),
            html: format!(
                "<p>Hi {},</p><p>Your account is ready. Start exploring the catalog.</p>",
                escape_html(name)
            ),
        }
    }
}

impl FollowerEmail {
    /// `to` is the creator's address, resolved by the caller
    pub fn render(&self, to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: NOTIFICATION_SENDER.into(),
            to: vec![to.to_string()],
            subject: format!("{} started following you!", self.follower_name),
            html: format!(
                "<p>Hi {},</p><p>{} (@{}) is now following you on STL Prime.</p>",
                escape_html(&self.creator_name),
                escape_html(&self.follower_name),
                escape_html(&self.follower_username)
            ),
        }
    }
}
