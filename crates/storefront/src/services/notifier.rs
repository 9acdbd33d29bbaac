//! Purchase confirmation notifications.
//!
//! Checkout hands a [`PurchaseNotice`] to a [`PurchaseNotifier`] on a detached
//! task. Delivery failures are only ever logged.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use estore_core::Email;

use crate::config::EmailConfig;

/// An item the buyer asked for but could not get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfulfilledItem {
    pub title: String,
    pub quantity: i32,
}

/// What the buyer is told after checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseNotice {
    pub to: Email,
    pub first_name: String,
    pub code: i32,
    pub amount: Decimal,
    pub unfulfilled: Vec<UnfulfilledItem>,
}

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Sends purchase confirmations.
#[async_trait]
pub trait PurchaseNotifier: Send + Sync {
    async fn purchase_confirmed(&self, notice: &PurchaseNotice) -> Result<(), EmailError>;
}

#[derive(Template)]
#[template(path = "email/purchase_confirmation.html")]
struct PurchaseConfirmationHtml<'a> {
    first_name: &'a str,
    code: i32,
    amount: &'a Decimal,
    unfulfilled: &'a [UnfulfilledItem],
}

#[derive(Template)]
#[template(path = "email/purchase_confirmation.txt")]
struct PurchaseConfirmationText<'a> {
    first_name: &'a str,
    code: i32,
    amount: &'a Decimal,
    unfulfilled: &'a [UnfulfilledItem],
}

/// Render the (text, html) bodies for a notice.
fn render(notice: &PurchaseNotice) -> Result<(String, String), askama::Error> {
    let text = PurchaseConfirmationText {
        first_name: &notice.first_name,
        code: notice.code,
        amount: &notice.amount,
        unfulfilled: &notice.unfulfilled,
    }
    .render()?;
    let html = PurchaseConfirmationHtml {
        first_name: &notice.first_name,
        code: notice.code,
        amount: &notice.amount,
        unfulfilled: &notice.unfulfilled,
    }
    .render()?;
    Ok((text, html))
}

/// SMTP notifier.
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailNotifier {
    /// Create a new SMTP notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl PurchaseNotifier for EmailNotifier {
    async fn purchase_confirmed(&self, notice: &PurchaseNotice) -> Result<(), EmailError> {
        let (text, html) = render(notice)?;
        let to = notice.to.as_str();

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(format!("E-Store purchase {}", notice.code))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, code = notice.code, "purchase confirmation sent");
        Ok(())
    }
}

/// Notifier used when SMTP is not configured: logs the notice and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl PurchaseNotifier for LogNotifier {
    async fn purchase_confirmed(&self, notice: &PurchaseNotice) -> Result<(), EmailError> {
        tracing::info!(
            to = %notice.to,
            code = notice.code,
            amount = %notice.amount,
            unfulfilled = notice.unfulfilled.len(),
            "purchase confirmation (mail disabled)"
        );
        Ok(())
    }
}

/// Notifier that records every notice, for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: tokio::sync::Mutex<Vec<PurchaseNotice>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingNotifier {
    /// Notices delivered so far.
    pub async fn sent(&self) -> Vec<PurchaseNotice> {
        self.sent.lock().await.clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PurchaseNotifier for RecordingNotifier {
    async fn purchase_confirmed(&self, notice: &PurchaseNotice) -> Result<(), EmailError> {
        self.sent.lock().await.push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn notice(unfulfilled: Vec<UnfulfilledItem>) -> PurchaseNotice {
        PurchaseNotice {
            to: Email::parse("bea@shop.com").unwrap(),
            first_name: "Bea".to_owned(),
            code: 123_456,
            amount: Decimal::new(25500, 2),
            unfulfilled,
        }
    }

    #[test]
    fn test_render_full_purchase() {
        let (text, html) = render(&notice(Vec::new())).unwrap();
        assert!(text.contains("Hi Bea"));
        assert!(text.contains("123456"));
        assert!(text.contains("$255.00"));
        assert!(!text.contains("out of stock"));
        assert!(html.contains("<strong>123456</strong>"));
    }

    #[test]
    fn test_render_lists_unfulfilled_items() {
        let (text, html) = render(&notice(vec![UnfulfilledItem {
            title: "Bombilla".to_owned(),
            quantity: 2,
        }]))
        .unwrap();
        assert!(text.contains("Bombilla x 2"));
        assert!(html.contains("Bombilla &times; 2"));
    }
}
