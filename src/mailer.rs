//! Out-of-band delivery of verification and password reset links.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::config::{MailConfig, MailTransport};
use crate::{Result, WardenError};

/// Kind of message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MailKind {
    /// Email address confirmation.
    Verification,
    /// Password reset.
    PasswordReset,
}

/// A message ready to send.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMail {
    /// Message kind.
    pub kind: MailKind,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// Action link embedded in the body.
    pub link: String,
    /// Token carried by the link.
    #[serde(skip)]
    pub token: String,
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message.
    async fn send(&self, mail: &OutboundMail) -> Result<()>;
}

/// Builds messages with links rooted at the public base URL.
#[derive(Debug, Clone)]
pub struct MailComposer {
    base_url: Url,
    from: String,
}

impl MailComposer {
    /// Create a composer. Fails if `public_url` is not an absolute URL.
    pub fn new(public_url: &str, from: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(public_url)
            .map_err(|e| WardenError::Config(format!("invalid public_url: {e}")))?;
        // Links are joined relative to the base, so it must end in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            from: from.into(),
        })
    }

    fn link(&self, path: &str, token: &str) -> Result<String> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| WardenError::Config(format!("invalid link path: {e}")))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.into())
    }

    /// Email verification message.
    pub fn verification(&self, to: &str, name: &str, token: &str) -> Result<OutboundMail> {
        let link = self.link("verify-email", token)?;
        Ok(OutboundMail {
            kind: MailKind::Verification,
            from: self.from.clone(),
            to: to.to_string(),
            subject: "Confirm your email address".to_string(),
            text: format!(
                "Hello {name},\n\nConfirm your email address by opening this link:\n{link}\n"
            ),
            link,
            token: token.to_string(),
        })
    }

    /// Password reset message.
    pub fn password_reset(&self, to: &str, name: &str, token: &str) -> Result<OutboundMail> {
        let link = self.link("reset-password", token)?;
        Ok(OutboundMail {
            kind: MailKind::PasswordReset,
            from: self.from.clone(),
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            text: format!(
                "Hello {name},\n\nA password reset was requested for your account.\n\
                 Open this link to choose a new password:\n{link}\n\n\
                 If you did not request this, ignore this message.\n"
            ),
            link,
            token: token.to_string(),
        })
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<()> {
        info!(
            to = %mail.to,
            kind = ?mail.kind,
            link = %mail.link,
            "Mail not sent (log transport)"
        );
        Ok(())
    }
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    client: reqwest::Client,
    url: Url,
}

impl WebhookMailer {
    /// Create a mailer posting to `url`.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| WardenError::Config(format!("invalid mail webhook_url: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(mail)
            .send()
            .await
            .map_err(|e| WardenError::Mail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WardenError::Mail(format!(
                "relay responded with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Build the configured transport.
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer)),
        MailTransport::Webhook => Ok(Arc::new(WebhookMailer::new(&config.webhook_url)?)),
    }
}
