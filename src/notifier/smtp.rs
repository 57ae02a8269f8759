// =============================================================================
// SMTP Notifier — implicit-TLS relay with login credentials
// =============================================================================

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info, instrument};

use super::{MailSettings, Notifier};

pub struct SmtpNotifier {
    settings: MailSettings,
}

impl SmtpNotifier {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }

    /// Build the message; fails on any unparsable address.
    fn build_message(&self, subject: &str, html_body: &str, recipients: &[String]) -> Result<Message> {
        let from_addr: Address = self
            .settings
            .username
            .parse()
            .with_context(|| format!("invalid sender address {:?}", self.settings.username))?;
        let from = Mailbox::new(Some(self.settings.sender_name.clone()), from_addr);

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in recipients {
            let to: Mailbox = recipient
                .parse()
                .with_context(|| format!("invalid recipient address {recipient:?}"))?;
            builder = builder.to(to);
        }

        builder
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .context("failed to assemble mail message")
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        Ok(AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.server)
            .with_context(|| format!("failed to configure SMTP relay {}", self.settings.server))?
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ))
            .build())
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        self.transport()?
            .send(message)
            .await
            .with_context(|| format!("SMTP delivery via {} failed", self.settings.server))?;
        Ok(())
    }

    /// Connect and authenticate against the relay without sending anything.
    #[instrument(skip(self), fields(server = %self.settings.server, port = self.settings.port))]
    pub async fn check_connection(&self) -> bool {
        let missing = self.settings.missing(&self.settings.recipients);
        if !missing.is_empty() {
            error!(missing = ?missing, "mail settings incomplete; not connecting");
            return false;
        }

        let result = match self.transport() {
            Ok(transport) => transport
                .test_connection()
                .await
                .with_context(|| format!("SMTP login to {} failed", self.settings.server)),
            Err(e) => Err(e),
        };

        match result {
            Ok(true) => {
                info!("SMTP connection and login ok");
                true
            }
            Ok(false) => {
                error!("SMTP server did not accept the connection");
                false
            }
            Err(e) => {
                error!(error = ?e, "SMTP connection check failed");
                false
            }
        }
    }
}

impl Notifier for SmtpNotifier {
    #[instrument(skip(self, html_body, recipients), fields(recipients = recipients.len()))]
    async fn send(&self, subject: &str, html_body: &str, recipients: &[String]) -> bool {
        let missing = self.settings.missing(recipients);
        if !missing.is_empty() {
            error!(missing = ?missing, "mail settings incomplete; not sending");
            return false;
        }

        let message = match self.build_message(subject, html_body, recipients) {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "failed to build report mail");
                return false;
            }
        };

        match self.deliver(message).await {
            Ok(()) => {
                info!(server = %self.settings.server, "report mail sent");
                true
            }
            Err(e) => {
                error!(error = ?e, "report mail delivery failed");
                false
            }
        }
    }
}
