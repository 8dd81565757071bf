//! Outbound notification channel.
//!
//! The orchestrator only ever talks to the [`Notifier`] trait; delivery
//! failures are reported but never fail the flow that triggered them.
//! [`LogNotifier`] is the development stand-in, [`LiveNotifier`] drives the
//! real SMS gateway and SMTP relay.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::info;

use crate::APP_USER_AGENT;

/// Who a message goes to. Phone is the national number; rendering adds the
/// country prefix.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a verification code. Goes over SMS when the recipient has a
    /// phone on file.
    async fn send_otp(&self, to: &Recipient, code: &str, expires_minutes: i64) -> Result<()>;

    /// Deliver the credentials for an admin-provisioned account.
    async fn send_temp_password(
        &self,
        to: &Recipient,
        temp_password: &str,
        expires_hours: i64,
    ) -> Result<()>;

    /// Confirmation after a successful password change or reset.
    async fn send_password_changed(&self, to: &Recipient) -> Result<()>;
}

/// Logs instead of sending. Secrets land in the log, so this is strictly
/// for development environments.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(&self, to: &Recipient, code: &str, expires_minutes: i64) -> Result<()> {
        info!(
            email = to.email,
            phone = to.phone.as_deref(),
            code,
            expires_minutes,
            "would send verification code"
        );
        Ok(())
    }

    async fn send_temp_password(
        &self,
        to: &Recipient,
        temp_password: &str,
        expires_hours: i64,
    ) -> Result<()> {
        info!(
            email = to.email,
            temp_password, expires_hours, "would send temporary password"
        );
        Ok(())
    }

    async fn send_password_changed(&self, to: &Recipient) -> Result<()> {
        info!(email = to.email, "would send password-changed notice");
        Ok(())
    }
}

const SMS_GATEWAY_URL: &str = "https://www.fast2sms.com/dev/bulkV2";

/// Fast2SMS bulkV2 client. The OTP route takes the bare code as the single
/// template variable.
pub struct SmsGateway {
    client: reqwest::Client,
    api_key: SecretString,
}

impl SmsGateway {
    pub fn new(api_key: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build sms client")?;
        Ok(Self { client, api_key })
    }

    async fn send_code(&self, phone: &str, code: &str) -> Result<()> {
        let response = self
            .client
            .get(SMS_GATEWAY_URL)
            .header("authorization", self.api_key.expose_secret())
            .query(&[
                ("variables_values", code),
                ("route", "otp"),
                ("numbers", phone),
            ])
            .send()
            .await
            .context("sms gateway request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("sms gateway returned {status}");
        }
        let body: Value = response
            .json()
            .await
            .context("sms gateway returned malformed response")?;
        if body.get("return").and_then(Value::as_bool) != Some(true) {
            bail!("sms gateway rejected the message: {body}");
        }
        Ok(())
    }
}

/// SMTP relay wrapper around lettre's pooled async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        username: String,
        password: SecretString,
        from: &str,
    ) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .context("failed to configure smtp relay")?
            .credentials(Credentials::new(
                username,
                password.expose_secret().to_string(),
            ))
            .build();
        let from = from.parse().context("invalid sender mailbox")?;
        Ok(Self { transport, from })
    }

    async fn send(&self, to: &Recipient, subject: &str, body: String) -> Result<()> {
        let mailbox = Mailbox::new(
            Some(to.name.clone()),
            to.email.parse().context("invalid recipient mailbox")?,
        );
        let message = Message::builder()
            .from(self.from.clone())
            .to(mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("failed to build message")?;
        self.transport
            .send(message)
            .await
            .context("smtp relay rejected the message")?;
        Ok(())
    }
}

/// Production dispatcher. Channels are optional so a deployment can run
/// SMS-only or email-only; a flow that needs a missing channel fails with
/// a configuration error, which the orchestrator logs.
pub struct LiveNotifier {
    sms: Option<SmsGateway>,
    smtp: Option<SmtpMailer>,
}

impl LiveNotifier {
    #[must_use]
    pub fn new(sms: Option<SmsGateway>, smtp: Option<SmtpMailer>) -> Self {
        Self { sms, smtp }
    }
}

#[async_trait]
impl Notifier for LiveNotifier {
    async fn send_otp(&self, to: &Recipient, code: &str, expires_minutes: i64) -> Result<()> {
        if let Some(phone) = to.phone.as_deref() {
            let Some(sms) = &self.sms else {
                bail!("sms gateway is not configured");
            };
            return sms.send_code(phone, code).await;
        }
        let Some(smtp) = &self.smtp else {
            bail!("smtp relay is not configured");
        };
        smtp.send(
            to,
            "Your verification code",
            format!(
                "Hi {},\n\nYour verification code is {code}. \
                 It expires in {expires_minutes} minutes.\n",
                to.name
            ),
        )
        .await
    }

    async fn send_temp_password(
        &self,
        to: &Recipient,
        temp_password: &str,
        expires_hours: i64,
    ) -> Result<()> {
        let Some(smtp) = &self.smtp else {
            bail!("smtp relay is not configured");
        };
        smtp.send(
            to,
            "Your account is ready",
            format!(
                "Hi {},\n\nAn account has been created for you.\n\
                 Temporary password: {temp_password}\n\
                 It expires in {expires_hours} hours. You will be asked to \
                 choose a new password on first login.\n",
                to.name
            ),
        )
        .await
    }

    async fn send_password_changed(&self, to: &Recipient) -> Result<()> {
        let Some(smtp) = &self.smtp else {
            bail!("smtp relay is not configured");
        };
        smtp.send(
            to,
            "Your password was changed",
            format!(
                "Hi {},\n\nThe password for your account was just changed. \
                 If this wasn't you, contact an administrator immediately.\n",
                to.name
            ),
        )
        .await
    }
}
