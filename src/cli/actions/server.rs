use std::sync::Arc;

use anyhow::Result;
use secrecy::SecretString;
use tracing::warn;

use crate::api::{self, ServerSettings};
use crate::auth::notify::{LiveNotifier, LogNotifier, Notifier, SmsGateway, SmtpMailer};
use crate::auth::{AuthConfig, RunMode};

#[derive(Debug)]
pub struct SmtpArgs {
    pub host: String,
    pub username: String,
    pub password: SecretString,
    pub from: String,
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub jwt_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
    pub temp_password_ttl_hours: i64,
    pub environment: RunMode,
    pub frontend_origin: String,
    pub sms_api_key: Option<SecretString>,
    pub smtp: Option<SmtpArgs>,
}

/// Wire the notifier and orchestrator config, then hand off to the server.
pub async fn execute(args: Args) -> Result<()> {
    let notifier = build_notifier(&args)?;

    let auth = AuthConfig::new()
        .with_run_mode(args.environment)
        .with_otp_ttl_minutes(args.otp_ttl_minutes)
        .with_temp_password_ttl_hours(args.temp_password_ttl_hours);

    api::new(ServerSettings {
        port: args.port,
        dsn: args.dsn,
        frontend_origin: args.frontend_origin,
        jwt_secret: args.jwt_secret,
        jwt_ttl_hours: args.jwt_ttl_hours,
        auth,
        notifier,
    })
    .await
}

/// Development logs instead of sending; production uses whichever live
/// channels are configured.
fn build_notifier(args: &Args) -> Result<Arc<dyn Notifier>> {
    if args.environment.is_development() {
        return Ok(Arc::new(LogNotifier));
    }

    let sms = args
        .sms_api_key
        .clone()
        .map(SmsGateway::new)
        .transpose()?;
    let smtp = args
        .smtp
        .as_ref()
        .map(|smtp| {
            SmtpMailer::new(
                &smtp.host,
                smtp.username.clone(),
                smtp.password.clone(),
                &smtp.from,
            )
        })
        .transpose()?;

    if sms.is_none() && smtp.is_none() {
        warn!("no SMS or SMTP channel configured, notification delivery will fail");
    }
    Ok(Arc::new(LiveNotifier::new(sms, smtp)))
}
