use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::auth::RunMode;
use crate::cli::actions::{server, Action};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(3000);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let jwt_secret: SecretString = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .context("missing required argument: --jwt-secret")?
        .into();
    let jwt_ttl_hours = matches
        .get_one::<i64>("jwt-ttl-hours")
        .copied()
        .context("missing --jwt-ttl-hours")?;
    let otp_ttl_minutes = matches
        .get_one::<i64>("otp-ttl-minutes")
        .copied()
        .context("missing --otp-ttl-minutes")?;
    let temp_password_ttl_hours = matches
        .get_one::<i64>("temp-password-ttl-hours")
        .copied()
        .context("missing --temp-password-ttl-hours")?;
    let environment: RunMode = matches
        .get_one::<String>("environment")
        .map(String::as_str)
        .unwrap_or("production")
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let frontend_origin = matches
        .get_one::<String>("frontend-origin")
        .cloned()
        .context("missing --frontend-origin")?;

    let sms_api_key = matches
        .get_one::<String>("sms-api-key")
        .cloned()
        .map(SecretString::from);
    let smtp = matches.get_one::<String>("smtp-host").map(|host| {
        server::SmtpArgs {
            host: host.clone(),
            username: matches
                .get_one::<String>("smtp-username")
                .cloned()
                .unwrap_or_default(),
            password: matches
                .get_one::<String>("smtp-password")
                .cloned()
                .unwrap_or_default()
                .into(),
            from: matches
                .get_one::<String>("smtp-from")
                .cloned()
                .unwrap_or_default(),
        }
    });

    Ok(Action::Server(server::Args {
        port,
        dsn,
        jwt_secret,
        jwt_ttl_hours,
        otp_ttl_minutes,
        temp_password_ttl_hours,
        environment,
        frontend_origin,
        sms_api_key,
        smtp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn handler_builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "pannello",
            "--dsn",
            "postgres://localhost/pannello",
            "--jwt-secret",
            "sekret",
            "--environment",
            "development",
        ]);
        let Action::Server(args) = handler(&matches).expect("action");
        assert_eq!(args.port, 3000);
        assert!(args.environment.is_development());
        assert!(args.sms_api_key.is_none());
        assert!(args.smtp.is_none());
    }
}
