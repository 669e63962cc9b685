#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Sends the HTML report as an email attachment over an unauthenticated
//! STARTTLS relay.

use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{AsyncSmtpTransport, AsyncTransport as _, Message, Tokio1Executor};
use park_assets_report::Report;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable consulted when no SMTP server is configured.
pub const SMTP_SERVER_ENV: &str = "SMTP_SERVER";

/// Errors that can occur while emailing a report.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// An address could not be parsed.
    #[error("Invalid email address {address:?}: {source}")]
    Address {
        /// Offending address.
        address: String,
        /// Underlying parse error.
        source: lettre::address::AddressError,
    },

    /// The message could not be assembled.
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    /// SMTP delivery failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Required settings are missing.
    #[error("Email configuration error: {message}")]
    Config {
        /// What is missing.
        message: String,
    },
}

/// Delivery settings, read from the `[email]` table of the config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// Whether the report is sent at all.
    pub enabled: bool,
    /// Relay host. Falls back to `SMTP_SERVER` when empty.
    pub smtp_server: String,
    /// Relay port.
    pub smtp_port: u16,
    /// Sender address.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: String::new(),
            smtp_port: 25,
            from: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            subject: "Outside-Boundary Asset Coordinates Map".to_string(),
            body: "Hello,\n\nPlease find attached the Outside-Boundary Asset Coordinates report.\n"
                .to_string(),
        }
    }
}

impl EmailSettings {
    /// The configured relay host, or `SMTP_SERVER` from the environment.
    ///
    /// # Errors
    ///
    /// * If neither is set
    pub fn resolve_server(&self) -> Result<String, NotifyError> {
        let configured = self.smtp_server.trim();
        if !configured.is_empty() {
            return Ok(configured.to_string());
        }

        std::env::var(SMTP_SERVER_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| NotifyError::Config {
                message: format!("no smtp_server configured and {SMTP_SERVER_ENV} is not set"),
            })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .trim()
        .parse()
        .map_err(|source| NotifyError::Address {
            address: address.to_string(),
            source,
        })
}

/// Assembles the message: plain-text body plus the report as a
/// `text/html` attachment named for `date`.
///
/// # Errors
///
/// * If any address is invalid
/// * If there are no recipients
pub fn build_message(
    settings: &EmailSettings,
    report: &Report,
    date: NaiveDate,
) -> Result<Message, NotifyError> {
    if settings.to.is_empty() && settings.cc.is_empty() {
        return Err(NotifyError::Config {
            message: "no recipients configured".to_string(),
        });
    }

    let mut builder = Message::builder()
        .from(mailbox(&settings.from)?)
        .subject(settings.subject.clone());
    for address in &settings.to {
        builder = builder.to(mailbox(address)?);
    }
    for address in &settings.cc {
        builder = builder.cc(mailbox(address)?);
    }

    let attachment = Attachment::new(Report::attachment_name(date))
        .body(report.html().to_string(), ContentType::TEXT_HTML);

    Ok(builder.multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::plain(settings.body.clone()))
            .singlepart(attachment),
    )?)
}

/// Sends `report` as configured by `settings`.
///
/// # Errors
///
/// * If the message cannot be built
/// * If the relay rejects the connection or the message
pub async fn send_report(
    settings: &EmailSettings,
    report: &Report,
    date: NaiveDate,
) -> Result<(), NotifyError> {
    let message = build_message(settings, report, date)?;
    let server = settings.resolve_server()?;

    log::info!("Sending report via {server}:{}", settings.smtp_port);

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&server)?
        .port(settings.smtp_port)
        .build();
    mailer.send(message).await?;

    log::info!("...email with HTML report sent successfully");
    Ok(())
}
