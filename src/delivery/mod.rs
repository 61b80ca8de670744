//! Outbound delivery of approved messages
//!
//! SMS goes through the Twilio Messages API, email through an SMTP relay and
//! social posts through a Facebook Page feed. Credentials are read once at
//! startup; a channel without credentials reports itself as not configured
//! instead of failing at boot.

use axum::http::StatusCode;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DeliveryConfig;

const FACEBOOK_GRAPH_VERSION: &str = "v19.0";

/// Port on which the relay expects TLS from the first byte
const SMTPS_PORT: u16 = 465;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("{provider} is not configured. Set {variables}.")]
    NotConfigured {
        provider: &'static str,
        variables: &'static str,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("{provider} API {status}: {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The SMTP relay or message assembly failed
    #[error("{0}")]
    Smtp(String),
}

impl DeliveryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeliveryError::NotConfigured { .. } | DeliveryError::Smtp(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DeliveryError::Rejected(_) => StatusCode::BAD_REQUEST,
            DeliveryError::Upstream { .. } | DeliveryError::Transport { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
}

#[derive(Clone)]
pub struct SmtpCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// `EMAIL_FROM`, or the SMTP user when unset
    pub from: String,
}

#[derive(Clone)]
pub struct FacebookCredentials {
    pub page_id: String,
    pub access_token: SecretString,
}

/// Delivery credentials taken from the environment
#[derive(Clone, Default)]
pub struct DeliveryCredentials {
    pub twilio: Option<TwilioCredentials>,
    /// `SMS_TO_NUMBER`, used when a request names no recipient
    pub default_sms_recipient: Option<String>,
    pub smtp: Option<SmtpCredentials>,
    /// `EMAIL_TO`, used when a request names no recipient
    pub default_email_recipient: Option<String>,
    pub facebook: Option<FacebookCredentials>,
}

impl std::fmt::Debug for DeliveryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryCredentials")
            .field("twilio", &self.twilio.as_ref().map(|_| "[REDACTED]"))
            .field("default_sms_recipient", &self.default_sms_recipient)
            .field(
                "smtp",
                &self.smtp.as_ref().map(|smtp| (&smtp.host, smtp.port, "[REDACTED]")),
            )
            .field("default_email_recipient", &self.default_email_recipient)
            .field("facebook", &self.facebook.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl DeliveryCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup; a provider is configured
    /// only when all of its variables are non-empty
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(token), Some(from_number)) => Some(TwilioCredentials {
                account_sid,
                auth_token: SecretString::from(token),
                from_number,
            }),
            _ => None,
        };

        let smtp = match (
            get("SMTP_HOST"),
            get("SMTP_PORT"),
            get("SMTP_USER"),
            get("SMTP_PASS"),
        ) {
            (Some(host), Some(port), Some(username), Some(password)) => {
                match port.trim().parse::<u16>() {
                    Ok(port) => Some(SmtpCredentials {
                        host,
                        port,
                        from: get("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                        username,
                        password: SecretString::from(password),
                    }),
                    Err(_) => {
                        tracing::warn!(port = %port, "SMTP_PORT is not a valid port, email delivery disabled");
                        None
                    }
                }
            }
            _ => None,
        };

        let facebook = match (get("FACEBOOK_PAGE_ID"), get("FACEBOOK_PAGE_ACCESS_TOKEN")) {
            (Some(page_id), Some(token)) => Some(FacebookCredentials {
                page_id,
                access_token: SecretString::from(token),
            }),
            _ => None,
        };

        Self {
            twilio,
            default_sms_recipient: get("SMS_TO_NUMBER"),
            smtp,
            default_email_recipient: get("EMAIL_TO"),
            facebook,
        }
    }
}

/// Body of `POST /api/send-sms`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub to: Option<String>,
}

/// Body of `POST /api/send-email`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailMessage {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub to: Option<String>,
}

/// Body of `POST /api/post-social`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialPost {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsReceipt {
    pub success: bool,
    pub sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailReceipt {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialReceipt {
    pub success: bool,
    pub platform: &'static str,
    pub id: Option<String>,
}

/// Sends messages to the configured gateways
pub struct Dispatcher {
    http: reqwest::Client,
    twilio_api_base: String,
    facebook_api_base: String,
    credentials: DeliveryCredentials,
}

impl Dispatcher {
    pub fn new(config: &DeliveryConfig, credentials: DeliveryCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            twilio_api_base: config.twilio_api_base.trim_end_matches('/').to_string(),
            facebook_api_base: config.facebook_api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Send one SMS through Twilio
    ///
    /// # Errors
    ///
    /// `NotConfigured` without Twilio credentials, `Rejected` for a blank
    /// message or when no recipient is known, `Upstream`/`Transport` when
    /// Twilio fails.
    pub async fn send_sms(&self, sms: &SmsMessage) -> Result<SmsReceipt, DeliveryError> {
        let twilio = self
            .credentials
            .twilio
            .as_ref()
            .ok_or(DeliveryError::NotConfigured {
                provider: "Twilio",
                variables: "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, and TWILIO_PHONE_NUMBER",
            })?;

        if sms.message.trim().is_empty() {
            return Err(DeliveryError::Rejected("message is required.".to_string()));
        }

        let recipient = sms
            .to
            .as_deref()
            .map(str::trim)
            .filter(|to| !to.is_empty())
            .or(self.credentials.default_sms_recipient.as_deref())
            .ok_or_else(|| {
                DeliveryError::Rejected(
                    "No recipient. Provide 'to' in the body or set SMS_TO_NUMBER.".to_string(),
                )
            })?;

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.twilio_api_base, twilio.account_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&twilio.account_sid, Some(twilio.auth_token.expose_secret()))
            .form(&[
                ("From", twilio.from_number.as_str()),
                ("To", recipient),
                ("Body", sms.message.as_str()),
            ])
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                provider: "Twilio",
                source,
            })?;

        let body = read_success("Twilio", response).await?;
        let sid = body.get("sid").and_then(Value::as_str).map(str::to_string);
        tracing::info!(sid = sid.as_deref().unwrap_or("-"), "SMS sent");

        Ok(SmsReceipt { success: true, sid })
    }

    /// Send one plain-text email through the SMTP relay
    ///
    /// Port 465 uses implicit TLS; any other port upgrades with STARTTLS when
    /// the relay offers it.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without SMTP credentials, `Rejected` for a blank
    /// subject or body, a missing recipient or an unparseable recipient
    /// address, `Smtp` when the relay fails.
    pub async fn send_email(&self, email: &EmailMessage) -> Result<EmailReceipt, DeliveryError> {
        let smtp = self
            .credentials
            .smtp
            .as_ref()
            .ok_or(DeliveryError::NotConfigured {
                provider: "SMTP",
                variables: "SMTP_HOST, SMTP_PORT, SMTP_USER, and SMTP_PASS",
            })?;

        if email.subject.trim().is_empty() || email.body.trim().is_empty() {
            return Err(DeliveryError::Rejected(
                "subject and body are required.".to_string(),
            ));
        }

        let recipient = email
            .to
            .as_deref()
            .map(str::trim)
            .filter(|to| !to.is_empty())
            .or(self.credentials.default_email_recipient.as_deref())
            .ok_or_else(|| {
                DeliveryError::Rejected(
                    "No recipient. Provide 'to' in the body or set EMAIL_TO.".to_string(),
                )
            })?;

        let to: Mailbox = recipient.parse().map_err(|e| {
            DeliveryError::Rejected(format!("Invalid recipient address '{}': {}", recipient, e))
        })?;
        let from: Mailbox = smtp.from.parse().map_err(|e| {
            DeliveryError::Smtp(format!("Invalid sender address '{}': {}", smtp.from, e))
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        let response = smtp_transport(smtp)?
            .send(message)
            .await
            .map_err(|e| {
                tracing::warn!(host = %smtp.host, port = smtp.port, error = %e, "SMTP relay rejected message");
                DeliveryError::Smtp(e.to_string())
            })?;
        tracing::info!(code = %response.code(), "Email sent");

        Ok(EmailReceipt { success: true })
    }

    /// Publish one social post
    ///
    /// Only Facebook Pages are supported; `twitter` is recognised but rejected.
    pub async fn post_social(&self, post: &SocialPost) -> Result<SocialReceipt, DeliveryError> {
        if post.message.trim().is_empty() {
            return Err(DeliveryError::Rejected("message is required.".to_string()));
        }

        match post.platform.trim() {
            "facebook" => {}
            "twitter" => {
                return Err(DeliveryError::Rejected(
                    "Posting to twitter is not supported by this service.".to_string(),
                ));
            }
            _ => {
                return Err(DeliveryError::Rejected(
                    "platform must be 'twitter' or 'facebook'.".to_string(),
                ));
            }
        }

        let facebook = self
            .credentials
            .facebook
            .as_ref()
            .ok_or(DeliveryError::NotConfigured {
                provider: "Facebook Page",
                variables: "FACEBOOK_PAGE_ID and FACEBOOK_PAGE_ACCESS_TOKEN",
            })?;

        let url = format!(
            "{}/{}/{}/feed",
            self.facebook_api_base, FACEBOOK_GRAPH_VERSION, facebook.page_id
        );

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "message": post.message,
                "access_token": facebook.access_token.expose_secret(),
            }))
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                provider: "Facebook",
                source,
            })?;

        let body = read_success("Facebook", response).await?;
        let id = body.get("id").and_then(Value::as_str).map(str::to_string);
        tracing::info!(post_id = id.as_deref().unwrap_or("-"), "Social post published");

        Ok(SocialReceipt {
            success: true,
            platform: "facebook",
            id,
        })
    }
}

fn smtp_transport(
    smtp: &SmtpCredentials,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
    let parameters =
        TlsParameters::new(smtp.host.clone()).map_err(|e| DeliveryError::Smtp(e.to_string()))?;
    let tls = if smtp.port == SMTPS_PORT {
        Tls::Wrapper(parameters)
    } else {
        Tls::Opportunistic(parameters)
    };
    let credentials = Credentials::new(
        smtp.username.clone(),
        smtp.password.expose_secret().to_string(),
    );

    Ok(
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp.host.as_str())
            .port(smtp.port)
            .tls(tls)
            .credentials(credentials)
            .build(),
    )
}

/// Body of a successful gateway response, or an `Upstream` error
///
/// A success body that is not JSON is treated as empty.
async fn read_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<Value, DeliveryError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| DeliveryError::Transport { provider, source })?;

    if !status.is_success() {
        tracing::warn!(provider, status = status.as_u16(), "Delivery gateway rejected request");
        return Err(DeliveryError::Upstream {
            provider,
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
}
