use reqwest::Client;
use serde::Serialize;
use std::future::Future;

use crate::{
    config::Config,
    error::{AppError, Result},
};

/// Outgoing mail through a SendGrid-compatible HTTP API.
///
/// Without an API key every message is logged instead of sent, which is how
/// development and test setups run.
#[derive(Debug, Clone)]
pub struct EmailService {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from_email: String,
    from_name: String,
    app_name: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SendGridEmail {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    subject: String,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

impl EmailService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from_email: config.mail_from_email.clone(),
            from_name: config.mail_from_name.clone(),
            app_name: config.app_name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn send_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<()> {
        let Some(api_key) = &self.api_key else {
            tracing::info!("Mail delivery disabled, not sending '{}' to {}", subject, to_email);
            return Ok(());
        };

        tracing::info!("Sending email to {}", to_email);

        let email = SendGridEmail {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: to_email.to_string(),
                    name: to_name.map(|s| s.to_string()),
                }],
            }],
            from: EmailAddress {
                email: self.from_email.clone(),
                name: Some(self.from_name.clone()),
            },
            subject: subject.to_string(),
            content: vec![
                Content {
                    content_type: "text/plain".to_string(),
                    value: text_content.to_string(),
                },
                Content {
                    content_type: "text/html".to_string(),
                    value: html_content.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&email)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Mail API error: {}", error_text);
            return Err(AppError::Internal(format!("Mail API error: {}", error_text)));
        }

        tracing::info!("Email sent successfully to {}", to_email);

        Ok(())
    }

    pub fn confirmation_url(&self, token: &str) -> String {
        format!("{}/confirm?token={}", self.base_url, token)
    }

    /// Welcome mail carrying the email confirmation link.
    pub async fn send_welcome_email(
        &self,
        to_email: &str,
        username: &str,
        confirm_token: &str,
    ) -> Result<()> {
        let confirm_url = self.confirmation_url(confirm_token);
        let subject = format!("Welcome to {}", self.app_name);

        let html_content = format!(
            r#"<p>Hi {username},</p>
<p>Welcome to {app}! Your account is ready.</p>
<p><a href="{url}">Confirm your email address</a></p>"#,
            username = username,
            app = self.app_name,
            url = confirm_url
        );
        let text_content = format!(
            "Hi {},\n\nWelcome to {}! Your account is ready.\n\nConfirm your email address: {}\n",
            username, self.app_name, confirm_url
        );

        self.send_email(
            to_email,
            Some(username),
            &subject,
            &html_content,
            &text_content,
        )
        .await
    }

    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        username: &str,
        reset_token: &str,
        ttl_minutes: i64,
    ) -> Result<()> {
        let subject = format!("{} password reset", self.app_name);

        let html_content = format!(
            r#"<p>Hi {username},</p>
<p>Use this code to reset your password: <strong>{token}</strong></p>
<p>It expires in {ttl} minutes. If you did not ask for a reset, ignore this mail.</p>"#,
            username = username,
            token = reset_token,
            ttl = ttl_minutes
        );
        let text_content = format!(
            "Hi {},\n\nUse this code to reset your password: {}\n\nIt expires in {} minutes. If you did not ask for a reset, ignore this mail.\n",
            username, reset_token, ttl_minutes
        );

        self.send_email(
            to_email,
            Some(username),
            &subject,
            &html_content,
            &text_content,
        )
        .await
    }
}

/// Runs a mail send off the request path. Failures are logged only.
pub fn send_in_background<F>(what: &'static str, send: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = send.await {
            tracing::warn!("Failed to send {} email: {}", what, e);
        }
    });
}
