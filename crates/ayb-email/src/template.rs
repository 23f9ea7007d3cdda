//! Builtin-vs-custom template resolution (§4.9). A small, fixed set of
//! builtin templates ships with the binary; a `custom` row for the same
//! `template_key`, if present, overrides it.

use ayb_error::{ApiError, ApiResult};
use deadpool_postgres::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    Builtin,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub template_key: String,
    pub subject_template: String,
    pub html_template: String,
    pub enabled: bool,
    pub source: TemplateSource,
}

/// Builtins shipped with the binary, keyed the same way a custom override
/// row would be. Kept as a plain match rather than a file/asset loader —
/// this core ships no template files on disk.
fn builtin(template_key: &str) -> Option<EmailTemplate> {
    let (subject, html) = match template_key {
        "auth.password_reset" => (
            "Reset your password",
            "<p>Hi {{.Name}},</p><p>Click <a href=\"{{.ResetUrl}}\">here</a> to reset your password. \
             This link expires in {{.ExpiresInMinutes}} minutes.</p>",
        ),
        "auth.email_verification" => (
            "Verify your email address",
            "<p>Hi {{.Name}},</p><p>Confirm your email by visiting <a href=\"{{.VerifyUrl}}\">this link</a>.</p>",
        ),
        "auth.welcome" => (
            "Welcome to {{.AppName}}",
            "<p>Hi {{.Name}},</p><p>Your account is ready.</p>",
        ),
        _ => return None,
    };
    Some(EmailTemplate {
        template_key: template_key.to_string(),
        subject_template: subject.to_string(),
        html_template: html.to_string(),
        enabled: true,
        source: TemplateSource::Builtin,
    })
}

fn row_to_template(row: &tokio_postgres::Row) -> EmailTemplate {
    EmailTemplate {
        template_key: row.get("template_key"),
        subject_template: row.get("subject_template"),
        html_template: row.get("html_template"),
        enabled: row.get("enabled"),
        source: TemplateSource::Custom,
    }
}

/// Resolves `template_key`: a `custom` row wins if present, else falls back
/// to the compiled-in builtin, else `None` if the key is unknown to both.
pub async fn resolve(client: &Client, template_key: &str) -> ApiResult<Option<EmailTemplate>> {
    let row = client
        .query_opt(
            "SELECT template_key, subject_template, html_template, enabled
             FROM _ayb_email_templates WHERE template_key = $1",
            &[&template_key],
        )
        .await
        .map_err(ApiError::from)?;

    if let Some(row) = row {
        return Ok(Some(row_to_template(&row)));
    }

    Ok(builtin(template_key))
}

pub async fn upsert_custom(
    client: &Client,
    template_key: &str,
    subject_template: &str,
    html_template: &str,
    enabled: bool,
) -> ApiResult<EmailTemplate> {
    client
        .execute(
            "INSERT INTO _ayb_email_templates (template_key, subject_template, html_template, enabled)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (template_key) DO UPDATE
                SET subject_template = EXCLUDED.subject_template,
                    html_template = EXCLUDED.html_template,
                    enabled = EXCLUDED.enabled",
            &[&template_key, &subject_template, &html_template, &enabled],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(EmailTemplate {
        template_key: template_key.to_string(),
        subject_template: subject_template.to_string(),
        html_template: html_template.to_string(),
        enabled,
        source: TemplateSource::Custom,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_builtin_resolves() {
        assert!(builtin("auth.password_reset").is_some());
    }

    #[test]
    fn unknown_key_has_no_builtin() {
        assert!(builtin("bogus.key").is_none());
    }

    #[test]
    fn builtin_source_is_tagged_builtin() {
        let template = builtin("auth.welcome").unwrap();
        assert_eq!(template.source, TemplateSource::Builtin);
    }
}
