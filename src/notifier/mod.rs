// =============================================================================
// Report delivery
// =============================================================================
//
// SECURITY: the mail password is never logged; `MailSettings` redacts it in
// its `Debug` output.
// =============================================================================

pub mod smtp;

use std::future::Future;

use chrono::{DateTime, FixedOffset};

pub use smtp::SmtpNotifier;

/// Delivers one HTML document to a recipient list.  `true` means the
/// transport accepted the message.
pub trait Notifier: Send + Sync {
    fn send(&self, subject: &str, html_body: &str, recipients: &[String]) -> impl Future<Output = bool> + Send;
}

/// `<code> Stock Analysis Report - <YYYY-MM-DD>`
pub fn report_subject(stock_code: &str, at: DateTime<FixedOffset>) -> String {
    format!("{} Stock Analysis Report - {}", stock_code, at.format("%Y-%m-%d"))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq)]
pub struct MailSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender_name: String,
    pub recipients: Vec<String>,
}

impl MailSettings {
    /// Read `MAIL_*` variables.  Missing values stay empty; `missing()`
    /// reports them before any connection is attempted.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            server: non_empty("MAIL_SERVER").unwrap_or_else(|| "smtp.qq.com".to_string()),
            port: non_empty("MAIL_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(465),
            username: non_empty("MAIL_USERNAME").unwrap_or_default(),
            password: non_empty("MAIL_PASSWORD").unwrap_or_default(),
            sender_name: non_empty("MAIL_SENDER_NAME").unwrap_or_else(|| "Stock Pulse".to_string()),
            recipients: non_empty("MAIL_TO")
                .map(|list| {
                    list.split(',')
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Names of the settings that must be present but are not.
    pub fn missing(&self, recipients: &[String]) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.server.is_empty() {
            missing.push("MAIL_SERVER");
        }
        if self.username.is_empty() {
            missing.push("MAIL_USERNAME");
        }
        if self.password.is_empty() {
            missing.push("MAIL_PASSWORD");
        }
        if recipients.is_empty() {
            missing.push("MAIL_TO");
        }
        missing
    }
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender_name", &self.sender_name)
            .field("recipients", &self.recipients)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> MailSettings {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        MailSettings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]);
        assert_eq!(s.server, "smtp.qq.com");
        assert_eq!(s.port, 465);
        assert_eq!(s.sender_name, "Stock Pulse");
        assert!(s.recipients.is_empty());
        assert_eq!(
            s.missing(&s.recipients),
            vec!["MAIL_USERNAME", "MAIL_PASSWORD", "MAIL_TO"]
        );
    }

    #[test]
    fn recipients_are_split_and_trimmed() {
        let s = settings(&[
            ("MAIL_USERNAME", "bot@qq.com"),
            ("MAIL_PASSWORD", "secret"),
            ("MAIL_TO", " a@x.com, ,b@y.com "),
            ("MAIL_PORT", "587"),
        ]);
        assert_eq!(s.recipients, vec!["a@x.com", "b@y.com"]);
        assert_eq!(s.port, 587);
        assert!(s.missing(&s.recipients).is_empty());
    }

    #[test]
    fn debug_output_redacts_password() {
        let s = settings(&[("MAIL_PASSWORD", "hunter2")]);
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn subject_uses_local_date() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let at = tz.with_ymd_and_hms(2024, 6, 12, 23, 30, 0).unwrap();
        assert_eq!(
            report_subject("002511.SZ", at),
            "002511.SZ Stock Analysis Report - 2024-06-12"
        );
    }
}
