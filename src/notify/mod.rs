use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;
use crate::routes::report::Report;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// 邮件通知出口。所有通知为即发即忘：失败只记日志，不重试、不上抛
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    admin: Mailbox,
}

impl Mailer {
    /// SMTP 凭据或管理员邮箱缺失时通知整体停用，启动时告警一次
    pub fn from_config(config: &Config) -> Option<Self> {
        let (Some(email), Some(password)) = (&config.smtp_email, &config.smtp_password) else {
            tracing::warn!("SMTP credentials not configured; email notifications disabled");
            return None;
        };
        let Some(admin_email) = &config.admin_email else {
            tracing::warn!("ADMIN_EMAIL not configured; email notifications disabled");
            return None;
        };

        let from: Mailbox = match email.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::warn!("SMTP_EMAIL is not a valid address ({e}); notifications disabled");
                return None;
            }
        };
        let admin: Mailbox = match admin_email.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::warn!("ADMIN_EMAIL is not a valid address ({e}); notifications disabled");
                return None;
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host) {
            Ok(builder) => builder
                .credentials(Credentials::new(email.clone(), password.clone()))
                .build(),
            Err(e) => {
                tracing::warn!("SMTP relay setup failed ({e}); notifications disabled");
                return None;
            }
        };

        Some(Self {
            transport,
            from,
            admin,
        })
    }

    /// 新报案提醒管理员；创建请求不等待发送结果
    pub fn notify_report_created(&self, report: Report, reporter: String) {
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_report_created(&report, &reporter).await {
                tracing::error!(
                    "failed to send notification for report {}: {}",
                    report.id,
                    e
                );
            }
        });
    }

    /// 生产模式下重置令牌的带外投递通道
    pub fn notify_password_reset(&self, to_email: String, username: String, token: String) {
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_password_reset(&to_email, &username, &token).await {
                tracing::error!("failed to send reset email to {}: {}", username, e);
            }
        });
    }

    async fn send_report_created(&self, report: &Report, reporter: &str) -> Result<(), SendError> {
        let text = format!(
            "New crime report submitted\n\n\
             Crime Type: {}\n\
             Title: {}\n\
             Location: {}\n\
             Description: {}\n\n\
             Reporter: {} (id {})\n\
             Report ID: {}\n\
             Status: {}\n\
             Submitted at: {}\n",
            report.category,
            report.title,
            report.location,
            report.description,
            reporter,
            report.reporter_id,
            report.id,
            report.status,
            report.created_at,
        );
        let html = format!(
            "<h2>New crime report submitted</h2>\
             <p><strong>Crime Type:</strong> {}</p>\
             <p><strong>Title:</strong> {}</p>\
             <p><strong>Location:</strong> {}</p>\
             <p><strong>Description:</strong> {}</p>\
             <p><strong>Reporter:</strong> {} (id {})</p>\
             <p><strong>Report ID:</strong> {}</p>\
             <p><strong>Status:</strong> {}</p>\
             <p><strong>Submitted at:</strong> {}</p>",
            escape_html(&report.category),
            escape_html(&report.title),
            escape_html(&report.location),
            escape_html(&report.description),
            escape_html(reporter),
            report.reporter_id,
            report.id,
            report.status,
            report.created_at,
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(self.admin.clone())
            .subject(format!(
                "Crime report alert - {} at {}",
                report.category, report.location
            ))
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        self.transport.send(message).await?;
        tracing::info!("admin notification sent for report {}", report.id);
        Ok(())
    }

    async fn send_password_reset(
        &self,
        to_email: &str,
        username: &str,
        token: &str,
    ) -> Result<(), SendError> {
        let to: Mailbox = to_email.parse()?;
        let text = format!(
            "Hello {username},\n\n\
             A password reset was requested for your account. Use the token below\n\
             to choose a new password. The token expires after a short while and\n\
             can be used only once.\n\n\
             {token}\n\n\
             If you did not request this, you can ignore this message.\n",
        );
        let html = format!(
            "<p>Hello {},</p>\
             <p>A password reset was requested for your account. Use the token below \
             to choose a new password. The token expires after a short while and \
             can be used only once.</p>\
             <p><code>{}</code></p>\
             <p>If you did not request this, you can ignore this message.</p>",
            escape_html(username),
            token,
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Password reset request")
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        self.transport.send(message).await?;
        tracing::info!("password reset email sent for {}", username);
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping_covers_the_special_characters() {
        assert_eq!(
            escape_html(r#"<b>"x" & 'y'</b>"#),
            "&lt;b&gt;&quot;x&quot; &amp; &#039;y&#039;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }
}
