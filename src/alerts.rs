use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, instrument};

use crate::config::MailConfig;
use crate::mail::MailTransport;

const CELL_STYLE: &str = "padding: 8px;line-height: 20px;vertical-align: top;border-top: 1px solid #ddd;";

/// Render the down servers as an HTML table, one row per identity in order.
pub fn render_failure_table(failed: &[String]) -> String {
    let mut table = String::from("<table><thead><tr><th>IP</th><th>DOWN</th></tr></thead><tbody>");

    for server_id in failed {
        // writing into a String cannot fail
        let _ = write!(
            table,
            "<tr><td style=\"{CELL_STYLE}\">{server_id}</td><td style=\"color: red;{CELL_STYLE}\">yes</td></tr>"
        );
    }

    table.push_str("</tbody></table>");
    table
}

/// Turns the failure list into one alert mail
#[derive(Clone)]
pub struct AlertDispatcher {
    mail: MailConfig,
    transport: Arc<dyn MailTransport>,
}

impl AlertDispatcher {
    pub fn new(mail: MailConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self { mail, transport }
    }

    /// Send a single alert listing `failed`. Transport errors are returned
    /// as is; there is no retry.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, failed: &[String]) -> Result<()> {
        let content = render_failure_table(failed);

        self.transport
            .send(
                &self.mail.from_addr,
                &self.mail.to_addr,
                &self.mail.smtp_server,
                &content,
            )
            .await?;

        info!("sent alert for {} server(s)", failed.len());
        Ok(())
    }
}
