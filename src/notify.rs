use async_trait::async_trait;
use chrono::{DateTime, Datelike as _, FixedOffset};
use tracing::info;

use crate::{
    apis::slack::{FileUpload, SlackClient, SlackError},
    tools::weekly_report::GeneratedReport,
    week,
};

const ERROR_FILE_NAME: &str = "error.txt";

/// How a run ended, as far as the channel is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Generated(GeneratedReport),
    Failed {
        /// The error and its chain of causes.
        error_trace: String,
    },
}

impl ReportOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ReportOutcome::Failed { .. })
    }
}

/// Delivers the outcome of a run somewhere people will see it. `now` is the
/// time the run started, in Korea time.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        outcome: &ReportOutcome,
        now: DateTime<FixedOffset>,
    ) -> Result<(), SlackError>;
}

/// The text and optional attachment sent for an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub caption: String,
    pub attachment: Option<FileUpload>,
}

/// Builds the message for `outcome` as of `now`, which should be Korea time.
pub fn compose_notification(outcome: &ReportOutcome, now: DateTime<FixedOffset>) -> Notification {
    let report_week = week::reporting_day(now.date_naive()).iso_week().week();
    let week_line = format!("• Week: {report_week}주차");
    let timestamp_line = format!("• Timestamp: {}", now.format("%Y-%m-%d %H:%M:%S KST"));

    match outcome {
        ReportOutcome::Failed { error_trace } => Notification {
            caption: format!(
                "🚨 *Coupang Play Weekly Report Failed*\n{week_line}\n{timestamp_line}\n• Status: Failed  ❌"
            ),
            attachment: Some(FileUpload {
                filename: ERROR_FILE_NAME.to_string(),
                content: error_trace.clone().into_bytes(),
            }),
        },
        ReportOutcome::Generated(report) if !report.bytes.is_empty() => Notification {
            caption: format!(
                "📊 *Coupang Play Weekly Report Generated Successfully*\n{week_line}\n{timestamp_line}\n• Status: Completed ✅"
            ),
            attachment: Some(FileUpload {
                filename: report.file_name.clone(),
                content: report.bytes.clone(),
            }),
        },
        ReportOutcome::Generated(_) => Notification {
            caption: format!(
                "⚠️ *Coupang Play Weekly Report Anomaly*\n{week_line}\n{timestamp_line}\n• Status: ⚠️ Warning (Report generated but no file content)"
            ),
            attachment: None,
        },
    }
}

/// Posts outcomes to a single Slack channel.
pub struct SlackNotifier {
    client: SlackClient,
    channel: String,
}

impl SlackNotifier {
    pub fn new(client: SlackClient, channel: impl Into<String>) -> Self {
        Self { client, channel: channel.into() }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(
        &self,
        outcome: &ReportOutcome,
        now: DateTime<FixedOffset>,
    ) -> Result<(), SlackError> {
        let Notification { caption, attachment } = compose_notification(outcome, now);
        info!("sending report notification to Slack channel {}", self.channel);
        match attachment {
            Some(file) => self.client.upload_files(&self.channel, &[file], &caption).await,
            None => self.client.post_message(&self.channel, &caption).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::kst;

    fn now() -> DateTime<FixedOffset> {
        kst().with_ymd_and_hms(2025, 8, 11, 9, 30, 0).unwrap()
    }

    fn report(bytes: &[u8]) -> GeneratedReport {
        GeneratedReport {
            file_name: "Nasmedia data request_W32_nap dsp_20250811_nasmedia.xlsx".to_string(),
            bytes: bytes.to_vec(),
            week: Some("W32".into()),
        }
    }

    #[test]
    fn success_attaches_the_workbook() {
        let notification =
            compose_notification(&ReportOutcome::Generated(report(b"PK..")), now());
        assert_eq!(
            notification.caption,
            "📊 *Coupang Play Weekly Report Generated Successfully*\n\
             • Week: 32주차\n\
             • Timestamp: 2025-08-11 09:30:00 KST\n\
             • Status: Completed ✅"
        );
        let file = notification.attachment.unwrap();
        assert_eq!(file.filename, "Nasmedia data request_W32_nap dsp_20250811_nasmedia.xlsx");
        assert_eq!(file.content, b"PK..");
    }

    #[test]
    fn failure_attaches_the_error_trace() {
        let outcome = ReportOutcome::Failed { error_trace: "boom\n\nCaused by:\n    io".into() };
        let notification = compose_notification(&outcome, now());
        assert!(notification.caption.starts_with("🚨 *Coupang Play Weekly Report Failed*"));
        assert!(notification.caption.ends_with("• Status: Failed  ❌"));
        let file = notification.attachment.unwrap();
        assert_eq!(file.filename, "error.txt");
        assert_eq!(file.content, b"boom\n\nCaused by:\n    io");
    }

    #[test]
    fn empty_workbook_is_reported_as_an_anomaly() {
        let notification = compose_notification(&ReportOutcome::Generated(report(b"")), now());
        assert!(notification.caption.starts_with("⚠️ *Coupang Play Weekly Report Anomaly*"));
        assert_eq!(notification.attachment, None);
    }
}
