use chrono::{DateTime, FixedOffset};
use tracing::{error, info};

use crate::{
    apis::{analytics::RowSource, slack::SlackError},
    config::ReportSettings,
    notify::{Notifier, ReportOutcome},
    tools::weekly_report,
};

/// Generates the weekly report and always tells the channel how it went.
///
/// Any failure while loading or shaping the data becomes a failure
/// notification carrying the full error chain. Only a failure to notify is
/// returned as an error. `now` should be Korea time; its date decides which
/// week the report covers and the same instant is stamped on the message.
pub async fn run_report_and_notify(
    source: &dyn RowSource,
    notifier: &dyn Notifier,
    now: DateTime<FixedOffset>,
    settings: &ReportSettings,
) -> Result<ReportOutcome, SlackError> {
    let today = now.date_naive();
    info!("generating weekly report for {}", today);
    let outcome = match weekly_report::generate_report(source, today, settings).await {
        Ok(report) => {
            info!("report generated successfully");
            ReportOutcome::Generated(report)
        }
        Err(err) => {
            let error_trace = format!("{:?}", anyhow::Error::from(err));
            error!("error while generating the report:\n{}", error_trace);
            ReportOutcome::Failed { error_trace }
        }
    };

    notifier.notify(&outcome, now).await?;
    info!("report notification sent");
    Ok(outcome)
}
