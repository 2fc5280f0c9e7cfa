pub mod layout;
pub mod output;
pub mod processing;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::{
    ad_rows::AdRow,
    apis::analytics::{LoadError, RowSource},
    config::ReportSettings,
    week::WeekLabel,
};

pub use processing::{ActiveCampaignSet, PivotSummary, WeeklyFigures};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("data update delayed: the report covers {expected}, but the latest week in the data is {found}")]
    StaleData { expected: WeekLabel, found: WeekLabel },
    #[error("failed to render the report workbook")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("report generation task did not finish")]
    Join(#[from] tokio::task::JoinError),
}

/// A finished workbook, held in memory until it is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// The latest week in the data, if there was any data.
    pub week: Option<WeekLabel>,
}

pub fn report_file_name(week: Option<&WeekLabel>, today: NaiveDate) -> String {
    let week = week.map(WeekLabel::as_str).unwrap_or("W_NA");
    format!("Nasmedia data request_{}_nap dsp_{}_nasmedia.xlsx", week, today.format("%Y%m%d"))
}

/// Shapes `rows` into the weekly workbook. Fails without producing a file if
/// the data does not reach the week the report covers.
pub fn create_weekly_report(
    rows: &[AdRow],
    today: NaiveDate,
    settings: &ReportSettings,
) -> Result<GeneratedReport, ReportError> {
    if rows.is_empty() {
        warn!("report data is empty");
    }

    info!("processing {} rows", rows.len());
    let summary = processing::summarize(rows);
    processing::check_freshness(&summary, today)?;

    let layout = layout::plan(&summary, settings);
    let bytes = output::render_workbook(&layout)?;

    let week = summary.latest_week().cloned();
    let file_name = report_file_name(week.as_ref(), today);
    info!("generated '{}' in memory", file_name);
    Ok(GeneratedReport { file_name, bytes, week })
}

/// Loads the rows from `source` and builds the workbook on a blocking thread.
pub async fn generate_report(
    source: &dyn RowSource,
    today: NaiveDate,
    settings: &ReportSettings,
) -> Result<GeneratedReport, ReportError> {
    let rows = source.load_rows().await?;
    let settings = settings.clone();
    tokio::task::spawn_blocking(move || create_weekly_report(&rows, today, &settings)).await?
}
