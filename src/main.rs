use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use weekly_ads_report::{
    apis::{
        analytics::{CsvRowSource, PostgresRowSource, RowSource},
        slack::SlackClient,
    },
    config::{self, AppConfig, ReportSettings, RunEnvironment, SlackConfig},
    job,
    notify::{ReportOutcome, SlackNotifier},
    utils,
};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Which channel to report to.
    #[arg(long, value_enum, default_value = "prod")]
    env: RunEnvironment,

    /// Connection URL of the analytics database.
    #[arg(long, env, required_unless_present = "from_csv", hide_env_values = true)]
    database_url: Option<String>,

    /// The table holding the weekly ads rows.
    #[arg(long, env = "REPORT_TABLE", default_value = config::DEFAULT_TABLE)]
    table: String,

    /// Read the rows from a CSV export instead of the database.
    #[arg(long, value_name = "PATH")]
    from_csv: Option<PathBuf>,

    /// The Slack bot token used to post the report.
    #[arg(long, env, hide_env_values = true)]
    slack_token: String,

    /// The Slack channel reported to with `--env prod`.
    #[arg(long, env)]
    slack_channel: String,

    /// The Slack channel reported to with `--env dev`.
    #[arg(long, env)]
    slack_channel_test: String,

    /// Base URL of the Slack Web API.
    #[arg(long, env, default_value = config::SLACK_API_BASE)]
    slack_api_base: String,

    /// Comma-separated ads groups to list first, in order.
    #[arg(long, env = "REPORT_GROUP_ORDER")]
    group_order: Option<String>,

    /// How many of the most recent week columns stay visible.
    #[arg(long, default_value_t = config::DEFAULT_VISIBLE_WEEKS)]
    visible_weeks: usize,

    /// Also save the generated workbook to this path.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl CliArgs {
    fn app_config(&self) -> AppConfig {
        let mut report = ReportSettings { visible_weeks: self.visible_weeks, ..Default::default() };
        if let Some(group_order) = &self.group_order {
            report.group_order = config::parse_group_order(group_order);
        }
        AppConfig {
            environment: self.env,
            slack: SlackConfig {
                token: self.slack_token.clone(),
                channel: self.slack_channel.clone(),
                test_channel: self.slack_channel_test.clone(),
                api_base: self.slack_api_base.clone(),
            },
            report,
        }
    }

    fn row_source(&self) -> anyhow::Result<Box<dyn RowSource>> {
        if let Some(path) = &self.from_csv {
            info!("reading report rows from {}", path.display());
            return Ok(Box::new(CsvRowSource::new(path)));
        }
        let database_url = self
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no database URL was given"))?;
        Ok(Box::new(PostgresRowSource::new(database_url, &self.table)?))
    }
}

#[tokio::main]
async fn main() {
    // set up tracing
    tracing_subscriber::fmt::init();

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            warn!("failed to load .env file: {}", err);
        }
    }

    let args = CliArgs::parse();
    if let Err(err) = run(args).await {
        error!("error during execution: {:?}", err);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = args.app_config();
    info!("running weekly ads report with {:?}", config);

    let source = args.row_source()?;
    let channel = config.slack.channel_for(config.environment);
    let client = SlackClient::new(config.slack.token.clone(), config.slack.api_base.clone());
    let notifier = SlackNotifier::new(client, channel);

    let outcome =
        job::run_report_and_notify(source.as_ref(), &notifier, utils::kst_now(), &config.report)
            .await?;

    if let (Some(path), ReportOutcome::Generated(report)) = (&args.output, &outcome) {
        tokio::fs::write(path, &report.bytes).await?;
        info!("saved '{}' to {}", report.file_name, path.display());
    }
    Ok(())
}
