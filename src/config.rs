use std::fmt::Display;

/// Which Slack channel a run reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunEnvironment {
    /// Report to the production channel.
    Prod,
    /// Report to the test channel.
    Dev,
}

impl Display for RunEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunEnvironment::Prod => write!(f, "prod"),
            RunEnvironment::Dev => write!(f, "dev"),
        }
    }
}

pub const DEFAULT_TABLE: &str = "jaeyoung.coupang_play_report";
pub const DEFAULT_GROUP_ORDER: &[&str] = &["LIVE_SPORTS", "LIVE_FAST", "VOD"];
pub const DEFAULT_VISIBLE_WEEKS: usize = 10;
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Everything a single run needs, resolved once from the command line and
/// environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: RunEnvironment,
    pub slack: SlackConfig,
    pub report: ReportSettings,
}

#[derive(Clone)]
pub struct SlackConfig {
    pub token: String,
    pub channel: String,
    pub test_channel: String,
    pub api_base: String,
}

impl SlackConfig {
    pub fn channel_for(&self, environment: RunEnvironment) -> &str {
        match environment {
            RunEnvironment::Prod => &self.channel,
            RunEnvironment::Dev => &self.test_channel,
        }
    }
}

// the token stays out of logs
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("test_channel", &self.test_channel)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Knobs for shaping the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    /// Groups written first, in this order. Groups in the data but not in
    /// this list follow in name order.
    pub group_order: Vec<String>,
    /// How many of the most recent week columns stay visible.
    pub visible_weeks: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            group_order: DEFAULT_GROUP_ORDER.iter().map(|g| g.to_string()).collect(),
            visible_weeks: DEFAULT_VISIBLE_WEEKS,
        }
    }
}

/// Splits a comma-separated list of group names, dropping blanks.
pub fn parse_group_order(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|g| !g.is_empty()).map(str::to_owned).collect()
}
