use std::{
    collections::{BTreeMap, BTreeSet},
    ops::AddAssign,
};

use chrono::NaiveDate;
use tracing::{debug, info};

use super::ReportError;
use crate::{
    ad_rows::AdRow,
    week::{self, WeekLabel},
};

/// Revenue and impressions summed over one week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklyFigures {
    pub revenue: i64,
    pub impressions: i64,
}

impl WeeklyFigures {
    /// Revenue per thousand impressions. Zero when nothing was delivered.
    pub fn cpm(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.revenue as f64 / self.impressions as f64 * 1000.0
        }
    }
}

impl AddAssign for WeeklyFigures {
    fn add_assign(&mut self, rhs: Self) {
        self.revenue += rhs.revenue;
        self.impressions += rhs.impressions;
    }
}

pub type WeekSeries = BTreeMap<WeekLabel, WeeklyFigures>;

/// Looks up a week in a series; weeks without rows count as zero.
pub fn figures_for(series: &WeekSeries, week: &WeekLabel) -> WeeklyFigures {
    series.get(week).copied().unwrap_or_default()
}

/// For each ads group, the campaigns that earned revenue in the group's most
/// recent week.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveCampaignSet {
    by_group: BTreeMap<String, BTreeSet<String>>,
}

impl ActiveCampaignSet {
    pub fn is_active(&self, group: &str, campaign: &str) -> bool {
        self.by_group.get(group).is_some_and(|campaigns| campaigns.contains(campaign))
    }
}

/// The report rows reshaped into per-week matrices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotSummary {
    /// Every week present in the data, ascending.
    pub weeks: Vec<WeekLabel>,
    /// Keyed by (group, campaign).
    pub campaigns: BTreeMap<(String, String), WeekSeries>,
    pub group_totals: BTreeMap<String, WeekSeries>,
    /// The first week each campaign name appears in, across all groups.
    pub start_weeks: BTreeMap<String, WeekLabel>,
    pub active: ActiveCampaignSet,
}

impl PivotSummary {
    pub fn latest_week(&self) -> Option<&WeekLabel> {
        self.weeks.last()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.group_totals.keys().map(String::as_str)
    }

    /// Campaigns of `group` with their series, in name order.
    pub fn campaigns_in<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a WeekSeries)> + 'a {
        self.campaigns
            .iter()
            .filter(move |((g, _), _)| g == group)
            .map(|((_, campaign), series)| (campaign.as_str(), series))
    }

    /// Totals over every group, one entry per week in `self.weeks`.
    pub fn weekly_totals(&self) -> Vec<WeeklyFigures> {
        self.weeks
            .iter()
            .map(|week| {
                let mut total = WeeklyFigures::default();
                for series in self.group_totals.values() {
                    total += figures_for(series, week);
                }
                total
            })
            .collect()
    }
}

/// Pivots raw rows by (group, campaign) and week, and works out which
/// campaigns are still running.
pub fn summarize(rows: &[AdRow]) -> PivotSummary {
    let mut weeks = BTreeSet::new();
    let mut campaigns: BTreeMap<(String, String), WeekSeries> = BTreeMap::new();
    let mut group_totals: BTreeMap<String, WeekSeries> = BTreeMap::new();
    let mut start_weeks: BTreeMap<String, WeekLabel> = BTreeMap::new();
    let mut latest_by_group: BTreeMap<&str, &WeekLabel> = BTreeMap::new();

    for row in rows {
        let figures = WeeklyFigures { revenue: row.ads_revenue(), impressions: row.impressions };
        weeks.insert(row.w.clone());

        *campaigns
            .entry((row.ads_group_nm.clone(), row.camp_nm.clone()))
            .or_default()
            .entry(row.w.clone())
            .or_default() += figures;
        *group_totals
            .entry(row.ads_group_nm.clone())
            .or_default()
            .entry(row.w.clone())
            .or_default() += figures;

        start_weeks
            .entry(row.camp_nm.clone())
            .and_modify(|start| {
                if row.w < *start {
                    *start = row.w.clone();
                }
            })
            .or_insert_with(|| row.w.clone());

        latest_by_group
            .entry(&row.ads_group_nm)
            .and_modify(|latest| {
                if row.w > **latest {
                    *latest = &row.w;
                }
            })
            .or_insert(&row.w);
    }

    // a campaign is active when any of its rows in the group's latest week
    // carries revenue
    let mut active = ActiveCampaignSet::default();
    for (group, latest) in &latest_by_group {
        let active_in_group = rows
            .iter()
            .filter(|row| row.ads_group_nm == *group && row.w == **latest && row.ads_revenue() > 0)
            .map(|row| row.camp_nm.clone())
            .collect();
        active.by_group.insert(group.to_string(), active_in_group);
    }

    let summary = PivotSummary {
        weeks: weeks.into_iter().collect(),
        campaigns,
        group_totals,
        start_weeks,
        active,
    };
    debug!(
        "pivoted {} rows into {} campaigns across {} groups and {} weeks",
        rows.len(),
        summary.campaigns.len(),
        summary.group_totals.len(),
        summary.weeks.len()
    );
    summary
}

/// Fails when the newest week in the data is not the week the report is
/// expected to cover. Empty data has nothing to check.
pub fn check_freshness(summary: &PivotSummary, today: NaiveDate) -> Result<(), ReportError> {
    let Some(latest) = summary.latest_week() else {
        return Ok(());
    };
    if latest.is_week_of(week::reporting_day(today)) {
        info!("data is up to date through {}", latest);
        Ok(())
    } else {
        Err(ReportError::StaleData {
            expected: week::expected_report_week(today),
            found: latest.clone(),
        })
    }
}
