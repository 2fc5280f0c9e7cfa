//! Decides where everything goes on the report sheet before any cell is
//! written, so placement and visibility can be checked without opening a
//! workbook.

use std::collections::BTreeSet;

use super::processing::{figures_for, PivotSummary, WeekSeries, WeeklyFigures};
use crate::{config::ReportSettings, week::WeekLabel};

pub type RowNum = u32;
pub type ColNum = u16;

/// Column holding the row labels ("Ads revenue", campaign names, ...).
pub const LABEL_COL: ColNum = 2;
pub const FIRST_WEEK_COL: ColNum = 3;
pub const FIRST_BLOCK_ROW: RowNum = 8;
/// Name row, three data rows, and a spacer.
pub const BLOCK_HEIGHT: RowNum = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekColumn {
    pub label: WeekLabel,
    pub column: ColNum,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Group,
    Campaign,
}

/// Five rows describing either an ads group rollup or one campaign in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub group: String,
    pub name: String,
    pub first_row: RowNum,
    pub hidden: bool,
    /// One entry per week column.
    pub figures: Vec<WeeklyFigures>,
}

impl Block {
    pub fn rows(&self) -> std::ops::Range<RowNum> {
        self.first_row..self.first_row + BLOCK_HEIGHT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub weeks: Vec<WeekColumn>,
    pub note_column: ColNum,
    pub blocks: Vec<Block>,
    /// Totals over every group, one entry per week column.
    pub weekly_totals: Vec<WeeklyFigures>,
}

impl ReportLayout {
    pub fn visible_weeks(&self) -> impl Iterator<Item = &WeekLabel> {
        self.weeks.iter().filter(|week| !week.hidden).map(|week| &week.label)
    }

    pub fn hidden_rows(&self) -> BTreeSet<RowNum> {
        self.blocks.iter().filter(|block| block.hidden).flat_map(Block::rows).collect()
    }

    pub fn block(&self, kind: BlockKind, group: &str, name: &str) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|block| block.kind == kind && block.group == group && block.name == name)
    }
}

pub fn plan(summary: &PivotSummary, settings: &ReportSettings) -> ReportLayout {
    let hidden_count = summary.weeks.len().saturating_sub(settings.visible_weeks);
    let weeks: Vec<WeekColumn> = summary
        .weeks
        .iter()
        .enumerate()
        .map(|(i, label)| WeekColumn {
            label: label.clone(),
            column: week_column(i),
            hidden: i < hidden_count,
        })
        .collect();
    let note_column = week_column(weeks.len());

    let per_week = |series: &WeekSeries| -> Vec<WeeklyFigures> {
        summary.weeks.iter().map(|week| figures_for(series, week)).collect()
    };

    let mut blocks = Vec::new();
    let mut row = FIRST_BLOCK_ROW;
    for group in ordered_groups(summary, &settings.group_order) {
        let Some(totals) = summary.group_totals.get(group) else {
            continue;
        };
        blocks.push(Block {
            kind: BlockKind::Group,
            group: group.to_owned(),
            name: group.to_owned(),
            first_row: row,
            hidden: false,
            figures: per_week(totals),
        });
        row += BLOCK_HEIGHT;

        for (campaign, series) in ordered_campaigns(summary, group) {
            blocks.push(Block {
                kind: BlockKind::Campaign,
                group: group.to_owned(),
                name: campaign.to_owned(),
                first_row: row,
                hidden: !summary.active.is_active(group, campaign),
                figures: per_week(series),
            });
            row += BLOCK_HEIGHT;
        }
    }

    ReportLayout { weeks, note_column, blocks, weekly_totals: summary.weekly_totals() }
}

/// Column of the `index`th week. Out-of-range indexes saturate so the
/// workbook writer rejects them instead of wrapping onto another column.
fn week_column(index: usize) -> ColNum {
    ColNum::try_from(index).ok().and_then(|i| FIRST_WEEK_COL.checked_add(i)).unwrap_or(ColNum::MAX)
}

/// The configured groups that have data, followed by any other group in the
/// data in name order.
fn ordered_groups<'a>(summary: &'a PivotSummary, order: &'a [String]) -> Vec<&'a str> {
    let mut groups: Vec<&str> = order
        .iter()
        .map(String::as_str)
        .filter(|group| summary.group_totals.contains_key(*group))
        .collect();
    for group in summary.groups() {
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    groups
}

/// Active campaigns first, then by the week each campaign started, then by
/// name.
fn ordered_campaigns<'a>(
    summary: &'a PivotSummary,
    group: &'a str,
) -> Vec<(&'a str, &'a WeekSeries)> {
    let mut campaigns: Vec<_> = summary.campaigns_in(group).collect();
    campaigns.sort_by(|(a, _), (b, _)| {
        let key = |campaign: &str| {
            (!summary.active.is_active(group, campaign), summary.start_weeks.get(campaign))
        };
        key(*a).cmp(&key(*b)).then_with(|| a.cmp(b))
    });
    campaigns
}
