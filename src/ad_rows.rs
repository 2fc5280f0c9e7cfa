use serde::Deserialize;

use crate::week::WeekLabel;

/// One observation from the analytics table: a campaign's delivery within an
/// ads group for a single week.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdRow {
    pub ads_group_nm: String,
    pub camp_nm: String,
    pub w: WeekLabel,
    pub cpm: f64,
    pub impressions: i64,
}

impl AdRow {
    pub fn new(
        ads_group_nm: impl Into<String>,
        camp_nm: impl Into<String>,
        w: impl Into<WeekLabel>,
        cpm: f64,
        impressions: i64,
    ) -> Self {
        Self {
            ads_group_nm: ads_group_nm.into(),
            camp_nm: camp_nm.into(),
            w: w.into(),
            cpm,
            impressions,
        }
    }

    /// Revenue implied by the row's CPM, truncated down to a whole unit.
    pub fn ads_revenue(&self) -> i64 {
        (self.cpm * self.impressions as f64 / 1000.0).floor() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_is_floored_cpm_times_impressions() {
        let cases = [
            (1500.0, 3, 4),
            (2000.0, 1_000_000, 2_000_000),
            (999.0, 1, 0),
            (0.0, 50_000, 0),
            (1234.5, 2_000, 2_469),
            (3000.0, 0, 0),
        ];
        for (cpm, impressions, expected) in cases {
            let row = AdRow::new("VOD", "camp", "W32", cpm, impressions);
            assert_eq!(row.ads_revenue(), expected, "cpm {cpm} x {impressions}");
        }
    }
}
