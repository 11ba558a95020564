use std::fmt;

use crate::records::SuiteSnapshotFact;

/// Occupancy of one lease snapshot against the property's leasable area.
#[derive(Debug, Clone, PartialEq)]
pub struct RentRollSummary {
    pub suites: usize,
    pub vacant: usize,
    pub own_use: usize,
    /// Area of suites that are not vacant.
    pub leased_sqft: f64,
    pub leased_sqft_excl_own_use: f64,
    pub total_sqft: f64,
    pub occupancy_pct: f64,
    pub occupancy_pct_excl_own_use: f64,
    /// Sum of monthly rent over non-vacant suites.
    pub monthly_rent_roll: f64,
}

impl RentRollSummary {
    pub fn from_snapshot(suites: &[SuiteSnapshotFact], total_sqft: f64) -> Self {
        let occupied = || suites.iter().filter(|s| !s.is_vacant);
        let leased_sqft: f64 = occupied().filter_map(|s| s.sqft).sum();
        let leased_sqft_excl_own_use: f64 = occupied()
            .filter(|s| !s.is_own_use)
            .filter_map(|s| s.sqft)
            .sum();
        let pct = |area: f64| if total_sqft > 0.0 { area / total_sqft * 100.0 } else { 0.0 };

        Self {
            suites: suites.len(),
            vacant: suites.iter().filter(|s| s.is_vacant).count(),
            own_use: suites.iter().filter(|s| s.is_own_use).count(),
            leased_sqft,
            leased_sqft_excl_own_use,
            total_sqft,
            occupancy_pct: pct(leased_sqft),
            occupancy_pct_excl_own_use: pct(leased_sqft_excl_own_use),
            monthly_rent_roll: occupied().filter_map(|s| s.rent_monthly).sum(),
        }
    }
}

impl fmt::Display for RentRollSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} suites ({} vacant, {} own-use), {:.0}/{:.0} sqft leased, occupancy {:.1}% ({:.1}% excl. own-use), rent roll ${:.2}/month",
            self.suites,
            self.vacant,
            self.own_use,
            self.leased_sqft,
            self.total_sqft,
            self.occupancy_pct,
            self.occupancy_pct_excl_own_use,
            self.monthly_rent_roll
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::AuditColumns;

    fn suite(id: &str, sqft: f64, rent: f64, vacant: bool, own_use: bool) -> SuiteSnapshotFact {
        SuiteSnapshotFact {
            suite_id: id.to_string(),
            building: None,
            tenant: String::new(),
            sqft: Some(sqft),
            rent_monthly: Some(rent),
            rent_annual: Some(rent * 12.0),
            rent_psf_yr: None,
            is_vacant: vacant,
            is_own_use: own_use,
            audit: AuditColumns {
                as_of_month: "2025-02".to_string(),
                file_sha256: "sha256:ab".to_string(),
                ingested_at: "t".to_string(),
            },
        }
    }

    #[test]
    fn test_occupancy_against_total_area() {
        let suites = vec![
            suite("101A", 1000.0, 2000.0, false, false),
            suite("101B", 500.0, 0.0, false, true),
            suite("205", 400.0, 900.0, true, false),
        ];
        let summary = RentRollSummary::from_snapshot(&suites, 10_000.0);
        assert_eq!(summary.suites, 3);
        assert_eq!(summary.vacant, 1);
        assert_eq!(summary.own_use, 1);
        assert_eq!(summary.leased_sqft, 1500.0);
        assert_eq!(summary.leased_sqft_excl_own_use, 1000.0);
        assert!((summary.occupancy_pct - 15.0).abs() < 1e-9);
        assert!((summary.occupancy_pct_excl_own_use - 10.0).abs() < 1e-9);
        assert_eq!(summary.monthly_rent_roll, 2000.0);
        assert!(summary.to_string().contains("occupancy 15.0%"));
    }

    #[test]
    fn test_empty_snapshot() {
        let summary = RentRollSummary::from_snapshot(&[], 9917.0);
        assert_eq!(summary.occupancy_pct, 0.0);
        assert_eq!(summary.suites, 0);
    }
}
