//! Runtime configuration: paths from the environment plus the matching rules
//! and sheet layouts, which are data rather than code.
//!
//! Row and column numbers in the layout descriptors are 1-based, exactly as
//! they appear in Excel (row 29, column I = 9).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::records::ExpenseCategory;

const DEFAULT_TOTAL_SQFT: f64 = 9917.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// `EXCEL_PATH`. When unset the workbook is looked up under `data_dir`,
    /// see [`Config::workbook_path`].
    pub excel_path: Option<PathBuf>,
    /// Total leasable area of the property, the occupancy denominator.
    pub total_sqft: f64,
    pub rules: IngestRules,
}

impl Config {
    /// Reads `DATA_DIR`, `EXCEL_PATH`, `TOTAL_SQFT` and `INGEST_RULES`.
    /// Call `dotenvy::dotenv()` first if a `.env` file should apply.
    pub fn from_env() -> Result<Self> {
        let data_dir =
            PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
        let excel_path = std::env::var("EXCEL_PATH").ok().map(PathBuf::from);
        let total_sqft = match std::env::var("TOTAL_SQFT") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| *v > 0.0)
                .ok_or_else(|| IngestError::Config(format!("TOTAL_SQFT must be positive, got '{raw}'")))?,
            Err(_) => DEFAULT_TOTAL_SQFT,
        };
        let rules = match std::env::var("INGEST_RULES") {
            Ok(path) => IngestRules::load(Path::new(&path))?,
            Err(_) => IngestRules::default(),
        };

        Ok(Self {
            data_dir,
            excel_path,
            total_sqft,
            rules,
        })
    }

    /// Config rooted at `data_dir` with default rules; handy for tests and tools.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            data_dir,
            excel_path: None,
            total_sqft: DEFAULT_TOTAL_SQFT,
            rules: IngestRules::default(),
        }
    }

    /// `EXCEL_PATH` if set, else `<data_dir>/raw/TCO Excel.xlsx`.
    pub fn workbook_path(&self) -> PathBuf {
        self.excel_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("raw").join("TCO Excel.xlsx"))
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.bronze_dir().join("_errors")
    }

    pub fn ingestion_log_path(&self) -> PathBuf {
        self.data_dir.join("ingestion_log.csv")
    }
}

/// Everything an operator may need to retune when the workbook drifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestRules {
    pub sheets: SheetPatterns,
    /// Lowercased header label -> canonical column name.
    pub column_aliases: BTreeMap<String, String>,
    pub vacancy_phrases: Vec<String>,
    pub own_use_phrases: Vec<String>,
    pub period: PeriodRules,
    pub dashboard: DashboardLayout,
    pub expenses: ExpenseLayout,
    pub lease: LeaseLayout,
}

impl Default for IngestRules {
    fn default() -> Self {
        Self {
            sheets: SheetPatterns::default(),
            column_aliases: default_aliases(),
            vacancy_phrases: strings(&["vacante", "vacant", "disponible", "available"]),
            // "101b" is the owner's own suite, which never shows a tenant label.
            own_use_phrases: strings(&["black label", "owner use", "uso propio", "101b"]),
            period: PeriodRules::default(),
            dashboard: DashboardLayout::default(),
            expenses: ExpenseLayout::default(),
            lease: LeaseLayout::default(),
        }
    }
}

impl IngestRules {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(IngestError::io(path))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetPatterns {
    pub dashboard: Vec<String>,
    pub lease_rate: Vec<String>,
    pub expenses: Vec<String>,
}

impl Default for SheetPatterns {
    fn default() -> Self {
        Self {
            dashboard: strings(&["dashboard", "2025", "2026"]),
            lease_rate: strings(&["lease", "rate"]),
            // Expense lines live on the dashboard sheet.
            expenses: strings(&["dashboard", "2025", "2026"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodRules {
    /// Header row of the dashboard table that may carry a `month` column.
    pub month_header_row: u32,
    pub month_column_label: String,
    pub marker: String,
    pub scan_rows: u32,
}

impl Default for PeriodRules {
    fn default() -> Self {
        Self {
            month_header_row: 29,
            month_column_label: "month".to_string(),
            marker: "period".to_string(),
            scan_rows: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardLayout {
    pub header_row: u32,
    pub first_month_col: u32,
    pub max_months: u32,
    /// Header labels that sit in the month row but are not months.
    pub skip_labels: Vec<String>,
    pub rows: DashboardRows,
}

impl Default for DashboardLayout {
    fn default() -> Self {
        Self {
            header_row: 29,
            first_month_col: 9,
            max_months: 12,
            skip_labels: strings(&["collection target", "target"]),
            rows: DashboardRows::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardRows {
    pub rent_base: u32,
    pub collected: u32,
    pub uncollected: u32,
    pub leased_sqft: u32,
    pub price_per_sf_yr: u32,
}

impl Default for DashboardRows {
    fn default() -> Self {
        Self {
            rent_base: 30,
            collected: 32,
            uncollected: 33,
            leased_sqft: 35,
            price_per_sf_yr: 36,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseLayout {
    pub header_row: u32,
    pub first_month_col: u32,
    pub max_months: u32,
    pub label_col: u32,
    pub lines: Vec<ExpenseLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseLine {
    pub row: u32,
    pub label: String,
    pub category: ExpenseCategory,
}

impl Default for ExpenseLayout {
    fn default() -> Self {
        use ExpenseCategory::{Fixed, Other, Variable};

        let lines = [
            (42, "Electricity", Fixed),
            (43, "Internet", Fixed),
            (44, "Yardi Breeze", Fixed),
            (45, "Water", Fixed),
            (46, "Pest Control", Fixed),
            (47, "Supplies", Fixed),
            (48, "Nexus trash disposal", Fixed),
            (49, "Insurance", Fixed),
            (50, "Property management", Fixed),
            (53, "Repairs", Variable),
            (54, "Real Estate Agent", Variable),
            (55, "A/C Maintenance", Variable),
            (56, "Bank Fees", Variable),
            (57, "Light fixtures maintenance", Variable),
            (60, "Accrued Property tax", Other),
            (61, "Other", Other),
            (66, "Management - RP", Other),
            (67, "Other expenses", Other),
            (68, "CAPEX", Other),
        ]
        .into_iter()
        .map(|(row, label, category)| ExpenseLine {
            row,
            label: label.to_string(),
            category,
        })
        .collect();

        Self {
            header_row: 40,
            first_month_col: 9,
            max_months: 12,
            label_col: 5,
            lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseLayout {
    pub header_row: u32,
    pub placeholder_prefix: String,
    pub unknown_tenant: String,
}

impl Default for LeaseLayout {
    fn default() -> Self {
        Self {
            header_row: 4,
            placeholder_prefix: "SUITE_".to_string(),
            unknown_tenant: "Unknown".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        // dashboard
        ("mes", "month"),
        ("month", "month"),
        ("renta base", "rent_base"),
        ("rent base", "rent_base"),
        ("base rent", "rent_base"),
        ("cobrado", "collected"),
        ("collected", "collected"),
        ("no cobrado", "uncollected"),
        ("uncollected", "uncollected"),
        ("m2 rentados", "leased_sqft"),
        ("leased sqft", "leased_sqft"),
        ("sqft arrendado", "leased_sqft"),
        ("precio m2/año", "price_per_sf_yr"),
        ("price per sf/yr", "price_per_sf_yr"),
        // expenses
        ("concepto", "item"),
        ("item", "item"),
        ("proveedor", "vendor"),
        ("vendor", "vendor"),
        ("real", "actual"),
        ("actual", "actual"),
        ("presupuesto", "budget"),
        ("budget", "budget"),
        ("varianza", "variance"),
        ("variance", "variance"),
        // lease / rate
        ("suite", "suite_id"),
        ("suite_id", "suite_id"),
        ("edificio", "building"),
        ("building", "building"),
        ("inquilino", "tenant"),
        ("tenant", "tenant"),
        ("m2", "sqft"),
        ("sqft", "sqft"),
        ("sq ft", "sqft"),
        ("renta mensual", "rent_monthly"),
        ("rent monthly", "rent_monthly"),
        ("monthly rent", "rent_monthly"),
        ("monthly rent ($)", "rent_monthly"),
        ("renta anual", "rent_annual"),
        ("rent annual", "rent_annual"),
        ("annual rent", "rent_annual"),
        ("annual rent ($)", "rent_annual"),
        ("renta $/m2/año", "rent_psf_yr"),
        ("rent psf yr", "rent_psf_yr"),
        ("$/sf/yr", "rent_psf_yr"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_rules_match_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/rules.json");
        let rules = IngestRules::load(&path).unwrap();
        assert_eq!(rules, IngestRules::default());
    }

    #[test]
    fn test_partial_rules_keep_defaults() {
        let rules: IngestRules = serde_json::from_str(
            r#"{
                "sheets": { "lease_rate": ["rent roll"] },
                "dashboard": { "rows": { "collected": 31 } },
                "expenses": { "lines": [ { "row": 42, "label": "Power", "category": "fixed" } ] }
            }"#,
        )
        .unwrap();
        assert_eq!(rules.sheets.lease_rate, vec!["rent roll".to_string()]);
        assert_eq!(rules.sheets.dashboard, SheetPatterns::default().dashboard);
        assert_eq!(rules.dashboard.rows.collected, 31);
        assert_eq!(rules.dashboard.rows.rent_base, 30);
        assert_eq!(rules.dashboard.header_row, 29);
        assert_eq!(rules.expenses.lines.len(), 1);
        assert_eq!(rules.expenses.header_row, 40);
        assert_eq!(rules.column_aliases.get("inquilino").map(String::as_str), Some("tenant"));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = serde_json::from_str::<IngestRules>(
            r#"{ "expenses": { "lines": [ { "row": 42, "label": "Power", "category": "capex" } ] } }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_default_layout_coordinates() {
        let rules = IngestRules::default();
        assert_eq!(rules.expenses.lines.len(), 19);
        let rows: Vec<u32> = rules
            .expenses
            .lines
            .iter()
            .filter(|l| l.category == ExpenseCategory::Other)
            .map(|l| l.row)
            .collect();
        assert_eq!(rows, vec![60, 61, 66, 67, 68]);
        assert_eq!(rules.lease.header_row, 4);
    }

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = Config::with_data_dir("/srv/co");
        assert_eq!(config.bronze_dir(), PathBuf::from("/srv/co/bronze"));
        assert_eq!(config.quarantine_dir(), PathBuf::from("/srv/co/bronze/_errors"));
        assert_eq!(config.ingestion_log_path(), PathBuf::from("/srv/co/ingestion_log.csv"));
        assert_eq!(config.total_sqft, 9917.0);
    }

    #[test]
    fn test_workbook_path_follows_data_dir_unless_set() {
        let mut config = Config::with_data_dir("/srv/co");
        assert_eq!(config.workbook_path(), PathBuf::from("/srv/co/raw/TCO Excel.xlsx"));

        config.data_dir = PathBuf::from("/mnt/other");
        assert_eq!(config.workbook_path(), PathBuf::from("/mnt/other/raw/TCO Excel.xlsx"));

        config.excel_path = Some(PathBuf::from("/uploads/tco.xlsx"));
        config.data_dir = PathBuf::from("/srv/co");
        assert_eq!(config.workbook_path(), PathBuf::from("/uploads/tco.xlsx"));
    }
}
