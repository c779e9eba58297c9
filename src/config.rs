//! Scan configuration, normally deserialized from a YAML or JSON file
use crate::error::ScanError;
use anyhow::Context;
use glob::Pattern;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

/// How two rows are compared by the duplicate row rule
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMatch {
    /// Every cell must hold the same value
    #[default]
    Exact,
    /// Strings are compared trimmed and lower-cased
    Normalized,
}

/// Every value of `sheet_a.key_a` must appear in `sheet_b.key_b`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipCheck {
    pub sheet_a: String,
    pub key_a: String,
    pub sheet_b: String,
    pub key_b: String,
}

impl RelationshipCheck {
    pub fn new(sheet_a: &str, key_a: &str, sheet_b: &str, key_b: &str) -> Self {
        RelationshipCheck {
            sheet_a: sheet_a.to_owned(),
            key_a: key_a.to_owned(),
            sheet_b: sheet_b.to_owned(),
            key_b: key_b.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// `k` in the outlier fences `[Q1 - k·IQR, Q3 + k·IQR]`
    pub max_outlier_iqr_multiplier: f64,
    /// Sheet name → names of columns that must not hold empty cells
    pub required_columns: BTreeMap<String, BTreeSet<String>>,
    /// Cross-sheet key checks, evaluated in order once every sheet is scanned
    pub relationship_checks: Vec<RelationshipCheck>,
    /// Sheets scanned in parallel
    pub worker_count: usize,
    /// Capacity of each column's numeric reservoir and distinct-value sketch
    pub sample_capacity: usize,
    /// Non-empty observations after which a column's type is taken as its baseline
    pub widening_window: usize,
    /// Numeric samples a column needs before outliers are reported
    pub outlier_min_samples: usize,
    pub duplicate_match: DuplicateMatch,
    /// Treat the first row of each sheet as column names
    pub has_header: bool,
    /// String values read as empty cells, such as `NULL` or `n/a`
    pub null_literals: Vec<String>,
    /// Glob patterns selecting the sheets to scan; empty selects all
    pub sheet_patterns: Vec<String>,
    /// Stop each sheet after this many data rows
    pub max_rows_per_sheet: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            max_outlier_iqr_multiplier: 1.5,
            required_columns: BTreeMap::new(),
            relationship_checks: Vec::new(),
            worker_count: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            sample_capacity: 256,
            widening_window: 10,
            outlier_min_samples: 8,
            duplicate_match: DuplicateMatch::Exact,
            has_header: true,
            null_literals: Vec::new(),
            sheet_patterns: Vec::new(),
            max_rows_per_sheet: None,
        }
    }
}

impl ScanConfig {
    /// Loads a configuration file; `.json` files are read as JSON, anything else as YAML
    pub fn load(path: &Path) -> anyhow::Result<ScanConfig> {
        let content = fs::read_to_string(path).with_context(|| format!("Opening scan configuration {path:?}"))?;
        let is_json = path
            .extension()
            .map(|extension| extension.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config: ScanConfig = if is_json {
            serde_json::from_str(&content).context("Parsing scan configuration JSON")?
        } else {
            serde_yaml::from_str(&content).context("Parsing scan configuration YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no scan can run with
    pub fn validate(&self) -> Result<(), ScanError> {
        let multiplier = self.max_outlier_iqr_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ScanError::InvalidConfig(format!(
                "max_outlier_iqr_multiplier must be a positive number, got {multiplier}"
            )));
        }
        if self.worker_count == 0 {
            return Err(ScanError::InvalidConfig("worker_count must be at least 1".to_string()));
        }
        if self.sample_capacity < 4 {
            return Err(ScanError::InvalidConfig(format!(
                "sample_capacity must be at least 4, got {}",
                self.sample_capacity
            )));
        }
        if self.widening_window == 0 {
            return Err(ScanError::InvalidConfig("widening_window must be at least 1".to_string()));
        }
        for check in &self.relationship_checks {
            if [&check.sheet_a, &check.key_a, &check.sheet_b, &check.key_b]
                .iter()
                .any(|name| name.is_empty())
            {
                return Err(ScanError::InvalidConfig(format!("incomplete relationship check {check:?}")));
            }
        }
        self.sheet_filter()?;
        Ok(())
    }

    /// Compiles `sheet_patterns`
    pub(crate) fn sheet_filter(&self) -> Result<SheetFilter, ScanError> {
        SheetFilter::new(&self.sheet_patterns)
    }

    /// Required column names configured for a sheet
    pub fn required_for(&self, sheet: &str) -> Option<&BTreeSet<String>> {
        self.required_columns.get(sheet)
    }

    /// Columns of a sheet that take part in relationship checks
    pub(crate) fn key_columns(&self, sheet: &str) -> BTreeSet<&str> {
        let mut keys = BTreeSet::new();
        for check in &self.relationship_checks {
            if check.sheet_a == sheet {
                keys.insert(check.key_a.as_str());
            }
            if check.sheet_b == sheet {
                keys.insert(check.key_b.as_str());
            }
        }
        keys
    }
}

/// Compiled sheet selection
#[derive(Clone, Debug, Default)]
pub(crate) struct SheetFilter {
    patterns: Vec<Pattern>,
}

impl SheetFilter {
    pub(crate) fn new(patterns: &[String]) -> Result<SheetFilter, ScanError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern)
                    .map_err(|error| ScanError::InvalidConfig(format!("invalid sheet pattern '{pattern}': {error}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SheetFilter { patterns })
    }

    pub(crate) fn accept(&self, sheet: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|pattern| pattern.matches(sheet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_outlier_iqr_multiplier, 1.5);
        assert_eq!(config.sample_capacity, 256);
        assert!(config.worker_count >= 1);
        assert!(config.sheet_filter().expect("filter").accept("anything"));
    }

    #[test]
    fn rejects_unusable_settings() {
        let invalid = [
            ScanConfig {
                max_outlier_iqr_multiplier: f64::NAN,
                ..ScanConfig::default()
            },
            ScanConfig {
                max_outlier_iqr_multiplier: 0.0,
                ..ScanConfig::default()
            },
            ScanConfig {
                worker_count: 0,
                ..ScanConfig::default()
            },
            ScanConfig {
                sample_capacity: 3,
                ..ScanConfig::default()
            },
            ScanConfig {
                widening_window: 0,
                ..ScanConfig::default()
            },
            ScanConfig {
                sheet_patterns: vec!["[".to_string()],
                ..ScanConfig::default()
            },
        ];
        for config in invalid {
            assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))), "{config:?}");
        }
    }

    #[test]
    fn loads_yaml_with_defaults_for_missing_keys() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(
            file,
            "max_outlier_iqr_multiplier: 3.0\n\
             required_columns:\n  Orders: [id, customer]\n\
             relationship_checks:\n  - {{sheet_a: Orders, key_a: customer, sheet_b: Customers, key_b: id}}\n\
             duplicate_match: normalized\n\
             sheet_patterns: ['Ord*', 'Cust*']"
        )
        .expect("write config");

        let config = ScanConfig::load(file.path()).expect("load config");
        assert_eq!(config.max_outlier_iqr_multiplier, 3.0);
        assert_eq!(config.duplicate_match, DuplicateMatch::Normalized);
        assert_eq!(config.sample_capacity, 256);
        assert!(config.required_for("Orders").is_some_and(|columns| columns.contains("customer")));
        assert_eq!(
            config.relationship_checks,
            vec![RelationshipCheck::new("Orders", "customer", "Customers", "id")]
        );
        assert_eq!(config.key_columns("Customers").into_iter().collect::<Vec<_>>(), vec!["id"]);

        let filter = config.sheet_filter().expect("filter");
        assert!(filter.accept("Orders"));
        assert!(!filter.accept("Notes"));
    }

    #[test]
    fn loads_json_and_reports_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(file, r#"{{"worker_count": 0}}"#).expect("write config");
        let error = ScanConfig::load(file.path()).expect_err("zero workers");
        assert!(error.to_string().contains("worker_count"));

        assert!(ScanConfig::load(Path::new("missing/scan.yaml")).is_err());
    }
}
