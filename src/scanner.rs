//! # Scan Orchestrator
//!
//! Opens the archive, loads the manifest and lookup tables, scans the selected sheets
//! (in parallel when more than one worker is configured), waits for all of them and
//! finally runs the relationship checks. Only a container that cannot be opened fails
//! the scan; every other problem ends up as a finding.
use crate::cancel::CancellationToken;
use crate::config::ScanConfig;
use crate::config::SheetFilter;
use crate::correlator::correlate;
use crate::correlator::KeyCollector;
use crate::correlator::SheetKeys;
use crate::error::ResultMessage;
use crate::error::ScanError;
use crate::helpers::reader::ArchiveSource;
use crate::report::ScanReport;
use crate::report::SheetReport;
use crate::report::SheetStatus;
use crate::rules::finding::Finding;
use crate::rules::outlier::OutlierFences;
use crate::rules::AnomalyDetector;
use crate::schema::SheetSchema;
use crate::schema::TypeInference;
use crate::spreadsheet::archive::Archive;
use crate::spreadsheet::parser::EntryParser;
use crate::spreadsheet::row::Row;
use crate::spreadsheet::workbook::SharedTables;
use crate::spreadsheet::workbook::Workbook;
use crate::spreadsheet::workbook::WorkbookSheet;
use crate::spreadsheet::MalformedSheetError;
use crate::spreadsheet::RowError;
use log::debug;
use log::info;
use log::warn;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::Path;
use std::sync::Arc;

/// Everything one sheet contributes to the report
struct SheetOutcome {
    report: SheetReport,
    findings: Vec<Finding>,
    keys: SheetKeys,
}

/// Accumulators of one sheet during its first pass
struct SheetState<'c> {
    inference: TypeInference,
    detector: AnomalyDetector<'c>,
    keys: KeyCollector,
    pass: FirstPass,
}

impl<'c> SheetState<'c> {
    fn new(sheet: &str, config: &'c ScanConfig) -> Self {
        SheetState {
            inference: TypeInference::new(sheet, config),
            detector: AnomalyDetector::new(sheet, config),
            keys: KeyCollector::new(sheet, config),
            pass: FirstPass {
                status: SheetStatus::Complete,
                rows_scanned: 0,
                truncated: false,
                last_row: None,
            },
        }
    }

    /// Feeds parsed rows through inference, detection and key buffering until the
    /// stream ends or the row limit is reached. Returns false once cancelled.
    fn consume(
        &mut self,
        rows: impl Iterator<Item = Result<Row, RowError>>,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> bool {
        for result in rows {
            if cancel.is_cancelled() {
                return false;
            }
            match result {
                Ok(row) if self.inference.header_pending() => self.inference.observe_header(&row),
                Ok(row) => {
                    if config
                        .max_rows_per_sheet
                        .is_some_and(|limit| self.pass.rows_scanned >= limit as u64)
                    {
                        self.pass.truncated = true;
                        break;
                    }
                    self.inference.prepare(&row);
                    self.detector.inspect(&row, self.inference.schema());
                    self.inference.observe(&row);
                    if !self.keys.is_empty() {
                        self.keys.collect(&row, self.inference.schema());
                    }
                    self.pass.rows_scanned += 1;
                    self.pass.last_row = Some(row.index);
                }
                Err(RowError::Row(error)) => {
                    debug!("{}", error);
                    self.detector.malformed_row(&error);
                }
                Err(RowError::Sheet(error)) => {
                    warn!("{}", error);
                    self.detector.malformed_sheet(&error);
                    self.pass.status = SheetStatus::Partial;
                }
            }
        }
        true
    }
}

/// Progress of the first pass over a sheet
struct FirstPass {
    status: SheetStatus,
    rows_scanned: u64,
    truncated: bool,
    /// Index of the last data row scanned; the outlier pass stops after it
    last_row: Option<usize>,
}

pub struct Scanner {
    config: ScanConfig,
    sheet_filter: SheetFilter,
}

impl Scanner {
    /// Creates a scanner after validating the configuration
    pub fn new(config: ScanConfig) -> Result<Scanner, ScanError> {
        config.validate()?;
        let sheet_filter = config.sheet_filter()?;
        Ok(Scanner { config, sheet_filter })
    }

    /// Scans a workbook file without cancellation
    pub fn scan_path(&self, path: impl AsRef<Path>) -> Result<ScanReport, ScanError> {
        self.scan(&ArchiveSource::from(path.as_ref()), &CancellationToken::new())
    }

    /// Scans an in-memory workbook without cancellation
    pub fn scan_bytes(&self, bytes: Vec<u8>) -> Result<ScanReport, ScanError> {
        self.scan(&ArchiveSource::from(bytes), &CancellationToken::new())
    }

    /// Scans a workbook.
    ///
    /// # Errors
    /// Only when the container cannot be opened or its manifest, relationships or
    /// sheet parts are unreadable or missing. Problems inside sheets are findings.
    pub fn scan(&self, source: &ArchiveSource, cancel: &CancellationToken) -> Result<ScanReport, ScanError> {
        let mut archive = Archive::open(source)?;
        let name = archive.name().to_owned();
        let workbook = Workbook::load(&mut archive).with_prefix(&name)?;
        let tables = Arc::new(SharedTables::load(&mut archive, workbook.date1904).with_prefix(&name)?);

        let sheets: Vec<&WorkbookSheet> = workbook
            .sheets
            .iter()
            .filter(|sheet| self.sheet_filter.accept(&sheet.name))
            .collect();
        let workers = self.config.worker_count.min(sheets.len()).max(1);
        info!(
            "Scanning {} of {} sheet(s) in '{}' with {} worker(s)",
            sheets.len(),
            workbook.sheets.len(),
            name,
            workers
        );

        let outcomes = if workers == 1 {
            self.scan_sequential(&mut archive, &sheets, &tables, cancel)
        } else {
            drop(archive);
            self.scan_parallel(source, &sheets, &tables, cancel, workers)
        };

        let mut report = ScanReport {
            workbook: name,
            cancelled: false,
            sheets: Vec::new(),
            skipped_sheets: workbook.skipped.clone(),
            findings: Vec::new(),
        };
        self.assemble(&mut report, outcomes, cancel);
        Ok(report)
    }

    /// The barrier: collects finished sheets in workbook order, then runs the
    /// relationship checks unless the scan was cancelled
    fn assemble(&self, report: &mut ScanReport, outcomes: Vec<Option<SheetOutcome>>, cancel: &CancellationToken) {
        let cancelled = cancel.is_cancelled() || outcomes.iter().any(Option::is_none);
        report.cancelled = cancelled;
        let mut keys = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            report.sheets.push(outcome.report);
            report.findings.extend(outcome.findings);
            keys.push(outcome.keys);
        }

        if cancelled {
            info!("Scan of '{}' cancelled after {} sheet(s)", report.workbook, report.sheets.len());
        } else {
            report
                .findings
                .extend(correlate(&self.config.relationship_checks, &keys));
            info!(
                "Scan of '{}' finished: {} sheet(s), {} finding(s)",
                report.workbook,
                report.sheets.len(),
                report.findings.len()
            );
        }
    }

    /// Scans the sheets one after another over a single archive handle
    fn scan_sequential(
        &self,
        archive: &mut Archive,
        sheets: &[&WorkbookSheet],
        tables: &SharedTables,
        cancel: &CancellationToken,
    ) -> Vec<Option<SheetOutcome>> {
        sheets
            .iter()
            .map(|sheet| self.scan_sheet(archive, sheet, tables, cancel))
            .collect()
    }

    /// Scans the sheets on a crate-local pool. Each worker opens its own archive handle.
    fn scan_parallel(
        &self,
        source: &ArchiveSource,
        sheets: &[&WorkbookSheet],
        tables: &Arc<SharedTables>,
        cancel: &CancellationToken,
        workers: usize,
    ) -> Vec<Option<SheetOutcome>> {
        let pool = match ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(error) => {
                warn!("Cannot start {} scan worker(s), scanning sequentially: {}", workers, error);
                return match Archive::open(source) {
                    Ok(mut archive) => self.scan_sequential(&mut archive, sheets, tables, cancel),
                    Err(error) => sheets.iter().map(|sheet| Some(self.unreadable_sheet(sheet, &error))).collect(),
                };
            }
        };
        pool.install(|| {
            sheets
                .par_iter()
                .map_init(
                    || Archive::open(source),
                    |archive, sheet| match archive {
                        Ok(archive) => self.scan_sheet(archive, sheet, tables, cancel),
                        Err(error) => Some(self.unreadable_sheet(sheet, error)),
                    },
                )
                .collect()
        })
    }

    /// Runs one sheet through inference, detection and key buffering.
    /// Returns `None` if the scan was cancelled before the sheet finished.
    fn scan_sheet(
        &self,
        archive: &mut Archive,
        sheet: &WorkbookSheet,
        tables: &SharedTables,
        cancel: &CancellationToken,
    ) -> Option<SheetOutcome> {
        if cancel.is_cancelled() {
            return None;
        }
        debug!("Scanning sheet '{}' from {}", sheet.name, sheet.entry);
        let mut state = SheetState::new(&sheet.name, &self.config);
        match EntryParser::open(archive, sheet, tables, &self.config.null_literals) {
            Ok(parser) => {
                if !state.consume(parser, &self.config, cancel) {
                    debug!("Sheet '{}' dropped by cancellation", sheet.name);
                    return None;
                }
            }
            Err(error) => {
                warn!("{}", error);
                state.detector.malformed_sheet(&error);
                state.pass.status = SheetStatus::Partial;
            }
        }

        let SheetState {
            inference,
            mut detector,
            keys,
            pass,
        } = state;
        let schema = inference.finish();
        let outliers = self.outlier_pass(archive, sheet, tables, &schema, pass.last_row, cancel)?;
        detector.extend(outliers);

        let findings = detector.finish(&schema);
        debug!(
            "Sheet '{}': {} row(s), {} column(s), {} finding(s)",
            sheet.name,
            pass.rows_scanned,
            schema.columns.len(),
            findings.len()
        );
        Some(SheetOutcome {
            keys: keys.finish(&schema, pass.status == SheetStatus::Partial),
            report: SheetReport {
                name: sheet.name.to_owned(),
                status: pass.status,
                rows_scanned: pass.rows_scanned,
                truncated: pass.truncated,
                schema,
            },
            findings,
        })
    }

    /// Re-reads the sheet to compare numeric cells against the finalized quartiles.
    /// Errors were reported by the first pass and are skipped here.
    fn outlier_pass(
        &self,
        archive: &mut Archive,
        sheet: &WorkbookSheet,
        tables: &SharedTables,
        schema: &SheetSchema,
        last_row: Option<usize>,
        cancel: &CancellationToken,
    ) -> Option<Vec<Finding>> {
        let mut findings = Vec::new();
        let fences = OutlierFences::new(&sheet.name, schema, &self.config);
        let Some(last_row) = last_row.filter(|_| !fences.is_empty()) else {
            return Some(findings);
        };
        let Ok(parser) = EntryParser::open(archive, sheet, tables, &self.config.null_literals) else {
            return Some(findings);
        };

        let mut header_pending = self.config.has_header;
        for result in parser {
            if cancel.is_cancelled() {
                return None;
            }
            let Ok(row) = result else {
                continue;
            };
            if header_pending {
                header_pending = false;
                continue;
            }
            if row.index > last_row {
                break;
            }
            fences.check(&row, &mut findings);
        }
        Some(findings)
    }

    /// Outcome of a sheet whose worker could not open the archive
    fn unreadable_sheet(&self, sheet: &WorkbookSheet, error: &ScanError) -> SheetOutcome {
        let error = MalformedSheetError {
            sheet: sheet.name.to_owned(),
            reason: error.to_string(),
        };
        warn!("{}", error);
        let mut detector = AnomalyDetector::new(&sheet.name, &self.config);
        detector.malformed_sheet(&error);
        let schema = SheetSchema::default();
        SheetOutcome {
            findings: detector.finish(&schema),
            keys: KeyCollector::new(&sheet.name, &self.config).finish(&schema, true),
            report: SheetReport {
                name: sheet.name.to_owned(),
                status: SheetStatus::Partial,
                rows_scanned: 0,
                truncated: false,
                schema,
            },
        }
    }
}
