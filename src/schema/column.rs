use crate::schema::lattice::ValueType;
use crate::schema::sample::DistinctSample;
use crate::schema::sample::Quartiles;
use crate::schema::sample::Reservoir;
use crate::schema::signature::date_signature;
use crate::spreadsheet::cell::CellValue;
use serde::Serialize;
use std::collections::BTreeSet;

/// Accumulated type and statistics state of one column.
///
/// Every field is bounded: the numeric reservoir and the distinct-value sketch
/// hold at most `sample_capacity` entries however many rows are observed.
#[derive(Clone, Debug, Serialize)]
pub struct ColumnSchema {
    /// Column index (0-based)
    pub index: usize,
    pub name: String,
    /// Join of every non-empty observation
    pub inferred_type: ValueType,
    pub observed_types: BTreeSet<ValueType>,
    /// An empty cell was seen after the first non-empty one
    pub nullable: bool,
    pub non_empty_count: u64,
    pub empty_count: u64,
    /// Error cells and formulas without a cached result
    pub unavailable_count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub cardinality_estimate: u64,
    pub distinct_sample: Vec<String>,
    pub quartiles: Option<Quartiles>,
    pub first_date_format: Option<String>,

    #[serde(skip)]
    baseline: Option<ValueType>,
    #[serde(skip)]
    reservoir: Reservoir,
    #[serde(skip)]
    distinct: DistinctSample,
}

impl ColumnSchema {
    pub(crate) fn new(index: usize, name: String, sample_capacity: usize, seed: u64) -> Self {
        ColumnSchema {
            index,
            name,
            inferred_type: ValueType::Empty,
            observed_types: BTreeSet::new(),
            nullable: false,
            non_empty_count: 0,
            empty_count: 0,
            unavailable_count: 0,
            min: None,
            max: None,
            cardinality_estimate: 0,
            distinct_sample: Vec::new(),
            quartiles: None,
            first_date_format: None,
            baseline: None,
            reservoir: Reservoir::new(sample_capacity, seed),
            distinct: DistinctSample::new(sample_capacity),
        }
    }

    /// Folds one cell value into the column
    pub(crate) fn observe(&mut self, value: &CellValue, widening_window: usize) {
        let Some(observed) = value.observed_type() else {
            self.unavailable_count += 1;
            return;
        };
        if observed == ValueType::Empty {
            self.empty_count += 1;
            if self.non_empty_count > 0 {
                self.nullable = true;
            }
            return;
        }

        self.non_empty_count += 1;
        self.observed_types.insert(observed);
        self.inferred_type = self.inferred_type.join(observed);
        if let Some(number) = value.as_number() {
            self.min = Some(self.min.map_or(number, |min| min.min(number)));
            self.max = Some(self.max.map_or(number, |max| max.max(number)));
            self.reservoir.push(number);
        }
        self.distinct.push(&value.canonical_text());
        if self.first_date_format.is_none() {
            self.first_date_format = date_signature(value).map(|signature| signature.into_owned());
        }
        if self.baseline.is_none() && self.non_empty_count >= widening_window as u64 {
            self.baseline = Some(self.inferred_type);
        }
    }

    /// Computes the summary fields once the last row has been observed
    pub(crate) fn finalize(&mut self) {
        self.quartiles = self.reservoir.quartiles();
        self.cardinality_estimate = self.distinct.estimate();
        self.distinct_sample = self.distinct.values();
    }

    /// The type the first `widening_window` observations settled on
    pub fn baseline(&self) -> Option<ValueType> {
        self.baseline
    }

    /// Numeric values held in the reservoir
    pub fn sample_len(&self) -> usize {
        self.reservoir.len()
    }

    pub fn is_numeric(&self) -> bool {
        self.inferred_type.is_numeric()
    }
}
