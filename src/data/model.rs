use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Result value that marks a passed exam.
pub const RESULT_PASSED: &str = "đạt";

/// Substituted for a missing result.
pub const RESULT_UNKNOWN: &str = "không rõ";

/// Scores offered by the dashboard's score filter.
pub const SCORE_DOMAIN: [u8; 3] = [3, 4, 5];

/// Source column names of the backing file.
pub mod columns {
    pub const CANDIDATE_ID: &str = "mã_sinh_viên";
    pub const CURRENT_POSITION: &str = "vị_trí_công_tác_hiện_tại";
    pub const TEST_POSITION: &str = "vị_trí_sát_hạch";
    pub const BIRTHPLACE: &str = "nơi_sinh";
    pub const TEST_PERIOD: &str = "thời_điểm_thi";
    pub const TEST_GROUP: &str = "nhóm_thi_sát_hạch";
    pub const RESULT: &str = "kết_quả";
    pub const SCORE: &str = "mức_đạt";
    /// Derived from the test period, never read from the source.
    pub const YEAR: &str = "năm";

    /// Columns every backing file must carry.
    pub const REQUIRED: [&str; 8] = [
        CANDIDATE_ID,
        CURRENT_POSITION,
        TEST_POSITION,
        BIRTHPLACE,
        TEST_PERIOD,
        TEST_GROUP,
        RESULT,
        SCORE,
    ];
}

// ---------------------------------------------------------------------------
// CellValue – a single cell of the source table
// ---------------------------------------------------------------------------

/// A dynamically-typed source cell, before it is mapped onto a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            CellValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            CellValue::Float(_) | CellValue::Null => serializer.serialize_none(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl CellValue {
    /// Interpret the cell numerically. Text is parsed; anything that is not a
    /// finite number yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            CellValue::Float(v) => *v,
            CellValue::Integer(i) => *i as f64,
            CellValue::String(s) => s.trim().parse::<f64>().ok()?,
            CellValue::Bool(_) | CellValue::Null => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Text form of the cell; `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Record – one exam attempt
// ---------------------------------------------------------------------------

/// One candidate's exam attempt, normalized at load time.
///
/// Serializes with the source column names so the raw-data dump looks like
/// the backing file plus the derived year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "mã_sinh_viên")]
    pub candidate_id: String,
    #[serde(rename = "vị_trí_công_tác_hiện_tại")]
    pub current_position: String,
    #[serde(rename = "vị_trí_sát_hạch")]
    pub test_position: String,
    #[serde(rename = "nơi_sinh")]
    pub birthplace: String,
    #[serde(rename = "thời_điểm_thi")]
    pub test_period: String,
    /// Upper-cased. Empty when the source cell was missing.
    #[serde(rename = "nhóm_thi_sát_hạch")]
    pub test_group: String,
    /// Never empty: missing results become [`RESULT_UNKNOWN`].
    #[serde(rename = "kết_quả")]
    pub result: String,
    /// `None` when the source value failed numeric coercion.
    #[serde(rename = "mức_đạt")]
    pub score: Option<f64>,
    /// Source columns the dashboard does not interpret, kept for the raw dump.
    #[serde(flatten)]
    pub extra: BTreeMap<String, CellValue>,
    #[serde(rename = "năm")]
    pub year: i32,
}

impl Record {
    pub fn is_passed(&self) -> bool {
        self.result == RESULT_PASSED
    }
}

// ---------------------------------------------------------------------------
// ExamTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full loaded dataset.
#[derive(Debug, Clone, Default)]
pub struct ExamTable {
    pub records: Vec<Record>,
    /// Source column names in file order.
    pub column_names: Vec<String>,
}

/// Distinct values for each filterable field, used to populate the
/// dashboard's filter controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    pub positions: Vec<String>,
    pub test_positions: Vec<String>,
    pub employee_ids: Vec<String>,
    pub birthplaces: Vec<String>,
    pub results: Vec<String>,
    pub scores: Vec<u8>,
}

impl ExamTable {
    pub fn new(records: Vec<Record>, column_names: Vec<String>) -> Self {
        ExamTable {
            records,
            column_names,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted unique values per filterable field. Empty strings (missing
    /// source cells) are left out.
    pub fn filter_options(&self) -> FilterOptions {
        fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
            values
                .filter(|v| !v.is_empty())
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        }

        let years: BTreeSet<i32> = self.records.iter().map(|r| r.year).collect();
        let mut employee_ids = distinct(self.records.iter().map(|r| &r.candidate_id));
        employee_ids.sort_by(|a, b| compare_ids(a, b));

        FilterOptions {
            years: years.into_iter().collect(),
            positions: distinct(self.records.iter().map(|r| &r.current_position)),
            test_positions: distinct(self.records.iter().map(|r| &r.test_position)),
            employee_ids,
            birthplaces: distinct(self.records.iter().map(|r| &r.birthplace)),
            results: distinct(self.records.iter().map(|r| &r.result)),
            scores: SCORE_DOMAIN.to_vec(),
        }
    }

    /// Serializable view of the records keyed in file column order, with
    /// the derived year last.
    pub fn in_source_order(&self) -> SourceOrderedRows<'_> {
        SourceOrderedRows(self)
    }
}

/// Records serialized as objects whose keys follow
/// [`ExamTable::column_names`].
#[derive(Debug, Clone, Copy)]
pub struct SourceOrderedRows<'a>(pub &'a ExamTable);

impl Serialize for SourceOrderedRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let columns = &self.0.column_names;
        serializer.collect_seq(
            self.0
                .records
                .iter()
                .map(|record| SourceOrderedRecord { record, columns }),
        )
    }
}

struct SourceOrderedRecord<'a> {
    record: &'a Record,
    columns: &'a [String],
}

impl Serialize for SourceOrderedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let r = self.record;
        if self.columns.is_empty() {
            return r.serialize(serializer);
        }

        let mut map = serializer.serialize_map(Some(self.columns.len() + 1))?;
        let mut wrote_year = false;
        for col in self.columns {
            match col.as_str() {
                columns::CANDIDATE_ID => map.serialize_entry(col, &r.candidate_id)?,
                columns::CURRENT_POSITION => map.serialize_entry(col, &r.current_position)?,
                columns::TEST_POSITION => map.serialize_entry(col, &r.test_position)?,
                columns::BIRTHPLACE => map.serialize_entry(col, &r.birthplace)?,
                columns::TEST_PERIOD => map.serialize_entry(col, &r.test_period)?,
                columns::TEST_GROUP => map.serialize_entry(col, &r.test_group)?,
                columns::RESULT => map.serialize_entry(col, &r.result)?,
                columns::SCORE => map.serialize_entry(col, &r.score)?,
                columns::YEAR => {
                    map.serialize_entry(col, &r.year)?;
                    wrote_year = true;
                }
                other => map.serialize_entry(col, &r.extra.get(other))?,
            }
        }
        if !wrote_year {
            map.serialize_entry(columns::YEAR, &r.year)?;
        }
        map.end()
    }
}

/// Integer ids order numerically and come before non-numeric ids, which
/// order lexically.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
