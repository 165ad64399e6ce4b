use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use once_cell::sync::Lazy;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::model::{columns, CellValue, ExamTable, Record, RESULT_UNKNOWN};

/// `"đợt 3/2024"` → `2024`
static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})").expect("year pattern is valid"));

/// One source row keyed by column name.
type RawRow = BTreeMap<String, CellValue>;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the exam table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with the source column names (the usual case)
/// * `.json`    – `[{ "mã_sinh_viên": ..., ... }, ...]`, e.g. a raw-data dump
/// * `.parquet` – one column per source column
///
/// Every call reads the file again; nothing is cached.
pub fn load_file(path: &Path) -> Result<ExamTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!("Loaded {} exam records from {}", table.len(), path.display());
    Ok(table)
}

// ---------------------------------------------------------------------------
// Row normalization
// ---------------------------------------------------------------------------

/// Map raw rows onto [`Record`]s, applying the load-time derivations.
///
/// Fails on the first row whose test period carries no year.
fn build_table(label: &str, column_names: Vec<String>, rows: Vec<RawRow>) -> Result<ExamTable> {
    for required in columns::REQUIRED {
        if !column_names.iter().any(|c| c == required) {
            bail!("{label} data missing '{required}' column");
        }
    }

    let mut coerced = 0usize;
    let mut records = Vec::with_capacity(rows.len());

    for (row_no, mut row) in rows.into_iter().enumerate() {
        let mut take = |col: &str| row.remove(col).unwrap_or(CellValue::Null);

        let period = take(columns::TEST_PERIOD).as_text().unwrap_or_default();
        let year = extract_year(&period).with_context(|| {
            format!(
                "{label} row {}: cannot extract year from period '{period}'",
                row_no + 1
            )
        })?;

        let score_cell = take(columns::SCORE);
        let score = score_cell.as_f64();
        if score.is_none() && !score_cell.is_null() {
            coerced += 1;
        }

        let result = take(columns::RESULT)
            .as_text()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| RESULT_UNKNOWN.to_string());

        let text = |cell: CellValue| cell.as_text().unwrap_or_default();
        let candidate_id = text(take(columns::CANDIDATE_ID));
        let current_position = text(take(columns::CURRENT_POSITION));
        let test_position = text(take(columns::TEST_POSITION));
        let birthplace = text(take(columns::BIRTHPLACE));
        let test_group = text(take(columns::TEST_GROUP)).to_uppercase();

        // A stale derived year (e.g. reloading a raw dump) is recomputed.
        row.remove(columns::YEAR);

        records.push(Record {
            candidate_id,
            current_position,
            test_position,
            birthplace,
            test_period: period,
            test_group,
            result,
            score,
            extra: row,
            year,
        });
    }

    if coerced > 0 {
        log::warn!("{label} data: {coerced} non-numeric score(s) treated as missing");
    }

    Ok(ExamTable::new(records, column_names))
}

/// First `/dddd` in the period string, as a year.
pub fn extract_year(period: &str) -> Option<i32> {
    YEAR_PATTERN
        .captures(period)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with the source column names, one exam per row.
/// Empty cells are read as missing values.
fn load_csv(path: &Path) -> Result<ExamTable> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    read_csv(reader)
}

fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<ExamTable> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {}", row_no + 1))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), guess_cell_type(value)))
            .collect();
        rows.push(row);
    }

    build_table("CSV", headers, rows)
}

fn guess_cell_type(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    match s {
        "True" | "true" => CellValue::Bool(true),
        "False" | "false" => CellValue::Bool(false),
        _ => CellValue::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the same shape the raw-data service emits:
///
/// ```json
/// [
///   { "mã_sinh_viên": 1001, "thời_điểm_thi": "đợt 1/2024", "mức_đạt": 4, ... },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<ExamTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

fn parse_json(text: &str) -> Result<ExamTable> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut column_names: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {} is not a JSON object", i + 1))?;

        let mut row = RawRow::new();
        for (key, val) in obj {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
            row.insert(key.clone(), json_to_cell(val));
        }
        rows.push(row);
    }

    // An empty dump carries no keys; its shape is the source schema.
    if rows.is_empty() {
        column_names = columns::REQUIRED.iter().map(|c| c.to_string()).collect();
    }

    build_table("JSON", column_names, rows)
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) if s.is_empty() => CellValue::Null,
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one column per source column.
///
/// String, boolean, integer and float columns of any width are read
/// directly or widened. Dictionary-encoded columns (pandas `category`), view
/// strings, decimals and dates are cast, which covers files written by
/// **Pandas** (`df.to_parquet()`) and **Polars** (`df.write_parquet()`).
/// A column type that cannot be cast fails the load.
fn load_parquet(path: &Path) -> Result<ExamTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let column_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let columns: Vec<(&String, ArrayRef)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, col)| Ok((field.name(), readable_column(field.name(), col)?)))
            .collect::<Result<_>>()?;

        for row in 0..batch.num_rows() {
            let raw: RawRow = columns
                .iter()
                .map(|(name, col)| Ok(((*name).clone(), extract_cell_value(col, row)?)))
                .collect::<Result<_>>()?;
            rows.push(raw);
        }
    }

    build_table("Parquet", column_names, rows)
}

/// Cast a column to one of the types [`extract_cell_value`] reads.
fn readable_column(name: &str, col: &ArrayRef) -> Result<ArrayRef> {
    let target = match col.data_type() {
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Boolean
        | DataType::Int32
        | DataType::Int64
        | DataType::Float32
        | DataType::Float64 => return Ok(col.clone()),
        DataType::Int8 | DataType::Int16 | DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => {
            DataType::Int64
        }
        DataType::UInt64
        | DataType::Float16
        | DataType::Decimal128(..)
        | DataType::Decimal256(..) => DataType::Float64,
        _ => DataType::Utf8,
    };
    if !can_cast_types(col.data_type(), &target) {
        bail!("Parquet column '{name}' has unsupported type {:?}", col.data_type());
    }
    cast(col, &target)
        .with_context(|| format!("casting Parquet column '{name}' from {:?}", col.data_type()))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell_value(col: &ArrayRef, row: usize) -> Result<CellValue> {
    if col.is_null(row) {
        return Ok(CellValue::Null);
    }
    let cell = match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        other => bail!("unreadable Arrow type {other:?}"),
    };
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{DictionaryArray, Float64Array, Int16Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    const HEADER: &str =
        "mã_sinh_viên,vị_trí_công_tác_hiện_tại,vị_trí_sát_hạch,nơi_sinh,thời_điểm_thi,nhóm_thi_sát_hạch,kết_quả,mức_đạt";

    fn csv_table(body: &str) -> Result<ExamTable> {
        let text = format!("{HEADER}\n{body}");
        read_csv(csv::Reader::from_reader(text.as_bytes()))
    }

    #[test]
    fn year_is_first_slash_followed_by_four_digits() {
        assert_eq!(extract_year("đợt 3/2024"), Some(2024));
        assert_eq!(extract_year("1/2023"), Some(2023));
        assert_eq!(extract_year("12/05/2022"), Some(2022));
        assert_eq!(extract_year("đợt 3/24"), None);
        assert_eq!(extract_year("2024"), None);
    }

    #[test]
    fn loads_and_normalizes_three_row_scenario() {
        let table = csv_table(
            "1,Kỹ sư,Vận hành,Hà Nội,1/2023,a,đạt,3\n\
             2,Kỹ sư,Vận hành,Huế,2/2023,B,đạt,4\n\
             3,Thợ,Sửa chữa,Huế,1/2024,a,,abc\n",
        )
        .unwrap();

        let years: Vec<i32> = table.records.iter().map(|r| r.year).collect();
        let groups: Vec<&str> = table.records.iter().map(|r| r.test_group.as_str()).collect();
        assert_eq!(years, vec![2023, 2023, 2024]);
        assert_eq!(groups, vec!["A", "B", "A"]);
        assert_eq!(table.records[0].score, Some(3.0));
        assert_eq!(table.records[2].score, None);
        assert_eq!(table.records[2].result, RESULT_UNKNOWN);
        assert_eq!(table.records[0].candidate_id, "1");
    }

    #[test]
    fn group_upper_casing_is_unicode_aware() {
        let table = csv_table("1,x,y,z,đợt 1/2024,nhóm đ,đạt,4\n").unwrap();
        assert_eq!(table.records[0].test_group, "NHÓM Đ");
    }

    #[test]
    fn missing_year_fails_whole_load() {
        let err = csv_table(
            "1,x,y,z,1/2023,A,đạt,4\n\
             2,x,y,z,đợt 1,A,đạt,4\n",
        )
        .unwrap_err();
        let msg = format!("{err:#}");
        // Data rows count from 1, header excluded.
        assert!(msg.contains("CSV row 2"), "{msg}");
        assert!(msg.contains("đợt 1"), "{msg}");
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let text = "mã_sinh_viên,thời_điểm_thi\n1,1/2023\n";
        let err = read_csv(csv::Reader::from_reader(text.as_bytes())).unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");
    }

    #[test]
    fn extra_columns_are_preserved() {
        let text = format!("{HEADER},ghi_chú\n1,x,y,z,1/2023,A,đạt,4,lần đầu\n");
        let table = read_csv(csv::Reader::from_reader(text.as_bytes())).unwrap();
        assert_eq!(
            table.records[0].extra.get("ghi_chú"),
            Some(&CellValue::String("lần đầu".into()))
        );
        assert_eq!(table.column_names.len(), 9);
    }

    #[test]
    fn json_records_round_trip_through_raw_dump_shape() {
        let table = csv_table("7,x,y,z,đợt 2/2022,b,,5\n").unwrap();
        let dumped = serde_json::to_string(&table.records).unwrap();
        let reloaded = parse_json(&dumped).unwrap();
        assert_eq!(reloaded.records, table.records);
    }

    fn text(v: Vec<Option<&str>>) -> ArrayRef {
        Arc::new(StringArray::from(v)) as ArrayRef
    }

    /// Write one record batch to a temporary `.parquet` file.
    fn parquet_file(fields: Vec<Field>, arrays: Vec<ArrayRef>) -> tempfile::NamedTempFile {
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let out = std::fs::File::create(file.path()).unwrap();
        let mut writer = ArrowWriter::try_new(out, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        file
    }

    fn utf8(name: &str) -> Field {
        Field::new(name, DataType::Utf8, true)
    }

    #[test]
    fn reads_parquet_columns() {
        let file = parquet_file(
            vec![
                Field::new(columns::CANDIDATE_ID, DataType::Int64, false),
                utf8(columns::CURRENT_POSITION),
                utf8(columns::TEST_POSITION),
                utf8(columns::BIRTHPLACE),
                utf8(columns::TEST_PERIOD),
                utf8(columns::TEST_GROUP),
                utf8(columns::RESULT),
                Field::new(columns::SCORE, DataType::Float64, true),
            ],
            vec![
                Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
                text(vec![Some("Kỹ sư"), Some("Thợ")]),
                text(vec![Some("Vận hành"); 2]),
                text(vec![Some("Huế"); 2]),
                text(vec![Some("đợt 1/2023"), Some("đợt 2/2024")]),
                text(vec![Some("b"), Some("c")]),
                text(vec![Some("đạt"), None]),
                Arc::new(Float64Array::from(vec![Some(4.0), None])) as ArrayRef,
            ],
        );

        let table = load_file(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].candidate_id, "1");
        assert_eq!(table.records[0].score, Some(4.0));
        assert_eq!(table.records[1].year, 2024);
        assert_eq!(table.records[1].test_group, "C");
        assert_eq!(table.records[1].result, RESULT_UNKNOWN);
        assert_eq!(table.records[1].score, None);
    }

    #[test]
    fn reads_narrow_integer_and_dictionary_columns() {
        // pandas writes small ints as int16 and `category` columns as dictionaries.
        let positions: DictionaryArray<Int32Type> =
            vec!["Kỹ sư", "Thợ", "Kỹ sư"].into_iter().collect();
        let dict_type = positions.data_type().clone();
        let file = parquet_file(
            vec![
                Field::new(columns::CANDIDATE_ID, DataType::Int64, false),
                Field::new(columns::CURRENT_POSITION, dict_type, false),
                utf8(columns::TEST_POSITION),
                utf8(columns::BIRTHPLACE),
                utf8(columns::TEST_PERIOD),
                utf8(columns::TEST_GROUP),
                utf8(columns::RESULT),
                Field::new(columns::SCORE, DataType::Int16, true),
            ],
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef,
                Arc::new(positions) as ArrayRef,
                text(vec![Some("Vận hành"); 3]),
                text(vec![Some("Huế"); 3]),
                text(vec![Some("đợt 1/2023"); 3]),
                text(vec![Some("a"); 3]),
                text(vec![Some("đạt"); 3]),
                Arc::new(Int16Array::from(vec![Some(4), Some(3), None])) as ArrayRef,
            ],
        );

        let table = load_file(file.path()).unwrap();
        let scores: Vec<Option<f64>> = table.records.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(4.0), Some(3.0), None]);
        assert_eq!(table.records[0].current_position, "Kỹ sư");
        assert_eq!(table.records[1].current_position, "Thợ");
        assert_eq!(
            table.filter_options().positions,
            vec!["Kỹ sư".to_string(), "Thợ".to_string()]
        );
    }

    #[test]
    fn narrow_columns_are_widened_before_reading() {
        let col = Arc::new(Int16Array::from(vec![5])) as ArrayRef;
        let widened = readable_column("mức_đạt", &col).unwrap();
        assert_eq!(widened.data_type(), &DataType::Int64);
        assert_eq!(extract_cell_value(&widened, 0).unwrap(), CellValue::Integer(5));

        // Arrays that skipped the cast are refused rather than guessed at.
        let err = extract_cell_value(&col, 0).unwrap_err();
        assert!(err.to_string().contains("Int16"), "{err}");
    }

    #[test]
    fn empty_json_dump_loads_as_empty_table() {
        let dumped = serde_json::to_string(&Vec::<Record>::new()).unwrap();
        assert_eq!(dumped, "[]");

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(dumped.as_bytes()).unwrap();
        let table = load_file(file.path()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names.len(), columns::REQUIRED.len());
    }

    #[test]
    fn json_row_errors_count_from_one() {
        let err = parse_json("[7]").unwrap_err();
        assert!(err.to_string().contains("Row 1"), "{err}");
    }

    #[test]
    fn dispatches_on_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "1,x,y,z,1/2023,A,đạt,4").unwrap();
        let table = load_file(file.path()).unwrap();
        assert_eq!(table.len(), 1);

        let err = load_file(Path::new("exams.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
