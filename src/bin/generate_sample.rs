use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use serde_json::{json, Map, Value};

use exam_dashboard::data::model::{columns, RESULT_PASSED};

/// Write a synthetic exam dataset in the backing-file schema.
#[derive(Debug, Parser)]
#[command(name = "generate-sample", version)]
struct Cli {
    /// Output file; the extension picks CSV, JSON or Parquet
    #[arg(long, short, default_value = "cleaned_data_final.csv")]
    output: PathBuf,

    /// Number of exam records
    #[arg(long, default_value_t = 500)]
    rows: usize,

    /// RNG seed, so reruns produce identical files
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// One generated row; `score` and `result` are kept as text so blanks and
/// junk values survive into every output format.
struct SampleRow {
    candidate_id: i64,
    current_position: &'static str,
    test_position: &'static str,
    birthplace: &'static str,
    test_period: String,
    test_group: &'static str,
    result: &'static str,
    score: String,
}

const POSITIONS: [&str; 4] = ["Kỹ sư", "Công nhân vận hành", "Kỹ thuật viên", "Tổ trưởng"];
const TEST_POSITIONS: [&str; 3] = ["Vận hành", "Sửa chữa", "An toàn"];
const BIRTHPLACES: [&str; 5] = ["Hà Nội", "Hải Phòng", "Huế", "Đà Nẵng", "Quảng Ninh"];
// Mixed case on purpose: the loader upper-cases groups.
const GROUPS: [&str; 5] = ["a", "A", "b", "C", "d"];
const YEARS: [u32; 4] = [2021, 2022, 2023, 2024];

fn generate(rows: usize, rng: &mut SimpleRng) -> Vec<SampleRow> {
    (0..rows)
        .map(|i| {
            let year = YEARS[(rng.next_u64() % YEARS.len() as u64) as usize];
            let round = 1 + rng.next_u64() % 3;
            // Scores lean on the group so the group chart has a visible spread.
            let group = rng.pick(&GROUPS);
            let bias = if group.eq_ignore_ascii_case("a") { 0.6 } else { 0.3 };
            let score_value = 3 + u32::from(rng.chance(bias)) + u32::from(rng.chance(bias / 2.0));

            let score = if rng.chance(0.05) {
                "N/A".to_string()
            } else {
                score_value.to_string()
            };
            let result = if rng.chance(0.05) {
                ""
            } else if score_value >= 4 {
                RESULT_PASSED
            } else {
                "không đạt"
            };

            SampleRow {
                candidate_id: 10_000 + i as i64 / 2,
                current_position: rng.pick(&POSITIONS),
                test_position: rng.pick(&TEST_POSITIONS),
                birthplace: rng.pick(&BIRTHPLACES),
                test_period: format!("đợt {round}/{year}"),
                test_group: group,
                result,
                score,
            }
        })
        .collect()
}

fn write_csv(path: &Path, rows: &[SampleRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record(columns::REQUIRED)?;
    for r in rows {
        writer.write_record([
            r.candidate_id.to_string().as_str(),
            r.current_position,
            r.test_position,
            r.birthplace,
            r.test_period.as_str(),
            r.test_group,
            r.result,
            r.score.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(path: &Path, rows: &[SampleRow]) -> Result<()> {
    let records: Vec<Value> = rows
        .iter()
        .map(|r| {
            let mut obj = Map::new();
            obj.insert(columns::CANDIDATE_ID.into(), json!(r.candidate_id));
            obj.insert(columns::CURRENT_POSITION.into(), json!(r.current_position));
            obj.insert(columns::TEST_POSITION.into(), json!(r.test_position));
            obj.insert(columns::BIRTHPLACE.into(), json!(r.birthplace));
            obj.insert(columns::TEST_PERIOD.into(), json!(r.test_period));
            obj.insert(columns::TEST_GROUP.into(), json!(r.test_group));
            let result = (!r.result.is_empty()).then_some(r.result);
            obj.insert(columns::RESULT.into(), json!(result));
            obj.insert(columns::SCORE.into(), json!(r.score));
            Value::Object(obj)
        })
        .collect();
    let file = std::fs::File::create(path).context("creating JSON file")?;
    serde_json::to_writer_pretty(file, &records)?;
    Ok(())
}

fn text_column(rows: &[SampleRow], f: impl Fn(&SampleRow) -> Option<&str>) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn write_parquet(path: &Path, rows: &[SampleRow]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(columns::CANDIDATE_ID, DataType::Int64, false),
        Field::new(columns::CURRENT_POSITION, DataType::Utf8, false),
        Field::new(columns::TEST_POSITION, DataType::Utf8, false),
        Field::new(columns::BIRTHPLACE, DataType::Utf8, false),
        Field::new(columns::TEST_PERIOD, DataType::Utf8, false),
        Field::new(columns::TEST_GROUP, DataType::Utf8, false),
        Field::new(columns::RESULT, DataType::Utf8, true),
        Field::new(columns::SCORE, DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.candidate_id))) as ArrayRef,
            text_column(rows, |r| Some(r.current_position)),
            text_column(rows, |r| Some(r.test_position)),
            text_column(rows, |r| Some(r.birthplace)),
            text_column(rows, |r| Some(r.test_period.as_str())),
            text_column(rows, |r| Some(r.test_group)),
            text_column(rows, |r| (!r.result.is_empty()).then_some(r.result)),
            text_column(rows, |r| Some(r.score.as_str())),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut rng = SimpleRng::new(cli.seed);
    let rows = generate(cli.rows, &mut rng);

    let ext = cli
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&cli.output, &rows)?,
        "json" => write_json(&cli.output, &rows)?,
        "parquet" | "pq" => write_parquet(&cli.output, &rows)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    println!("Wrote {} exam records to {}", rows.len(), cli.output.display());
    Ok(())
}
