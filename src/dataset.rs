use crate::error::EvalError;
use crate::models::{RawExample, Sample};
use crate::prompt;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const TRAIN_SPLIT: &str = "train";
pub const TEST_SPLIT: &str = "test";

/// One line of a prepared split file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreparedRow {
    text: String,
}

/// A dataset row, either pre-rendered or already split into fields
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DatasetRow {
    Rendered { text: String },
    Fields(RawExample),
}

impl DatasetRow {
    fn into_sample(self, id: usize) -> Sample {
        match self {
            DatasetRow::Rendered { text } => {
                let parts = prompt::parse(&text);
                Sample {
                    id,
                    instruction: parts.instruction,
                    input: parts.input,
                    expected_output: parts.output,
                }
            }
            DatasetRow::Fields(raw) => Sample {
                id,
                instruction: raw.instruction,
                input: raw.input,
                expected_output: raw.output,
            },
        }
    }
}

/// Sizes of the splits written by [`prepare_dataset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub test: usize,
}

/// Load the raw JSON array of training examples
pub fn load_raw_data(path: &Path) -> Result<Vec<RawExample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read raw data file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse raw data JSON: {}", path.display()))
}

/// Render raw examples into the prompt template and write a seeded train/test split
pub fn prepare_dataset(
    raw_data_path: &Path,
    output_path: &Path,
    test_size: f64,
    seed: u64,
) -> Result<SplitSizes> {
    if !(test_size > 0.0 && test_size < 1.0) {
        anyhow::bail!("test_size must be between 0 and 1, got {}", test_size);
    }

    let raw_data = load_raw_data(raw_data_path)?;
    if raw_data.len() < 2 {
        anyhow::bail!(
            "Need at least 2 examples to split, found {} in {}",
            raw_data.len(),
            raw_data_path.display()
        );
    }

    let mut rows: Vec<PreparedRow> = raw_data
        .iter()
        .map(|example| PreparedRow {
            text: prompt::render(&example.instruction, &example.input, &example.output),
        })
        .collect();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rows.shuffle(&mut rng);

    let test_len = test_split_len(rows.len(), test_size);
    let train_rows = rows.split_off(test_len);
    let test_rows = rows;

    std::fs::create_dir_all(output_path)
        .with_context(|| format!("Failed to create directory: {}", output_path.display()))?;
    write_split(&split_path(output_path, TRAIN_SPLIT), &train_rows)?;
    write_split(&split_path(output_path, TEST_SPLIT), &test_rows)?;

    let sizes = SplitSizes {
        train: train_rows.len(),
        test: test_rows.len(),
    };
    tracing::info!(
        path = %output_path.display(),
        train = sizes.train,
        test = sizes.test,
        "Dataset saved"
    );

    Ok(sizes)
}

/// Number of held-out rows; always leaves at least one row on each side
fn test_split_len(total: usize, test_size: f64) -> usize {
    let wanted = (total as f64 * test_size).ceil() as usize;
    wanted.clamp(1, total - 1)
}

fn split_path(dir: &Path, split: &str) -> PathBuf {
    dir.join(format!("{split}.jsonl"))
}

fn write_split(path: &Path, rows: &[PreparedRow]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create split file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for row in rows {
        serde_json::to_writer(&mut writer, row).context("Failed to serialize dataset row")?;
        writer.write_all(b"\n")?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write split file: {}", path.display()))
}

/// Load evaluation samples in source order.
///
/// `path` may be a prepared dataset directory (the `split` file is read), a
/// `.jsonl` file or a `.json` array.
pub fn load_samples(path: &Path, split: &str) -> Result<Vec<Sample>, EvalError> {
    let file_path = if path.is_dir() {
        let candidate = split_path(path, split);
        if !candidate.is_file() {
            return Err(EvalError::dataset(
                path,
                format!("split '{split}' not found (expected {})", candidate.display()),
            ));
        }
        candidate
    } else {
        path.to_path_buf()
    };

    let content = std::fs::read_to_string(&file_path).map_err(|e| EvalError::dataset(&file_path, e))?;

    let rows = if file_path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<Vec<DatasetRow>>(&content)
            .map_err(|e| EvalError::dataset(&file_path, e))?
    } else {
        parse_jsonl(&file_path, &content)?
    };

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(id, row)| row.into_sample(id))
        .collect())
}

fn parse_jsonl(path: &Path, content: &str) -> Result<Vec<DatasetRow>, EvalError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_no, line)| {
            serde_json::from_str(line)
                .map_err(|e| EvalError::dataset(path, format!("line {}: {}", line_no + 1, e)))
        })
        .collect()
}
