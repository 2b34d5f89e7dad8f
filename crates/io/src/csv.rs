// CSV/TSV import into datasets

use std::io::Read;
use std::path::Path;

use voteflow_pipeline::model::Record;
use voteflow_pipeline::{Dataset, Value};

pub fn import(path: &Path) -> Result<Dataset, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    log::debug!("{}: sniffed delimiter {:?}", path.display(), delimiter as char);
    parse_dataset(&content, delimiter)
}

pub fn import_with_delimiter(path: &Path, delimiter: u8) -> Result<Dataset, String> {
    let content = read_file_as_utf8(path)?;
    parse_dataset(&content, delimiter)
}

/// Candidate delimiters, in tie-break order. Results exports from
/// decimal-comma locales use `;`, so it is tried first.
const DELIMITERS: [u8; 4] = [b';', b',', b'\t', b'|'];

/// Non-blank rows inspected when guessing the delimiter.
const SNIFF_ROWS: usize = 10;

/// Guess the field delimiter of a results table.
///
/// The header must split into at least two columns. Each candidate then
/// scores `(1 + data rows as wide as the header) * header width`; the highest
/// score wins and ties keep the earlier candidate. Falls back to `,`.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_ROWS)
        .collect();

    let Some((header, rows)) = sample.split_first() else {
        return b',';
    };

    let mut best = (b',', 0usize);
    for delimiter in DELIMITERS {
        let width = field_count(header, delimiter);
        if width < 2 {
            continue;
        }
        let matching = rows.iter().filter(|row| field_count(row, delimiter) == width).count();
        let score = (1 + matching) * width;
        if score > best.1 {
            best = (delimiter, score);
        }
    }
    best.0
}

/// Fields in one line under `delimiter`, honoring quotes.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map_or(1, |r| r.len())
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel on Windows exports CP-1252
            log::warn!("{} is not valid UTF-8; decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match content.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => content,
    })
}

/// Numeric auto-detection for one field.
///
/// Finite numbers become `Number`, blank fields `Empty`, anything else stays
/// verbatim as `Text`.
pub fn parse_cell(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ => Value::Text(field.to_string()),
    }
}

/// Parse delimited text with a header row into a dataset.
///
/// Rows with every field blank are skipped. Short rows leave trailing columns
/// absent; cells past the header width are dropped. When a header repeats,
/// the first column with that name wins.
pub fn parse_dataset(content: &str, delimiter: u8) -> Result<Dataset, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = reader.records();

    let header = loop {
        match rows.next() {
            Some(result) => {
                let record = result.map_err(|e| e.to_string())?;
                if record.iter().any(|f| !f.trim().is_empty()) {
                    break record;
                }
            }
            None => return Err("file has no header row".to_string()),
        }
    };

    let headers: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
    let mut dataset = Dataset::new(headers.clone());
    let mut skipped = 0usize;

    for result in rows {
        let record = result.map_err(|e| e.to_string())?;
        if record.iter().all(|f| f.trim().is_empty()) {
            skipped += 1;
            continue;
        }

        let mut row = Record::with_capacity(headers.len());
        for (name, field) in headers.iter().zip(record.iter()) {
            row.entry(name.clone()).or_insert_with(|| parse_cell(field));
        }
        dataset.push(row);
    }

    if skipped > 0 {
        log::debug!("skipped {skipped} blank row(s)");
    }

    Ok(dataset)
}
