use std::{
    collections::BTreeMap,
    fs,
    panic::Location,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Value};
use tracing::{error, warn};

use crate::error::{Result, XnatError};

/// Logs an error together with the file and line of the caller.
#[track_caller]
pub fn log_error(err: &XnatError) {
    let location = Location::caller();
    error!("({}, line {}): {}", location.file(), location.line(), err);
}

/// Appends `.ext` to `name` unless it already ends with it.
pub fn with_extension(name: &str, ext: &str) -> PathBuf {
    let suffix = format!(".{}", ext);
    if name.ends_with(&suffix) {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{}{}", name, suffix))
    }
}

/// Text form of a JSON value as it should appear in a query string or a CSV
/// cell: strings without quotes, `null` as an empty string.
pub fn plain_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Formats a duration given in seconds.
///
/// Without `fmt` the output reads `1 hour, 1 minute, and 1.00 seconds`,
/// `2 minutes and 5.50 seconds`, `12.00 seconds`, or `4.00 ms` below 10 ms.
///
/// `fmt` may hold one to three placeholders, either `{}` / `{:.2f}` or
/// printf style `%i` / `%d` / `%s` / `%f` / `%.2f`. Three placeholders receive
/// hours, minutes and seconds; two receive minutes (hours folded in) and
/// seconds; one receives the total in seconds. A format that cannot be
/// applied falls back to the default output.
pub fn convert_seconds(seconds: f64, fmt: Option<&str>) -> String {
    let total = if seconds.is_finite() { seconds } else { 0.0 };
    let h = (total / 3600.0).floor();
    let m = ((total - h * 3600.0) / 60.0).floor();
    let s = total - h * 3600.0 - m * 60.0;

    if let Some(fmt) = fmt {
        let args = match count_placeholders(fmt) {
            3 => Some(vec![h, m, s]),
            2 => Some(vec![h * 60.0 + m, s]),
            1 => Some(vec![total]),
            _ => None,
        };
        if let Some(output) = args.and_then(|args| apply_placeholders(fmt, &args)) {
            return output;
        }
    }

    let plural = |n: f64, unit: &str| {
        if n == 1.0 {
            format!("{} {}", n, unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };
    let s_str = format!("{:.2} seconds", s);

    if h > 0.0 {
        format!("{}, {}, and {}", plural(h, "hour"), plural(m, "minute"), s_str)
    } else if m > 0.0 {
        format!("{} and {}", plural(m, "minute"), s_str)
    } else if s < 0.01 {
        format!("{:.2} ms", s * 1000.0)
    } else {
        s_str
    }
}

enum Placeholder {
    Default,
    Integer,
    Fixed(usize),
}

enum Token {
    Text(String),
    Slot(Placeholder),
}

/// Splits `fmt` into literal text and placeholders.
fn tokenize(fmt: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut spec = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        ch => spec.push(ch),
                    }
                }
                tokens.push(Token::Text(std::mem::take(&mut literal)));
                tokens.push(Token::Slot(parse_spec(spec.trim_start_matches(':'))?));
            }
            '%' => {
                let mut spec = String::new();
                while let Some(&ch) = chars.peek() {
                    chars.next();
                    spec.push(ch);
                    if ch.is_ascii_alphabetic() {
                        break;
                    }
                }
                tokens.push(Token::Text(std::mem::take(&mut literal)));
                tokens.push(Token::Slot(parse_spec(&spec)?));
            }
            _ => literal.push(c),
        }
    }
    tokens.push(Token::Text(literal));
    Some(tokens)
}

fn parse_spec(spec: &str) -> Option<Placeholder> {
    match spec {
        "" | "s" => Some(Placeholder::Default),
        "i" | "d" => Some(Placeholder::Integer),
        "f" => Some(Placeholder::Fixed(6)),
        _ => {
            let precision = spec.strip_prefix('.')?.strip_suffix('f')?;
            precision.parse().ok().map(Placeholder::Fixed)
        }
    }
}

fn count_placeholders(fmt: &str) -> usize {
    tokenize(fmt).map_or(0, |tokens| {
        tokens
            .iter()
            .filter(|t| matches!(t, Token::Slot(_)))
            .count()
    })
}

fn apply_placeholders(fmt: &str, args: &[f64]) -> Option<String> {
    let mut args = args.iter();
    let mut output = String::new();
    for token in tokenize(fmt)? {
        match token {
            Token::Text(text) => output.push_str(&text),
            Token::Slot(placeholder) => {
                let value = *args.next()?;
                let text = match placeholder {
                    Placeholder::Default => value.to_string(),
                    Placeholder::Integer => format!("{}", value.trunc()),
                    Placeholder::Fixed(precision) => format!("{:.*}", precision, value),
                };
                output.push_str(&text);
            }
        }
    }
    Some(output)
}

/// Pretty-prints `data` to `name` (`.json` appended when missing) and returns
/// the path written.
pub fn write_json<T: Serialize + ?Sized>(data: &T, name: &str, indent: usize) -> Result<PathBuf> {
    let path = with_extension(name, "json");
    let indent = " ".repeat(indent);
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(indent.as_bytes()));
    data.serialize(&mut serializer)?;
    fs::write(&path, buffer).map_err(|e| XnatError::io(&path, e))?;
    Ok(path)
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| XnatError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// Which records contribute scalar keys to the CSV header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderDiscovery {
    /// Only the first record, later records' extra keys are dropped.
    #[default]
    FirstRecord,
    /// Every record, in order of first appearance.
    AllRecords,
}

/// Flattens JSON records into CSV text.
///
/// The header row is `keys` followed by the non-object top-level keys of the
/// records (see [HeaderDiscovery]). Top-level scalars fill their own column;
/// each name in `keys` is also looked up inside every nested object and the
/// first hit wins. Commas inside header names and values become semicolons.
pub fn records_to_csv(records: &[Value], keys: &[String], discovery: HeaderDiscovery) -> String {
    let mut headers: Vec<String> = Vec::new();
    for key in keys {
        if !headers.contains(key) {
            headers.push(key.clone());
        }
    }

    let sources = match discovery {
        HeaderDiscovery::FirstRecord => &records[..records.len().min(1)],
        HeaderDiscovery::AllRecords => records,
    };
    for record in sources.iter().filter_map(Value::as_object) {
        for (key, value) in record {
            if !value.is_object() && !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    if headers.is_empty() {
        return String::new();
    }

    let header_row: Vec<String> = headers.iter().map(|h| h.replace(',', ";")).collect();
    let mut csv = format!("{}\n", header_row.join(","));
    for record in records {
        let row = csv_row(record, &headers, keys);
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map_or(String::new(), |v| v.replace(',', ";")))
            .collect();
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    csv
}

fn csv_row(record: &Value, headers: &[String], keys: &[String]) -> BTreeMap<String, String> {
    let mut row = BTreeMap::new();
    let Some(record) = record.as_object() else {
        return row;
    };

    for (key, value) in record {
        if value.is_object() {
            continue;
        }
        if headers.contains(key) {
            row.insert(key.clone(), plain_string(value));
        }
    }
    for nested in record.values().filter_map(Value::as_object) {
        for key in keys {
            if row.contains_key(key) {
                continue;
            }
            if let Some(value) = nested.get(key) {
                row.insert(key.clone(), plain_string(value));
            }
        }
    }
    row
}

/// Writes `records` as CSV to `name` (`.csv` appended when missing).
pub fn json_to_csv(records: &[Value], name: &str, keys: &[String]) -> Result<PathBuf> {
    json_to_csv_with(records, name, keys, HeaderDiscovery::default())
}

pub fn json_to_csv_with(
    records: &[Value],
    name: &str,
    keys: &[String],
    discovery: HeaderDiscovery,
) -> Result<PathBuf> {
    let path = with_extension(name, "csv");
    let csv = records_to_csv(records, keys, discovery);
    fs::write(&path, csv).map_err(|e| XnatError::io(&path, e))?;
    Ok(path)
}

/// Reads a CSV file into `lowercased column -> values`.
///
/// Cells that parse as numbers become JSON numbers. Columns holding any
/// other text are dropped unless their name is listed in `keep`
/// (case-insensitive). Rows with the wrong number of cells are skipped.
pub fn parse_csv(name: &str, keep: &[&str]) -> Result<Map<String, Value>> {
    let path = with_extension(name, "csv");
    let text = fs::read_to_string(&path).map_err(|e| XnatError::io(&path, e))?;

    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Ok(Map::new());
    };
    let columns: Vec<String> = header.split(',').map(|h| h.replace(' ', "")).collect();

    let mut output: Vec<(String, Vec<Value>)> =
        columns.iter().map(|c| (c.clone(), Vec::new())).collect();
    for (index, line) in lines.enumerate() {
        let items: Vec<&str> = line.split(',').collect();
        if items.len() != columns.len() {
            warn!(
                "Line {} has incorrect amount of inputs: {} != {}",
                index + 2,
                items.len(),
                columns.len()
            );
            continue;
        }
        for ((_, values), item) in output.iter_mut().zip(items) {
            let value = item
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or_else(|| Value::String(item.to_string()), Value::Number);
            values.push(value);
        }
    }

    let keep: Vec<String> = keep.iter().map(|k| k.to_lowercase()).collect();
    Ok(output
        .into_iter()
        .filter(|(column, values)| {
            !values.iter().any(Value::is_string) || keep.contains(&column.to_lowercase())
        })
        .map(|(column, values)| (column.to_lowercase(), Value::Array(values)))
        .collect())
}

/// Reports completion in fixed 20% steps of a known total.
pub struct Progress {
    total: usize,
    done: usize,
    next: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            next: 20,
        }
    }

    /// Marks one more item as done and returns every 20% step crossed.
    pub fn advance(&mut self) -> Vec<usize> {
        self.done += 1;
        let mut crossed = Vec::new();
        if self.total == 0 {
            return crossed;
        }
        while self.next <= 100 && self.done * 100 >= self.next * self.total {
            crossed.push(self.next);
            self.next += 20;
        }
        crossed
    }
}
