use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::panel::{Column, Panel};
use crate::{ColumnKey, Product, SettleError, ValueType};

/// One flat record as handed over by a data source.
pub type Record = serde_json::Map<String, Value>;

const KEY_FIELDS: [&str; 6] = ["market", "commodity", "instrument", "area", "product", "offset"];

/// Pivot flat records into a panel.
///
/// Each record carries `as_of`, the six key fields (`market`, `commodity`,
/// `instrument`, `area`, `product`, `offset`) and one field per requested value
/// type, named by its label (`close`, `maturity`...).
///
/// - Null or absent values are skipped, as are records with a null key field.
/// - Duplicate numeric cells are averaged; for maturities the first one wins.
/// - Dates may be ISO dates, ISO date-times or UNIX seconds.
///
/// # Errors
/// - `MissingColumns` if no record has one of the required fields.
/// - `InvalidArg` if a field has the wrong shape (unparseable date, non-numeric value...).
pub fn pivot_records(records: &[Record], value_types: &[ValueType]) -> Result<Panel, SettleError> {
    if records.is_empty() {
        return Ok(Panel::new());
    }
    let present: BTreeSet<&str> = records.iter().flat_map(|r| r.keys().map(String::as_str)).collect();
    let missing: Vec<String> = ["as_of"]
        .into_iter()
        .chain(KEY_FIELDS)
        .chain(value_types.iter().map(ValueType::as_str))
        .filter(|f| !present.contains(f))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(SettleError::missing_columns(missing));
    }

    let mut sums: BTreeMap<ColumnKey, BTreeMap<NaiveDate, (f64, u32)>> = BTreeMap::new();
    let mut dates: BTreeMap<ColumnKey, BTreeMap<NaiveDate, NaiveDate>> = BTreeMap::new();
    let mut index: BTreeSet<NaiveDate> = BTreeSet::new();

    for (i, record) in records.iter().enumerate() {
        let Some(as_of) = field_date(record, "as_of", i)? else {
            continue;
        };
        let Some(base) = record_key(record, i)? else {
            continue;
        };
        for vt in value_types {
            let key = base.with_type(vt.clone());
            if vt.is_maturity() {
                if let Some(d) = field_date(record, vt.as_str(), i)? {
                    dates.entry(key).or_default().entry(as_of).or_insert(d);
                    index.insert(as_of);
                }
            } else if let Some(v) = field_number(record, vt.as_str(), i)? {
                let cell = sums.entry(key).or_default().entry(as_of).or_insert((0.0, 0));
                cell.0 += v;
                cell.1 += 1;
                index.insert(as_of);
            }
        }
    }

    let index: Vec<NaiveDate> = index.into_iter().collect();
    let mut columns: Vec<(ColumnKey, Column)> = Vec::with_capacity(sums.len() + dates.len());
    for (key, cells) in sums {
        let values = index
            .iter()
            .map(|d| cells.get(d).map(|(sum, n)| sum / f64::from(*n)))
            .collect();
        columns.push((key, Column::Values(values)));
    }
    for (key, cells) in dates {
        let values = index.iter().map(|d| cells.get(d).copied()).collect();
        columns.push((key, Column::Dates(values)));
    }
    Panel::from_columns(index, columns)
}

fn bad_field(i: usize, field: &str, value: &Value) -> SettleError {
    SettleError::InvalidArg(format!("record {i}: field '{field}' has unexpected value {value}"))
}

fn record_key(record: &Record, i: usize) -> Result<Option<ColumnKey>, SettleError> {
    let mut text = Vec::with_capacity(4);
    for field in &KEY_FIELDS[..4] {
        match record.get(*field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) => text.push(s.clone()),
            Some(other) => return Err(bad_field(i, field, other)),
        }
    }
    let product: Product = match record.get("product") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.parse()?,
        Some(other) => return Err(bad_field(i, "product", other)),
    };
    let offset = match record.get("offset") {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => parse_offset(v).ok_or_else(|| bad_field(i, "offset", v))?,
    };
    let [market, commodity, instrument, area]: [String; 4] = text
        .try_into()
        .map_err(|_| SettleError::InvalidArg(format!("record {i}: incomplete key")))?;
    Ok(Some(ColumnKey::new(
        market,
        commodity,
        instrument,
        area,
        product,
        offset,
        ValueType::Close,
    )))
}

fn parse_offset(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|o| i32::try_from(o).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_number(record: &Record, field: &str, i: usize) -> Result<Option<f64>, SettleError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64().filter(|x| !x.is_nan())),
        Some(other) => Err(bad_field(i, field, other)),
    }
}

fn field_date(record: &Record, field: &str, i: usize) -> Result<Option<NaiveDate>, SettleError> {
    let Some(value) = record.get(field) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::String(s) => parse_date(s).map(Some).ok_or_else(|| bad_field(i, field, value)),
        Value::Number(n) => match n.as_f64() {
            Some(secs) if secs.is_nan() || secs <= 0.0 => Ok(None),
            Some(secs) => DateTime::from_timestamp(secs as i64, 0)
                .map(|dt| Some(dt.date_naive()))
                .ok_or_else(|| bad_field(i, field, value)),
            None => Err(bad_field(i, field, value)),
        },
        _ => Err(bad_field(i, field, value)),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.date())
        })
}
