use crate::jsonstat::{Cell, Table};
use anyhow::Result;
use csv::WriterBuilder;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Cells starting with these are interpreted as formulas by spreadsheet software.
const FORMULA_STARTERS: [char; 4] = ['=', '+', '-', '@'];

fn neutralize(text: &str) -> Cow<'_, str> {
    if text.starts_with(FORMULA_STARTERS) {
        Cow::Owned(format!("'{text}"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Save a decoded table as CSV with header. Missing values are empty cells.
pub fn save_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(table.column_names())?;
    for row in table.rows() {
        let record: Vec<Cow<'_, str>> = row
            .cells()
            .into_iter()
            .map(|cell| match cell {
                Cell::Text(s) => neutralize(s),
                Cell::Number(Some(v)) => Cow::Owned(v.to_string()),
                Cell::Number(None) => Cow::Borrowed(""),
            })
            .collect();
        wtr.write_record(record.iter().map(|c| c.as_bytes()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Rows as JSON objects keyed by column name; missing values are `null`.
pub fn to_records(table: &Table) -> Vec<Map<String, Value>> {
    let names = table.column_names();
    table
        .rows()
        .map(|row| {
            names
                .iter()
                .zip(row.cells())
                .map(|(name, cell)| {
                    let v = match cell {
                        Cell::Text(s) => Value::String(s.to_string()),
                        Cell::Number(n) => n.map(Value::from).unwrap_or(Value::Null),
                    };
                    (name.clone(), v)
                })
                .collect()
        })
        .collect()
}

/// Save a decoded table as a pretty JSON array of records.
pub fn save_json<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut f, &to_records(table))?;
    f.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonstat::decode_value;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn write_csv_and_json() {
        let dir = tempdir().unwrap();
        let csvp = dir.path().join("x.csv");
        let jsonp = dir.path().join("x.json");
        let table = decode_value(&json!({
            "id": ["geo"],
            "size": [2],
            "dimension": {"geo": {"category": {"index": {"DE": 0, "FR": 1}}}},
            "value": {"0": 1.23}
        }))
        .unwrap();
        save_csv(&table, &csvp).unwrap();
        save_json(&table, &jsonp).unwrap();
        assert!(csvp.exists());
        assert!(jsonp.exists());
    }

    #[test]
    fn neutralizes_formula_starters_only() {
        assert_eq!(neutralize("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(neutralize("-x"), "'-x");
        assert_eq!(neutralize("SE"), "SE");
    }
}
