use eustat_rs::{decode_value, storage};
use serde_json::{Value, json};
use std::fs;
use tempfile::tempdir;

fn sample() -> Value {
    json!({
        "id": ["geo", "time"],
        "size": [2, 2],
        "dimension": {
            "geo": {"category": {
                "index": {"SE": 0, "NO": 1},
                "label": {"SE": "Sweden", "NO": "Norway"}
            }},
            "time": {"category": {"index": {"2020": 0, "2021": 1}}}
        },
        "value": {"0": 1.5, "1": 2.0, "3": 4.25},
        "status": {"3": "p"}
    })
}

#[test]
fn save_csv_and_json() {
    let table = decode_value(&sample()).unwrap();
    let dir = tempdir().unwrap();

    let csv_path = dir.path().join("gdp.csv");
    storage::save_csv(&table, &csv_path).unwrap();
    let csv_txt = fs::read_to_string(&csv_path).unwrap();
    assert!(csv_txt.starts_with("geo,time,value,status,geo_label\n"));
    assert_eq!(csv_txt.lines().count(), 1 + table.len());
    // NO/2020 has no observation
    assert_eq!(csv_txt.lines().nth(3).unwrap(), "NO,2020,,,Norway");

    let json_path = dir.path().join("gdp.json");
    storage::save_json(&table, &json_path).unwrap();
    let v: Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    let records = v.as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["geo_label"], "Sweden");
    assert_eq!(records[2]["value"], Value::Null);
    assert_eq!(records[3]["value"], 4.25);
    assert_eq!(records[3]["status"], "p");
}

// Spreadsheets evaluate cells starting with = + - @ as formulas.
#[test]
fn csv_cells_are_prefixed_to_avoid_formulas() {
    let table = decode_value(&json!({
        "id": ["geo"],
        "size": [3],
        "dimension": {"geo": {"category": {
            "index": {"=HYPERLINK(\"http://evil\")": 0, "DE": 1, "-X": 2},
            "label": {"DE": "@foo", "-X": "+SUM(A1:A9)"}
        }}},
        "value": {"0": 1, "1": -2.5, "2": 3}
    }))
    .unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("injection.csv");
    storage::save_csv(&table, &path).unwrap();

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 3);

    assert_eq!(&rows[0][0], "'=HYPERLINK(\"http://evil\")");
    assert_eq!(&rows[1][0], "DE");
    assert_eq!(&rows[1][2], "'@foo");
    assert_eq!(&rows[2][0], "'-X");
    assert_eq!(&rows[2][2], "'+SUM(A1:A9)");
    // numbers are written as numbers
    assert_eq!(&rows[1][1], "-2.5");
}
