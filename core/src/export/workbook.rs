use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::models::{FoodEntry, Reading};

pub const READINGS_SHEET: &str = "readings";
pub const FOODLOG_SHEET: &str = "foodlog";

pub const READINGS_HEADERS: &[&str] = &["measured_at", "value", "kind", "note"];
pub const FOODLOG_HEADERS: &[&str] = &["logged_at", "name", "calories", "gi"];

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    DateTime(NaiveDateTime),
    Number(f64),
    Text(String),
    Empty,
}

/// One worksheet: a header row followed by one row per record.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<Cell>>,
}

fn optional_text(value: Option<&str>) -> Cell {
    value.map_or(Cell::Empty, |v| Cell::Text(v.to_string()))
}

#[allow(clippy::cast_precision_loss)]
fn optional_number(value: Option<i64>) -> Cell {
    value.map_or(Cell::Empty, |v| Cell::Number(v as f64))
}

/// Lay out both sheets in input order, without writing any bytes.
pub fn workbook_tables(readings: &[Reading], foods: &[FoodEntry]) -> [SheetTable; 2] {
    let reading_rows = readings
        .iter()
        .map(|r| {
            vec![
                Cell::DateTime(r.measured_at),
                Cell::Number(r.value),
                Cell::Text(r.kind.as_str().to_string()),
                optional_text(r.note.as_deref()),
            ]
        })
        .collect();

    let food_rows = foods
        .iter()
        .map(|f| {
            vec![
                Cell::DateTime(f.logged_at),
                Cell::Text(f.name.clone()),
                optional_number(f.calories),
                optional_number(f.glycemic_index),
            ]
        })
        .collect();

    [
        SheetTable {
            name: READINGS_SHEET,
            headers: READINGS_HEADERS,
            rows: reading_rows,
        },
        SheetTable {
            name: FOODLOG_SHEET,
            headers: FOODLOG_HEADERS,
            rows: food_rows,
        },
    ]
}

fn write_table(worksheet: &mut Worksheet, table: &SheetTable) -> Result<()> {
    let header_format = Format::new().set_bold();
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

    worksheet
        .set_name(table.name)
        .with_context(|| format!("invalid sheet name '{}'", table.name))?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(idx + 1).context("too many rows for one worksheet")?;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::DateTime(ts) => {
                    worksheet.write_datetime_with_format(row_num, col, ts, &datetime_format)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                Cell::Empty => {}
            }
        }
    }

    worksheet.set_column_width(0, 20)?;
    Ok(())
}

/// Serialize readings and food entries into a two-sheet XLSX workbook.
///
/// Both sheets are always present; an empty input produces a header-only
/// sheet.
pub fn build_workbook(readings: &[Reading], foods: &[FoodEntry]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    for table in &workbook_tables(readings, foods) {
        let worksheet = workbook.add_worksheet();
        write_table(worksheet, table)?;
    }

    let buffer = workbook
        .save_to_buffer()
        .context("failed to serialize workbook")?;
    log::debug!(
        "built workbook readings={} foods={} bytes={}",
        readings.len(),
        foods.len(),
        buffer.len()
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{Data, DataType, Reader, Xlsx, open_workbook_from_rs};
    use chrono::NaiveDate;

    use super::*;
    use crate::models::ReadingKind;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn sample_readings() -> Vec<Reading> {
        vec![
            Reading {
                id: 1,
                user_id: 1,
                value: 98.0,
                kind: ReadingKind::Fasting,
                note: Some("Morning".to_string()),
                measured_at: at(12, 7, 0),
            },
            Reading {
                id: 2,
                user_id: 1,
                value: 145.5,
                kind: ReadingKind::PostMeal,
                note: None,
                measured_at: at(12, 13, 30),
            },
            Reading {
                id: 3,
                user_id: 1,
                value: 92.0,
                kind: ReadingKind::Fasting,
                note: Some("Morning".to_string()),
                measured_at: at(13, 7, 0),
            },
        ]
    }

    fn sample_foods() -> Vec<FoodEntry> {
        vec![
            FoodEntry {
                id: 1,
                user_id: 1,
                name: "Oatmeal with berries".to_string(),
                calories: Some(250),
                glycemic_index: Some(55),
                logged_at: at(12, 7, 30),
            },
            FoodEntry {
                id: 2,
                user_id: 1,
                name: "Black coffee".to_string(),
                calories: None,
                glycemic_index: None,
                logged_at: at(12, 9, 0),
            },
        ]
    }

    fn read_sheet(bytes: &[u8], name: &str) -> Vec<Vec<Data>> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
        let range = workbook.worksheet_range(name).unwrap();
        range.rows().map(<[Data]>::to_vec).collect()
    }

    fn sheet_names(bytes: &[u8]) -> Vec<String> {
        let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
        workbook.sheet_names()
    }

    fn assert_same_instant(cell: &Data, expected: NaiveDateTime) {
        let actual = cell.as_datetime().expect("datetime cell");
        assert!((actual - expected).num_seconds().abs() < 1, "{actual} != {expected}");
    }

    fn header(row: &[Data]) -> Vec<String> {
        row.iter()
            .map(|c| c.get_string().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn tables_preserve_input_order() {
        let readings = sample_readings();
        let [reading_table, food_table] = workbook_tables(&readings, &sample_foods());

        assert_eq!(reading_table.name, READINGS_SHEET);
        assert_eq!(reading_table.rows.len(), 3);
        assert_eq!(reading_table.rows[1][1], Cell::Number(145.5));
        assert_eq!(reading_table.rows[1][3], Cell::Empty);
        assert_eq!(food_table.rows[0][1], Cell::Text("Oatmeal with berries".to_string()));
        assert_eq!(food_table.rows[1][2], Cell::Empty);
    }

    #[test]
    fn workbook_round_trips_readings() {
        let readings = sample_readings();
        let bytes = build_workbook(&readings, &sample_foods()).unwrap();
        assert_eq!(sheet_names(&bytes), vec![READINGS_SHEET, FOODLOG_SHEET]);

        let rows = read_sheet(&bytes, READINGS_SHEET);
        assert_eq!(header(&rows[0]), READINGS_HEADERS);
        assert_eq!(rows.len(), readings.len() + 1);

        for (row, reading) in rows[1..].iter().zip(&readings) {
            assert_same_instant(&row[0], reading.measured_at);
            assert_eq!(row[1].get_float(), Some(reading.value));
            assert_eq!(row[2].get_string(), Some(reading.kind.as_str()));
            assert_eq!(row[3].get_string(), reading.note.as_deref());
        }
    }

    #[test]
    fn workbook_round_trips_foods() {
        let foods = sample_foods();
        let bytes = build_workbook(&sample_readings(), &foods).unwrap();

        let rows = read_sheet(&bytes, FOODLOG_SHEET);
        assert_eq!(header(&rows[0]), FOODLOG_HEADERS);
        assert_eq!(rows.len(), foods.len() + 1);

        assert_same_instant(&rows[1][0], foods[0].logged_at);
        assert_eq!(rows[1][1].get_string(), Some("Oatmeal with berries"));
        assert_eq!(rows[1][2].get_float(), Some(250.0));
        assert_eq!(rows[1][3].get_float(), Some(55.0));
        assert_eq!(rows[2][1].get_string(), Some("Black coffee"));
        assert!(rows[2][2].is_empty());
    }

    #[test]
    fn empty_readings_give_header_only_sheet() {
        let foods = sample_foods();
        let bytes = build_workbook(&[], &foods).unwrap();

        let readings = read_sheet(&bytes, READINGS_SHEET);
        assert_eq!(readings.len(), 1);
        assert_eq!(header(&readings[0]), READINGS_HEADERS);

        let food_rows = read_sheet(&bytes, FOODLOG_SHEET);
        assert_eq!(food_rows.len(), foods.len() + 1);
    }

    #[test]
    fn both_sheets_present_when_everything_is_empty() {
        let bytes = build_workbook(&[], &[]).unwrap();
        assert_eq!(sheet_names(&bytes), vec![READINGS_SHEET, FOODLOG_SHEET]);
        assert_eq!(read_sheet(&bytes, FOODLOG_SHEET).len(), 1);
    }
}
