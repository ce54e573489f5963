use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use marksix_db::dataset::{Dataset, MergeSummary, SourceOrder};
use marksix_db::models::{BALLS_PER_DRAW, DrawRecord, Zodiac};
use marksix_db::rusqlite::Connection;
use tracing::warn;

use crate::update::{UpdateMode, store_batch};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header of the exported table: period, seven numbers, seven zodiacs.
pub fn csv_header() -> Vec<String> {
    let mut header = vec!["期数".to_string()];
    header.extend((1..=BALLS_PER_DRAW).map(|i| format!("号码{i}")));
    header.extend((1..=BALLS_PER_DRAW).map(|i| format!("生肖{i}")));
    header
}

fn parse_record(record: &csv::StringRecord) -> Result<DrawRecord> {
    let get = |idx: usize| -> Result<&str> {
        record
            .get(idx)
            .map(str::trim)
            .with_context(|| format!("缺少第 {} 列", idx + 1))
    };

    let period = get(0)?;

    let mut numbers = [0u8; BALLS_PER_DRAW];
    for (i, n) in numbers.iter_mut().enumerate() {
        let s = get(1 + i)?;
        *n = s
            .parse()
            .with_context(|| format!("无法解析号码 '{}' (第 {} 列)", s, 2 + i))?;
    }

    let mut zodiacs = [Zodiac::Rat; BALLS_PER_DRAW];
    for (i, z) in zodiacs.iter_mut().enumerate() {
        *z = get(1 + BALLS_PER_DRAW + i)?.parse()?;
    }

    Ok(DrawRecord::new(period, numbers, zodiacs)?)
}

#[derive(Debug, Default)]
pub struct ImportResult {
    pub total_records: u32,
    pub imported: u32,
    pub errors: u32,
    pub merge: MergeSummary,
    pub stored: usize,
}

/// Reads an exported table. Bad lines are reported and skipped.
/// Returned records keep file order.
pub fn read_csv(path: &Path) -> Result<(Vec<DrawRecord>, ImportResult)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("无法打开 {:?}", path))?;

    let mut result = ImportResult::default();
    let mut records = Vec::new();

    for record_result in reader.records() {
        result.total_records += 1;
        let line = result.total_records + 1;
        match record_result {
            Ok(record) => match parse_record(&record) {
                Ok(draw) => {
                    records.push(draw);
                    result.imported += 1;
                }
                Err(e) => {
                    warn!("第 {line} 行解析错误 : {e:#}");
                    result.errors += 1;
                }
            },
            Err(e) => {
                warn!("第 {line} 行读取错误 : {e}");
                result.errors += 1;
            }
        }
    }

    Ok((records, result))
}

/// Imports a table in the exported layout (newest draw first).
pub fn import_csv(conn: &Connection, name: &str, path: &Path, mode: UpdateMode) -> Result<ImportResult> {
    let (records, mut result) = read_csv(path)?;
    if records.is_empty() && result.errors > 0 {
        bail!("{:?} 中没有可导入的记录", path);
    }
    let batch = SourceOrder::NewestFirst.to_chronological(records);
    let (merge, stored) = store_batch(conn, name, batch, mode)?;
    result.merge = merge;
    result.stored = stored;
    Ok(result)
}

/// Writes the dataset newest first, UTF-8 with BOM so spreadsheet tools
/// keep the labels intact. Returns the number of rows written.
pub fn export_csv(dataset: &Dataset, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| format!("无法创建目录 {:?}", parent))?;
        }
    }
    let mut file = File::create(path).with_context(|| format!("无法创建 {:?}", path))?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(csv_header())?;
    for r in dataset.records().iter().rev() {
        let mut row = Vec::with_capacity(1 + 2 * BALLS_PER_DRAW);
        row.push(r.period.clone());
        row.extend(r.numbers.iter().map(|n| n.to_string()));
        row.extend(r.zodiacs.iter().map(|z| z.label().to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(dataset.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marksix_db::db::{DEFAULT_DATASET, load_dataset, migrate};
    use Zodiac::*;

    fn sample() -> Dataset {
        Dataset::from_records(vec![
            DrawRecord::new("2024/001", [1, 2, 3, 4, 5, 6, 7], [Rat, Ox, Tiger, Rabbit, Dragon, Snake, Horse]).unwrap(),
            DrawRecord::new("2024/002", [8, 9, 10, 11, 12, 13, 49], [Goat, Monkey, Rooster, Dog, Pig, Rat, Rat]).unwrap(),
        ])
    }

    #[test]
    fn test_header_layout() {
        let header = csv_header();
        assert_eq!(header.len(), 15);
        assert_eq!(header[0], "期数");
        assert_eq!(header[1], "号码1");
        assert_eq!(header[14], "生肖7");
    }

    #[test]
    fn test_export_writes_bom_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("draws.csv");
        assert_eq!(export_csv(&sample(), &path).unwrap(), 2);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "期数,号码1,号码2,号码3,号码4,号码5,号码6,号码7,生肖1,生肖2,生肖3,生肖4,生肖5,生肖6,生肖7");
        assert_eq!(lines[1], "2024/002,8,9,10,11,12,13,49,羊,猴,鸡,狗,猪,鼠,鼠");
        assert_eq!(lines[2], "2024/001,1,2,3,4,5,6,7,鼠,牛,虎,兔,龙,蛇,马");
    }

    #[test]
    fn test_export_then_import_restores_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draws.csv");
        export_csv(&sample(), &path).unwrap();

        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let result = import_csv(&conn, DEFAULT_DATASET, &path, UpdateMode::Replace).unwrap();

        assert_eq!(result.total_records, 2);
        assert_eq!(result.imported, 2);
        assert_eq!(result.errors, 0);
        assert_eq!(load_dataset(&conn, DEFAULT_DATASET).unwrap(), sample());
    }

    #[test]
    fn test_header_only_file_keeps_stored_draws() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("full.csv");
        let empty = dir.path().join("empty.csv");
        export_csv(&sample(), &full).unwrap();
        export_csv(&Dataset::new(), &empty).unwrap();

        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        import_csv(&conn, DEFAULT_DATASET, &full, UpdateMode::Replace).unwrap();
        let result = import_csv(&conn, DEFAULT_DATASET, &empty, UpdateMode::Replace).unwrap();

        assert_eq!(result.total_records, 0);
        assert_eq!(result.stored, 2);
        assert_eq!(load_dataset(&conn, DEFAULT_DATASET).unwrap(), sample());
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draws.csv");
        std::fs::write(
            &path,
            "期数,号码1,号码2,号码3,号码4,号码5,号码6,号码7,生肖1,生肖2,生肖3,生肖4,生肖5,生肖6,生肖7\n\
             3,01,02,03,04,05,06,07,鼠,牛,虎,兔,龙,蛇,马\n\
             2,1,2,3,4,5,6,x,鼠,牛,虎,兔,龙,蛇,马\n\
             1,1,2,3,4,5,6,7,鼠,牛\n",
        )
        .unwrap();

        let (records, result) = read_csv(&path).unwrap();
        assert_eq!(result.total_records, 3);
        assert_eq!(result.imported, 1);
        assert_eq!(result.errors, 2);
        assert_eq!(records[0].period, "3");
        assert_eq!(records[0].numbers, [1, 2, 3, 4, 5, 6, 7]);
    }
}
