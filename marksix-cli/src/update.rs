use anyhow::{Context, Result};
use indicatif::ProgressBar;
use marksix_db::dataset::{Dataset, MergeSummary, SourceOrder};
use marksix_db::db::{StoreError, count_draws, dataset_exists, load_dataset, save_dataset};
use marksix_db::models::DrawRecord;
use marksix_db::rusqlite::Connection;
use tracing::{info, warn};

use crate::extract::{Extractor, MalformedRecord};
use crate::fetch::Fetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Throw away the stored dataset and keep only this run.
    #[default]
    Replace,
    /// Keep stored draws; a period seen again takes the new values.
    Merge,
}

#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub pages: usize,
    pub extracted: usize,
    pub merge: MergeSummary,
    pub stored: usize,
    pub warnings: Vec<MalformedRecord>,
}

/// Applies a chronologically ordered batch to the stored dataset and saves it.
/// An empty batch never wipes a stored dataset, even in replace mode.
pub fn store_batch(
    conn: &Connection,
    name: &str,
    batch: Vec<DrawRecord>,
    mode: UpdateMode,
) -> Result<(MergeSummary, usize)> {
    if mode == UpdateMode::Replace && batch.is_empty() && dataset_exists(conn, name)? {
        let stored = count_draws(conn, name)? as usize;
        warn!(dataset = name, stored, "no draws to store, keeping the stored dataset");
        return Ok((MergeSummary::default(), stored));
    }
    let mut dataset = match mode {
        UpdateMode::Replace => Dataset::new(),
        UpdateMode::Merge => match load_dataset(conn, name) {
            Ok(ds) => ds,
            Err(StoreError::NotFound { .. }) => Dataset::new(),
            Err(e) => return Err(e).context("无法读取现有数据"),
        },
    };
    let merge = dataset.merge(batch);
    let stored = save_dataset(conn, name, &dataset).context("无法保存数据")?;
    info!(dataset = name, added = merge.added, replaced = merge.replaced, stored, "dataset updated");
    Ok((merge, stored))
}

/// Fetches every page, extracts the draws and persists them. Pages are taken
/// oldest first. Any fetch failure aborts before the store is touched.
#[allow(clippy::too_many_arguments)]
pub fn run_update(
    fetcher: &dyn Fetcher,
    extractor: &Extractor,
    conn: &Connection,
    name: &str,
    urls: &[String],
    mode: UpdateMode,
    order: SourceOrder,
    pb: &ProgressBar,
) -> Result<UpdateSummary> {
    let mut documents = Vec::with_capacity(urls.len());
    for url in urls {
        pb.set_message(url.clone());
        let doc = fetcher.fetch(url)?;
        documents.push(doc);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut summary = UpdateSummary {
        pages: documents.len(),
        ..UpdateSummary::default()
    };
    let mut batch = Vec::new();
    for doc in &documents {
        let extraction = extractor.extract(doc);
        summary.warnings.extend(extraction.warnings);
        batch.extend(order.to_chronological(extraction.records));
    }
    summary.extracted = batch.len();

    let (merge, stored) = store_batch(conn, name, batch, mode)?;
    summary.merge = merge;
    summary.stored = stored;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MarkupLayout;
    use crate::fetch::FetchError;
    use marksix_db::db::{DEFAULT_DATASET, migrate};
    use std::collections::HashMap;

    struct StubFetcher {
        pages: HashMap<String, String>,
    }

    impl Fetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn draw_box(period: &str, first: u8) -> String {
        let zodiacs = ["鼠", "牛", "虎", "兔", "龙", "蛇", "马"];
        let balls: String = (0..7)
            .map(|i| format!(r#"<dt class="ball-red">{}</dt><dd>{}/火</dd>"#, first + i as u8, zodiacs[i]))
            .collect();
        format!(r#"<div class="kj-tit">第{period}期</div><div class="kj-box"><dl>{balls}</dl></div>"#)
    }

    fn stub(pages: &[(&str, Vec<String>)]) -> StubFetcher {
        StubFetcher {
            pages: pages
                .iter()
                .map(|(url, boxes)| (url.to_string(), format!("<html><body>{}</body></html>", boxes.concat())))
                .collect(),
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn periods(conn: &Connection) -> Vec<String> {
        load_dataset(conn, DEFAULT_DATASET)
            .unwrap()
            .records()
            .iter()
            .map(|r| r.period.clone())
            .collect()
    }

    fn update(fetcher: &StubFetcher, conn: &Connection, urls: &[&str], mode: UpdateMode) -> Result<UpdateSummary> {
        let extractor = Extractor::new(&MarkupLayout::default()).unwrap();
        let urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        run_update(
            fetcher,
            &extractor,
            conn,
            DEFAULT_DATASET,
            &urls,
            mode,
            SourceOrder::NewestFirst,
            &ProgressBar::hidden(),
        )
    }

    #[test]
    fn test_update_stores_oldest_first_across_pages() {
        let fetcher = stub(&[
            ("2023", vec![draw_box("2023002", 1), draw_box("2023001", 1)]),
            ("2024", vec![draw_box("2024002", 1), draw_box("2024001", 1)]),
        ]);
        let conn = memory_db();
        let summary = update(&fetcher, &conn, &["2023", "2024"], UpdateMode::Replace).unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.extracted, 4);
        assert_eq!(summary.stored, 4);
        assert!(summary.warnings.is_empty());
        assert_eq!(periods(&conn), vec!["2023001", "2023002", "2024001", "2024002"]);
    }

    #[test]
    fn test_update_keeps_warnings_and_valid_records() {
        let broken = r#"<div class="kj-tit">第2024003期</div><div class="kj-box"><dt class="ball-red">1</dt><dd>鼠</dd></div>"#;
        let fetcher = stub(&[("p", vec![broken.to_string(), draw_box("2024002", 1)])]);
        let conn = memory_db();
        let summary = update(&fetcher, &conn, &["p"], UpdateMode::Replace).unwrap();

        assert_eq!(summary.stored, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(periods(&conn), vec!["2024002"]);
    }

    #[test]
    fn test_fetch_error_leaves_store_untouched() {
        let conn = memory_db();
        let first = stub(&[("p", vec![draw_box("2024001", 1)])]);
        update(&first, &conn, &["p"], UpdateMode::Replace).unwrap();

        let err = update(&first, &conn, &["p", "missing"], UpdateMode::Replace).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FetchError>(),
            Some(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(periods(&conn), vec!["2024001"]);
    }

    #[test]
    fn test_replace_drops_previous_draws() {
        let conn = memory_db();
        update(&stub(&[("p", vec![draw_box("1", 1)])]), &conn, &["p"], UpdateMode::Replace).unwrap();
        update(&stub(&[("p", vec![draw_box("2", 1)])]), &conn, &["p"], UpdateMode::Replace).unwrap();
        assert_eq!(periods(&conn), vec!["2"]);
    }

    #[test]
    fn test_empty_page_keeps_stored_draws() {
        let conn = memory_db();
        update(&stub(&[("p", vec![draw_box("1", 1)])]), &conn, &["p"], UpdateMode::Replace).unwrap();

        let summary = update(&stub(&[("p", vec![])]), &conn, &["p"], UpdateMode::Replace).unwrap();
        assert_eq!(summary.extracted, 0);
        assert_eq!(summary.merge, MergeSummary::default());
        assert_eq!(summary.stored, 1);
        assert_eq!(periods(&conn), vec!["1"]);
    }

    #[test]
    fn test_merge_overwrites_by_period() {
        let conn = memory_db();
        update(&stub(&[("p", vec![draw_box("2", 1), draw_box("1", 1)])]), &conn, &["p"], UpdateMode::Merge).unwrap();

        let summary = update(
            &stub(&[("p", vec![draw_box("3", 1), draw_box("2", 20)])]),
            &conn,
            &["p"],
            UpdateMode::Merge,
        )
        .unwrap();

        assert_eq!(summary.merge, MergeSummary { added: 1, replaced: 1 });
        assert_eq!(periods(&conn), vec!["1", "2", "3"]);
        let ds = load_dataset(&conn, DEFAULT_DATASET).unwrap();
        assert_eq!(ds.records()[1].numbers[0], 20);
    }
}
