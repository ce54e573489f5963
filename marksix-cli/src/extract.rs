use marksix_db::models::{BALLS_PER_DRAW, DrawRecord, RecordError, Zodiac};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

/// Where the draw data sits in a results page.
#[derive(Debug, Clone)]
pub struct MarkupLayout {
    /// One container per draw.
    pub draw_box: String,
    /// Heading placed right before each container; carries the period.
    pub title: String,
    /// Ball elements. The colour classes are presentational only.
    pub ball: String,
    /// First element of this kind after a ball holds "生肖/五行".
    pub zodiac: String,
    pub period_prefix: String,
    pub period_suffix: String,
}

impl Default for MarkupLayout {
    fn default() -> Self {
        Self {
            draw_box: "div.kj-box".into(),
            title: "div.kj-tit".into(),
            ball: "dt.ball-green, dt.ball-blue, dt.ball-red".into(),
            zodiac: "dd".into(),
            period_prefix: "第".into(),
            period_suffix: "期".into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("无效的选择器 '{selector}' : {reason}")]
pub struct LayoutError {
    pub selector: String,
    pub reason: String,
}

/// A draw box that could not be turned into a record. The box is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("第 {index} 个开奖框前没有期数标题")]
    MissingTitle { index: usize },
    #[error("第 {index} 个开奖框的标题无法解析期数 : '{title}'")]
    BadTitle { index: usize, title: String },
    #[error("数据提取错误: 期数 {period} 有 {numbers} 个号码和 {zodiacs} 个生肖")]
    WrongCount {
        period: String,
        numbers: usize,
        zodiacs: usize,
    },
    #[error("期数 {period} 的号码无法解析 : '{text}'")]
    BadNumber { period: String, text: String },
    #[error("期数 {period} : {source}")]
    Invalid { period: String, source: RecordError },
}

#[derive(Debug, Default)]
pub struct Extraction {
    /// Document order.
    pub records: Vec<DrawRecord>,
    pub warnings: Vec<MalformedRecord>,
}

pub struct Extractor {
    draw_box: Selector,
    title: Selector,
    ball: Selector,
    zodiac: Selector,
    period_prefix: String,
    period_suffix: String,
}

impl Extractor {
    pub fn new(layout: &MarkupLayout) -> Result<Self, LayoutError> {
        Ok(Self {
            draw_box: parse_selector(&layout.draw_box)?,
            title: parse_selector(&layout.title)?,
            ball: parse_selector(&layout.ball)?,
            zodiac: parse_selector(&layout.zodiac)?,
            period_prefix: layout.period_prefix.clone(),
            period_suffix: layout.period_suffix.clone(),
        })
    }

    pub fn extract(&self, document: &str) -> Extraction {
        let doc = Html::parse_document(document);
        let mut out = Extraction::default();

        for (i, draw_box) in doc.select(&self.draw_box).enumerate() {
            match self.extract_box(i + 1, draw_box) {
                Ok(record) => out.records.push(record),
                Err(w) => {
                    warn!("{w}");
                    out.warnings.push(w);
                }
            }
        }

        debug!(records = out.records.len(), warnings = out.warnings.len(), "page extracted");
        out
    }

    fn extract_box(&self, index: usize, draw_box: ElementRef<'_>) -> Result<DrawRecord, MalformedRecord> {
        let title = draw_box
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| self.title.matches(e))
            .ok_or(MalformedRecord::MissingTitle { index })?;
        let title_text = element_text(title);
        let period = self
            .parse_period(&title_text)
            .ok_or_else(|| MalformedRecord::BadTitle {
                index,
                title: title_text.clone(),
            })?;

        // Every element of the box in document order, so that each ball can
        // be paired with the next zodiac element after it.
        let elements: Vec<ElementRef<'_>> = draw_box.descendants().filter_map(ElementRef::wrap).collect();
        let mut numbers = Vec::with_capacity(BALLS_PER_DRAW);
        let mut zodiacs = Vec::with_capacity(BALLS_PER_DRAW);
        for (pos, el) in elements.iter().enumerate() {
            if !self.ball.matches(el) {
                continue;
            }
            numbers.push(element_text(*el));
            if let Some(dd) = elements[pos + 1..].iter().find(|e| self.zodiac.matches(e)) {
                let text = element_text(*dd);
                let label = text.split('/').next().unwrap_or_default().trim().to_string();
                zodiacs.push(label);
            }
        }

        if numbers.len() != BALLS_PER_DRAW || zodiacs.len() != BALLS_PER_DRAW {
            return Err(MalformedRecord::WrongCount {
                period,
                numbers: numbers.len(),
                zodiacs: zodiacs.len(),
            });
        }

        let mut parsed_numbers = [0u8; BALLS_PER_DRAW];
        for (slot, text) in parsed_numbers.iter_mut().zip(&numbers) {
            *slot = text.parse().map_err(|_| MalformedRecord::BadNumber {
                period: period.clone(),
                text: text.clone(),
            })?;
        }

        let mut parsed_zodiacs = [Zodiac::Rat; BALLS_PER_DRAW];
        for (slot, label) in parsed_zodiacs.iter_mut().zip(&zodiacs) {
            *slot = label.parse().map_err(|source| MalformedRecord::Invalid {
                period: period.clone(),
                source,
            })?;
        }

        DrawRecord::new(period.clone(), parsed_numbers, parsed_zodiacs)
            .map_err(|source| MalformedRecord::Invalid { period, source })
    }

    /// Text between the prefix and the next suffix, e.g. "第123期" gives "123".
    fn parse_period(&self, title: &str) -> Option<String> {
        let (_, rest) = title.split_once(self.period_prefix.as_str())?;
        let (period, _) = rest.split_once(self.period_suffix.as_str())?;
        let period = period.trim();
        (!period.is_empty()).then(|| period.to_string())
    }
}

fn parse_selector(css: &str) -> Result<Selector, LayoutError> {
    Selector::parse(css).map_err(|e| LayoutError {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(n: &str, colour: &str, zodiac: &str) -> String {
        format!(r#"<dl><dt class="ball-{colour}">{n}</dt><dd>{zodiac}/金</dd></dl>"#)
    }

    fn draw_box(period: &str, balls: &[(&str, &str)]) -> String {
        let colours = ["red", "blue", "green"];
        let inner: String = balls
            .iter()
            .enumerate()
            .map(|(i, (n, z))| ball(n, colours[i % 3], z))
            .collect();
        format!(r#"<div class="kj-tit">澳门六合彩 第{period}期 开奖结果</div><div class="kj-box">{inner}</div>"#)
    }

    fn page(boxes: &[String]) -> String {
        format!("<html><body><div class=\"list\">{}</div></body></html>", boxes.concat())
    }

    const FULL: [(&str, &str); 7] = [
        ("01", "鼠"),
        ("12", "牛"),
        ("23", "虎"),
        ("34", "兔"),
        ("45", "龙"),
        ("06", "蛇"),
        ("17", "马"),
    ];

    fn extractor() -> Extractor {
        Extractor::new(&MarkupLayout::default()).unwrap()
    }

    #[test]
    fn test_extract_well_formed_boxes_in_document_order() {
        let html = page(&[draw_box("2024300", &FULL), draw_box("2024299", &FULL)]);
        let out = extractor().extract(&html);

        assert!(out.warnings.is_empty());
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].period, "2024300");
        assert_eq!(out.records[1].period, "2024299");
        assert_eq!(out.records[0].numbers, [1, 12, 23, 34, 45, 6, 17]);
        assert_eq!(
            out.records[0].zodiacs,
            [Zodiac::Rat, Zodiac::Ox, Zodiac::Tiger, Zodiac::Rabbit, Zodiac::Dragon, Zodiac::Snake, Zodiac::Horse]
        );
    }

    #[test]
    fn test_short_box_is_reported_not_stored() {
        let html = page(&[
            draw_box("2024300", &FULL),
            draw_box("2024299", &FULL[..6]),
            draw_box("2024298", &FULL),
        ]);
        let out = extractor().extract(&html);

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[1].period, "2024298");
        assert_eq!(
            out.warnings,
            vec![MalformedRecord::WrongCount {
                period: "2024299".into(),
                numbers: 6,
                zodiacs: 6,
            }]
        );
        assert!(out.records.iter().all(|r| r.numbers.len() == 7 && r.zodiacs.len() == 7));
    }

    #[test]
    fn test_ball_without_zodiac_is_reported() {
        let mut inner: String = FULL.iter().take(6).map(|(n, z)| ball(n, "red", z)).collect();
        inner.push_str(r#"<dl><dt class="ball-blue">49</dt></dl>"#);
        let html = page(&[format!(r#"<div class="kj-tit">第007期</div><div class="kj-box">{inner}</div>"#)]);
        let out = extractor().extract(&html);

        assert!(out.records.is_empty());
        assert_eq!(
            out.warnings,
            vec![MalformedRecord::WrongCount {
                period: "007".into(),
                numbers: 7,
                zodiacs: 6,
            }]
        );
    }

    #[test]
    fn test_other_ball_classes_are_ignored() {
        let mut balls = draw_box("100", &FULL);
        balls = balls.replace("</div><div class=\"kj-box\">", "</div><div class=\"kj-box\"><dt class=\"ball-gray\">99</dt>");
        let out = extractor().extract(&page(&[balls]));
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn test_bad_title_and_missing_title() {
        let no_markers = r#"<div class="kj-tit">最新开奖</div><div class="kj-box"></div>"#.to_string();
        let no_title = r#"<div class="kj-box"></div>"#.to_string();
        let out = extractor().extract(&page(&[no_title, no_markers]));

        assert!(out.records.is_empty());
        assert_eq!(out.warnings[0], MalformedRecord::MissingTitle { index: 1 });
        assert_eq!(
            out.warnings[1],
            MalformedRecord::BadTitle {
                index: 2,
                title: "最新开奖".into(),
            }
        );
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let mut bad_number = FULL;
        bad_number[2] = ("2x", "虎");
        let mut bad_zodiac = FULL;
        bad_zodiac[3] = ("34", "猫");
        let mut out_of_range = FULL;
        out_of_range[6] = ("50", "马");

        let html = page(&[
            draw_box("1", &bad_number),
            draw_box("2", &bad_zodiac),
            draw_box("3", &out_of_range),
        ]);
        let out = extractor().extract(&html);

        assert!(out.records.is_empty());
        assert_eq!(
            out.warnings[0],
            MalformedRecord::BadNumber {
                period: "1".into(),
                text: "2x".into(),
            }
        );
        assert_eq!(
            out.warnings[1],
            MalformedRecord::Invalid {
                period: "2".into(),
                source: RecordError::UnknownZodiac("猫".into()),
            }
        );
        assert_eq!(
            out.warnings[2],
            MalformedRecord::Invalid {
                period: "3".into(),
                source: RecordError::NumberOutOfRange(50),
            }
        );
    }

    #[test]
    fn test_custom_layout() {
        let layout = MarkupLayout {
            draw_box: "section.draw".into(),
            title: "h3".into(),
            ball: "span.ball".into(),
            zodiac: "em".into(),
            period_prefix: "Draw ".into(),
            period_suffix: ":".into(),
        };
        let balls: String = FULL
            .iter()
            .map(|(n, z)| format!(r#"<span class="ball">{n}</span><em>{z}</em>"#))
            .collect();
        let html = format!("<h3>Draw 24/001: results</h3><section class=\"draw\">{balls}</section>");
        let out = Extractor::new(&layout).unwrap().extract(&html);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].period, "24/001");
    }

    #[test]
    fn test_invalid_selector() {
        let layout = MarkupLayout {
            ball: "dt[".into(),
            ..MarkupLayout::default()
        };
        assert!(Extractor::new(&layout).is_err());
    }
}
