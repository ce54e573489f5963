use std::collections::BTreeMap;

use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use marksix_db::models::{DrawRecord, Zodiac};

use crate::analysis::frequency::FrequencyReport;
use crate::analysis::special::SpecialReport;
use crate::analysis::wager::SimulationReport;
use crate::analysis::{PairCount, ZodiacCounts};
use crate::import::ImportResult;
use crate::update::UpdateSummary;

const BAR_WIDTH: u32 = 30;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn bar(count: u32, max: u32) -> String {
    if max == 0 {
        return String::new();
    }
    let width = (count * BAR_WIDTH).div_ceil(max);
    "█".repeat(width as usize)
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn join_zodiacs(zodiacs: &[Zodiac]) -> String {
    zodiacs.iter().map(|z| z.label()).collect::<Vec<_>>().join(" ")
}

/// `first_row` is the 1-based position of `records[0]` in the whole dataset.
pub fn display_draws(records: &[DrawRecord], first_row: usize) {
    if records.is_empty() {
        println!("没有可显示的开奖记录。");
        return;
    }

    let mut table = new_table(vec!["#", "期数", "正码", "特码", "生肖", "特肖"]);
    for (i, r) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new(first_row + i),
            Cell::new(&r.period),
            Cell::new(join_numbers(&r.numbers[..6])),
            Cell::new(format!("{:2}", r.special_number())).fg(Color::Red),
            Cell::new(join_zodiacs(&r.zodiacs[..6])),
            Cell::new(r.special_zodiac().label()).fg(Color::Red),
        ]);
    }
    println!("{table}");
}

fn number_table(counts: &BTreeMap<u8, u32>) -> Table {
    let max = counts.values().copied().max().unwrap_or(0);
    let mut table = new_table(vec!["号码", "次数", ""]);
    for (n, c) in counts {
        table.add_row(vec![format!("{:2}", n), c.to_string(), bar(*c, max)]);
    }
    table
}

fn zodiac_table(counts: &ZodiacCounts) -> Table {
    let max = counts.max();
    let mut table = new_table(vec!["生肖", "次数", ""]);
    for (z, c) in counts.iter() {
        table.add_row(vec![z.label().to_string(), c.to_string(), bar(c, max)]);
    }
    table
}

fn pair_table<T>(pairs: &[PairCount<T>], label: impl Fn(&T) -> String) -> Table {
    let mut table = new_table(vec!["#", "组合", "次数"]);
    for (i, p) in pairs.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            format!("{} + {}", label(&p.pair.0), label(&p.pair.1)),
            p.count.to_string(),
        ]);
    }
    table
}

pub fn display_frequency(report: &FrequencyReport) {
    println!("\n📊 普通分析 (共 {} 期)\n", report.draws);

    println!("── 号码出现次数 ──");
    println!("{}", number_table(&report.number_counts));

    println!("\n── 生肖出现次数 ──");
    println!("{}", zodiac_table(&report.zodiac_counts));

    println!("\n── 最常出现的号码组合 ──");
    println!("{}", pair_table(&report.top_number_pairs, |n| format!("{:2}", n)));

    println!("\n── 最常出现的生肖组合 ──");
    println!("{}", pair_table(&report.top_zodiac_pairs, |z| z.label().to_string()));
}

pub fn display_special(report: &SpecialReport) {
    println!("\n🎯 特码分析 (共 {} 期)\n", report.draws);

    println!("── 特码出现次数 ──");
    println!("{}", number_table(&report.number_counts));

    println!("\n── 特肖出现次数 ──");
    println!("{}", zodiac_table(&report.zodiac_counts));
}

fn signed(value: i64) -> Cell {
    let color = if value > 0 {
        Color::Green
    } else if value < 0 {
        Color::Red
    } else {
        Color::White
    };
    Cell::new(value).fg(color)
}

pub fn display_simulation(report: &SimulationReport) {
    println!("\n🎲 组合猜码分析 (共 {} 期)\n", report.draws);

    let mut table = new_table(vec!["类型", "选择", "下注", "赔率", "中奖次数", "下注总额", "中奖总额", "收益"]);
    for o in &report.outcomes {
        let kind = match o.group {
            Some(g) => format!("{} #{}", o.kind, g),
            None => o.kind.to_string(),
        };
        table.add_row(vec![
            Cell::new(kind),
            Cell::new(o.picks.join(" ")),
            Cell::new(o.stake.bet_amount),
            Cell::new(o.stake.odds),
            Cell::new(format!("{}/{}", o.wins, o.draws)),
            Cell::new(o.total_bet),
            Cell::new(o.total_win),
            signed(o.net()),
        ]);
    }
    println!("{table}");

    for o in &report.outcomes {
        println!(
            "{} - 组合 {} - 下注总金额: {} 元, 总中奖次数: {} 次, 总中奖金额: {} 元",
            o.kind,
            o.picks.join(" "),
            o.total_bet,
            o.wins,
            o.total_win
        );
    }
    println!(
        "\n下注总金额: {} 元, 总中奖金额: {} 元, 最终收益: {} 元",
        report.total_bet, report.total_win, report.net_profit
    );
}

pub fn display_update_summary(summary: &UpdateSummary) {
    println!("更新完成 :");
    println!("  页面数     : {}", summary.pages);
    println!("  提取记录   : {}", summary.extracted);
    println!("  新增       : {}", summary.merge.added);
    println!("  覆盖       : {}", summary.merge.replaced);
    println!("  当前总期数 : {}", summary.stored);
    if !summary.warnings.is_empty() {
        println!("  跳过       : {}", summary.warnings.len());
        for w in &summary.warnings {
            println!("    - {w}");
        }
    }
}

pub fn display_import_summary(result: &ImportResult) {
    println!("导入完成 :");
    println!("  读取行数   : {}", result.total_records);
    println!("  有效记录   : {}", result.imported);
    println!("  新增       : {}", result.merge.added);
    println!("  覆盖       : {}", result.merge.replaced);
    println!("  当前总期数 : {}", result.stored);
    if result.errors > 0 {
        println!("  错误       : {}", result.errors);
    }
}
