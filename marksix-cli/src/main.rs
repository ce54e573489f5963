mod analysis;
mod config;
mod display;
mod extract;
mod fetch;
mod import;
mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use marksix_db::dataset::{Dataset, Selection};
use marksix_db::db::{StoreError, load_dataset, migrate, open_db};
use marksix_db::rusqlite::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analysis::wager::GuessSpec;
use crate::analysis::{AnalysisMode, AnalysisOutput, AnalysisRequest, run_analysis};
use crate::config::{AppConfig, ConfigError};
use crate::display::{
    display_draws, display_frequency, display_import_summary, display_simulation, display_special,
    display_update_summary,
};
use crate::extract::{Extractor, MarkupLayout};
use crate::fetch::{HttpFetcher, source_urls};
use crate::update::{UpdateMode, run_update};

#[derive(Parser)]
#[command(name = "marksix", about = "六合彩开奖记录采集与分析")]
struct Cli {
    /// SQLite 数据库路径
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// 数据集名称
    #[arg(long, global = true)]
    dataset: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 从网站获取开奖记录并保存
    Update {
        /// 年份，可重复 (默认今年)
        #[arg(short, long)]
        year: Vec<i32>,

        /// 开奖页面地址，可包含 {year}
        #[arg(long)]
        url: Option<String>,

        /// 与已有数据合并而不是替换
        #[arg(long)]
        merge: bool,
    },

    /// 从 CSV 文件导入开奖记录
    Import {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        merge: bool,
    },

    /// 导出开奖记录到 CSV 文件
    Export {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// 显示原始数据
    List {
        /// 起始行 (从最早一期开始计数)
        #[arg(long)]
        oldest: Option<usize>,

        /// 结束行
        #[arg(long)]
        newest: Option<usize>,
    },

    /// 分析选定范围的开奖记录
    Analyze {
        #[arg(short, long, value_enum, default_value_t = AnalysisMode::Plain)]
        mode: AnalysisMode,

        #[arg(long)]
        oldest: Option<usize>,

        #[arg(long)]
        newest: Option<usize>,

        /// 猜码，格式 类型:选择[:下注[:赔率]]，如 5不中:1,2,3,4,5 或 中二肖:鼠牛;虎兔:20:5
        #[arg(short, long)]
        guess: Vec<GuessSpec>,

        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,
    },

    /// 显示数据库路径
    DbPath,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    init_tracing(&config.log_level);
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(dataset) = cli.dataset {
        config.dataset = dataset;
    }

    if let Command::DbPath = cli.command {
        println!("{}", config.db_path.display());
        return Ok(());
    }

    let conn = open_db(&config.db_path).with_context(|| format!("无法打开数据库 {:?}", config.db_path))?;
    migrate(&conn)?;

    match cli.command {
        Command::Update { year, url, merge } => cmd_update(&conn, &config, &year, url, mode_of(merge)),
        Command::Import { file, merge } => cmd_import(&conn, &config, &file, mode_of(merge)),
        Command::Export { file } => cmd_export(&conn, &config, &file),
        Command::List { oldest, newest } => cmd_list(&conn, &config, oldest, newest),
        Command::Analyze {
            mode,
            oldest,
            newest,
            guess,
            json,
        } => cmd_analyze(&conn, &config, mode, oldest, newest, guess, json),
        Command::DbPath => Ok(()),
    }
}

fn mode_of(merge: bool) -> UpdateMode {
    if merge { UpdateMode::Merge } else { UpdateMode::Replace }
}

/// `None` when the dataset has never been stored; the hint is already printed.
fn load_or_hint(conn: &Connection, config: &AppConfig) -> Result<Option<Dataset>> {
    match load_dataset(conn, &config.dataset) {
        Ok(ds) if !ds.is_empty() => Ok(Some(ds)),
        Ok(_) | Err(StoreError::NotFound { .. }) => {
            println!("没有数据，请先运行 : marksix update");
            Ok(None)
        }
        Err(e) => Err(e).context("无法读取数据"),
    }
}

fn cmd_update(conn: &Connection, config: &AppConfig, years: &[i32], url: Option<String>, mode: UpdateMode) -> Result<()> {
    let template = url
        .or_else(|| config.source.url_template.clone())
        .ok_or(ConfigError::NoSource)?;
    let urls = source_urls(&template, years);

    let fetcher = HttpFetcher::new(&config.source.user_agent, config.source.timeout)
        .context("无法创建 HTTP 客户端")?;
    let extractor = Extractor::new(&MarkupLayout::default())?;

    let pb = if urls.len() > 1 {
        let pb = ProgressBar::new(urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let summary = run_update(
        &fetcher,
        &extractor,
        conn,
        &config.dataset,
        &urls,
        mode,
        config.source.order,
        &pb,
    )?;
    display_update_summary(&summary);
    Ok(())
}

fn cmd_import(conn: &Connection, config: &AppConfig, file: &Path, mode: UpdateMode) -> Result<()> {
    let result = import::import_csv(conn, &config.dataset, file, mode)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_export(conn: &Connection, config: &AppConfig, file: &Path) -> Result<()> {
    let Some(dataset) = load_or_hint(conn, config)? else {
        return Ok(());
    };
    let n = import::export_csv(&dataset, file)?;
    info!(rows = n, path = %file.display(), "exported");
    println!("已导出 {} 期到 {}", n, file.display());
    Ok(())
}

fn cmd_list(conn: &Connection, config: &AppConfig, oldest: Option<usize>, newest: Option<usize>) -> Result<()> {
    let Some(dataset) = load_or_hint(conn, config)? else {
        return Ok(());
    };
    let selection = Selection::resolve(oldest, newest, dataset.len());
    let records = dataset.select(selection)?;
    display_draws(records, selection.oldest);
    Ok(())
}

fn cmd_analyze(
    conn: &Connection,
    config: &AppConfig,
    mode: AnalysisMode,
    oldest: Option<usize>,
    newest: Option<usize>,
    guesses: Vec<GuessSpec>,
    json: bool,
) -> Result<()> {
    let Some(dataset) = load_or_hint(conn, config)? else {
        return Ok(());
    };
    let request = AnalysisRequest {
        selection: Selection::resolve(oldest, newest, dataset.len()),
        mode,
        guesses,
    };
    let output = run_analysis(&dataset, &request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    match &output {
        AnalysisOutput::Plain(report) => display_frequency(report),
        AnalysisOutput::Special(report) => display_special(report),
        AnalysisOutput::Wager(report) => display_simulation(report),
    }
    Ok(())
}
