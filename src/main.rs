use std::path::PathBuf;
use std::sync::OnceLock;
use clap::{Parser, ValueEnum, ColorChoice, ArgAction, CommandFactory};
use clap_complete::Shell;
use comfy_table::{Table, ContentArrangement};
use serde::{Deserialize, Serialize};
use is_terminal::IsTerminal;
mod board;
mod cell;
mod dataset;
mod html;
mod markdown;
mod source;
mod view;

use board::Board;
use dataset::{ViewOptions, DEFAULT_RETENTION_DAYS, DEFAULT_TIMESTAMP_COLUMN, MAX_RETENTION_DAYS};
use source::{Source, DEFAULT_SOURCE_URL};
use view::TableView;

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

const DEFAULT_TITLE: &str = "Candidates";
const DEFAULT_DOWNLOAD_LABEL: &str = "Download full candidates list here";
const DEFAULT_INTRO: [&str; 4] = [
    "Recently, an increasing number of people have sought my assistance in job hunting. However, aiding each person individually is highly inefficient. Consequently, I have established this page for both recruiters and candidates with whom I communicate. This initiative aims to conserve time for all parties involved and to offer a comprehensive list of all candidates in a single location.",
    "The page is automatically generated based on the requests made to me.",
    "To add yourself in the list, please connect with me on [Linkedin](https://www.linkedin.com/in/creotiv/) and i will send you the link to the form.",
    "**By utilizing the data in this list, you agree to send hiring or role acceptance bonuses as donation to the [Ukraine Animal Help Fund](https://uah.fund/donate) to help homeless animals**",
];
const DEFAULT_HTML_PATH: &str = "index.html";
const DEFAULT_CELL_WIDTH: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFmt { Text, Json, None }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SortOrder { Asc, Desc }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Theme { Dark, Light }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "SheetView",
    about = "Render a published spreadsheet CSV as a searchable, sortable HTML table",
    long_about = "Fetches a published spreadsheet export (CSV) once, shows newest rows first, drops stale rows, neutralizes hostile cell content and writes a self-contained HTML page with a search box and sortable columns.",
    after_long_help = "Examples:\n  SheetView\n  SheetView --source https://example.org/pub?output=csv --html board.html --no-open\n  SheetView --source export.csv --keep-stale --output text --filter rust --sort-by Name\n  SheetView --retention-days 30 --json-path board.json --md-path board.md",
    color = ColorChoice::Auto
)]
struct Args {
    /// CSV source: http(s) URL or local file path
    #[arg(long, short = 's')]
    source: Option<String>,
    #[arg(long, default_value_t = false, help = "Show cell values as-is (markup is still escaped)")]
    no_sanitize: bool,
    #[arg(long, default_value_t = false, help = "Keep rows older than the retention window")]
    keep_stale: bool,
    /// Days a row stays visible [default: 7]
    #[arg(long, short = 'r', value_parser = clap::value_parser!(i64).range(0..=MAX_RETENTION_DAYS))]
    retention_days: Option<i64>,
    #[arg(long)]
    timestamp_column: Option<String>,
    #[arg(long)]
    title: Option<String>,
    /// Intro paragraph shown above the table (repeatable). `[label](https://..)` and `**bold**` are
    /// rendered; pass an empty string to drop the default intro.
    #[arg(long)]
    intro: Vec<String>,
    #[arg(long)]
    download_label: Option<String>,
    #[arg(long)]
    html: Option<String>,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    md_path: Option<String>,
    /// Terminal output [default: text]
    #[arg(long, short = 'o', value_enum)]
    output: Option<OutputFmt>,
    /// Page theme [default: dark]
    #[arg(long, value_enum)]
    theme: Option<Theme>,
    /// Terminal preview: keep rows containing this text (case-insensitive)
    #[arg(long, short = 'f')]
    filter: Option<String>,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long, value_enum, default_value = "asc")]
    sort_order: SortOrder,
    #[arg(long, default_value_t = false)]
    no_truncate: bool,
    #[arg(long)]
    cell_width: Option<usize>,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long, default_value_t = false)]
    no_open: bool,
    #[arg(long, default_value_t = false, help = "Exit with status 1 when no rows survive loading")]
    fail_on_empty: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
    #[arg(long)]
    config: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            source: None,
            no_sanitize: false,
            keep_stale: false,
            retention_days: None,
            timestamp_column: None,
            title: None,
            intro: vec![],
            download_label: None,
            html: None,
            json_path: None,
            md_path: None,
            output: None,
            theme: None,
            filter: None,
            sort_by: None,
            sort_order: SortOrder::Asc,
            no_truncate: false,
            cell_width: None,
            no_color: false,
            force_color: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            progress: false,
            no_open: false,
            fail_on_empty: false,
            completions: None,
            completions_out: None,
            config: None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AppConfig {
    source: Option<String>,
    sanitize_cells: Option<bool>,
    filter_stale_rows: Option<bool>,
    retention_days: Option<i64>,
    timestamp_column: Option<String>,
    title: Option<String>,
    intro: Option<Vec<String>>,
    download_label: Option<String>,
    theme: Option<Theme>,
    html: Option<String>,
    json_path: Option<String>,
    md_path: Option<String>,
    output: Option<OutputFmt>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
    no_truncate: Option<bool>,
    cell_width: Option<usize>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "SheetView", &mut f); } else { clap_complete::generate(sh, &mut cmd, "SheetView", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "SheetView", &mut std::io::stdout());
        }
        return;
    }
    let cfg_result = load_config(args.config.as_deref())
        .map(|found| found.map(|(path, cfg)| { let notes = apply_config(&mut args, cfg); (path, notes) }));
    init_logging(&args);
    match cfg_result {
        Ok(Some((path, notes))) => {
            log::info!("Using config {}", path);
            for n in notes { log::warn!("{}: {}", path, n); }
        }
        Ok(None) => {}
        Err(e) => log::warn!("Ignoring config: {:#}", e),
    }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let source = Source::parse(args.source.as_deref().unwrap_or(DEFAULT_SOURCE_URL));
    let board = Board::new(source, view_options(&args));
    log::debug!("View options: {:?}", board.options());
    let loaded = {
        let pb = if args.progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
        if let Some(ref pb) = pb {
            pb.set_message(format!("Fetching {}", board.source()));
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
        }
        let l = board.load();
        if let Some(pb) = pb { pb.finish_and_clear(); }
        l
    };

    let mut write_failed = false;
    let title = args.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let intro = intro_paragraphs(&args);
    let page = html::PageText {
        title: &title,
        intro: &intro,
        download_label: args.download_label.as_deref().unwrap_or(DEFAULT_DOWNLOAD_LABEL),
    };
    let html_path = args.html.clone().unwrap_or_else(|| DEFAULT_HTML_PATH.to_string());
    match std::fs::write(&html_path, html::render_html(&board, &page, args.theme.unwrap_or(Theme::Dark))) {
        Ok(_) => {
            if !args.no_open { open_file_default(PathBuf::from(&html_path)); }
            if !args.quiet { println!("{}", paint(&format!("HTML generated: {}", html_path), "1;36")); }
        }
        Err(e) => { log::error!("HTML write failed for {}: {}", html_path, e); write_failed = true; }
    }
    match args.output.unwrap_or(OutputFmt::Text) {
        OutputFmt::Text => { if !args.quiet { print_text_table(&board, &args); } }
        OutputFmt::Json => {
            if args.json_path.is_none() { println!("{}", serde_json::to_string_pretty(&json_document(&board)).unwrap_or_default()); }
        }
        OutputFmt::None => {}
    }
    if let Some(p) = args.json_path.as_ref() {
        if let Err(e) = write_json(p, &board) { log::error!("JSON write failed for {}: {:#}", p, e); write_failed = true; } else if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); }
    }
    if let Some(p) = args.md_path.as_ref() {
        let md = markdown::render_markdown(&board, &title);
        match std::fs::write(p, md) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("Markdown written: {}", p), "1;36")); } }
            Err(e) => { log::error!("Markdown write failed for {}: {}", p, e); write_failed = true; }
        }
    }
    if write_failed { std::process::exit(2); }
    if args.fail_on_empty && loaded.dataset.is_empty() {
        log::error!("No rows to show from {}", board.source());
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = args.log_level {
        let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
        builder.filter_level(f);
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    match args.log_format {
        Some(LogFormat::Json) => {
            builder.format(|buf, record| {
                use std::io::Write;
                let obj = serde_json::json!({
                    "ts": chrono::Local::now().to_rfc3339(),
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "msg": record.args().to_string(),
                });
                writeln!(buf, "{}", obj)
            });
        }
        Some(LogFormat::Text) => {
            builder.format(|buf, record| {
                use std::io::Write;
                writeln!(buf, "[{:<5} {}] {}", record.level(), chrono::Local::now().format("%H:%M:%S"), record.args())
            });
        }
        None => {}
    }
    if let Some(path) = args.log_path.as_ref() {
        match std::fs::File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => { eprintln!("Failed to open log file {}: {}", path, e); }
        }
    }
    builder.init();
}

/// Explicit `--config` path, else `SheetView.toml` in the working directory if present.
fn load_config(explicit: Option<&str>) -> anyhow::Result<Option<(String, AppConfig)>> {
    use anyhow::Context;
    let path = match explicit {
        Some(p) => p.to_string(),
        None => {
            let def = "SheetView.toml";
            if !std::path::Path::new(def).exists() { return Ok(None); }
            def.to_string()
        }
    };
    let s = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let cfg = toml::from_str::<AppConfig>(&s).with_context(|| format!("parsing {}", path))?;
    Ok(Some((path, cfg)))
}

/// Command-line flags win over file values; file values win over built-in defaults.
/// Returns the values that were rejected, to be logged once logging is up.
fn apply_config(args: &mut Args, cfg: AppConfig) -> Vec<String> {
    let mut notes = Vec::new();
    if args.source.is_none() && let Some(v) = cfg.source { args.source = Some(v); }
    if !args.no_sanitize && let Some(v) = cfg.sanitize_cells { args.no_sanitize = !v; }
    if !args.keep_stale && let Some(v) = cfg.filter_stale_rows { args.keep_stale = !v; }
    if args.retention_days.is_none() && let Some(v) = cfg.retention_days {
        if (0..=MAX_RETENTION_DAYS).contains(&v) { args.retention_days = Some(v); } else { notes.push(format!("ignoring retention_days {} (allowed 0..={})", v, MAX_RETENTION_DAYS)); }
    }
    if args.timestamp_column.is_none() && let Some(v) = cfg.timestamp_column { args.timestamp_column = Some(v); }
    if args.title.is_none() && let Some(v) = cfg.title { args.title = Some(v); }
    if args.intro.is_empty() && let Some(v) = cfg.intro { args.intro = v; }
    if args.download_label.is_none() && let Some(v) = cfg.download_label { args.download_label = Some(v); }
    if args.theme.is_none() && let Some(v) = cfg.theme { args.theme = Some(v); }
    if args.html.is_none() && let Some(v) = cfg.html { args.html = Some(v); }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.md_path.is_none() && let Some(v) = cfg.md_path { args.md_path = Some(v); }
    if args.output.is_none() && let Some(v) = cfg.output { args.output = Some(v); }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
    if !args.no_truncate && let Some(v) = cfg.no_truncate { args.no_truncate = v; }
    if args.cell_width.is_none() && let Some(v) = cfg.cell_width { args.cell_width = Some(v); }
    notes
}

fn intro_paragraphs(args: &Args) -> Vec<String> {
    if args.intro.is_empty() { return DEFAULT_INTRO.iter().map(|p| p.to_string()).collect(); }
    args.intro.iter().filter(|p| !p.trim().is_empty()).cloned().collect()
}

fn view_options(args: &Args) -> ViewOptions {
    ViewOptions {
        sanitize_cells: !args.no_sanitize,
        filter_stale_rows: !args.keep_stale,
        retention_days: args.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
        timestamp_column: args.timestamp_column.clone().unwrap_or_else(|| DEFAULT_TIMESTAMP_COLUMN.to_string()),
    }
}

fn print_text_table(board: &Board, args: &Args) {
    let Some(loaded) = board.loaded() else { return; };
    let mut view = TableView::new(&loaded.dataset, &loaded.columns);
    if let Some(q) = args.filter.as_ref() { view.set_filter(q); }
    if let Some(col) = args.sort_by.as_ref() {
        match view.column_index(col) {
            Some(i) => {
                let clicks = match args.sort_order { SortOrder::Asc => 1, SortOrder::Desc => 2 };
                for _ in 0..clicks { view.toggle_sort(i); }
            }
            None => log::warn!("Unknown sort column {:?}; available: {}", col, loaded.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")),
        }
    }
    let width = args.cell_width.unwrap_or(DEFAULT_CELL_WIDTH);
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let hdr: Vec<String> = view.columns().iter().enumerate()
        .map(|(i, c)| paint(&format!("{}{}", c.name, view.sort_state(i).indicator()), "1"))
        .collect();
    table.set_header(hdr);
    let rows = view.rows();
    for r in &rows {
        let row: Vec<String> = view.columns().iter().map(|c| {
            let shown = board.render(c, r);
            let text = shown.plain().replace('\n', " ");
            if args.no_truncate { text } else { truncate(&text, width) }
        }).collect();
        table.add_row(row);
    }
    println!("{}", paint(&format!("Source: {}", board.source()), "1;36"));
    if loaded.columns.is_empty() {
        println!("{}", paint("(no data)", "2"));
        return;
    }
    println!("{}", table);
    println!("{} {} of {}", paint("Rows:", "1"), rows.len(), loaded.dataset.len());
}

fn json_document(board: &Board) -> serde_json::Value {
    let Some(loaded) = board.loaded() else { return serde_json::Value::Null; };
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = loaded.dataset.records.iter().map(|r| {
        loaded.columns.iter()
            .map(|c| (c.name.clone(), serde_json::to_value(board.render(c, r)).unwrap_or_default()))
            .collect()
    }).collect();
    serde_json::json!({
        "source": board.source().link_target(),
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "columns": loaded.columns,
        "rows": rows,
    })
}

fn write_json(path: &str, board: &Board) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(&json_document(board))?;
    std::fs::write(path, data)?;
    Ok(())
}

fn truncate(s: &str, n: usize) -> String {
    let mut out: String = s.chars().take(n).collect();
    if s.chars().count() > n { out.push_str("..."); }
    out
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(target_os = "windows")]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("cmd").args(["/C", "start", "", &s]).spawn()
        .map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(target_os = "macos")]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("xdg-open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}
