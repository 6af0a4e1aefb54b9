//! Search binary entry point.
//!
//! Greps the local paper database by keyword. Supports single-query and
//! interactive REPL modes, with plain (highlighted), table or JSON output.
//!
//! # Examples
//!
//! Papers mentioning both keywords, with abstracts:
//! ```bash
//! search -k rowhammer,mitigation --abstracts
//! ```
//!
//! Stem matching, JSON output, recent years only:
//! ```bash
//! search -k "exploiting" --fuzzy --format json --year-start 2020
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::{Color as KeywordColor, Colorize};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use confgrep::{
    models::{join_authors, Paper},
    query::{KeywordSearchEngine, SearchEngine, SearchQuery},
    storage::{sqlite::SqliteStorage, PaperStorage, YearRange},
};
use regex::{Regex, RegexBuilder};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::IsTerminal;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Highlight color per keyword position; later keywords reuse the last one.
const KEYWORD_PALETTE: [KeywordColor; 6] = [
    KeywordColor::BrightRed,
    KeywordColor::BrightGreen,
    KeywordColor::BrightYellow,
    KeywordColor::BrightBlue,
    KeywordColor::BrightMagenta,
    KeywordColor::BrightCyan,
];

/// Output format for search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One line per paper with keywords highlighted
    Plain,
    /// Human-friendly table
    Table,
    /// Machine-readable JSON format
    Json,
}

/// When to color keyword matches in plain output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

/// Search binary CLI for querying the paper database
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Search crawled papers by keyword",
    long_about = "Query the local paper database. A paper matches when its title or abstract \
                  contains every keyword. Results are sorted newest first, then by venue.

EXAMPLES:
  Single query:
    search -k fuzzing,kernel

  Stem matching with abstracts:
    search -k exploiting --fuzzy --abstracts

  Table output with year filter:
    search -k tor --format table --year-start 2018 --year-end 2022

  Papers still missing an abstract:
    search --list-missing-abstract

  Interactive mode:
    search --interactive"
)]
struct Args {
    /// Comma-separated keywords; every keyword must match
    #[arg(short = 'k', long, value_name = "K1,K2")]
    keywords: Option<String>,

    /// Print abstracts along with titles
    #[arg(long)]
    abstracts: bool,

    /// Match word stems ("exploiting" finds "exploit")
    #[arg(long)]
    fuzzy: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    format: OutputFormat,

    /// Filter papers from this year onwards (inclusive)
    #[arg(long, value_name = "YEAR")]
    year_start: Option<i32>,

    /// Filter papers up to this year (inclusive)
    #[arg(long, value_name = "YEAR")]
    year_end: Option<i32>,

    /// List papers that have no abstract yet
    #[arg(long, conflicts_with_all = ["keywords", "interactive"])]
    list_missing_abstract: bool,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i', conflicts_with = "keywords")]
    interactive: bool,

    /// Database file path (default: <data dir>/confgrep/papers.db)
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Color keyword matches in plain output
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorChoice,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

/// Display settings shared by single-query and interactive modes
#[derive(Debug, Clone)]
struct View {
    format: OutputFormat,
    abstracts: bool,
    fuzzy: bool,
    year_range: Option<YearRange>,
    color: bool,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Resolve the optional year bounds into a range
fn year_range(start: Option<i32>, end: Option<i32>) -> Result<Option<YearRange>> {
    match (start, end) {
        (None, None) => Ok(None),
        (start, end) => {
            let start = start.unwrap_or(i32::MIN);
            let end = end.unwrap_or(i32::MAX);
            if start > end {
                anyhow::bail!(
                    "Invalid year range: start year ({}) cannot be greater than end year ({})",
                    start,
                    end
                );
            }
            Ok(Some(YearRange::new(start, end)))
        }
    }
}

/// Decide whether plain output is colored.
fn use_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => {
            colored::control::set_override(true);
            true
        }
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            if !std::io::stdout().is_terminal() {
                colored::control::set_override(false);
            }
            colored::control::SHOULD_COLORIZE.should_colorize()
        }
    }
}

fn keyword_color(position: usize) -> KeywordColor {
    KEYWORD_PALETTE
        .get(position)
        .copied()
        .unwrap_or(KeywordColor::BrightCyan)
}

/// Case-insensitive keyword highlighter; each keyword keeps its own color.
struct Highlighter {
    pattern: Option<Regex>,
    /// Color of each capture group, in pattern order
    colors: Vec<KeywordColor>,
    enabled: bool,
}

impl Highlighter {
    fn new(keywords: &[String], enabled: bool) -> Self {
        let mut order: Vec<usize> = (0..keywords.len())
            .filter(|&i| !keywords[i].is_empty())
            .collect();
        // Longest first so "rowhammer" wins over "row".
        order.sort_by_key(|&i| std::cmp::Reverse(keywords[i].len()));

        let alternation = order
            .iter()
            .map(|&i| format!("({})", regex::escape(&keywords[i])))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = (!order.is_empty())
            .then(|| RegexBuilder::new(&alternation).case_insensitive(true).build().ok())
            .flatten();

        Self {
            pattern,
            colors: order.into_iter().map(keyword_color).collect(),
            enabled,
        }
    }

    /// Keyword occurrences in `text` with the color of the keyword matched.
    fn occurrences(&self, text: &str) -> Vec<(Range<usize>, KeywordColor)> {
        let Some(re) = &self.pattern else {
            return Vec::new();
        };
        re.captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let group = (1..caps.len()).find(|&g| caps.get(g).is_some())?;
                let color = self.colors.get(group - 1).copied()?;
                Some((whole.range(), color))
            })
            .collect()
    }

    fn apply(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (range, color) in self.occurrences(text) {
            out.push_str(&text[last..range.start]);
            out.push_str(&text[range.clone()].color(color).bold().to_string());
            last = range.end;
        }
        out.push_str(&text[last..]);
        out
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Format results one per line, keywords highlighted
fn format_results_plain(results: &[Paper], keywords: &[String], abstracts: bool, color: bool) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let highlighter = Highlighter::new(keywords, color);
    let mut out = String::new();
    for paper in results {
        out.push_str(&highlighter.apply(&paper.to_string()));
        out.push('\n');
        if abstracts && paper.has_abstract() {
            out.push_str(&highlighter.apply(&paper.abstract_text));
            out.push_str("\n\n");
        }
    }
    out.trim_end().to_string()
}

/// Format results as a pretty table
fn format_results_table(results: &[Paper], abstracts: bool) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Venue").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Authors").add_attribute(Attribute::Bold),
    ];
    if abstracts {
        header.push(Cell::new("Abstract").add_attribute(Attribute::Bold));
    }
    table.set_header(header);

    for paper in results {
        let mut row = vec![
            Cell::new(paper.year),
            Cell::new(paper.conference.name()).fg(Color::Cyan),
            Cell::new(truncate(&paper.title, 80)),
            Cell::new(truncate(&join_authors(&paper.authors), 40)),
        ];
        if abstracts {
            row.push(Cell::new(truncate(&paper.abstract_text, 300)));
        }
        table.add_row(row);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[Paper]) -> Result<String> {
    serde_json::to_string_pretty(results).context("Failed to serialize results to JSON")
}

fn print_results(results: &[Paper], keywords: &[String], view: &View) -> Result<()> {
    match view.format {
        OutputFormat::Plain => println!("{}", format_results_plain(results, keywords, view.abstracts, view.color)),
        OutputFormat::Table => println!("{}", format_results_table(results, view.abstracts)),
        OutputFormat::Json => println!("{}", format_results_json(results)?),
    }
    Ok(())
}

/// Execute a search query and return results
async fn execute_search<S: PaperStorage>(
    engine: &KeywordSearchEngine<S>,
    keywords: Vec<String>,
    view: &View,
) -> Result<Vec<Paper>> {
    let query = SearchQuery::new(keywords, view.fuzzy, view.year_range);
    if query.is_empty() {
        warn!("No keywords given, every paper matches");
    }
    debug!("Executing search: {:?}", query);

    engine
        .search(&query)
        .await
        .with_context(|| format!("Failed to execute search for {:?}", query.keywords))
}

fn print_help() {
    println!("Commands:");
    println!("  <k1,k2,...>       - Search for papers matching every keyword");
    println!("  /fuzzy on|off     - Toggle stem matching");
    println!("  /abstracts on|off - Toggle abstract display");
    println!("  /year START END   - Filter by year range");
    println!("  /year clear       - Clear year filter");
    println!("  /format plain|table|json - Set output format");
    println!("  /missing          - List papers without an abstract");
    println!("  /help             - Show this help");
    println!("  Ctrl+D or Ctrl+C  - Exit");
}

fn parse_toggle(value: Option<&&str>) -> Option<bool> {
    match value.copied() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

/// Run interactive REPL mode
async fn run_interactive<S: PaperStorage>(engine: KeywordSearchEngine<S>, mut view: View) -> Result<()> {
    println!("Interactive Paper Search");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;

    loop {
        match rl.readline("Search> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_help(),
                        "/fuzzy" => match parse_toggle(parts.get(1)) {
                            Some(on) => {
                                view.fuzzy = on;
                                println!("Fuzzy matching {}", if on { "on" } else { "off" });
                            }
                            None => eprintln!("Usage: /fuzzy on|off"),
                        },
                        "/abstracts" => match parse_toggle(parts.get(1)) {
                            Some(on) => {
                                view.abstracts = on;
                                println!("Abstracts {}", if on { "shown" } else { "hidden" });
                            }
                            None => eprintln!("Usage: /abstracts on|off"),
                        },
                        "/year" => {
                            if parts.len() == 2 && parts[1] == "clear" {
                                view.year_range = None;
                                println!("Cleared year filter");
                            } else if parts.len() == 3 {
                                match (parts[1].parse::<i32>(), parts[2].parse::<i32>()) {
                                    (Ok(start), Ok(end)) if start <= end => {
                                        view.year_range = Some(YearRange::new(start, end));
                                        println!("Set year filter: {} - {}", start, end);
                                    }
                                    _ => eprintln!("Invalid year range: START must be <= END"),
                                }
                            } else {
                                eprintln!("Usage: /year START END  or  /year clear");
                            }
                        }
                        "/format" => match parts.get(1).and_then(|f| OutputFormat::from_str(f, true).ok()) {
                            Some(format) => {
                                view.format = format;
                                println!("Set output format to {:?}", format);
                            }
                            None => eprintln!("Usage: /format plain|table|json"),
                        },
                        "/missing" => match engine.missing_abstracts().await {
                            Ok(papers) => {
                                if let Err(e) = print_results(&papers, &[], &view) {
                                    eprintln!("Error formatting results: {}", e);
                                }
                                println!("\n{} papers without abstract", papers.len());
                            }
                            Err(e) => eprintln!("Listing failed: {}", e),
                        },
                        _ => eprintln!("Unknown command: {}. Type /help for available commands.", parts[0]),
                    }
                } else {
                    let keywords = SearchQuery::parse_keywords(line);
                    let start = Instant::now();
                    match execute_search(&engine, keywords.clone(), &view).await {
                        Ok(results) => {
                            if let Err(e) = print_results(&results, &keywords, &view) {
                                eprintln!("Error formatting results: {}", e);
                            }
                            if view.format != OutputFormat::Json {
                                println!(
                                    "\nFound {} results in {:.2}s",
                                    results.len(),
                                    start.elapsed().as_secs_f64()
                                );
                            }
                        }
                        Err(e) => eprintln!("Search failed: {:#}", e),
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    let view = View {
        format: args.format,
        abstracts: args.abstracts,
        fuzzy: args.fuzzy,
        year_range: year_range(args.year_start, args.year_end)?,
        color: use_color(args.color),
    };

    let db_path = args.db_path.clone().unwrap_or_else(confgrep::default_db_path);
    if !db_path.exists() {
        anyhow::bail!(
            "Database file not found: {}\n\
             Please run the ingestion binary first to create the database.",
            db_path.display()
        );
    }
    info!("Loading database from: {}", db_path.display());

    let mut storage = SqliteStorage::new(db_path);
    storage
        .initialize()
        .await
        .context("Failed to initialize storage")?;

    let paper_count = storage
        .count_papers()
        .await
        .context("Failed to count papers in database")?;
    if paper_count == 0 {
        warn!("Database is empty, run the ingestion binary first");
    }
    info!("Database contains {} papers", paper_count);

    let engine = KeywordSearchEngine::new(storage);

    if args.list_missing_abstract {
        let papers = engine
            .missing_abstracts()
            .await
            .context("Failed to list papers without abstract")?;
        print_results(&papers, &[], &view)?;
        if view.format != OutputFormat::Json {
            println!("\n{} papers without abstract", papers.len());
        }
        return Ok(());
    }

    if args.interactive {
        return run_interactive(engine, view).await;
    }

    let keywords = args
        .keywords
        .as_deref()
        .map(SearchQuery::parse_keywords)
        .unwrap_or_default();
    let start = Instant::now();
    let results = execute_search(&engine, keywords.clone(), &view).await?;
    print_results(&results, &keywords, &view)?;
    if view.format != OutputFormat::Json {
        println!(
            "\nFound {} results in {:.2}s",
            results.len(),
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}
