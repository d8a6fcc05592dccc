use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pagegraph_core::PageGraph;
use pagegraph_core::query::{self, JsCallFilter};
use pagegraph_core::report::generate_json_report;
use pagegraph_extract::corpus::{self, ExtractionConfig};
use pagegraph_extract::mapping::{self, MappingTable};
use pagegraph_extract::scheduler::{OutcomeCallback, ProcessLauncher, ScheduleSummary, TaskOutcome};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

// Helper functions shared by the handlers

/// Installs the stderr log subscriber. Stdout is reserved for reports.
pub fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Expands a leading `~` in a user supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn string_arg<'a>(args: &'a ArgMatches, name: &str) -> Option<&'a str> {
    args.get_one::<String>(name).map(String::as_str)
}

fn path_arg(args: &ArgMatches, name: &str) -> PathBuf {
    expand_path(string_arg(args, name).unwrap_or_default())
}

fn input_graph(args: &ArgMatches) -> PathBuf {
    args.get_one::<PathBuf>("INPUT").cloned().unwrap_or_default()
}

pub fn load_graph(path: &Path) -> Result<PageGraph, String> {
    PageGraph::from_path(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
}

pub fn render_report<T: Serialize + ?Sized>(report: &T) -> Result<String, String> {
    generate_json_report(report).map_err(|e| e.to_string())
}

fn fail(message: &str) -> ! {
    eprintln!("Invalid argument: {}", message);
    std::process::exit(1);
}

// Loads the graph, runs the query and prints its report, or exits with status 1
fn run_query<T, F>(args: &ArgMatches, query: F)
where
    T: Serialize,
    F: FnOnce(&PageGraph) -> Result<T, String>,
{
    let output = load_graph(&input_graph(args))
        .and_then(|pg| query(&pg))
        .and_then(|report| render_report(&report));
    match output {
        Ok(json) => println!("{}", json),
        Err(e) => fail(&e),
    }
}

pub fn handle_subframes(args: &ArgMatches) {
    let local_only = args.get_flag("local");
    run_query(args, |pg| Ok(query::subframes(pg, local_only)));
}

pub fn handle_requests(args: &ArgMatches) {
    let frame = string_arg(args, "frame");
    run_query(args, |pg| Ok(query::requests(pg, frame)));
}

pub fn handle_scripts(args: &ArgMatches) {
    let frame = string_arg(args, "frame");
    let node_id = string_arg(args, "id");
    let include_source = args.get_flag("source");
    run_query(args, |pg| Ok(query::scripts(pg, frame, node_id, include_source)));
}

pub fn js_call_filter(args: &ArgMatches) -> JsCallFilter {
    JsCallFilter {
        frame: string_arg(args, "frame").map(str::to_string),
        cross_frame_only: args.get_flag("cross-frame"),
        method: string_arg(args, "method").map(str::to_string),
        node_id: string_arg(args, "id").map(str::to_string),
    }
}

pub fn handle_js_calls(args: &ArgMatches) {
    let filter = js_call_filter(args);
    run_query(args, |pg| Ok(query::js_calls(pg, &filter)));
}

pub fn handle_elm(args: &ArgMatches) {
    let id = string_arg(args, "ID").unwrap_or_default();
    let depth = args.get_one::<usize>("depth").copied().unwrap_or(0);
    run_query(args, |pg| {
        query::element_query(pg, id, depth).map_err(|e| e.to_string())
    });
}

/// Builds the extraction settings from `extract` or `extract-one` arguments.
pub fn extraction_config(args: &ArgMatches) -> ExtractionConfig {
    let graph_dir = args
        .try_get_one::<String>("graph-dir")
        .ok()
        .flatten()
        .map(|dir| expand_path(dir))
        .unwrap_or_default();
    let mut config = ExtractionConfig::new(
        graph_dir,
        path_arg(args, "feature-dir"),
        path_arg(args, "mapping-path"),
    )
    .with_modified(args.get_flag("modified"));

    if let Ok(Some(&jobs)) = args.try_get_one::<usize>("jobs") {
        config = config.with_jobs(jobs);
    }
    if let Ok(Some(&seconds)) = args.try_get_one::<u64>("timeout") {
        config = config.with_timeout(Duration::from_secs(seconds));
    }
    if let Ok(Some(&ms)) = args.try_get_one::<u64>("tick-ms") {
        config = config.with_tick(Duration::from_millis(ms));
    }
    config
}

/// Arguments that make a child process run `extract-one` for one graph. The
/// graph path is appended by the launcher.
pub fn extract_one_args(config: &ExtractionConfig, debug: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "extract-one".into(),
        "--feature-dir".into(),
        config.feature_dir.clone().into_os_string(),
        "--mapping-path".into(),
        config.mapping_path.clone().into_os_string(),
    ];
    if config.modified {
        args.push("--modified".into());
    }
    if debug {
        args.push("--debug".into());
    }
    args
}

fn print_summary(summary: &ScheduleSummary, feature_dir: &Path) {
    println!();
    println!(
        "{} {} graphs extracted to {}",
        "✓".green().bold(),
        summary.completed.len().to_string().cyan(),
        feature_dir.display().to_string().bright_white()
    );
    if !summary.failed.is_empty() {
        println!(
            "{} {} graphs failed",
            "✗".red().bold(),
            summary.failed.len().to_string().cyan()
        );
    }
    if !summary.timed_out.is_empty() {
        println!(
            "{} {} graphs timed out",
            "⚠".yellow().bold(),
            summary.timed_out.len().to_string().cyan()
        );
    }
    println!(
        "{} At most {} extractions ran at once",
        "→".blue(),
        summary.peak_in_flight
    );
}

pub async fn handle_extract(args: &ArgMatches) {
    let quiet = args.get_flag("quiet");
    let debug = args.get_flag("debug");
    let config = extraction_config(args);

    if !config.mapping_path.is_file() {
        eprintln!(
            "{} Mapping table not found: {}",
            "✗".red().bold(),
            config.mapping_path.display()
        );
        std::process::exit(1);
    }

    let paths = match corpus::discover(&config.graph_dir, &config.feature_dir) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!(
                "{} Failed to read {}: {}",
                "✗".red().bold(),
                config.graph_dir.display(),
                e
            );
            std::process::exit(1);
        }
    };

    let launcher = match ProcessLauncher::current_exe(extract_one_args(&config, debug)) {
        Ok(launcher) => launcher,
        Err(e) => {
            eprintln!("{} Failed to locate the pagegraph binary: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    if !quiet {
        println!(
            "{} {} graphs to extract ({} jobs, {}s timeout)",
            "→".blue(),
            paths.len().to_string().cyan(),
            config.jobs,
            config.timeout.as_secs()
        );
    }

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(paths.len() as u64)
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));

    let pb_clone = pb.clone();
    let progress: OutcomeCallback = Arc::new(move |outcome: &TaskOutcome| {
        match outcome {
            TaskOutcome::Completed(path) => {
                pb_clone.set_message(path.display().to_string());
            }
            TaskOutcome::Failed { path, reason } => {
                pb_clone.println(format!(
                    "{} {}: {}",
                    "✗".red().bold(),
                    path.display(),
                    reason
                ));
            }
            TaskOutcome::TimedOut(path) => {
                pb_clone.println(format!(
                    "{} {}: timed out",
                    "⚠".yellow().bold(),
                    path.display()
                ));
            }
        }
        pb_clone.inc(1);
    });

    let summary = corpus::extract_corpus(&config, &launcher, paths, Some(progress)).await;
    pb.finish_and_clear();

    if !quiet {
        print_summary(&summary, &config.feature_dir);
    }
}

/// One isolated extraction task. Exits non-zero on failure so the parent
/// counts it as failed.
pub fn handle_extract_one(args: &ArgMatches) {
    let config = extraction_config(args);
    let graph = args.get_one::<PathBuf>("GRAPH").cloned().unwrap_or_default();

    let result = MappingTable::load(&config.mapping_path)
        .and_then(|mapping| corpus::run_one(&config, &mapping, &graph));
    if let Err(e) = result {
        eprintln!("{} {}: {}", "✗".red().bold(), graph.display(), e);
        std::process::exit(1);
    }
}

pub fn handle_rewrite(args: &ArgMatches) {
    let quiet = args.get_flag("quiet");
    let mapping_path = path_arg(args, "mapping-path");
    let html_dir = path_arg(args, "html-path");
    let output = path_arg(args, "output");
    let modified = args.get_flag("modified");

    let result = MappingTable::load(&mapping_path)
        .and_then(|table| mapping::rewrite(&table, &html_dir, modified))
        .and_then(|entries| {
            mapping::write_mapping(&entries, &output)?;
            Ok(entries.len())
        });

    match result {
        Ok(count) => {
            if !quiet {
                println!(
                    "{} {} mapping entries written to {}",
                    "✓".green().bold(),
                    count.to_string().cyan(),
                    output.display().to_string().bright_white()
                );
            }
        }
        Err(e) => {
            eprintln!("{} Rewrite failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
