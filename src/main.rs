// Entry point and high-level CLI flow.
//
// - Option [1] loads the case table and the department boundaries once.
// - Option [2] sets or clears the department filter.
// - Option [3] switches the ranking metric between cases and incidence.
// - Option [4] rebuilds every view for the current filter, exports it and
//   prints previews; afterwards the user can go back to the menu or exit.
//
// `--batch` runs load + generate once without prompting.
mod aggregate;
mod args;
mod error;
mod geo_join;
mod loader;
mod output;
mod reference;
mod schema;
mod types;
mod util;
mod views;

use args::Args;
use clap::Parser;
use error::{DashResult, DashboardError};
use loader::{Dataset, LoadOptions};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::io::{self, Write};
use types::{DashboardView, MapView, Metric};
use views::ViewOptions;

// Loaded once, read-only afterwards. Every recomputation borrows it.
static DATASET: OnceCell<Dataset> = OnceCell::new();

/// The only mutable state: what the user is currently looking at.
struct Session {
    filter: Option<String>,
    metric: Metric,
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Ask the user whether to go back to the menu after generating views.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        let resp = read_line("Back to Menu (Y/N): ").to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn load_options(args: &Args) -> LoadOptions {
    LoadOptions {
        cases: args.cases.clone(),
        boundaries: args.boundaries.clone(),
        name_properties: args.boundary_name_property.clone(),
        strict_schema: args.strict_schema,
    }
}

fn install_dataset(args: &Args) -> DashResult<&'static Dataset> {
    if DATASET.get().is_some() {
        return Err(DashboardError::AlreadyLoaded);
    }
    let dataset = Dataset::load(&load_options(args))?;
    DATASET
        .set(dataset)
        .map_err(|_| DashboardError::AlreadyLoaded)?;
    DATASET.get().ok_or(DashboardError::AlreadyLoaded)
}

fn print_load_report(ds: &Dataset) {
    let r = &ds.report;
    println!(
        "Processing dataset... ({} rows loaded from {})",
        util::format_int(r.total_rows),
        r.source
    );
    println!("Detected columns: {}", r.schema);
    println!(
        "{} departments, {} cases.",
        util::format_int(ds.departments().len()),
        util::format_int(
            ds.records
                .iter()
                .map(|c| c.cases)
                .fold(0, u64::saturating_add)
        )
    );
    if r.skipped_rows > 0 || r.invalid_counts > 0 {
        println!(
            "Note: {} rows skipped (blank department), {} unreadable case counts.",
            util::format_int(r.skipped_rows),
            util::format_int(r.invalid_counts)
        );
    }
    if let (Some(first), Some(last)) = (r.first_date, r.last_date) {
        println!(
            "Dates: {} to {} ({} unparseable).",
            first,
            last,
            util::format_int(r.unparseable_dates)
        );
    }
    match &ds.boundaries {
        loader::BoundaryState::Loaded(b) => {
            println!("Boundaries: {} departments.", util::format_int(b.len()))
        }
        loader::BoundaryState::Unavailable(reason) => {
            println!("Boundaries: unavailable ({}).", reason)
        }
    }
    println!();
}

/// Handle option [1]: load the datasets.
fn handle_load(args: &Args) {
    match install_dataset(args) {
        Ok(ds) => print_load_report(ds),
        Err(DashboardError::AlreadyLoaded) => {
            println!("Datasets are already loaded.\n");
        }
        Err(e) => eprintln!("Failed to load datasets: {}\n", e),
    }
}

/// Handle option [2]: choose a department by number or name, or clear
/// the filter with an empty line.
fn handle_set_filter(session: &mut Session) {
    let Some(ds) = DATASET.get() else {
        println!("Error: No data loaded. Please load the datasets first (option 1).\n");
        return;
    };
    let departments = ds.departments();
    for (i, d) in departments.iter().enumerate() {
        println!("[{}] {}", i + 1, d);
    }
    let input = read_line("Department (number or name, empty for all): ");
    session.filter = if input.is_empty() {
        None
    } else if let Some(d) = input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| departments.get(i))
    {
        Some(d.to_string())
    } else {
        Some(input)
    };
    match &session.filter {
        Some(f) => println!("Filter set to {:?}.\n", f),
        None => println!("Filter cleared.\n"),
    }
}

fn print_view(view: &DashboardView, opts: &ViewOptions) {
    let k = &view.kpis;
    println!(
        "Filter: {}",
        view.filter.as_deref().unwrap_or("(all departments)")
    );
    println!(
        "Total cases: {}   Departments: {}   Mean per department: {}",
        util::format_int(k.total_cases_sum),
        util::format_int(k.department_count),
        util::format_number(k.mean_per_department, 1)
    );
    match (k.total_population, k.pooled_incidence) {
        (Some(p), Some(i)) => println!(
            "Population: {}   Incidence per 100k: {}\n",
            util::format_int(p),
            util::format_number(i, 1)
        ),
        _ => println!("Population: unknown\n"),
    }

    println!("Top {} Departments - {}\n", opts.top_n, view.metric.label());
    output::preview_table_rows(&view.ranking, opts.top_n);

    match &view.map {
        MapView::Available { features, stats } => println!(
            "Map: {} departments ({} with cases, {} without, {} case departments without a boundary)\n",
            util::format_int(features.len()),
            util::format_int(stats.matched),
            util::format_int(stats.unmatched_boundaries.len()),
            util::format_int(stats.unmatched_aggregates.len())
        ),
        MapView::Unavailable { reason } => println!(
            "Map: unavailable ({}); {} department markers exported instead.\n",
            reason,
            util::format_int(view.markers.len())
        ),
    }
    println!(
        "Sample: {} of the filtered rows.\n",
        util::format_int(view.sample.rows.len())
    );
}

/// Handle option [4]: rebuild and export every view.
fn handle_generate(session: &Session, args: &Args) {
    let Some(ds) = DATASET.get() else {
        println!("Error: No data loaded. Please load the datasets first (option 1).\n");
        return;
    };
    let opts = ViewOptions {
        top_n: args.top,
        sample_rows: args.sample,
    };
    println!("Generating views...");
    let view = views::build_view(ds, session.filter.as_deref(), session.metric, &opts);
    print_view(&view, &opts);

    for (path, result) in output::export_view(&view, &args.out_dir) {
        match result {
            Ok(()) => println!("(exported to {})", path.display()),
            Err(e) => eprintln!("Write error for {}: {}", path.display(), e),
        }
    }
    println!();
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_batch(args: &Args) -> i32 {
    if let Err(e) = install_dataset(args) {
        error!("{}", e);
        return 1;
    }
    if let Some(ds) = DATASET.get() {
        print_load_report(ds);
    }
    let session = Session {
        filter: args.filter.clone(),
        metric: args.metric,
    };
    handle_generate(&session, args);
    0
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("starting dashboard backend");

    if args.batch {
        std::process::exit(run_batch(&args));
    }

    let mut session = Session {
        filter: args.filter.clone(),
        metric: args.metric,
    };
    loop {
        println!("Select an option:");
        println!("[1] Load the datasets");
        println!(
            "[2] Set department filter (current: {})",
            session.filter.as_deref().unwrap_or("all")
        );
        println!("[3] Toggle metric (current: {})", session.metric.label());
        println!("[4] Generate views\n");
        match read_choice().as_str() {
            "1" => handle_load(&args),
            "2" => handle_set_filter(&mut session),
            "3" => {
                session.metric = session.metric.toggled();
                println!("Metric: {}\n", session.metric.label());
            }
            "4" => {
                println!();
                handle_generate(&session, &args);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1, 2, 3 or 4.\n"),
        }
    }
}
