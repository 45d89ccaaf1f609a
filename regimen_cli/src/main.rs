use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use regimen_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "regimen")]
#[command(about = "Supplement regimen planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $XDG_CONFIG_HOME/regimen/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Regimen model file (.toml or .json), overrides [model] path
    #[arg(long, global = true)]
    model: Option<PathBuf>,
}

/// Run parameters that override the [run] section
#[derive(Args, Clone, Debug, Default)]
struct RunArgs {
    /// First day of the off-week (must be a Monday)
    #[arg(long)]
    off_week_start: Option<NaiveDate>,

    /// Anchor date for custom-date cycle rules
    #[arg(long)]
    cycle_anchor: Option<NaiveDate>,

    /// Enable a runtime flag (repeatable)
    #[arg(long = "flag", value_name = "NAME")]
    flags: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the regimen model
    Validate,

    /// Show the plan for one day, or a one-line overview of a whole year
    Plan {
        /// Day to show (default: today)
        #[arg(long, conflicts_with = "year")]
        date: Option<NaiveDate>,

        /// Show an overview of every day of this year
        #[arg(long)]
        year: Option<i32>,

        /// Print plans as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Export a year of plans as CSV
    ExportCsv {
        #[arg(long)]
        year: Option<i32>,

        /// Output file (default: <output dir>/regimen_<year>.csv)
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Export a year of plans as an iCalendar file
    ExportIcs {
        #[arg(long)]
        year: Option<i32>,

        /// Output file (default: <output dir>/regimen_<year>.ics)
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the plain-text digest for a day or a window of days
    Digest {
        /// First day (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Number of consecutive days (default: [digest] window_days)
        #[arg(long)]
        days: Option<u32>,

        #[command(flatten)]
        run: RunArgs,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    regimen_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let model = match &cli.model {
        Some(path) => load_model(path)?,
        None => config.load_model()?,
    };
    tracing::debug!(
        "Using model with {} supplements and {} events",
        model.supplements.len(),
        model.events.len()
    );

    match cli.command {
        Commands::Validate => cmd_validate(&model),
        Commands::Plan {
            date,
            year,
            json,
            run,
        } => {
            let params = run_params(&config, &run);
            match year {
                Some(year) => cmd_plan_year(&model, year, &params, json),
                None => cmd_plan_day(&model, date.unwrap_or_else(today), &params, json),
            }
        }
        Commands::ExportCsv { year, out, run } => {
            let year = resolve_year(year, &config);
            let out = out.unwrap_or_else(|| default_output(&config, year, "csv"));
            cmd_export_csv(&model, year, &out, &run_params(&config, &run))
        }
        Commands::ExportIcs { year, out, run } => {
            let year = resolve_year(year, &config);
            let out = out.unwrap_or_else(|| default_output(&config, year, "ics"));
            cmd_export_ics(&model, year, &out, &run_params(&config, &run), &config)
        }
        Commands::Digest { date, days, run } => cmd_digest(
            &model,
            date.unwrap_or_else(today),
            days.unwrap_or(config.digest.window_days),
            &run_params(&config, &run),
            &config,
        ),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn resolve_year(year: Option<i32>, config: &Config) -> i32 {
    year.or(config.run.year).unwrap_or_else(|| today().year())
}

fn default_output(config: &Config, year: i32, extension: &str) -> PathBuf {
    config.output.dir.join(format!("regimen_{}.{}", year, extension))
}

/// Config `[run]` values with command-line overrides applied
fn run_params(config: &Config, args: &RunArgs) -> RunParams {
    let mut params = config.run_params();
    if let Some(start) = args.off_week_start {
        params.off_week_start_date = Some(start);
    }
    if let Some(anchor) = args.cycle_anchor {
        params.cycle_anchor_date = Some(anchor);
    }
    for flag in &args.flags {
        params.flags.insert(flag.clone(), true);
    }
    params
}

fn cmd_validate(model: &RegimenModel) -> Result<()> {
    validate_model(model)?;

    println!("✓ Model is valid");
    println!("  Blocks:      {}", model.blocks.len());
    println!("  Supplements: {}", model.supplements.len());
    println!("  Events:      {}", model.events.len());
    Ok(())
}

fn cmd_plan_day(model: &RegimenModel, day: NaiveDate, params: &RunParams, json: bool) -> Result<()> {
    let plan = plan_for_day(model, day, params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        display_plan(&plan);
    }
    Ok(())
}

fn cmd_plan_year(model: &RegimenModel, year: i32, params: &RunParams, json: bool) -> Result<()> {
    let plans = generate_year(model, year, params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    for plan in &plans {
        let marker = if plan.is_off_week {
            "OFF"
        } else if plan.is_pulse_day {
            "PULSE"
        } else {
            ""
        };
        println!(
            "{}  {:<8} {:>3} items  {:<5} {}",
            plan.day,
            plan.block_id,
            plan.items.len(),
            marker,
            plan.events.join(",")
        );
    }
    Ok(())
}

fn cmd_export_csv(model: &RegimenModel, year: i32, out: &Path, params: &RunParams) -> Result<()> {
    let plans = generate_year(model, year, params)?;
    let count = export_csv(&plans, out)?;

    println!("✓ Exported {} days to CSV", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn cmd_export_ics(
    model: &RegimenModel,
    year: i32,
    out: &Path,
    params: &RunParams,
    config: &Config,
) -> Result<()> {
    let plans = generate_year(model, year, params)?;
    let options = config.ics.options(Utc::now());
    let count = export_ics(&plans, out, &options)?;

    println!("✓ Exported {} calendar events", count);
    println!("  ICS: {}", out.display());
    Ok(())
}

fn cmd_digest(
    model: &RegimenModel,
    first: NaiveDate,
    days: u32,
    params: &RunParams,
    config: &Config,
) -> Result<()> {
    let plans = generate_range(model, first, days.max(1), params)?;
    let digest = Digest::for_window(&plans)?;

    if let Some(ref recipient) = config.digest.recipient {
        println!("To: {}", recipient);
    }
    println!("Subject: {}", digest.subject);
    println!();
    println!("{}", digest.body);
    Ok(())
}

fn display_plan(plan: &DayPlan) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}  {}", plan.day, plan.block_name);
    println!("╰─────────────────────────────────────────╯");

    if !plan.events.is_empty() {
        println!("  Events: {}", plan.events.join(", "));
    }
    if plan.is_off_week {
        println!("  Off-week: nothing scheduled");
        println!();
        return;
    }
    println!();

    let buckets = plan.buckets();
    for (label, items) in [
        ("Morning", &buckets.morning),
        ("During the day", &buckets.any),
        ("Evening", &buckets.evening),
    ] {
        if items.is_empty() {
            continue;
        }
        println!("  {}", label);
        for item in items.iter() {
            println!("    → {}", item.label());
        }
    }

    println!();
}
