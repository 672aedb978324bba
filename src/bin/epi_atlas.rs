use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use epi_atlas::app::App;
use epi_atlas::config::ConfigLoader;
use epi_atlas::domain::{DatasetName, PredictionKind};
use epi_atlas::error::AtlasError;
use epi_atlas::output::JsonOutput;
use epi_atlas::pagination::DEFAULT_PAGE_SIZE;
use epi_atlas::records::Record;
use epi_atlas::source::HttpSourceReader;

#[derive(Parser)]
#[command(name = "epi-atlas")]
#[command(about = "Flu surveillance and vaccination datasets, joined to department boundaries")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, env = "EPI_ATLAS_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load every dataset and report record counts")]
    Preload,
    #[command(about = "Print one page of a dataset")]
    Page(PageArgs),
    #[command(about = "Print the records of a dataset matching a filter")]
    Find(FindArgs),
    #[command(about = "Mean ER flu rate and mean flu coverage")]
    Stats,
    #[command(about = "Forecast a future vaccination campaign")]
    Predict(PredictArgs),
}

#[derive(Args)]
struct PageArgs {
    dataset: DatasetName,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    first: usize,

    #[arg(long)]
    after: Option<String>,
}

#[derive(Args)]
struct FindArgs {
    dataset: DatasetName,

    #[arg(long, conflicts_with_all = ["date", "year", "campaign"])]
    department: Option<String>,

    #[arg(long, conflicts_with_all = ["year", "campaign"])]
    date: Option<String>,

    #[arg(long, conflicts_with = "campaign")]
    year: Option<i32>,

    #[arg(long)]
    campaign: Option<String>,
}

#[derive(Args)]
struct PredictArgs {
    #[arg(long)]
    year: i32,

    #[arg(long, value_enum, default_value_t = PredictionKind::Doses)]
    kind: PredictionKind,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<AtlasError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AtlasError) -> u8 {
    match error {
        AtlasError::Validation(_) | AtlasError::UnknownDataset(_) => 2,
        AtlasError::Fetch { .. } | AtlasError::FetchStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sources = ConfigLoader::resolve(cli.config.as_deref())?;
    let reader = HttpSourceReader::new()?;
    let app = App::new(reader, sources);

    match cli.command {
        Commands::Preload => {
            let result = app.preload()?;
            JsonOutput::print_preload(&result).into_diagnostic()
        }
        Commands::Page(args) => {
            let page = app.page(args.dataset, args.first, args.after.as_deref())?;
            JsonOutput::print_page(&page).into_diagnostic()
        }
        Commands::Find(args) => {
            let records = run_find(&app, args)?;
            JsonOutput::print_records(&records).into_diagnostic()
        }
        Commands::Stats => {
            let stats = app.stats()?;
            JsonOutput::print_stats(&stats).into_diagnostic()
        }
        Commands::Predict(args) => {
            let prediction = app.predict(args.year, args.kind)?;
            JsonOutput::print_prediction(&prediction).into_diagnostic()
        }
    }
}

fn run_find(app: &App<HttpSourceReader>, args: FindArgs) -> Result<Vec<Record>, AtlasError> {
    match args.dataset {
        DatasetName::Urgences => {
            if let Some(code) = args.department {
                return app.urgences_by_department(&code);
            }
            if let Some(date) = args.date {
                return app.urgences_by_date(&date);
            }
        }
        DatasetName::Couverture => {
            if let Some(code) = args.department {
                return app.couvertures_by_department(&code);
            }
            if let Some(year) = args.year {
                return app.couvertures_by_year(year);
            }
        }
        DatasetName::Doses => {
            if let Some(campaign) = args.campaign {
                return app.doses_by_campaign(&campaign);
            }
        }
        _ => {}
    }
    Err(AtlasError::Validation(format!(
        "no filter for dataset {}: urgences takes --department or --date, \
         couverture takes --department or --year, doses takes --campaign",
        args.dataset
    )))
}
