use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uz_booker::{BookingOrchestrator, BookingRequest, ChromeDriver, Config, DatePolicy, Page};

#[derive(Parser)]
#[command(name = "uz-booker", version, about = "Reserve train seats on booking.uz.gov.ua up to payment")]
struct Cli {
    /// JSON config file; keys it leaves out keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log driver-level detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the site, pick a wagon and seats, fill passengers, then stop before payment
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        headless: bool,

        #[arg(long)]
        base_url: Option<String>,

        /// Save a screenshot here if the run aborts
        #[arg(long, value_name = "PATH")]
        screenshot_on_failure: Option<PathBuf>,
    },
    /// Check the trip and passenger data without starting a browser
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Combined {"trip": ..., "passengers": [...]} file
    #[arg(long, default_value = "passengers.json", conflicts_with_all = ["trip", "passengers"])]
    input: PathBuf,

    /// Trip object file, used together with --passengers
    #[arg(long, requires = "passengers")]
    trip: Option<PathBuf>,

    /// Passenger array file, used together with --trip
    #[arg(long, requires = "trip")]
    passengers: Option<PathBuf>,

    /// Wait for the date to be picked by hand instead of using trip.date
    #[arg(long)]
    manual_date: bool,
}

impl InputArgs {
    fn load(&self) -> uz_booker::Result<BookingRequest> {
        match (&self.trip, &self.passengers) {
            (Some(trip), Some(passengers)) => BookingRequest::from_split_files(trip, passengers),
            _ => BookingRequest::from_file(&self.input),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "uz_booker=debug"
    } else {
        "uz_booker=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_booking_failure() => {
            error!("❌ Booking stopped: {}", err);
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("❌ {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> uz_booker::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Validate { input } => {
            if input.manual_date {
                config.booking.date_policy = DatePolicy::Manual;
            }
            config.validate()?;
            let request = input.load()?;
            request.validate(config.booking.date_policy)?;
            info!(
                from = %request.trip.from,
                to = %request.trip.to,
                seats = request.trip.seats,
                passengers = request.passengers.len(),
                "Input is valid"
            );
            Ok(())
        }
        Command::Run {
            input,
            headless,
            base_url,
            screenshot_on_failure,
        } => {
            if input.manual_date {
                config.booking.date_policy = DatePolicy::Manual;
            }
            if headless {
                config.browser.headless = true;
            }
            if let Some(url) = base_url {
                config.booking.base_url = url;
            }
            if screenshot_on_failure.is_some() {
                config.booking.failure_screenshot = screenshot_on_failure;
            }
            config.validate()?;

            let request = input.load()?;
            request.validate(config.booking.date_policy)?;

            let driver = ChromeDriver::launch(&config.browser).await?;
            let page = Page::new(Arc::new(driver));
            let headless = config.browser.headless;
            let mut orchestrator = BookingOrchestrator::new(page, config);
            if !headless {
                orchestrator = orchestrator.with_handoff(wait_for_operator());
            }
            let report = orchestrator.run(&request).await;

            info!(
                state = %report.state,
                seats = ?report.booked_seats,
                passengers = report.passengers_filled,
                "Run finished"
            );
            report.outcome
        }
    }
}

/// Resolves on Enter or Ctrl+C. A closed stdin leaves only Ctrl+C.
async fn wait_for_operator() {
    info!("Press Enter or Ctrl+C once payment is done to close the browser");
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        read = stdin.read_line(&mut line) => {
            if matches!(read, Ok(0) | Err(_)) {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
}
