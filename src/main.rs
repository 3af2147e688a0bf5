use clap::Parser;
use lagcorr::batch::BatchRunner;
use lagcorr::cache::CacheManager;
use lagcorr::cli::{self, Cli, Commands};
use lagcorr::config::AppConfig;
use lagcorr::data::DbReturnProvider;
use lagcorr::error::{LagError, Result};
use lagcorr::persistence::Store;
use lagcorr::service::AnalysisService;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    init_logging(&config.logging.level);
    if let Err(errors) = config.validate() {
        return Err(LagError::Validation(errors.join("; ")));
    }

    let store = Store::connect(&config.database).await?;
    let cache = CacheManager::new(&config.cache);

    match &cli.command {
        Commands::Migrate => {
            store.run_migrations().await?;
        }
        Commands::Ingest { tickers } => {
            store.run_migrations().await?;
            let provider = DbReturnProvider::new(store.clone());
            let runner = BatchRunner::new(store, provider, cache, config);
            runner.run_ingest(tickers).await?;
        }
        Commands::Recalc => {
            let provider = DbReturnProvider::new(store.clone());
            let runner = BatchRunner::new(store, provider, cache, config);
            let job_id = runner.run_recalculation().await?;
            if let Some(job) = runner.jobs().get(job_id) {
                info!("Job {}: {}", job.id, job.message.unwrap_or_default());
            }
        }
        Commands::Daily => {
            let provider = DbReturnProvider::new(store.clone());
            let runner = BatchRunner::new(store, provider, cache, config);
            let job_id = runner.run_daily_update().await?;
            if let Some(job) = runner.jobs().get(job_id) {
                info!("Job {}: {}", job.id, job.message.unwrap_or_default());
            }
        }
        Commands::Triggers { date, timeframe } => {
            let timeframe = cli::parse_timeframe(timeframe)?;
            let service = AnalysisService::new(store, cache, config);
            let triggers = service.triggers(*date, timeframe).await?;
            cli::print_triggers(&triggers);
        }
        Commands::Candidates {
            asset,
            timeframe,
            top,
        } => {
            let timeframe = cli::parse_timeframe(timeframe)?;
            let service = AnalysisService::new(store, cache, config);
            let candidates = service.candidates(asset, timeframe, *top).await?;
            cli::print_candidates(asset, &candidates);
        }
        Commands::Pair {
            asset_a,
            asset_b,
            timeframe,
        } => {
            let timeframe = cli::parse_timeframe(timeframe)?;
            let service = AnalysisService::new(store, cache, config);
            let points = service.pair_profile(asset_a, asset_b, timeframe).await?;
            cli::print_pair_profile(asset_a, asset_b, &points);
        }
        Commands::Circular { timeframe } => {
            let timeframe = cli::parse_timeframe(timeframe)?;
            let service = AnalysisService::new(store, cache, config);
            let pairs = service.circular_pairs(timeframe).await?;
            cli::print_circular(&pairs);
        }
        Commands::Hitrate { timeframe, top } => {
            let timeframe = cli::parse_timeframe(timeframe)?;
            let service = AnalysisService::new(store, cache, config);
            let outcomes = service.hit_rates(timeframe, *top).await?;
            cli::print_hit_rates(&outcomes);
        }
        Commands::Signals {
            asset_a,
            asset_b,
            lag,
            direction,
            timeframe,
            limit,
        } => {
            let timeframe = cli::parse_timeframe(timeframe)?;
            let direction = cli::parse_direction(direction)?;
            let service = AnalysisService::new(store, cache, config);
            let signals = service
                .recent_signals(asset_a, asset_b, timeframe, *lag, direction, *limit)
                .await?;
            cli::print_signals(&signals);
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
