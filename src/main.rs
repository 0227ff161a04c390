mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::database;
use crate::features::files::FileService;
use crate::features::forms::FormService;
use crate::features::jobs::{CollectJob, DistributeJob, Operator, ScanJob};
use crate::features::notifications::NotificationService;
use crate::features::users::UserService;
use crate::modules::google::oauth::CredentialManager;
use crate::modules::google::{DriveClient, FormsClient, GmailClient, MailApi};
use clap::{ArgGroup, Parser};
use std::sync::Arc;
use tracing::{info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Audit shared Drive files: record them, survey their owners and act on the answers
#[derive(Debug, Parser)]
#[command(name = "drive-audit", version, about)]
#[command(group(ArgGroup::new("job").args(["scan", "send_forms", "process_forms"])))]
struct Cli {
    /// Record every visible Drive file and its owner
    #[arg(long)]
    scan: bool,

    /// Send each user a severity survey for their files not surveyed yet
    #[arg(long)]
    send_forms: bool,

    /// Apply survey answers and email owners of risky public files
    #[arg(long)]
    process_forms: bool,

    /// While processing forms, also remove public access from flagged files
    #[arg(long, requires = "process_forms")]
    revoke_public: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !(cli.scan || cli.send_forms || cli.process_forms) {
        tracing::warn!("No job selected; pass --scan, --send-forms or --process-forms");
        return Ok(());
    }

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let http_client = reqwest::Client::new();

    // One token per invocation, shared by every client
    let credentials = CredentialManager::new(config.google.clone(), http_client.clone());
    let access_token = match credentials.access_token().await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Google credentials unavailable: {}", e);
            return Err(e.into());
        }
    };

    let drive = Arc::new(DriveClient::new(
        http_client.clone(),
        config.google.drive_api_base_url.clone(),
        access_token.clone(),
        config.jobs.drive_page_size,
    ));
    let forms_api = Arc::new(FormsClient::new(
        http_client.clone(),
        config.google.forms_api_base_url.clone(),
        access_token.clone(),
    ));
    let gmail = Arc::new(GmailClient::new(
        http_client,
        config.google.gmail_api_base_url.clone(),
        access_token,
    ));

    let operator_email = match config.operator.email.clone() {
        Some(email) => email,
        None => gmail.profile_email().await?,
    };
    let mail_from = config
        .operator
        .mail_from
        .clone()
        .unwrap_or_else(|| operator_email.clone());
    let operator = Operator::new(operator_email, config.operator.survey_recipients.clone());

    let users = Arc::new(UserService::new(pool.clone()));
    let files = Arc::new(FileService::new(pool.clone()));
    let forms = Arc::new(FormService::new(pool.clone()));
    let notifier = Arc::new(NotificationService::new(gmail, mail_from));
    let max_concurrency = config.jobs.max_concurrency;

    if cli.scan {
        let span = info_span!("job", name = "scan", operator = %operator.email);
        ScanJob::new(drive, users, files, max_concurrency)
            .run()
            .instrument(span)
            .await;
    } else if cli.send_forms {
        let span = info_span!("job", name = "send_forms", operator = %operator.email);
        DistributeJob::new(
            users,
            files,
            forms,
            forms_api,
            notifier,
            operator,
            max_concurrency,
        )
        .run()
        .instrument(span)
        .await;
    } else {
        let span = info_span!(
            "job",
            name = "process_forms",
            operator = %operator.email,
            revoke_public = cli.revoke_public
        );
        let report = CollectJob::new(
            forms,
            files,
            forms_api,
            drive,
            notifier,
            operator,
            cli.revoke_public,
            max_concurrency,
        )
        .run()
        .instrument(span)
        .await;
        tracing::debug!("Collect report: {:?}", report);
    }

    pool.close().await;
    Ok(())
}
