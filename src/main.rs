//! CGP Rip
//!
//! Rips a book from the CGP online reader into an outlined PDF, or serves a
//! local relay API for browser front ends.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cgp_rip::config::{Config, SessionConfig, DEFAULT_SESSION_FILE};
use cgp_rip::pipeline::{PageSpec, RipRequest, Ripper};
use cgp_rip::routes;
use cgp_rip::state::AppState;
use cgp_rip::storage::OutputLayout;
use cgp_rip::vendor::VendorClient;

#[derive(Parser)]
#[command(name = "cgp-rip")]
#[command(version, about = "Rip online CGP books into a single PDF", long_about = None)]
#[command(after_help = "EXAMPLES:
    cgp-rip configure <session-id>       Store the ASP.NET_SessionId cookie
    cgp-rip rip 12345 -p 10              Rip the first 10 pages of book 12345
    cgp-rip rip 12345 -p 5-9 -q 2        Rip pages 5 to 9 at quality 2
    cgp-rip serve --port 3000            Run the relay API")]
struct Cli {
    /// Log what is being fetched
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store the session id used to log in
    Configure {
        /// Value of the reader's ASP.NET_SessionId cookie
        session_id: String,

        /// The path to the configuration file
        #[arg(short, long, default_value = DEFAULT_SESSION_FILE)]
        file: PathBuf,
    },

    /// Rip an online book
    Rip {
        book_id: String,

        /// Pages to grab: N for the first N, or A-B (default: all)
        #[arg(short, long)]
        pages: Option<PageSpec>,

        /// Background resolution, 1 (lowest) to 4 (highest)
        #[arg(short, long)]
        quality: Option<u8>,

        /// The output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Config file path
        #[arg(short, long, default_value = DEFAULT_SESSION_FILE)]
        file: PathBuf,

        /// Session id to use instead of the config file
        #[arg(long)]
        session: Option<String>,

        /// Pages fetched at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Also write the raw SVG and background files
        #[arg(long)]
        save_assets: bool,

        /// Skip building the PDF (implies --save-assets)
        #[arg(long)]
        no_pdf: bool,
    },

    /// Run the local relay API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "cgp_rip=debug,tower_http=debug"
    } else {
        "cgp_rip=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let result = match cli.command {
        Command::Configure { session_id, file } => configure(&file, &session_id).await,
        Command::Rip {
            book_id,
            pages,
            quality,
            output,
            file,
            session,
            concurrency,
            save_assets,
            no_pdf,
        } => {
            let session_token = match session {
                Some(token) => token,
                None => SessionConfig::load(&file).await?.session_id,
            };
            let request = RipRequest {
                pages: pages.unwrap_or(PageSpec::All),
                quality: quality.unwrap_or(config.rip.quality),
                concurrency,
                build_pdf: !no_pdf,
                keep_assets: save_assets || no_pdf,
                ..RipRequest::new(book_id, session_token)
            };
            rip(config, request, OutputLayout::new(output)).await
        }
        Command::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
    };

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}

async fn configure(file: &std::path::Path, session_id: &str) -> anyhow::Result<()> {
    SessionConfig::configure(file, session_id).await?;
    tracing::info!("Configured; session saved to {}", file.display());
    Ok(())
}

async fn rip(config: Config, request: RipRequest, layout: OutputLayout) -> anyhow::Result<()> {
    let client = VendorClient::new(&config.vendor)?;
    let ripper = Ripper::new(client, config.rip);

    let outcome = ripper.rip(request).await?;

    if let Some(pdf) = &outcome.pdf {
        layout.write_pdf(&outcome.book_id, pdf).await?;
    }
    if !outcome.assets.is_empty() {
        layout.write_assets(&outcome.book_id, &outcome.assets).await?;
    }

    if outcome.skipped.is_empty() {
        tracing::info!("Ripped {} pages of {}", outcome.pages.len(), outcome.book_id);
    } else {
        tracing::warn!(
            "Ripped {} pages of {}; skipped {:?}",
            outcome.pages.len(),
            outcome.book_id,
            outcome.skipped
        );
    }
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting CGP Rip relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Vendor: {}", config.vendor.base_url);

    let app = routes::app(AppState::new(config.clone())?);

    let (host, port) = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("cannot listen on {}:{}", host, port))?;
    tracing::info!("CGP Rip relay listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
