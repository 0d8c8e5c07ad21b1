use std::path::PathBuf;

use clap::Parser;
use diesel::Connection;
use tracing::warn;
use tracing_subscriber::{
    filter::EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

use chartdeck::db::init_pool;
use chartdeck::errors::StoreError;
use chartdeck::logger;
use chartdeck::models::{Dashboard, DashboardExport};
use chartdeck::utilities::is_valid_log_level;

#[derive(Parser)]
#[command(about = "Admin CLI for chartdeck", long_about = None)]
struct AdminCli {
    /// Export the given dashboard ids as JSON on stdout
    #[arg(long, value_delimiter = ',')]
    export_dashboards: Option<Vec<i32>>,

    /// Import dashboards from a JSON export file
    #[arg(long)]
    import_dashboards: Option<PathBuf>,

    /// Database URL
    #[arg(long, env = "CHARTDECK_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level
    /// Possible values: trace, debug, info, warn, error
    #[arg(long, env = "CHARTDECK_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), StoreError> {
    let admin_cli = AdminCli::parse();
    init_logging(&admin_cli.log_level);

    let database_url = admin_cli.database_url.unwrap_or_else(|| {
        std::env::var("CHARTDECK_DATABASE_URL")
            .expect("CHARTDECK_DATABASE_URL must be set if not provided as an argument")
    });

    let pool = init_pool(&database_url, 1)?;
    let mut conn = pool.get()?;

    if let Some(dashboard_ids) = admin_cli.export_dashboards {
        let document = Dashboard::export_dashboards(&mut conn, &dashboard_ids)?;
        println!("{document}");
    } else if let Some(path) = admin_cli.import_dashboards {
        let raw = std::fs::read_to_string(&path)?;
        let export: DashboardExport = serde_json::from_str(&raw)?;
        let import_time = chrono::Utc::now().timestamp();

        conn.transaction::<_, StoreError, _>(|conn| {
            for bundle in &export.dashboards {
                let dashboard_id = Dashboard::import_dashboard(conn, bundle, Some(import_time))?;
                println!("Imported dashboard {dashboard_id}");
            }
            Ok(())
        })?;
    } else {
        println!("No command specified. Use --help for usage information.");
    }

    Ok(())
}

fn init_logging(log_level: &str) {
    let filter = if is_valid_log_level(log_level) {
        EnvFilter::try_new(log_level).unwrap_or_else(|_e| {
            warn!("Error parsing log level: {}", log_level);
            std::process::exit(1);
        })
    } else {
        warn!("Invalid log level: {}", log_level);
        std::process::exit(1);
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .event_format(logger::ChartdeckLoggingFormat),
        )
        .init();
}
