use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use haul_scanner::{
    domain::{
        LocationId, MatchResult, Progress, ProgressSink, RegionId, SearchCriteria, SystemId,
    },
    engine::MatchEngine,
    infra::{
        esi::EsiClient,
        orders::{FetchOutcome, OrderFetcher},
        reference::ReferenceCache,
        store::DiskStore,
    },
    util::{
        format::{format_isk, format_volume},
        logging::init_logging,
        settings::{load_settings, save_settings},
        version::version_label,
    },
};

#[derive(Parser)]
#[clap(name = "haul-scanner")]
#[clap(about = "Finds profitable station trading hauls inside an EVE Online region")]
#[clap(version)]
struct Cli {
    /// Region id to scan (defaults to The Forge)
    #[clap(short, long, conflicts_with = "region_name")]
    region: Option<RegionId>,

    /// Region name to scan, resolved through ESI
    #[clap(long)]
    region_name: Option<String>,

    /// Minimum profit in ISK; matches must beat it strictly
    #[clap(short = 'p', long, default_value = "1000000")]
    min_profit: Decimal,

    /// Cargo capacity in m³
    #[clap(short, long, default_value = "2500")]
    capacity: Decimal,

    /// Sales tax in percent, added to the purchase cost
    #[clap(short, long, default_value = "0")]
    tax: Decimal,

    /// Plan multiple trips per match (single trips are evaluated)
    #[clap(long)]
    multi_trip: bool,

    /// Ignore the stored order book snapshot and do not write one
    #[clap(long)]
    no_cache: bool,

    /// Drop every cached entry before scanning
    #[clap(long)]
    clear_cache: bool,

    /// Item types matched concurrently
    #[clap(short, long)]
    workers: Option<usize>,

    /// Cache directory override
    #[clap(long)]
    cache_dir: Option<PathBuf>,

    /// Contact (mail or character name) sent to ESI in the user agent
    #[clap(long)]
    contact: Option<String>,

    /// Persist the effective workers, cache directory and contact as defaults
    #[clap(long)]
    save_settings: bool,

    /// Number of matches to print
    #[clap(short, long, default_value = "25")]
    limit: usize,

    /// Print matches as JSON instead of a table
    #[clap(long)]
    json: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    info!(version = %version_label(), "starting");

    let mut settings = load_settings();
    if let Some(workers) = cli.workers {
        settings.lookup_workers = workers;
    }
    if let Some(dir) = &cli.cache_dir {
        settings.cache_dir = Some(dir.clone());
    }
    if let Some(contact) = &cli.contact {
        settings.contact = Some(contact.clone());
    }
    if settings.contact.is_none() {
        warn!("no contact configured; ESI asks clients to identify an operator (see --contact)");
    }
    if cli.save_settings {
        let path = save_settings(&settings).context("saving settings")?;
        info!(path = %path.display(), "settings saved");
    }

    let cache_dir = settings.resolved_cache_dir();
    let store = DiskStore::open(&cache_dir)
        .with_context(|| format!("opening cache directory {}", cache_dir.display()))?
        .with_ttl(settings.cache_ttl());
    let client = Arc::new(EsiClient::with_base_url(
        &settings.esi_base_url,
        settings.request_timeout(),
        settings.contact.as_deref(),
    )?);
    let references = Arc::new(ReferenceCache::new(client.clone(), store.clone()));

    if cli.clear_cache {
        let removed = references.clear()?;
        info!(removed, "cache cleared");
    }

    let region_id = resolve_region(&cli, &references).await?;
    let criteria = SearchCriteria {
        region_id,
        min_profit: cli.min_profit,
        ship_capacity: cli.capacity,
        tax_rate_percent: cli.tax,
        multi_trip: cli.multi_trip,
        use_cache: !cli.no_cache,
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; cancelling scan");
                cancel.cancel();
            }
        }
    });

    let (progress, events) = ProgressSink::channel();
    let reporter = tokio::spawn(report_progress(events));

    let fetcher = OrderFetcher::new(client, store);
    let fetched = fetcher
        .fetch_region_orders(&criteria, &progress, &cancel)
        .await?;
    if let FetchOutcome::Truncated { page, reason } = &fetched.outcome {
        warn!(
            page,
            reason = %reason,
            "order book incomplete; some opportunities may be missing"
        );
    }

    let engine = MatchEngine::new(references.clone()).with_workers(settings.lookup_workers);
    let report = engine
        .run(&fetched.orders, &criteria, &progress, &cancel)
        .await?;

    drop(progress);
    let _ = reporter.await;

    if report.is_partial() {
        warn!(
            skipped = report.skipped_pairs,
            "some pairs were skipped because reference data was unavailable"
        );
    }

    let shown = &report.matches[..report.matches.len().min(cli.limit)];
    if cli.json {
        println!("{}", serde_json::to_string_pretty(shown)?);
    } else {
        print_table(shown, &references).await;
        println!(
            "{} match(es) from {} order(s) across {} item type(s)",
            report.matches.len(),
            fetched.orders.len(),
            report.types_total
        );
    }

    Ok(())
}

async fn resolve_region(cli: &Cli, references: &ReferenceCache) -> Result<RegionId> {
    if let Some(region_id) = cli.region {
        return Ok(region_id);
    }
    let Some(name) = &cli.region_name else {
        return Ok(SearchCriteria::default().region_id);
    };

    match references.region_by_name(name).await? {
        Some(region) => {
            info!(region_id = region.region_id, name = %region.name, "resolved region");
            Ok(region.region_id)
        }
        None => bail!("no region named {name:?}"),
    }
}

async fn report_progress(mut events: UnboundedReceiver<Progress>) {
    let mut last = String::new();
    while let Some(event) = events.recv().await {
        let label = event.label();
        if label != last {
            eprintln!("{label}");
            last = label;
        }
    }
}

async fn print_table(matches: &[MatchResult], references: &ReferenceCache) {
    println!(
        "{:<32} {:<28} {:<28} {:<18} {:>8} {:>12} {:>5} {:>22} {:>22}",
        "Item", "From", "To", "Dest system", "Qty", "Volume", "Jumps", "Profit", "Profit/jump"
    );
    for result in matches {
        let item = match references.item_info(result.type_id).await {
            Ok(item) => item.name,
            Err(_) => format!("type {}", result.type_id),
        };
        let from = location_name(references, result.sell_order.location_id).await;
        let to = location_name(references, result.buy_order.location_id).await;
        let destination = system_label(references, result.buy_order.system_id).await;

        println!(
            "{:<32} {:<28} {:<28} {:<18} {:>8} {:>12} {:>5} {:>22} {:>22}",
            truncate(&item, 32),
            truncate(&from, 28),
            truncate(&to, 28),
            truncate(&destination, 18),
            result.move_quantity,
            format_volume(result.move_volume_total),
            result.jumps,
            format_isk(result.profit),
            format_isk(result.profit_per_jump),
        );
    }
}

async fn location_name(references: &ReferenceCache, location_id: LocationId) -> String {
    match references.station_info(location_id).await {
        Ok(station) => station.name,
        Err(_) => format!("structure {location_id}"),
    }
}

/// `Jita (0.9)`; security is omitted when unknown.
async fn system_label(references: &ReferenceCache, system_id: SystemId) -> String {
    match references.system_info(system_id).await {
        Ok(system) => match system.display_security() {
            Some(security) => format!("{} ({security:.1})", system.name),
            None => system.name,
        },
        Err(_) => format!("system {system_id}"),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(2)).collect();
    out.push_str("..");
    out
}
