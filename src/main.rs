//! cert-corpus - tooling for a content-addressed X.509 certificate corpus

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cert_corpus::bookkeeping::DomainStore;
use cert_corpus::harvest::{self, HarvestConfig};
use cert_corpus::import::import_csv;
use cert_corpus::probe::OpensslProber;
use cert_corpus::report;
use cert_corpus::storage::{run_repair, CertDatabase, RepairOptions};
use cert_corpus::x509;
use cert_corpus::{CertHash, CorpusError};

#[derive(Parser, Debug)]
#[command(name = "cert-corpus")]
#[command(about = "Harvest, store and inspect a content-addressed X.509 certificate corpus")]
struct Cli {
    /// Log level
    #[arg(long, env = "CERT_CORPUS_LOG", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand that touches the corpus
#[derive(Args, Debug, Clone)]
struct CorpusArgs {
    /// Path of the certificate database directory
    #[arg(short = 'c', long, env = "CERT_CORPUS_DB", default_value = "certs")]
    certdb: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe candidate hosts and store the certificate chains they present
    Scrape(ScrapeArgs),
    /// Sanity check the corpus and repair what is broken
    Check(CheckArgs),
    /// Seed the domain list from ranked CSV exports
    Import(ImportArgs),
    /// Search all stored certificates for a pattern in their rendered text
    Find(FindArgs),
    /// Dump one connection by its ID
    ShowId(ShowIdArgs),
    /// Dump every connection recorded for a servername
    ShowHost(ShowHostArgs),
    /// Dump one certificate by its SHA-256 digest
    ShowCert(ShowCertArgs),
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Domain bookkeeping database (defaults to <certdb>/domainnames.sqlite3)
    #[arg(long, env = "CERT_CORPUS_DOMAIN_DB")]
    domain_db: Option<PathBuf>,

    /// Probe the hosts in this newline-separated file instead of the
    /// scheduled candidates (bypasses the max-age filter)
    #[arg(long)]
    hosts: Option<PathBuf>,

    /// Number of concurrent probe workers
    #[arg(long, default_value = "20")]
    workers: usize,

    /// Per-probe timeout in seconds
    #[arg(long, default_value = "15")]
    timeout_secs: u64,

    /// Only probe hosts whose last attempt is older than this many days
    #[arg(long, default_value = "365")]
    max_age_days: u64,

    /// Probe at most this many hosts
    #[arg(long)]
    limit: Option<usize>,

    /// TLS port to probe
    #[arg(long, default_value = "443")]
    port: u16,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Only print stats, do not do any modification of the database
    #[arg(short = 's', long)]
    stats_only: bool,

    /// Do not check if all connections have associated certificate data
    #[arg(long)]
    skip_connection_check: bool,

    /// Do not check for stored certificates that no connection references
    #[arg(long)]
    skip_unused_certificate_check: bool,

    /// Do not optimize the database files as the last step
    #[arg(long)]
    skip_optimization: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Domain bookkeeping database (defaults to <certdb>/domainnames.sqlite3)
    #[arg(long, env = "CERT_CORPUS_DOMAIN_DB")]
    domain_db: Option<PathBuf>,

    /// Zero all scheduling state before importing
    #[arg(long)]
    reset: bool,

    /// CSV files to import, one `rank,domain` per line
    #[arg(required = true)]
    csvfiles: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct FindArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Regular expression matched against the rendered certificate text
    pattern: String,
}

#[derive(Args, Debug)]
struct ShowIdArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Connection ID to dump certificates of
    conn_id: i64,
}

#[derive(Args, Debug)]
struct ShowHostArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Servername whose connections to dump
    servername: String,
}

#[derive(Args, Debug)]
struct ShowCertArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Hex SHA-256 digest of the certificate
    digest: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&cli.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Scrape(args) => scrape(args).await,
        Command::Check(args) => check(args),
        Command::Import(args) => import(args),
        Command::Find(args) => find(args).await,
        Command::ShowId(args) => show_id(args),
        Command::ShowHost(args) => show_host(args),
        Command::ShowCert(args) => show_cert(args).await,
    }
}

fn open_corpus(args: &CorpusArgs) -> anyhow::Result<CertDatabase> {
    CertDatabase::open(&args.certdb)
        .with_context(|| format!("opening certificate database at {}", args.certdb.display()))
}

fn domain_db_path(certdb: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => certdb.join("domainnames.sqlite3"),
    }
}

fn read_host_list(path: &Path) -> std::io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

async fn scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    let config = HarvestConfig {
        workers: args.workers,
        probe_timeout: Duration::from_secs(args.timeout_secs),
        port: args.port,
        max_age: Duration::from_secs(args.max_age_days * 86400),
        limit: args.limit,
        ..Default::default()
    };

    let db = open_corpus(&args.corpus)?;
    let domain_db = domain_db_path(&args.corpus.certdb, args.domain_db.as_deref());
    let domains = DomainStore::open(&domain_db)
        .with_context(|| format!("opening domain database at {}", domain_db.display()))?;

    let candidates = match &args.hosts {
        Some(path) => read_host_list(path)
            .with_context(|| format!("reading host list {}", path.display()))?,
        None => {
            let cutoff = Utc::now().timestamp() - config.max_age.as_secs() as i64;
            domains.candidates(cutoff).context("loading candidate list")?
        }
    };

    let prober = Arc::new(OpensslProber::new(config.port, config.probe_timeout));
    let summary = harvest::run(&db, &domains, candidates, &config, prober).await?;
    println!("{summary}");

    domains.close()?;
    db.close()?;
    Ok(())
}

fn check(args: CheckArgs) -> anyhow::Result<()> {
    let options = RepairOptions {
        check_connections: !args.skip_connection_check,
        check_orphans: !args.skip_unused_certificate_check,
        compact: !args.skip_optimization,
        stats_only: args.stats_only,
    };

    let db = open_corpus(&args.corpus)?;
    let stats = db.stats()?;
    if !args.json {
        println!(
            "Analyzing database with {} connections and {} certificates.",
            stats.connections, stats.certificates
        );
    }

    let report = run_repair(&db, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if options.check_connections {
            println!(
                "Checked {} connections, {} referenced missing certificates.",
                report.connections_checked, report.dangling_connections
            );
        }
        if options.check_orphans {
            println!(
                "{} certificates referenced, {} stored, {} unreferenced.",
                report.referenced_certificates,
                report.stored_certificates,
                report.orphan_certificates
            );
        }
        if args.stats_only {
            println!("Stats-only mode: nothing was modified.");
        }
    }

    db.close()?;
    Ok(())
}

fn import(args: ImportArgs) -> anyhow::Result<()> {
    let path = domain_db_path(&args.corpus.certdb, args.domain_db.as_deref());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    let domains = DomainStore::open(&path)
        .with_context(|| format!("opening domain database at {}", path.display()))?;

    if args.reset {
        let cleared = domains.reset()?;
        println!("Reset scheduling state of {cleared} domainnames.");
    }

    for file in &args.csvfiles {
        println!("Processing CSV {}...", file.display());
        let outcome =
            import_csv(&domains, file).with_context(|| format!("importing {}", file.display()))?;
        let (total, succeeded) = domains.stats()?;
        println!(
            "Added {} of {} rows ({} malformed). Domain name list now contains \
             {} domainnames total, {} of which were successfully scraped before.",
            outcome.added, outcome.lines, outcome.malformed, total, succeeded
        );
    }

    domains.close()?;
    Ok(())
}

async fn find(args: FindArgs) -> anyhow::Result<()> {
    let db = open_corpus(&args.corpus)?;
    if report::find_certificate(&db, &args.pattern).await?.is_none() {
        println!("No certificate matched.");
    }
    db.close()?;
    Ok(())
}

fn show_id(args: ShowIdArgs) -> anyhow::Result<()> {
    let db = open_corpus(&args.corpus)?;
    let conn = db
        .connection(args.conn_id)?
        .ok_or(CorpusError::ConnectionNotFound(args.conn_id))?;
    report::dump_connection(&conn);
    db.close()?;
    Ok(())
}

fn show_host(args: ShowHostArgs) -> anyhow::Result<()> {
    let db = open_corpus(&args.corpus)?;
    let connections = db.connections_for(&args.servername)?;
    if connections.is_empty() {
        println!("No connections recorded for {}.", args.servername);
    }
    for conn in &connections {
        report::dump_connection(conn);
    }
    db.close()?;
    Ok(())
}

async fn show_cert(args: ShowCertArgs) -> anyhow::Result<()> {
    let db = open_corpus(&args.corpus)?;
    let hash = CertHash::from_hex(&args.digest)?;
    match db.certificate(&hash)? {
        Some(der) => {
            println!("{}", x509::to_pem(&der).trim_end());
            match x509::render_text(&der).await {
                Ok(text) => print!("{text}"),
                Err(e) => println!("Failed to render certificate: {e}"),
            }
        }
        None => println!("No certificate with digest {hash} stored."),
    }
    db.close()?;
    Ok(())
}
