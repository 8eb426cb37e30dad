use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use collections::{CollectionManager, Confirmation};
use std::fs::OpenOptions;
use std::future::Future;
use std::io::{BufRead, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vecprobe_core::{BackendKind, EndpointDescriptor, ProbeOutcome};

mod config;
mod report;

use config::{Config, EndpointConfig};
use report::BackendReport;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

#[derive(Debug, Parser)]
#[command(name = "vecprobe", version, about = "Connectivity diagnostics for REST and RPC vector stores")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./vecprobe.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log request-level detail to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(flatten)]
    endpoints: EndpointArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Endpoints")]
struct EndpointArgs {
    /// REST backend host, with or without scheme
    #[arg(long, global = true, env = "QDRANT_HOST")]
    rest_host: Option<String>,
    /// REST backend port (6334 implies https for a bare host)
    #[arg(long, global = true, env = "QDRANT_PORT")]
    rest_port: Option<u16>,
    /// REST backend API key, sent as the `api-key` header
    #[arg(long, global = true, env = "QDRANT_API_KEY", hide_env_values = true)]
    rest_api_key: Option<String>,
    /// REST request timeout in seconds
    #[arg(long, global = true)]
    rest_timeout_secs: Option<u64>,
    /// RPC backend host, with or without scheme
    #[arg(long, global = true, env = "ZILLIZ_HOST")]
    rpc_host: Option<String>,
    /// RPC backend port
    #[arg(long, global = true, env = "ZILLIZ_PORT")]
    rpc_port: Option<u16>,
    /// RPC backend API key (kept for parity; the health and DNS tiers do not send it)
    #[arg(long, global = true, env = "ZILLIZ_API_KEY", hide_env_values = true)]
    rpc_api_key: Option<String>,
    /// Timeout for the RPC backend's HTTP health check, in seconds
    #[arg(long, global = true)]
    rpc_health_timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Probe both backends, REST first, and report one diagnosis per backend
    Check {
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write CSV instead of text/json when --out is provided
        #[arg(long, default_value_t = false)]
        csv: bool,
        /// Do not probe the REST backend
        #[arg(long, default_value_t = false)]
        skip_rest: bool,
        /// Do not probe the RPC backend
        #[arg(long, default_value_t = false)]
        skip_rpc: bool,
    },
    /// Check whether a collection exists on the REST backend
    Exists {
        /// Collection name (default from config, else pet-vet-embeddings)
        name: Option<String>,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Delete a collection on the REST backend. Irreversible.
    Delete {
        /// Collection name (default from config, else pet-vet-embeddings)
        name: Option<String>,
        /// Confirm without prompting
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

/// Everything a command needs, after flags, environment and config file are merged.
#[derive(Debug)]
struct Settings {
    rest: EndpointDescriptor,
    rest_timeout: Duration,
    rpc: EndpointDescriptor,
    rpc_health_timeout: Duration,
    collection: String,
    lifecycle_timeout: Duration,
}

fn endpoint_from(
    backend: BackendKind,
    host: Option<&String>,
    port: Option<u16>,
    api_key: Option<&String>,
    file: Option<&EndpointConfig>,
) -> EndpointDescriptor {
    let host = host.cloned().or_else(|| file.and_then(|f| f.host.clone())).unwrap_or_else(|| "localhost".into());
    let port = port.or_else(|| file.and_then(|f| f.port)).unwrap_or_else(|| backend.default_port());
    let api_key = api_key.cloned().or_else(|| file.and_then(|f| f.api_key.clone()));
    EndpointDescriptor::new(backend, host, port).with_api_key(api_key)
}

fn secs(cli: Option<u64>, file: Option<u64>, default: Duration) -> Duration {
    cli.or(file).map(Duration::from_secs).unwrap_or(default)
}

impl Settings {
    fn resolve(args: &EndpointArgs, cfg: Option<&Config>) -> Self {
        let rest_file = cfg.and_then(|c| c.rest.as_ref());
        let rpc_file = cfg.and_then(|c| c.rpc.as_ref());
        let coll_file = cfg.and_then(|c| c.collections.as_ref());
        Settings {
            rest: endpoint_from(BackendKind::Rest, args.rest_host.as_ref(), args.rest_port, args.rest_api_key.as_ref(), rest_file),
            rest_timeout: secs(args.rest_timeout_secs, rest_file.and_then(|f| f.timeout_secs), rest_probe::DEFAULT_TIMEOUT),
            rpc: endpoint_from(BackendKind::Rpc, args.rpc_host.as_ref(), args.rpc_port, args.rpc_api_key.as_ref(), rpc_file),
            rpc_health_timeout: secs(args.rpc_health_timeout_secs, rpc_file.and_then(|f| f.timeout_secs), rpc_probe::DEFAULT_HEALTH_TIMEOUT),
            collection: coll_file
                .and_then(|c| c.name.clone())
                .unwrap_or_else(|| collections::DEFAULT_COLLECTION.to_string()),
            lifecycle_timeout: secs(None, coll_file.and_then(|c| c.timeout_secs), collections::DEFAULT_TIMEOUT),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if needs_settings(&cli.command) {
        let loaded_cfg = config::load_config(cli.config.as_deref())?;
        let settings = Settings::resolve(&cli.endpoints, loaded_cfg.as_ref());
        tracing::debug!(?settings, "resolved settings");
        run(cli.command, settings)
    } else {
        print_version()
    }
}

fn print_version() -> Result<ExitCode> {
    println!("vecprobe {} (core {})", env!("CARGO_PKG_VERSION"), vecprobe_core::version());
    Ok(ExitCode::SUCCESS)
}

/// `version` must work even when the config file is broken.
fn needs_settings(cmd: &Commands) -> bool {
    !matches!(cmd, Commands::Version)
}

fn run(command: Commands, settings: Settings) -> Result<ExitCode> {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    match command {
        Commands::Version => print_version(),
        Commands::Check { format, out, csv, skip_rest, skip_rpc } => {
            let mut reports = Vec::new();
            // REST first, then RPC
            if !skip_rest {
                let desc = &settings.rest;
                let endpoint = desc.normalize();
                let probe = rest_probe::probe_with_timeout(&endpoint, desc.api_key.as_deref(), settings.rest_timeout);
                reports.push(timed(&rt, desc, probe));
            }
            if !skip_rpc {
                let endpoint = settings.rpc.normalize();
                let resolver = rpc_probe::SystemResolver;
                let probe = rpc_probe::probe_with(&endpoint, &resolver, settings.rpc_health_timeout);
                reports.push(timed(&rt, &settings.rpc, probe));
            }
            emit_check(&reports, format, out, csv)?;
            let failed = report::failures(&reports);
            Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Exists { name, format } => {
            let name = name.unwrap_or(settings.collection.clone());
            let manager = CollectionManager::connect(&settings.rest, settings.lifecycle_timeout)
                .context("cannot build REST client")?;
            let state = rt.block_on(manager.exists(&name));
            match format {
                OutputFormat::Text => match (state.exists, state.dimension) {
                    (true, Some(d)) => println!("collection '{}' exists (dimension {})", name, d),
                    (true, None) => println!("collection '{}' exists", name),
                    (false, _) => println!("collection '{}' does not exist (or could not be read)", name),
                },
                OutputFormat::Json | OutputFormat::Jsonl => {
                    let obj = serde_json::json!({
                        "collection": name,
                        "url": manager.client().endpoint().base_url,
                        "exists": state.exists,
                        "dimension": state.dimension,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Delete { name, yes } => {
            let name = name.unwrap_or(settings.collection.clone());
            let manager = CollectionManager::connect(&settings.rest, settings.lifecycle_timeout)
                .context("cannot build REST client")?;
            println!("REST backend: {}", manager.client().endpoint().base_url);
            println!("checking collection: {}", name);
            let state = rt.block_on(manager.exists(&name));
            if !state.exists {
                println!("collection '{}' does not exist (or could not be read); nothing to delete", name);
                return Ok(ExitCode::SUCCESS);
            }
            match state.dimension {
                Some(d) => println!("collection '{}' exists (dimension {})", name, d),
                None => println!("collection '{}' exists", name),
            }
            println!();
            println!("WARNING: about to delete collection '{}'.", name);
            println!("This cannot be undone; every vector in it is lost.");
            let Some(confirmation) = confirm(yes)? else {
                println!("deletion cancelled");
                return Ok(ExitCode::SUCCESS);
            };
            let result = rt.block_on(manager.delete(&name, confirmation));
            println!("{}", result.message());
            if result.is_success() {
                println!("the collection will be recreated with the current dimension on next application start");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("deletion failed; check that:");
                eprintln!("  1. the REST backend is reachable");
                eprintln!("  2. the API key is correct");
                eprintln!("  3. the collection name is correct");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn timed<F>(rt: &tokio::runtime::Runtime, desc: &EndpointDescriptor, probe: F) -> BackendReport
where
    F: Future<Output = ProbeOutcome>,
{
    let started_at = report::now_rfc3339();
    let start = Instant::now();
    let outcome = rt.block_on(probe);
    BackendReport {
        backend: desc.backend,
        endpoint: desc.normalize(),
        api_key_configured: desc.api_key.is_some(),
        outcome,
        started_at,
        ended_at: report::now_rfc3339(),
        duration_ms: start.elapsed().as_millis(),
    }
}

/// `--yes`, or an interactive `yes`/`y`. Without a terminal and without the flag the answer is no.
fn confirm(flag: bool) -> Result<Option<Confirmation>> {
    if flag {
        return Ok(Confirmation::from_flag(true));
    }
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        println!("not a terminal and --yes not given");
        return Ok(None);
    }
    print!("confirm deletion? (yes/no): ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(Confirmation::from_answer(&answer))
}

fn emit_check(reports: &[BackendReport], format: OutputFormat, out: Option<PathBuf>, csv: bool) -> Result<()> {
    if csv {
        match &out {
            Some(path) => {
                let file = OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
                return report::write_csv(BufWriter::new(file), reports);
            }
            None => eprintln!("--csv requires --out <file>"),
        }
    }
    let mut lines = Vec::new();
    match format {
        OutputFormat::Text => {
            for r in reports { lines.extend(r.text_lines()); }
            let failed = report::failures(reports);
            lines.push(format!("{} backend(s) checked, {} failed", reports.len(), failed));
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "results": reports.iter().map(BackendReport::to_json).collect::<Vec<_>>(),
                "failed": report::failures(reports),
            });
            lines.push(serde_json::to_string(&obj)?);
        }
        OutputFormat::Jsonl => {
            for r in reports { lines.push(serde_json::to_string(&r.to_json())?); }
        }
    }
    if let Some(path) = out {
        let file = OpenOptions::new().create(true).truncate(true).write(true).open(&path)?;
        let mut w = BufWriter::new(file);
        for l in &lines { writeln!(w, "{}", l)?; }
        w.flush()?;
    } else {
        for l in &lines { println!("{}", l); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecprobe_core::Scheme;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid args")
    }

    #[test]
    fn flags_override_config_file() {
        let cli = parse(&["vecprobe", "--rest-host", "q.example.com", "check"]);
        let cfg = Config {
            rest: Some(EndpointConfig { host: Some("file-host".into()), port: Some(6333), api_key: Some("k".into()), timeout_secs: Some(3) }),
            rpc: None,
            collections: None,
        };
        let s = Settings::resolve(&cli.endpoints, Some(&cfg));
        assert_eq!(s.rest.raw_host, "q.example.com");
        assert_eq!(s.rest.port, 6333);
        assert_eq!(s.rest.api_key.as_deref(), Some("k"));
        assert_eq!(s.rest_timeout, Duration::from_secs(3));
        assert_eq!(s.rpc.port, 19530);
        assert_eq!(s.collection, collections::DEFAULT_COLLECTION);
    }

    #[test]
    fn defaults_infer_tls_for_rest() {
        let cli = parse(&["vecprobe", "check", "--rest-host", "qdrant.example.com"]);
        let s = Settings::resolve(&cli.endpoints, None);
        let ep = s.rest.normalize();
        assert_eq!(ep.scheme, Scheme::Https);
        assert_eq!(ep.base_url, "https://qdrant.example.com:6334");
        assert_eq!(s.rest_timeout, rest_probe::DEFAULT_TIMEOUT);
        assert_eq!(s.rpc_health_timeout, rpc_probe::DEFAULT_HEALTH_TIMEOUT);
    }

    #[test]
    fn delete_requires_nothing_but_accepts_yes() {
        let cli = parse(&["vecprobe", "delete", "docs", "--yes"]);
        match cli.command {
            Commands::Delete { name, yes } => {
                assert_eq!(name.as_deref(), Some("docs"));
                assert!(yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn only_version_skips_the_config_file() {
        assert!(!needs_settings(&parse(&["vecprobe", "version"]).command));
        assert!(needs_settings(&parse(&["vecprobe", "check"]).command));
        assert!(needs_settings(&parse(&["vecprobe", "exists"]).command));
        assert!(needs_settings(&parse(&["vecprobe", "delete"]).command));
    }

    #[test]
    fn confirm_flag_short_circuits() {
        assert!(confirm(true).expect("no io").is_some());
    }
}
