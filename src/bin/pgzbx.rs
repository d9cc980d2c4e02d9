//! pgzbx - PostgreSQL table metrics for a monitoring agent.
//!
//! Runs one item key per invocation and prints the value on stdout, for use
//! as a `UserParameter` or external check.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{Level, debug, error};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use pgzbx::agent::{self, AgentOptions, OBJECT_PARAM, TableParam};
use pgzbx::connection::SslMode;

/// PostgreSQL table metrics for a monitoring agent.
#[derive(Parser)]
#[command(name = "pgzbx", about = "PostgreSQL table metrics for a monitoring agent", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// TLS mode for the connection. Overrides PGSSLMODE.
    #[arg(long, value_enum, global = true)]
    sslmode: Option<SslMode>,

    /// Connection timeout in seconds (0 waits forever).
    #[arg(long, default_value = "10", global = true)]
    connect_timeout: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is warn level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run an item key and print its value,
    /// e.g. 'pg.table.size[localhost,5432,shop,zabbix,,orders]'.
    Get {
        /// Item key with optional [host,port,db,user,passwd,table] params.
        item_key: String,
    },
    /// Print the SQL an item key would run, without connecting.
    Sql {
        /// Item key with optional [host,port,db,user,passwd,table] params.
        item_key: String,
    },
    /// List supported item keys.
    Keys,
}

/// Initializes the tracing subscriber on stderr; stdout carries the value.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("pgzbx={}", level).parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_get(item_key: &str, options: &AgentOptions) -> ExitCode {
    match agent::process(item_key, options) {
        Ok(response) => {
            println!("{}", response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "{}", item_key);
            println!("ZBX_NOTSUPPORTED: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_sql(item_key: &str) -> ExitCode {
    let planned = agent::parse_item_key(item_key)
        .and_then(|req| agent::plan(&req.key, req.param(OBJECT_PARAM)));

    match planned {
        Ok(plan) => {
            let statement = plan.statement();
            println!("{}", statement.literal_sql().trim());
            for (idx, param) in statement.params.iter().enumerate() {
                println!("-- ${} = {:?}", idx + 1, param);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_keys() -> ExitCode {
    for (key, param) in agent::supported_keys() {
        let hint = match param {
            TableParam::None => "[<conn>]",
            TableParam::Optional => "[<conn>,<table>]",
            TableParam::Required => "[<conn>,table]",
        };
        println!("{}{}", key, hint);
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let options = AgentOptions {
        sslmode: args.sslmode,
        connect_timeout: (args.connect_timeout > 0)
            .then(|| Duration::from_secs(args.connect_timeout)),
    };
    debug!(?options, "pgzbx {} starting", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Get { item_key } => run_get(item_key, &options),
        Command::Sql { item_key } => run_sql(item_key),
        Command::Keys => run_keys(),
    }
}
