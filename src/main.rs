use clap::{ArgAction, Parser};
use log::{LevelFilter, error};
use rpclog_verify::rpc::RpcNames;
use rpclog_verify::{ChainLink, ChainSpec, verify_chain};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rpclog-verify")]
#[command(about = "Check that client and server logs match for a given rpc name", long_about = None)]
struct Cli {
    /// The name of the rpc to check.
    rpc_name: String,

    /// The path to the client library's logfile.
    client_log: PathBuf,

    /// The path to the server's logfile.
    server_log: PathBuf,

    /// The address of the server.
    server_address: Option<String>,

    /// The path to the controller's logfile.
    #[arg(requires = "ctl_address")]
    ctl_log: Option<PathBuf>,

    /// The address of the controller.
    ctl_address: Option<String>,

    /// Enable verbose output (additional flags increase verbosity).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Fail when an operation is missing from the next log in the chain.
    #[arg(long)]
    strict: bool,

    /// JSON file replacing the built-in list of rpc names.
    #[arg(long, value_name = "FILE")]
    rpc_names: Option<PathBuf>,

    /// Write the full report as JSON.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

fn configure_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    configure_logging(cli.verbose);

    let names = match &cli.rpc_names {
        Some(path) => RpcNames::from_json_file(path)?,
        None => RpcNames::builtin(),
    };

    // The client's own address is never known; every later hop is
    // identified by the address it was reached at.
    let mut links = vec![
        ChainLink::new("CLIENT_LOG", cli.client_log, None),
        ChainLink::new("SERVER_LOG", cli.server_log, cli.server_address),
    ];
    if let Some(ctl_log) = cli.ctl_log {
        links.push(ChainLink::new("CTL_LOG", ctl_log, cli.ctl_address));
    }

    let spec = ChainSpec {
        rpc_name: cli.rpc_name,
        links,
        strict: cli.strict,
    };

    let report = match verify_chain(&spec, &names) {
        Ok(report) => report,
        Err(e) => {
            error!("{:#}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(path) = &cli.report {
        report.write_json(path)?;
    }

    if !report.all_match() {
        for pair in report.failed_pairs() {
            error!(
                "operations in '{}' and '{}' do not match ({} findings)",
                pair.origin.display(),
                pair.target.display(),
                pair.diagnostics.len()
            );
        }
        error!("Not all operations match");
        return Ok(ExitCode::FAILURE);
    }

    println!("All operations match");
    Ok(ExitCode::SUCCESS)
}
