//! Entry point for `gbn-transfer`.
//!
//! Parses CLI arguments and dispatches into one of the subcommands.  All
//! protocol work lives in the library; `main.rs` owns only process setup
//! (logging, signal handling, argument parsing) and the exit status.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use gbn_transfer::config::{DEFAULT_CONTROL_RETRIES, DEFAULT_WINDOW};
use gbn_transfer::file_io;
use gbn_transfer::socket::Socket;
use gbn_transfer::transfer::{self, LaunchMode, LaunchPlan};
use gbn_transfer::{EngineConfig, Result, TransferError};

/// Reliable file transfer over UDP (three-way handshake + Go-Back-N).
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Wait for one client and send it a file.
    Serve {
        /// Local address to bind.
        #[arg(short, long, default_value = "127.0.0.1:8888")]
        bind: SocketAddr,
        /// File to send.
        #[arg(short, long)]
        input: PathBuf,
        /// Destination name announced to the client.
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        tune: Tunables,
    },
    /// Connect to a server and receive its file.
    Fetch {
        /// Local address to bind (port 0 picks one).
        #[arg(short, long, default_value = "127.0.0.1:0")]
        bind: SocketAddr,
        /// Server address.
        #[arg(short, long, default_value = "127.0.0.1:8888")]
        server: SocketAddr,
        /// Directory for the received file.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Output file name; defaults to the name the server announces.
        #[arg(short, long)]
        output: Option<String>,
        #[command(flatten)]
        tune: Tunables,
    },
    /// Check that two files hold the same bytes.
    Compare {
        first: PathBuf,
        second: PathBuf,
        /// Delete the second file afterwards.
        #[arg(long)]
        remove: bool,
    },
    /// Start many independent sessions on consecutive ports.
    Launch {
        #[arg(long, value_enum)]
        mode: LaunchKind,
        /// Number of sessions.
        #[arg(long, default_value_t = 100)]
        runs: u16,
        /// Pause between launches, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
        /// First port; session `i` uses `base_port + i`.
        #[arg(long, default_value_t = 8888)]
        base_port: u16,
        /// Local IP to bind.
        #[arg(long, default_value = "127.0.0.1")]
        bind_ip: IpAddr,
        /// Server IP (fetch mode).
        #[arg(long, default_value = "127.0.0.1")]
        server_ip: IpAddr,
        /// File to send (serve mode).
        #[arg(short, long, required_if_eq("mode", "serve"))]
        input: Option<PathBuf>,
        /// Destination name announced to clients (serve mode).
        #[arg(short, long)]
        name: Option<String>,
        /// Parent directory for per-run output (fetch mode).
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[command(flatten)]
        tune: Tunables,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LaunchKind {
    Serve,
    Fetch,
}

/// Protocol knobs shared by every transfer subcommand.
#[derive(Args)]
struct Tunables {
    /// Go-Back-N window size, in segments.
    #[arg(long, default_value_t = DEFAULT_WINDOW, value_parser = clap::value_parser!(u32).range(1..))]
    window: u32,
    /// Retransmission timeout, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    rto_ms: u64,
    /// Give up after this many data timeouts without progress (default: never).
    #[arg(long)]
    max_retries: Option<u32>,
    /// Retransmissions of SYN, SYN+ACK and FIN before failing.
    #[arg(long, default_value_t = DEFAULT_CONTROL_RETRIES)]
    control_retries: u32,
    /// Seconds a receiver waits for the sender before giving up (0 = forever).
    #[arg(long, default_value_t = 60)]
    idle_secs: u64,
}

impl Tunables {
    fn config(&self) -> EngineConfig {
        let idle = (self.idle_secs > 0).then(|| Duration::from_secs(self.idle_secs));
        EngineConfig::default()
            .with_window_size(self.window)
            .with_rto(Duration::from_millis(self.rto_ms))
            .with_max_data_retries(self.max_retries)
            .with_max_control_retries(self.control_retries)
            .with_idle_timeout(idle)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default `info` filter.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli.mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode) -> Result<()> {
    match mode {
        Mode::Serve {
            bind,
            input,
            name,
            tune,
        } => {
            let socket = Socket::bind(bind).await?;
            log::info!("Serving {} on {}", input.display(), socket.local_addr);
            let report = cancellable(transfer::serve_file(
                socket,
                &input,
                name.as_deref(),
                tune.config(),
            ))
            .await?;
            println!("{report}");
        }
        Mode::Fetch {
            bind,
            server,
            out_dir,
            output,
            tune,
        } => {
            let socket = Socket::bind(bind).await?;
            log::info!("Fetching from {server} via {}", socket.local_addr);
            let (path, report) = cancellable(transfer::fetch_file(
                socket,
                server,
                &out_dir,
                output.as_deref(),
                tune.config(),
            ))
            .await?;
            println!("{report}");
            println!("Saved {}", path.display());
        }
        Mode::Compare {
            first,
            second,
            remove,
        } => {
            let same = file_io::contents_equal(&first, &second)?;
            println!(
                "{} and {} have the same content: {same}",
                first.display(),
                second.display()
            );
            if remove {
                std::fs::remove_file(&second).map_err(|source| TransferError::FileIo {
                    path: second.clone(),
                    source,
                })?;
                println!("Deleted {}", second.display());
            }
        }
        Mode::Launch {
            mode,
            runs,
            delay_ms,
            base_port,
            bind_ip,
            server_ip,
            input,
            name,
            out_dir,
            tune,
        } => {
            let mode = match mode {
                LaunchKind::Serve => LaunchMode::Serve {
                    // clap requires --input for this mode.
                    input: input.ok_or(TransferError::BadState("serve mode needs --input"))?,
                    announce: name,
                },
                LaunchKind::Fetch => LaunchMode::Fetch { server_ip, out_dir },
            };
            let plan = LaunchPlan {
                mode,
                runs,
                delay: Duration::from_millis(delay_ms),
                bind_ip,
                base_port,
                config: tune.config(),
            };
            let summary = cancellable(transfer::launch(plan)).await?;
            println!(
                "{} session(s) succeeded, {} failed",
                summary.succeeded(),
                summary.failed()
            );
            if summary.failed() > 0 {
                return Err(TransferError::BadState("some launched sessions failed"));
            }
        }
    }
    Ok(())
}

/// Race `fut` against Ctrl-C; dropping the future closes its socket.
async fn cancellable<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        res = fut => res,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted; abandoning transfer");
            Err(TransferError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_serve_requires_input() {
        let err = Cli::try_parse_from(["gbn-transfer", "launch", "--mode", "serve"])
            .err()
            .expect("missing --input must be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn launch_fetch_needs_no_input() {
        let cli = Cli::try_parse_from(["gbn-transfer", "launch", "--mode", "fetch", "--runs", "2"])
            .expect("fetch mode parses without --input");
        assert!(matches!(
            cli.mode,
            Mode::Launch { runs: 2, input: None, .. }
        ));
    }

    #[test]
    fn launch_serve_with_input_parses() {
        let cli = Cli::try_parse_from([
            "gbn-transfer",
            "launch",
            "--mode",
            "serve",
            "--input",
            "apple.jpg",
        ])
        .expect("serve mode with --input parses");
        assert!(matches!(cli.mode, Mode::Launch { input: Some(_), .. }));
    }
}
