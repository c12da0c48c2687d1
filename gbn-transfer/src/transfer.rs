//! Whole-file drivers built on the engine.
//!
//! [`serve_file`] binds the usual pairing (Responder + Source),
//! [`fetch_file`] the other half (Initiator + Sink), and [`launch`] starts
//! many independent sessions for load testing.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use crate::file_io::{self, FileSink, DEFAULT_OUTPUT_NAME};
use crate::handshake::Endpoint;
use crate::session::TransferReport;
use crate::socket::{Datagram, Socket};
use crate::state::DataRole;

/// Wait for one Initiator on `socket` and push the file at `input` to it.
///
/// The file is read completely before the socket is touched, so a missing
/// input fails with [`TransferError::FileNotFound`] and no traffic.
/// `announce` is offered to the peer as the destination name.
pub async fn serve_file<D: Datagram>(
    socket: D,
    input: &Path,
    announce: Option<&str>,
    config: EngineConfig,
) -> Result<TransferReport> {
    let content = file_io::read_all_bytes(input)?;
    log::info!("[serve] {} ({} bytes) ready", input.display(), content.len());

    let mut endpoint = Endpoint::new(socket, DataRole::Source, config);
    if let Some(name) = announce {
        endpoint = endpoint.announce(name);
    }
    let mut session = endpoint.accept().await?;
    session.send_content(&content).await?;
    session.close().await
}

/// Connect to `server`, receive its file and write it under `out_dir`.
///
/// The output name is `output` when given, otherwise the name the server
/// announced (reduced to a bare file name), otherwise
/// [`DEFAULT_OUTPUT_NAME`].  Returns the path written.
pub async fn fetch_file<D: Datagram>(
    socket: D,
    server: SocketAddr,
    out_dir: &Path,
    output: Option<&str>,
    config: EngineConfig,
) -> Result<(PathBuf, TransferReport)> {
    std::fs::create_dir_all(out_dir).map_err(|source| TransferError::FileIo {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut session = Endpoint::new(socket, DataRole::Sink, config)
        .connect(server)
        .await?;

    let name = output
        .map(str::to_owned)
        .or_else(|| session.peer_announced_name().and_then(file_io::sanitize_file_name))
        .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_owned());
    let mut sink = FileSink::create(out_dir.join(name))?;
    log::info!("[fetch] writing to {}", sink.path().display());

    session.receive_content(&mut sink).await?;
    let report = session.close().await?;
    Ok((sink.path().to_path_buf(), report))
}

/// What each launched session does.
#[derive(Debug, Clone)]
pub enum LaunchMode {
    /// Serve `input` on `bind_ip:base_port + i`.
    Serve {
        input: PathBuf,
        announce: Option<String>,
    },
    /// Fetch from `server_ip:base_port + i` into `out_dir/run-NNN/`.
    Fetch { server_ip: IpAddr, out_dir: PathBuf },
}

/// A batch of independent sessions started one after another.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub mode: LaunchMode,
    pub runs: u16,
    /// Pause between two launches.
    pub delay: Duration,
    pub bind_ip: IpAddr,
    pub base_port: u16,
    pub config: EngineConfig,
}

/// Outcome of a [`launch`].
#[derive(Debug, Default)]
pub struct LaunchSummary {
    pub reports: Vec<(u16, TransferReport)>,
    pub failures: Vec<(u16, TransferError)>,
}

impl LaunchSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Start `plan.runs` sessions, waiting `plan.delay` between launches, and
/// collect every outcome.
///
/// Sessions share nothing; each gets its own socket.  A failed session is
/// recorded in the summary and does not stop the others.
pub async fn launch(plan: LaunchPlan) -> Result<LaunchSummary> {
    let mut tasks = JoinSet::new();

    for run in 0..plan.runs {
        if run > 0 && !plan.delay.is_zero() {
            tokio::time::sleep(plan.delay).await;
        }
        let port = plan.base_port.checked_add(run).ok_or(TransferError::BadState(
            "launch ports run past 65535",
        ))?;
        let config = plan.config.clone();
        let bind_ip = plan.bind_ip;
        let mode = plan.mode.clone();

        log::info!("[launch] run {run} on port {port}");
        tasks.spawn(async move { (run, launch_one(run, mode, bind_ip, port, config).await) });
    }

    let mut summary = LaunchSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((run, Ok(report))) => summary.reports.push((run, report)),
            Ok((run, Err(e))) => {
                log::error!("[launch] run {run} failed: {e}");
                summary.failures.push((run, e));
            }
            Err(e) => log::error!("[launch] session task aborted: {e}"),
        }
    }
    summary.reports.sort_by_key(|(run, _)| *run);
    summary.failures.sort_by_key(|(run, _)| *run);

    log::info!(
        "[launch] {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    Ok(summary)
}

async fn launch_one(
    run: u16,
    mode: LaunchMode,
    bind_ip: IpAddr,
    port: u16,
    config: EngineConfig,
) -> Result<TransferReport> {
    match mode {
        LaunchMode::Serve { input, announce } => {
            let socket = Socket::bind(SocketAddr::new(bind_ip, port)).await?;
            serve_file(socket, &input, announce.as_deref(), config).await
        }
        LaunchMode::Fetch { server_ip, out_dir } => {
            let socket = Socket::bind(SocketAddr::new(bind_ip, 0)).await?;
            let run_dir = out_dir.join(format!("run-{run:03}"));
            let server = SocketAddr::new(server_ip, port);
            let (_, report) = fetch_file(socket, server, &run_dir, None, config).await?;
            Ok(report)
        }
    }
}
