use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use sd400_core::{
    audio::{write_wav_file, WavSpec},
    cancellation,
    http::HttpServer,
    rpc::RpcServer,
    shell::{parse_duration, Shell},
    CollarCommand, Config, Remote, RemoteId, SAMPLE_RATE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "sd400-remote")]
#[command(about = "Software remote for the SD-400 training collar", long_about = None)]
#[command(version)]
struct Cli {
    /// Remote identity: remote1, remote2 or four hex digits
    #[arg(long, global = true, default_value = "remote1")]
    remote: RemoteId,

    /// Path to the rpitx binary [default: $HOME/src/rpitx/rpitx]
    #[arg(long, global = true)]
    rpitx: Option<PathBuf>,

    /// Folder to store the WAV file sent to rpitx
    #[arg(long, global = true, default_value = ".")]
    wav_dir: PathBuf,

    /// Output sample rate in Hz
    #[arg(long, global = true, default_value_t = SAMPLE_RATE)]
    sample_rate: u32,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the RPC and HTTP servers and the interactive shell (default)
    Serve {
        /// Address for the RPC server
        #[arg(long, default_value = ":50051")]
        rpc_addr: String,

        /// Address for the HTTP server
        #[arg(long, default_value = ":8000")]
        http_addr: String,

        /// Folder served at GET /
        #[arg(long, default_value = "static")]
        static_dir: PathBuf,
    },

    /// Synthesize a command to <wav-dir>/result.wav without transmitting
    Render {
        #[command(subcommand)]
        command: CommandArgs,
    },

    /// Print the symbol string of a command
    Frame {
        #[command(subcommand)]
        command: CommandArgs,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum CommandArgs {
    /// Beep for a duration, e.g. 1s
    Beep {
        #[arg(value_parser = parse_duration)]
        duration: Duration,
    },

    /// Momentary stimulation at level 1-8
    Nick {
        #[arg(allow_negative_numbers = true)]
        level: i64,
    },

    /// Continuous stimulation at level 1-8 for a duration
    Shock {
        #[arg(allow_negative_numbers = true)]
        level: i64,
        #[arg(value_parser = parse_duration)]
        duration: Duration,
    },
}

impl From<CommandArgs> for CollarCommand {
    fn from(args: CommandArgs) -> Self {
        match args {
            CommandArgs::Beep { duration } => CollarCommand::beep(duration),
            CommandArgs::Nick { level } => CollarCommand::nick(level),
            CommandArgs::Shock { level, duration } => CollarCommand::shock(level, duration),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    log_setup(cli.verbose);

    let config = Arc::new(Config {
        remote_id: cli.remote.clone(),
        sample_rate: cli.sample_rate,
        rpitx_path: cli.rpitx.clone().unwrap_or_else(sd400_core::default_rpitx_path),
        wav_output_dir: cli.wav_dir.clone(),
        ..Config::default()
    });
    let remote = Arc::new(Remote::new(config));

    match cli.command {
        None => serve(remote, ":50051", ":8000", PathBuf::from("static")).await,
        Some(Commands::Serve {
            rpc_addr,
            http_addr,
            static_dir,
        }) => serve(remote, &rpc_addr, &http_addr, static_dir).await,
        Some(Commands::Render { command }) => render(&remote, command.into()).await,
        Some(Commands::Frame { command }) => {
            let command = command.into();
            remote.sample_count(&command)?;
            println!("{}", remote.frame(&command));
            Ok(())
        }
    }
}

fn log_setup(verbose: u8) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
        return;
    }

    let filter = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("sd400_core", filter)
        .filter_module("sd400_remote", filter)
        .init();
}

// ":8000" binds every interface
fn listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

async fn serve(remote: Arc<Remote>, rpc_addr: &str, http_addr: &str, static_dir: PathBuf) -> Result<()> {
    let rpc_listener = TcpListener::bind(listen_addr(rpc_addr))
        .await
        .with_context(|| format!("failed to listen for RPC on {}", rpc_addr))?;
    let http_listener = TcpListener::bind(listen_addr(http_addr))
        .await
        .with_context(|| format!("failed to listen for HTTP on {}", http_addr))?;

    let (shutdown, cancel) = cancellation();

    let rpc = Arc::new(RpcServer::new(Arc::clone(&remote), cancel.clone()));
    tokio::spawn(async move {
        if let Err(err) = rpc.serve(rpc_listener).await {
            error!("RPC server failed: {}", err);
        }
    });

    let http = Arc::new(HttpServer::new(Arc::clone(&remote), static_dir, cancel.clone()));
    tokio::spawn(async move {
        if let Err(err) = http.serve(http_listener).await {
            error!("HTTP server failed: {}", err);
        }
    });

    let runtime = tokio::runtime::Handle::current();
    let shell = tokio::task::spawn_blocking(move || {
        let mut shell = Shell::try_new(remote, runtime, cancel)?;
        shell.run()
    });
    let result = shell.await.context("shell panicked")?;

    info!("shutting down");
    shutdown.cancel();
    result?;
    Ok(())
}

async fn render(remote: &Remote, command: CollarCommand) -> Result<()> {
    let config = remote.config();
    remote.sample_count(&command)?;
    let samples = remote.render(&command);
    let path = config.wav_path();
    write_wav_file(&path, &WavSpec::stereo(config.sample_rate), &samples)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!(
        "Wrote {} ({} samples, {:.1} ms)",
        path.display(),
        samples.len(),
        samples.len() as f64 * 1000.0 / config.sample_rate as f64
    );
    Ok(())
}
