//! Command-line access to the services of a remote application.

use std::io::Read as _;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use remote_api_core::ApiScope;
use remote_api_core::RemoteApiError;
use remote_api_core::RemoteApiInstaller;
use remote_api_core::RemoteApiOptions;
use remote_api_login::read_credentials_file;
use remote_api_login::write_credentials_file;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit code for options that can't describe a session.
pub const INVALID_OPTIONS_EXIT_CODE: i32 = 3;

const CALL_LOG_FILTER: &str = "remote_api_client=debug,remote_api_core=debug,remote_api_login=debug";

#[derive(Debug, Parser)]
#[command(
    name = "remote-api",
    version,
    about = "Call the services of a remote application"
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log every remote call to stderr.
    #[arg(long)]
    pub log_calls: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// TOML file with connection options. Flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, env = "REMOTE_API_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Serialized session credentials are read from and saved to this file.
    #[arg(long, value_name = "FILE")]
    pub credentials_file: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub remote_api_path: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and report which application the session reaches.
    Login(LoginCommand),

    /// Print the id of the remote application.
    AppId,

    /// Send one encoded request to a service and write the encoded response
    /// to stdout.
    Call(CallCommand),
}

#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Save the session cookies to --credentials-file.
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Args)]
pub struct CallCommand {
    pub service: String,

    pub method: String,

    /// File holding the encoded request. Read from stdin when omitted.
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Options from the config file with the flags layered on top. A saved
    /// session is reused unless a password is given.
    pub fn resolve(&self) -> remote_api_core::Result<RemoteApiOptions> {
        let mut options = match &self.config {
            Some(path) => RemoteApiOptions::load(path)?,
            None => RemoteApiOptions::new(),
        };
        if let Some(host) = &self.host {
            options.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            options.port = port;
        }
        if let Some(email) = &self.email {
            options.email = Some(email.clone());
        }
        if let Some(path) = &self.remote_api_path {
            options.remote_api_path = path.clone();
        }
        if let Some(password) = &self.password {
            options.password = Some(password.clone());
            options.credentials_to_reuse = None;
        } else if options.credentials_to_reuse.is_none()
            && let Some(path) = &self.credentials_file
            && let Some(serialized) = read_credentials_file(path)?
        {
            debug!("reusing credentials from {}", path.display());
            options.credentials_to_reuse = Some(serialized);
        }
        Ok(options)
    }
}

/// Sends `tracing` output to stderr. `RUST_LOG` wins over `log_calls`.
pub fn init_tracing(log_calls: bool) {
    let default_filter = if log_calls { CALL_LOG_FILTER } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.connection.resolve()?;
    if let Command::Login(LoginCommand { save: true }) = &cli.command
        && cli.connection.credentials_file.is_none()
    {
        return Err(
            RemoteApiError::InvalidArgument("--save needs --credentials-file".to_string()).into(),
        );
    }

    let mut scope = ApiScope::default();
    let mut installer = RemoteApiInstaller::new();
    installer.install(&options, &mut scope)?;
    let outcome = execute(&cli, &installer, &scope);
    installer.uninstall(&mut scope)?;
    outcome
}

fn execute(cli: &Cli, installer: &RemoteApiInstaller, scope: &ApiScope) -> anyhow::Result<()> {
    let app_id = installer.app_id().unwrap_or_default();
    match &cli.command {
        Command::Login(LoginCommand { save }) => {
            let credentials = installer
                .credentials()
                .context("remote API is not installed")?;
            if *save && let Some(path) = &cli.connection.credentials_file {
                write_credentials_file(path, credentials)?;
                println!("Saved credentials to {}", path.display());
            }
            println!(
                "Logged in to {} as {} (app {app_id})",
                credentials.host, credentials.email
            );
        }
        Command::AppId => println!("{app_id}"),
        Command::Call(call) => {
            let request = match &call.request {
                Some(path) => std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut request = Vec::new();
                    std::io::stdin().read_to_end(&mut request)?;
                    request
                }
            };
            let response = scope.make_sync_call(&call.service, &call.method, &request)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&response)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RemoteApiError>() {
        Some(RemoteApiError::InvalidArgument(_) | RemoteApiError::Config { .. }) => {
            INVALID_OPTIONS_EXIT_CODE
        }
        _ => 1,
    }
}
