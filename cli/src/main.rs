use clap::Parser;
use remote_api_cli::Cli;

fn main() {
    let cli = Cli::parse();
    remote_api_cli::init_tracing(cli.log_calls);
    if let Err(err) = remote_api_cli::run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(remote_api_cli::exit_code(&err));
    }
}
