use clap::Parser;
use nu_ansi_term::Color;
use renterbind_cli::Command;
use tracing_subscriber::EnvFilter;

/// renterbind - currency, contract and transaction utilities
#[derive(Parser, Debug)]
#[command(name = "renterbind")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level regardless of RENTERBIND_LOG
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("RENTERBIND_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match renterbind_cli::run(args.command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{} {}", Color::Red.bold().paint("Error:"), e);
            std::process::exit(1);
        }
    }
}
