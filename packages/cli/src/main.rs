use clap::Parser;

use metatree_cli::Cli;

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if let Err(e) = metatree_cli::run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
