use log::LevelFilter;

use clap::Parser;
use snafu::ErrorCompat;

mod args;
mod audit;

fn main() {
    let args = args::Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();

    let config_path = match args.config {
        Some(p) => p,
        None => {
            eprintln!("No run configuration provided. Use --config to point at one.");
            std::process::exit(2);
        }
    };

    let res = audit::run_audit(config_path, args.reference, args.out, args.check_embedded);
    if let Err(e) = res {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
