use clap::Parser;
use clapbridge::cli::{execute, Cli};
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .init();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Ctrl-C received, stopping");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Unable to set Ctrl-C handler: {}", e);
    }

    if let Err(e) = execute(cli, &running) {
        error!("{}", e);
        process::exit(e.exit_code());
    }
}
