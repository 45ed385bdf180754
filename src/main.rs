use std::process::ExitCode;

use clap::Parser;

use refpaint::settings::Settings;
use refpaint::{cli, log_info, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Truncates the previous session's log
    logger::init();
    logger::set_echo(args.verbose);

    let settings = Settings::load();
    log_info!(
        "Settings loaded ({} slots, eraser radius {})",
        settings.slot_mode.name(),
        settings.eraser_radius
    );

    cli::run(args, &settings)
}
