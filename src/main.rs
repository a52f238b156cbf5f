mod browser;
mod cli;
mod dispatcher;
mod logging;
mod outside;
mod result;
mod search;
mod settings;
mod shell;
mod types;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use tracing::{debug, info};

use crate::{
    browser::{Session, WebDriverLauncher},
    cli::Args,
    dispatcher::Dispatcher,
    outside::{Ffmpeg, Ytdl},
    settings::Settings,
    shell::Shell,
};

fn main() -> miette::Result<()> {
    // Initialize the logging & CLI
    let args = Args::parse();
    logging::init_logging(args.log_level)?;

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    debug!("{settings:?}");

    // Make sure the needed directories are created
    std::fs::create_dir_all(&settings.download.out_dir)
        .into_diagnostic()
        .wrap_err("Could not create out directory")?;

    let ytdl = Ytdl::new()
        .map_err(miette::Report::from)
        .wrap_err("Cannot download without an extractor")?;
    info!("Downloads will go through {}", ytdl.program());
    let ffmpeg = Ffmpeg;

    // Searches are driven asynchronously, one at a time, from the shell thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
        .wrap_err("Could not start the async runtime")?;

    let mut session = Session::new(WebDriverLauncher {
        webdriver_url: settings.browser.webdriver_url.clone(),
        headless: settings.browser.headless,
    });

    let dispatcher = Dispatcher::new(
        &ytdl,
        &ffmpeg,
        &settings.download.out_dir,
        settings.download.codec,
        settings.download.quality,
    );

    let res = Shell::new(&runtime, &mut session, dispatcher, &settings).run(args.query.clone());

    // Release the browser whatever happened in the shell
    if session.is_open() {
        runtime.block_on(session.close());
    }

    info!("Bye");
    res
}
