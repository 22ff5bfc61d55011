// ytgrab-cli/src/commands/resolve.rs
//
// The `resolve` command: runs URL resolution only and prints the best
// known URL (the direct media link when extraction succeeded).

use std::env;

use log::debug;
use ytgrab_core::{CoreConfig, CoreResult, EventDispatcher, ResolvedTarget, UrlResolver};

use crate::cli::ResolveArgs;
use crate::commands::locate_tool;
use crate::output::ConsoleHandler;

pub fn run_resolve(args: ResolveArgs) -> CoreResult<ResolvedTarget> {
    let downloader = locate_tool(args.downloader, "yt-dlp")?;
    // Resolution never touches the download directory.
    let config = CoreConfig::new(downloader, env::current_dir()?);

    let (console, printer) = ConsoleHandler::spawn();
    let mut events = EventDispatcher::new();
    events.add_handler(console);

    let target = {
        let resolver = UrlResolver::new(&config, &events);
        resolver.resolve(&args.url)
    };

    drop(events);
    if printer.join().is_err() {
        debug!("console printer thread panicked");
    }

    println!("{}", target.resolved_url);
    Ok(target)
}
