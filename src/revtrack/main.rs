use clap::Parser;
use revtrack::api::RevtrackApi;
use revtrack::commands::fix::IssueSelection;
use revtrack::error::Result;
use revtrack::store::fs_backend::FsBackend;
use revtrack::watch::registry::WatcherRegistry;
use revtrack::watch::WatchController;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod args;
mod print;
use args::{Cli, Commands};

const LOG_ENV: &str = "REVTRACK_LOG";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Watchers = cli.command {
        return handle_watchers(cli.json);
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let api = revtrack::context::open(&cwd, cli.dir.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Init { file } => handle_init(&api, file, json),
        Commands::Watch => handle_watch(api, json),
        Commands::Sync => handle_sync(&api, json),
        Commands::Fix {
            yes,
            repair,
            remove_orphans,
            untrack,
        } => handle_fix(&api, yes, repair, remove_orphans, untrack, json),
        Commands::Bump { file, major } => handle_bump(&api, file, major, json),
        Commands::Archive { file } => handle_archive(&api, file, json),
        Commands::Track { file, limit } => handle_track(&api, file, limit, json),
        Commands::Compact { file } => handle_compact(&api, file, json),
        Commands::Status => handle_status(&api, json),
        Commands::Watchers => handle_watchers(json),
    }
}

type Api = RevtrackApi<FsBackend>;

fn handle_init(api: &Api, file: Option<PathBuf>, json: bool) -> Result<()> {
    match file {
        Some(file) => {
            let report = api.tracking_init(&file)?;
            if json {
                return print::print_json(&report);
            }
            print::print_init(&report);
        }
        None => {
            let report = api.init_all()?;
            if json {
                return print::print_json(&report);
            }
            print::print_init_all(&report);
        }
    }
    Ok(())
}

fn handle_watch(api: Api, json: bool) -> Result<()> {
    let controller = WatchController::start(Arc::new(api), WatcherRegistry::open_default())?;
    if !json {
        print::print_watching(controller.api().workspace().root(), controller.pid());
    }

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&term))?;
    while !term.load(Ordering::Relaxed) && controller.is_running() {
        thread::sleep(Duration::from_millis(200));
    }

    let report = controller.stop()?;
    if json {
        return print::print_json(&report);
    }
    print::print_stopped(&report);
    Ok(())
}

fn handle_sync(api: &Api, json: bool) -> Result<()> {
    let report = api.sync()?;
    if json {
        return print::print_json(&report);
    }
    print::print_sync(&report);
    Ok(())
}

fn handle_fix(
    api: &Api,
    yes: bool,
    repair: bool,
    remove_orphans: bool,
    untrack: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if let Some(file) = untrack {
        let report = api.untrack(&file)?;
        if json {
            return print::print_json(&report);
        }
        print::print_untrack(&report);
        return Ok(());
    }
    if repair {
        let report = api.repair()?;
        if json {
            return print::print_json(&report);
        }
        print::print_repair(&report);
        return Ok(());
    }
    if remove_orphans {
        let report = api.remove_orphans()?;
        if json {
            return print::print_json(&report);
        }
        print::print_orphans(&report);
        return Ok(());
    }
    if yes {
        let report = api.fix(IssueSelection::AllFixable)?;
        if json {
            return print::print_json(&report);
        }
        print::print_fix(&report);
        return Ok(());
    }

    let issues = api.scan_issues()?;
    if json {
        return print::print_json(&issues);
    }
    print::print_issues(&issues);
    Ok(())
}

fn handle_bump(api: &Api, file: Option<PathBuf>, major: bool, json: bool) -> Result<()> {
    let target = api.target_for(file.as_deref())?;
    let report = if major {
        api.merge(&target)?
    } else {
        api.bump(&target)?
    };
    if json {
        return print::print_json(&report);
    }
    print::print_bump(&report);
    Ok(())
}

fn handle_archive(api: &Api, file: Option<PathBuf>, json: bool) -> Result<()> {
    let target = api.target_for(file.as_deref())?;
    let report = api.archive(&target)?;
    if json {
        return print::print_json(&report);
    }
    print::print_archive(&report);
    Ok(())
}

fn handle_track(api: &Api, file: PathBuf, limit: Option<usize>, json: bool) -> Result<()> {
    let view = api.record_history(&file, limit)?;
    if json {
        return print::print_json(&view);
    }
    print::print_history(&view);
    Ok(())
}

fn handle_compact(api: &Api, file: Option<PathBuf>, json: bool) -> Result<()> {
    let target = api.target_for(file.as_deref())?;
    let stats = api.compact(&target)?;
    if json {
        return print::print_json(&stats);
    }
    print::print_stats(&stats);
    Ok(())
}

fn handle_status(api: &Api, json: bool) -> Result<()> {
    let report = api.status()?;
    if json {
        return print::print_json(&report);
    }
    print::print_status(&report);
    Ok(())
}

fn handle_watchers(json: bool) -> Result<()> {
    let entries = match WatcherRegistry::open_default() {
        Some(registry) => registry.live()?,
        None => Vec::new(),
    };
    if json {
        return print::print_json(&entries);
    }
    print::print_watchers(&entries);
    Ok(())
}
