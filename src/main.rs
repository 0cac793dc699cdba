//! Terminal shell around the flipview engine
//!
//! Wires the view controller to the filesystem provider and a logging
//! display sink, driven by one-letter stdin commands. Contains no engine
//! logic; it exists to exercise the whole path end-to-end.

use clap::Parser;
use log::debug;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use flipview::cli::Args;
use flipview::frame::DisplayFrame;
use flipview::media::{FsProvider, FsTrash};
use flipview::source::{ConfirmPrompt, DisplaySink};
use flipview::viewer::{Viewer, ViewerConfig};

/// Headless sink: counts presents and traces them to the log.
#[derive(Default)]
struct LogSink {
    presents: AtomicUsize,
}

impl DisplaySink for LogSink {
    fn present(&self, frame: &DisplayFrame) {
        let n = self.presents.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "present #{}: {}x{} ({} bytes)",
            n,
            frame.width(),
            frame.height(),
            frame.mem()
        );
    }
}

struct StdinPrompt;

impl ConfirmPrompt for StdinPrompt {
    fn ask_yes_no(&self, message: &str) -> bool {
        print!("{} [y/N] ", message);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        line.trim().eq_ignore_ascii_case("y")
    }
}

fn print_status(viewer: &Viewer) {
    match viewer.current_id() {
        Some(id) => {
            let (used, budget) = viewer.cache_stats();
            println!(
                "[{}/{}] {} (rot {}, state {:?}, cache {}/{} MB)",
                viewer.index() + 1,
                viewer.item_count(),
                id,
                viewer.rotation(),
                viewer.state(),
                used >> 20,
                budget >> 20
            );
        }
        None => println!("(empty folder)"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = ViewerConfig {
        width: args.width,
        height: args.height,
        cache_budget: args.mem_mb << 20,
        loading_indicator: args.loading,
        ..ViewerConfig::default()
    };
    if let Some(workers) = args.workers {
        config.animation_workers = workers.max(1);
    }

    let mut viewer = Viewer::new(
        config,
        Arc::new(FsProvider),
        Arc::new(LogSink::default()),
        Box::new(StdinPrompt),
        Box::new(FsTrash),
    );
    viewer.set_folder(&args.folder)?;
    print_status(&viewer);
    println!("commands: n(ext) p(rev) r/R(otate) s W H (resize) x (delete) i (info) q (quit)");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("n") => viewer.next(),
            Some("p") => viewer.prev(),
            Some("r") => viewer.rotate_cw(),
            Some("R") => viewer.rotate_ccw(),
            Some("x") => {
                if let Err(e) = viewer.delete_current() {
                    eprintln!("{}", e);
                }
            }
            Some("s") => {
                let w = parts.next().and_then(|s| s.parse().ok());
                let h = parts.next().and_then(|s| s.parse().ok());
                match (w, h) {
                    (Some(w), Some(h)) => {
                        viewer.on_resize(w, h);
                        // Pump the debounce window so the reload settles
                        let end = Instant::now() + Duration::from_millis(250);
                        while Instant::now() < end {
                            viewer.update();
                            std::thread::sleep(Duration::from_millis(20));
                        }
                    }
                    _ => eprintln!("usage: s WIDTH HEIGHT"),
                }
            }
            Some("i") => {}
            Some("q") => break,
            Some(other) => {
                eprintln!("unknown command: {}", other);
                continue;
            }
            None => continue,
        }
        viewer.update();
        print_status(&viewer);
    }

    viewer.stop();
    Ok(())
}
