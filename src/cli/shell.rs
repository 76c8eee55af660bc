//! `vigil chat` - interactive REPL over the command router

use std::path::PathBuf;

use crate::agent::{CommandKind, CommandRouter};
use crate::domain::Mode;

pub async fn run(router: &CommandRouter) -> anyhow::Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    println!("\x1b[36mVigil Interactive Shell\x1b[0m");
    println!("Watching {}. Type 'help' for commands, 'exit' to quit.", router.agent().symbol());
    println!();

    let history_path = history_path();
    let mut rl = DefaultEditor::new()?;
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        let mode = router.controller().mode().await;
        match rl.readline(&format!("\x1b[36mvigil({})>\x1b[0m ", mode)) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    "exit" | "quit" | "q" => break,
                    "help" | "?" => {
                        print_help(router, mode);
                        continue;
                    }
                    "status" => {
                        print_status(router).await;
                        continue;
                    }
                    _ => {}
                }

                match router.dispatch_line(line).await {
                    Ok(output) => println!("{}", output),
                    Err(e) => print_error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = rl.save_history(path);
    }

    Ok(())
}

fn history_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("vigil").join("history.txt"))
}

fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

fn print_help(router: &CommandRouter, mode: Mode) {
    println!("Available in {} mode:", mode);
    for kind in CommandKind::ALL {
        if router.controller().commands(mode).contains(&kind) {
            println!("  {}", kind.usage());
        }
    }
    println!("  status             mode, loop and cycle counters");
    println!("  help               this message");
    println!("  exit               quit shell");
}

async fn print_status(router: &CommandRouter) {
    let controller = router.controller();
    let agent = router.agent();
    let stats = agent.stats().await;
    let scheduler = controller.scheduler_stats();

    println!("Mode:       {} (epoch {})", controller.mode().await, controller.epoch().await);
    println!(
        "Cycles:     {} recorded, {} ok, {} failed, {} skipped, {} stale",
        stats.recorded,
        stats.succeeded,
        stats.failed,
        stats.skipped,
        agent.stale_discarded()
    );
    println!("Actions:    {} trades, {} posts", stats.trades, stats.posts);
    println!(
        "Scheduler:  {} ticks, {} skipped{}",
        scheduler.ticks,
        scheduler.skipped,
        if scheduler.in_flight { ", cycle running" } else { "" }
    );
    if let Some(last) = agent.recent_cycles(1).await.first() {
        let action = last
            .action()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("Last cycle: {} {} at {}", action, last.result, last.finished_at.format("%H:%M:%S"));
    }
}
