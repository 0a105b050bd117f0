//! REPL session management

use std::path::{Path, PathBuf};

use colored::Colorize;
use eyre::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, ExternalPrinter};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use super::command::{ReplCommand, format_notice, format_rows, parse_answer, parse_command};
use crate::config::ReplConfig;
use crate::store::{StoreError, StoreEvent, StoreManager};

/// Interactive REPL session
pub struct ReplSession {
    store: StoreManager,
    config: ReplConfig,
}

impl ReplSession {
    /// Create a new REPL session over a store
    pub fn new(store: StoreManager, config: ReplConfig) -> Self {
        Self { store, config }
    }

    /// Run the REPL main loop
    ///
    /// The store is shut down (stopping its watcher) before this returns.
    pub async fn run(&mut self, initial_file: Option<PathBuf>) -> Result<()> {
        self.print_welcome();

        // Preloaded files skip the confirmation prompt
        if let Some(file) = initial_file {
            self.load(&file).await;
        }

        let rl_config = rustyline::Config::builder()
            .max_history_size(self.config.history_size)
            .map_err(|e| eyre::eyre!("Invalid history size: {}", e))?
            .build();
        let mut rl = DefaultEditor::with_config(rl_config).map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        // On a terminal, notices are printed above the prompt as they arrive.
        // Otherwise they are drained before each prompt.
        let (mut pending, notifier) = match rl.create_external_printer() {
            Ok(printer) => {
                let events = self.store.subscribe_events();
                (None, Some(tokio::spawn(forward_notices(events, printer))))
            }
            Err(e) => {
                debug!(error = %e, "run: no external printer, notices shown between prompts");
                (Some(self.store.subscribe_events()), None)
            }
        };

        let result = self.read_loop(&mut rl, pending.as_mut()).await;

        if let Some(notifier) = notifier {
            notifier.abort();
        }
        result?;

        self.store.shutdown().await.context("Failed to shut down store")?;
        println!("Goodbye!");
        Ok(())
    }

    async fn read_loop(
        &mut self,
        rl: &mut DefaultEditor,
        mut pending: Option<&mut broadcast::Receiver<StoreEvent>>,
    ) -> Result<()> {
        loop {
            if let Some(events) = pending.as_deref_mut() {
                print_pending(events);
            }

            match rl.readline("> ") {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match parse_command(input) {
                        Ok(ReplCommand::Exit) => break,
                        Ok(command) => self.execute(command, rl).await?,
                        Err(msg) => println!("{} {}", "?".yellow(), msg),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "In-Memory CSV Database".bright_cyan().bold());
        println!("Commands: load, unload, print, save, status, help, exit");
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Load a CSV file and start watching it", "load [file]".yellow());
        println!("  {:14} Drop the loaded data and stop watching", "unload".yellow());
        println!("  {:14} Print every row", "print".yellow());
        println!("  {:14} Write the rows back to disk", "save [file]".yellow());
        println!("  {:14} Show what is loaded", "status".yellow());
        println!("  {:14} Exit", "exit".yellow());
        println!();
    }

    async fn execute(&mut self, command: ReplCommand, rl: &mut DefaultEditor) -> Result<()> {
        debug!(?command, "execute: called");
        match command {
            ReplCommand::Load(path) => self.cmd_load(path, rl).await?,
            ReplCommand::Unload => self.cmd_unload().await,
            ReplCommand::Print => self.cmd_print().await,
            ReplCommand::Save(path) => self.cmd_save(path, rl).await?,
            ReplCommand::Status => self.cmd_status().await,
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => {}
        }
        Ok(())
    }

    async fn cmd_load(&mut self, path: Option<PathBuf>, rl: &mut DefaultEditor) -> Result<()> {
        if let Ok(Some(status)) = self.store.status().await {
            println!("A file is already loaded ({}). Unload it first.", status.path.display());
            return Ok(());
        }

        let path = match path {
            Some(path) => path,
            None => match prompt(rl, "Enter CSV filename: ")? {
                Some(name) if !name.is_empty() => PathBuf::from(name),
                _ => {
                    println!("Load cancelled.");
                    return Ok(());
                }
            },
        };

        if !path.exists() {
            println!("{} File not found: {}", "✗".red(), path.display());
            return Ok(());
        }

        if self.config.confirm_load {
            let question = format!("Confirm loading file '{}'? (yes/no): ", path.display());
            let answer = prompt(rl, &question)?.unwrap_or_default();
            if parse_answer(&answer) != Some(true) {
                println!("Load cancelled.");
                return Ok(());
            }
        }

        self.load(&path).await;
        Ok(())
    }

    async fn load(&mut self, path: &Path) {
        match self.store.load(path).await {
            Ok(summary) => {
                println!(
                    "{} File loaded into memory: {} ({} rows)",
                    "✓".green(),
                    summary.path.display(),
                    summary.rows
                );
                if !summary.watching {
                    println!("{} Changes to this file will not be picked up.", "!".yellow());
                }
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    async fn cmd_unload(&mut self) {
        match self.store.unload().await {
            Ok(path) => println!("{} In-memory database unloaded ({}).", "✓".green(), path.display()),
            Err(StoreError::NotLoaded) => println!("No file is currently loaded."),
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    async fn cmd_print(&mut self) {
        match self.store.snapshot().await {
            Ok(records) if records.is_empty() => println!("{}", "(no rows)".dimmed()),
            Ok(records) => {
                for line in format_rows(&records) {
                    println!("{}", line);
                }
            }
            Err(StoreError::NotLoaded) => println!("No data loaded."),
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    async fn cmd_save(&mut self, path: Option<PathBuf>, rl: &mut DefaultEditor) -> Result<()> {
        let status = match self.store.status().await {
            Ok(Some(status)) => status,
            Ok(None) => {
                println!("No data to save.");
                return Ok(());
            }
            Err(e) => {
                println!("{} {}", "✗".red(), e);
                return Ok(());
            }
        };

        let target = match path {
            Some(path) => path,
            None if !self.config.confirm_save => status.path,
            None => {
                let question = format!("Save to original file ({})? (Y/N): ", status.path.display());
                let answer = prompt(rl, &question)?.unwrap_or_default();
                match parse_answer(&answer) {
                    Some(true) => status.path,
                    Some(false) => match prompt(rl, "Enter new filename to save as: ")? {
                        Some(name) if !name.is_empty() => PathBuf::from(name),
                        _ => {
                            println!("Save cancelled: no filename given.");
                            return Ok(());
                        }
                    },
                    None => {
                        println!("Invalid input. Save cancelled.");
                        return Ok(());
                    }
                }
            }
        };

        match self.store.save(&target).await {
            Ok(summary) => println!(
                "{} Data saved to {} ({} rows)",
                "✓".green(),
                summary.path.display(),
                summary.rows
            ),
            Err(e) => println!("{} {}", "✗".red(), e),
        }
        Ok(())
    }

    async fn cmd_status(&mut self) {
        match self.store.status().await {
            Ok(Some(status)) => {
                println!("File: {}", status.path.display().to_string().cyan());
                println!("  Rows: {}", status.rows);
                println!("  Watching: {}", if status.watching { "yes" } else { "no" });
                println!("  Loaded at: {}", status.loaded_at.format("%Y-%m-%d %H:%M:%S UTC"));
                match status.reloaded_at {
                    Some(at) => println!(
                        "  Reloads: {} (last at {})",
                        status.reloads,
                        at.format("%Y-%m-%d %H:%M:%S UTC")
                    ),
                    None => println!("  Reloads: 0"),
                }
            }
            Ok(None) => println!("No file is currently loaded."),
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }
}

/// Print watcher notices that arrived since the last prompt
fn print_pending(events: &mut broadcast::Receiver<StoreEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => println!("{}", format_notice(&event)),
            Err(TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "print_pending: missed watcher notices");
            }
            Err(_) => break,
        }
    }
}

/// Print each watcher notice as soon as it is broadcast
async fn forward_notices<P>(mut events: broadcast::Receiver<StoreEvent>, mut printer: P)
where
    P: ExternalPrinter + Send + 'static,
{
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = printer.print(format!("{}\n", format_notice(&event))) {
                    warn!(error = %e, "forward_notices: failed to print watcher notice");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "forward_notices: missed watcher notices");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Ask a follow-up question. None when the user cancels with Ctrl+C/Ctrl+D.
fn prompt(rl: &mut DefaultEditor, message: &str) -> Result<Option<String>> {
    match rl.readline(message) {
        Ok(line) => Ok(Some(line.trim().to_string())),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(eyre::eyre!("Readline error: {}", err)),
    }
}
