//! PDF Compiler CLI tool
//!
//! A terminal front end for the compile session: merge files in one shot, or
//! build and reorder the list interactively before compiling.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use glob::glob;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use pdf_compiler::logging::init_tracing;
use pdf_compiler::pdf::count_pages;
use pdf_compiler::{CompileSession, CompilerConfig, Error, Notification};

/// PDF Compiler - put PDFs in order and merge them into one
#[derive(Parser)]
#[command(name = "pdf-compiler")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Merge two files
    pdf-compiler merge -o merged.pdf intro.pdf appendix.pdf

    # Merge numbered PDFs in order
    pdf-compiler merge -o handout.pdf \"[0-9]*.pdf\"

    # Build the list interactively
    pdf-compiler shell")]
struct Cli {
    /// Log what the merge is doing (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge PDF files, in the order given, into one
    Merge {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        /// Don't print per-file progress
        #[arg(short, long)]
        quiet: bool,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Edit the file list interactively, then compile it
    Shell {
        /// Keep the list after a successful compile
        #[arg(long)]
        keep_list: bool,

        /// Don't print per-file progress
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "info" } else { "warn" });

    let result = match cli.command {
        Commands::Merge { inputs, output, quiet, open } => cmd_merge(inputs, output, quiet, open),
        Commands::Shell { keep_list, quiet } => {
            let config = CompilerConfig {
                clear_on_success: !keep_list,
                report_progress: !quiet,
            };
            cmd_shell(config)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Expand glob patterns, keeping argument order; each pattern's matches are sorted
fn expand_globs<I, S>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut paths = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched: Vec<PathBuf> = Vec::new();
            for entry in glob(pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))? {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => eprintln!("Warning: glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                bail!("No files matched pattern: {}", pattern);
            }
            matched.sort();
            paths.extend(matched);
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Print notifications; returns the failure message, if any
fn report(notifications: Vec<Notification>) -> Option<String> {
    let mut failure = None;
    for notification in notifications {
        match notification {
            Notification::Status(text) => eprintln!("{}", text),
            Notification::Success(path) => {
                let pages = count_pages(&path)
                    .map(|n| format!(" ({} pages)", n))
                    .unwrap_or_default();
                eprintln!("Success! PDF saved to: {}{}", path.display(), pages);
            }
            Notification::Failure(message) => {
                eprintln!("Merge failed: {}", message);
                failure = Some(message);
            }
        }
    }
    failure
}

/// Merge inputs into one PDF, waiting for the result
fn cmd_merge(inputs: Vec<String>, output: PathBuf, quiet: bool, open: bool) -> anyhow::Result<()> {
    let inputs = expand_globs(inputs)?;

    let mut session = CompileSession::new(CompilerConfig {
        clear_on_success: true,
        report_progress: !quiet,
    });
    session.add(inputs)?;

    eprintln!("Merging {} PDF files...", session.list().len());
    session
        .compile(Some(output.as_path()))
        .context("Could not start the merge")?;

    if let Some(message) = report(session.wait()) {
        return Err(anyhow!(message));
    }

    if open {
        open_file(&output)?;
    }

    Ok(())
}

const SHELL_HELP: &str = "Commands:
    add <file|pattern>...   append files to the list; quote paths with spaces
    rm <n>                  remove entry n
    up <n> / down <n>       move entry n one place
    clear                   empty the list
    list                    show the list
    compile <output.pdf>    merge the list in the background (.pdf added if missing)
    wait                    block until the running merge is done
    help                    show this text
    quit                    leave (waits for a running merge)";

/// Line-oriented session on stdin
fn cmd_shell(config: CompilerConfig) -> anyhow::Result<()> {
    let mut session = CompileSession::new(config);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    eprintln!("Ready. Add 2 or more files to merge. Type 'help' for commands.");

    loop {
        // Whatever the worker posted while we sat at the prompt
        report(session.pump());

        print!("{}> ", if session.is_busy() { "merging" } else { "pdf" });
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let result: anyhow::Result<()> = match command {
            "" => continue,
            "help" | "?" => {
                println!("{}", SHELL_HELP);
                Ok(())
            }
            "list" | "ls" => {
                render(&session);
                Ok(())
            }
            "add" => add_files(&mut session, rest),
            "rm" | "remove" => session.remove(parse_row(rest)).map(|_| {
                eprintln!("File removed.");
                render(&session);
            }).map_err(Into::into),
            "up" => session.move_up(parse_row(rest)).map(|_| render(&session)).map_err(Into::into),
            "down" => session.move_down(parse_row(rest)).map(|_| render(&session)).map_err(Into::into),
            "clear" => session.clear().map(|_| {
                eprintln!("File list cleared.");
                render(&session);
            }).map_err(Into::into),
            "compile" => compile(&mut session, rest),
            "wait" => {
                report(session.wait());
                render(&session);
                Ok(())
            }
            "quit" | "exit" => break,
            other => Err(anyhow!("Unknown command '{}'; type 'help'", other)),
        };

        if let Err(e) = result {
            if is_routine(&e) {
                eprintln!("{}", e);
            } else {
                eprintln!("Error: {:#}", e);
            }
        }
    }

    if session.is_busy() {
        eprintln!("Waiting for the running merge to finish...");
        report(session.wait());
    }
    Ok(())
}

/// 1-based row number as shown by `list`; anything else means no selection
fn parse_row(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok().and_then(|n| n.checked_sub(1))
}

/// Refused edits and compile requests are routine; anything else is an error
fn is_routine(error: &anyhow::Error) -> bool {
    error.downcast_ref::<Error>().is_some_and(Error::is_validation)
}

/// Split shell arguments on whitespace; single or double quotes keep spaces
fn split_args(line: &str) -> anyhow::Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if let Some(q) = quote {
        bail!("Unclosed {} in arguments", q);
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

/// Destination as the save dialog would return it: `.pdf` added when missing
fn with_pdf_extension(path: &str) -> PathBuf {
    let mut path = PathBuf::from(path);
    if !path.as_os_str().is_empty() && path.extension().is_none() {
        path.set_extension("pdf");
    }
    path
}

fn add_files(session: &mut CompileSession, rest: &str) -> anyhow::Result<()> {
    let paths = expand_globs(split_args(rest)?)?;
    let added = session.add(paths)?;
    eprintln!("{} file(s) added.", added);
    render(session);
    Ok(())
}

fn compile(session: &mut CompileSession, rest: &str) -> anyhow::Result<()> {
    let rest = match split_args(rest)?.as_slice() {
        [single] => single.clone(),
        _ => rest.to_string(),
    };
    let destination = with_pdf_extension(&rest);
    match session.compile(Some(destination.as_path())) {
        Ok(request) => {
            eprintln!(
                "Merging {} files into {}... type 'wait' to block until done.",
                request.paths().len(),
                request.destination().display()
            );
            Ok(())
        }
        Err(Error::NoDestination) => {
            eprintln!("Save cancelled.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Re-render the list after a change
fn render(session: &CompileSession) {
    let list = session.list();
    if list.is_empty() {
        println!("(no files; use 'add' to include PDFs)");
        return;
    }
    println!("Files to merge:");
    for (i, entry) in list.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, entry.name());
    }
    if !list.can_merge() {
        println!("Add 2 or more files to merge.");
    }
}
