//! `model-archive` CLI entrypoint.
//!
//! Acquires archives through the library pipeline and reports the result,
//! removes downloaded archives from the store, and packages model
//! directories.

use clap::Parser;
use model_archive::archive::{ModelArchive, remove_by_reference};
use model_archive::cli::{AcquireArgs, Cli, CliError, Command, PackArgs, RemoveArgs};
use model_archive::dirs::{BaseDirs, SystemBaseDirs};
use model_archive::output::{ArchiveSummary, write_stderr_line};
use model_archive::packaging::package_archive;
use model_archive::pipeline::Acquirer;
use std::io::Write;

/// Output streams and settings shared by every subcommand.
struct RunContext<'a> {
    quiet: bool,
    dirs: &'a dyn BaseDirs,
    stdout: &'a mut dyn Write,
    stderr: &'a mut dyn Write,
}

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let mut context = RunContext {
        quiet: cli.quiet,
        dirs: &SystemBaseDirs,
        stdout: &mut stdout,
        stderr: &mut stderr,
    };
    let run_result = run(cli.command, &mut context);
    let exit_code = exit_code_for_run_result(run_result, context.stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(command: Command, context: &mut RunContext<'_>) -> Result<(), CliError> {
    match command {
        Command::Acquire(args) => run_acquire(&args, context),
        Command::Remove(args) => run_remove(&args, context),
        Command::Pack(args) => run_pack(args, context),
    }
}

fn run_acquire(args: &AcquireArgs, context: &mut RunContext<'_>) -> Result<(), CliError> {
    let options = args.resolve_options(context.dirs)?;
    if !context.quiet {
        write_stderr_line(context.stderr, format!("Acquiring {}...", args.reference));
    }

    let archive = Acquirer::new(options).acquire(&args.reference)?;
    let reported = report_archive(&archive, args.json, context);

    if args.keep {
        if !context.quiet && archive.is_self_extracted() {
            write_stderr_line(
                context.stderr,
                format!("Kept {}", archive.model_dir().display()),
            );
        }
    } else {
        archive.cleanup();
    }
    reported
}

fn report_archive(
    archive: &ModelArchive,
    json: bool,
    context: &mut RunContext<'_>,
) -> Result<(), CliError> {
    let warnings: Vec<String> = archive.advisories().iter().map(ToString::to_string).collect();
    if !context.quiet {
        for warning in &warnings {
            write_stderr_line(context.stderr, format!("warning: {warning}"));
        }
    }

    let summary = ArchiveSummary::new(archive, warnings);
    let rendered = if json {
        summary.to_json()?
    } else {
        summary.display_text()
    };
    writeln!(context.stdout, "{rendered}")?;
    Ok(())
}

fn run_remove(args: &RemoveArgs, context: &mut RunContext<'_>) -> Result<(), CliError> {
    let config = args.store.load_config()?;
    let store = args.store.resolve_store(&config, context.dirs)?;
    let removed = remove_by_reference(store.as_std_path(), &args.reference);
    if !context.quiet {
        let message = if removed {
            format!("Removed archive for {}", args.reference)
        } else {
            format!("No downloaded archive for {} in {store}", args.reference)
        };
        write_stderr_line(context.stderr, message);
    }
    Ok(())
}

fn run_pack(args: PackArgs, context: &mut RunContext<'_>) -> Result<(), CliError> {
    let output = package_archive(args.into_params())?;
    if !context.quiet && output.encrypted {
        write_stderr_line(context.stderr, "Archive encrypted with the supplied key.");
    }
    writeln!(context.stdout, "Created {}", output.archive_path.display())?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<(), CliError>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}
