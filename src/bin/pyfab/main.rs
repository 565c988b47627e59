mod clean;

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::error;

use pyfab::load_config;
use pyfab::tasks::{RunOptions, TaskContext, TaskError, TaskName, TaskTable};

#[derive(Parser, Debug)]
#[command(name = "pyfab", version, about = "Task runner for everyday Python project chores")]
struct Cli {
    /// Path to config file (auto-detected if not specified)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log file path (mirrors log output to a file)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ToolArgs {
    /// Show hidden tool output and log at debug level
    #[arg(long)]
    debug: bool,

    /// Extra arguments forwarded verbatim to the tool (after `--`)
    #[arg(last = true)]
    extra: Vec<String>,
}

#[derive(Args, Debug)]
struct AutotestArgs {
    /// Keep pytest warnings
    #[arg(long)]
    warnings: bool,

    /// Re-run the tests whenever a source file changes
    #[arg(long)]
    watch: bool,

    /// Extra arguments forwarded verbatim to pytest (after `--`)
    #[arg(last = true)]
    extra: Vec<String>,
}

#[derive(Args, Debug)]
struct FixturesArgs {
    /// Show every fixture instead of the fixtures used per test
    #[arg(long)]
    whole: bool,

    /// Keep pytest warnings
    #[arg(long)]
    warnings: bool,

    /// Extra arguments forwarded verbatim to pytest (after `--`)
    #[arg(last = true)]
    extra: Vec<String>,
}

#[derive(Args, Debug)]
struct TreeArgs {
    /// Depth to list (0 for unlimited); defaults to the configured depth
    #[arg(short = 'L', long)]
    depth: Option<usize>,

    /// Extra arguments forwarded verbatim to tree (after `--`)
    #[arg(last = true)]
    extra: Vec<String>,
}

#[derive(Args, Debug)]
struct GenerateFilesArgs {
    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse coding standards with pylint
    Analyse(ToolArgs),
    /// Format source files with black
    Autoformat(ToolArgs),
    /// Run the test suite with pytest
    Autotest(AutotestArgs),
    /// Check variable types with mypy
    CheckTypes(ToolArgs),
    /// Remove the virtual environment and pylint resource file
    Clean(clean::CleanArgs),
    /// Scaffold files, create the virtual environment and install packages
    Develop(ToolArgs),
    /// Create a bare virtual environment
    Env(ToolArgs),
    /// Show the pytest fixtures used by the tests
    Fixtures(FixturesArgs),
    /// Generate the essential files of a Python project
    GenerateFiles(GenerateFilesArgs),
    /// Install the requirements file into the virtual environment
    Install(ToolArgs),
    /// Print the directory tree
    Tree(TreeArgs),
    #[command(external_subcommand)]
    External(Vec<String>),
}

/// A parsed command reduced to a table lookup.
struct Dispatch {
    name: String,
    options: RunOptions,
    extra: Vec<String>,
}

impl Dispatch {
    fn task(name: TaskName, options: RunOptions, extra: Vec<String>) -> Self {
        Self {
            name: name.as_str().to_string(),
            options,
            extra,
        }
    }

    fn tool(name: TaskName, args: ToolArgs) -> Self {
        let options = RunOptions {
            debug: args.debug,
            ..Default::default()
        };
        Self::task(name, options, args.extra)
    }
}

impl From<Commands> for Dispatch {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Analyse(args) => Dispatch::tool(TaskName::Analyse, args),
            Commands::Autoformat(args) => Dispatch::tool(TaskName::Autoformat, args),
            Commands::CheckTypes(args) => Dispatch::tool(TaskName::CheckTypes, args),
            Commands::Develop(args) => Dispatch::tool(TaskName::Develop, args),
            Commands::Env(args) => Dispatch::tool(TaskName::Env, args),
            Commands::Install(args) => Dispatch::tool(TaskName::Install, args),
            Commands::Autotest(args) => Dispatch::task(
                TaskName::Autotest,
                RunOptions {
                    warnings: args.warnings,
                    watch: args.watch,
                    ..Default::default()
                },
                args.extra,
            ),
            Commands::Fixtures(args) => Dispatch::task(
                TaskName::Fixtures,
                RunOptions {
                    whole: args.whole,
                    warnings: args.warnings,
                    ..Default::default()
                },
                args.extra,
            ),
            Commands::Tree(args) => Dispatch::task(
                TaskName::Tree,
                RunOptions {
                    depth: args.depth,
                    ..Default::default()
                },
                args.extra,
            ),
            Commands::GenerateFiles(args) => Dispatch::task(
                TaskName::GenerateFiles,
                RunOptions {
                    debug: args.debug,
                    ..Default::default()
                },
                Vec::new(),
            ),
            Commands::Clean(_) => Dispatch::task(TaskName::Clean, RunOptions::default(), Vec::new()),
            Commands::External(mut args) => {
                let name = if args.is_empty() {
                    String::new()
                } else {
                    args.remove(0)
                };
                Dispatch {
                    name,
                    options: RunOptions::default(),
                    extra: args,
                }
            }
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let confirm_clean = match &cli.command {
        Commands::Clean(args) => Some(args.yes),
        _ => None,
    };
    let dispatch = Dispatch::from(cli.command);

    let log_file = cli
        .log_file
        .as_ref()
        .map(std::fs::File::create)
        .transpose()?;
    pyfab::logger::init(dispatch.options.debug, log_file)?;

    let (settings, root) = load_config(cli.config.as_deref())?;
    let cwd = std::env::current_dir()?;
    let table = TaskTable::new(&settings);
    let ctx = TaskContext::new(settings, root)
        .with_cwd(cwd)
        .with_options(dispatch.options);

    if let Some(yes) = confirm_clean
        && !clean::confirm(&ctx, yes)?
    {
        return Ok(ExitCode::SUCCESS);
    }

    match table.run(&ctx, &dispatch.name, &dispatch.extra) {
        Ok(code) => Ok(exit_code(code)),
        Err(e) => {
            error!("{e}");
            if let TaskError::UnknownCommand(_) = e {
                eprintln!("Available commands:");
                for entry in table.entries() {
                    eprintln!("  {:<16}{}", entry.name.as_str(), entry.name.summary());
                }
            }
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
