//! Main CLI application

use crate::cli::interrupt::cancel_on_interrupt;
use crate::cli::logging::init_logging;
use crate::config::{
    build_predicates, load_project, parse_definition, populate_store, validate_build_file,
    Project,
};
use crate::error::RantError;
use crate::graph::{DependencyGraph, Scheduler};
use crate::properties::{Expander, PropertyStore};
use crate::runner::{console_listener, CancellationToken, Engine, ShellRunner, Step, Verbosity};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// What to do once the build file is loaded
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Requested targets; empty means the default target
    pub targets: Vec<String>,
    /// `-D` properties, in command-line order
    pub definitions: Vec<(String, String)>,
    pub keep_going: bool,
    /// Worker threads; 1 runs sequentially
    pub jobs: usize,
    pub strict: bool,
    pub verbosity: Verbosity,
}

/// A loaded and validated build
pub struct App {
    project: Project,
    graph: DependencyGraph<Step>,
}

impl App {
    /// Load `path`, or discover the build file when it is `None`
    pub fn load(path: Option<PathBuf>) -> Result<Self, RantError> {
        let project = load_project(path.as_deref())?;
        validate_build_file(&project.file)?;
        let graph = project.graph()?;

        Ok(App { project, graph })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn graph(&self) -> &DependencyGraph<Step> {
        &self.graph
    }

    /// Property store for `definitions` with every layer filled
    pub fn properties(&self, definitions: &[(String, String)]) -> Result<PropertyStore, RantError> {
        let store = PropertyStore::standard();
        populate_store(&self.project, definitions, &store)?;
        Ok(store)
    }

    /// Run the requested targets and return the process exit code
    ///
    /// Cancelling `cancel` stops the build after the step in progress.
    pub fn run(&self, options: &RunOptions, cancel: CancellationToken) -> Result<i32, RantError> {
        let store = self.properties(&options.definitions)?;
        let base_dir = self.project.base_dir();
        let expander = Expander::new().with_strict(options.strict);

        let runner = ShellRunner::new()
            .with_working_dir(&base_dir)
            .with_verbosity(options.verbosity)
            .with_strict(options.strict);
        let predicates = build_predicates(&self.project.file, &base_dir, &runner, expander)?;

        let plan = Scheduler::new().schedule(&self.graph, options.targets.as_slice())?;
        debug!(plan = %plan, "scheduled");

        let mut engine = Engine::new()
            .with_keep_going(options.keep_going)
            .with_strict(options.strict)
            .with_resolver(predicates)
            .with_cancellation(cancel);
        engine.subscribe(console_listener(options.verbosity));

        let result = if options.jobs > 1 {
            engine.run_parallel(&plan, &self.graph, &store, &runner, options.jobs)
        } else {
            engine.run(&plan, &self.graph, &store, &runner)
        };

        Ok(result.exit_code())
    }

    /// Print targets with descriptions first, then the rest
    pub fn list_targets(&self) {
        if let Some(name) = &self.project.file.name {
            println!("{}", name.bold());
        }

        let width = self.graph.names().map(str::len).max().unwrap_or(0);
        let (main, other): (Vec<_>, Vec<_>) =
            self.graph.targets().partition(|t| t.description().is_some());

        if !main.is_empty() {
            println!("Main targets:\n");
            for target in &main {
                let name = format!("{:width$}", target.name(), width = width);
                println!(" {}  {}", name.cyan(), target.description().unwrap_or_default());
            }
        }
        if !other.is_empty() {
            println!("Other targets:\n");
            for target in &other {
                println!(" {}", target.name());
            }
        }
        if let Some(default) = self.graph.default_target() {
            println!("Default target: {}", default);
        }
    }
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("rant")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A dependency-driven build target runner")
        .arg(
            Arg::new("targets")
                .value_name("TARGET")
                .help("Targets to run (default target when omitted)")
                .num_args(0..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .alias("buildfile")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Path to build.yml"),
        )
        .arg(
            Arg::new("define")
                .short('D')
                .value_name("NAME=VALUE")
                .help("Define a property (highest precedence)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("keep-going")
                .short('k')
                .long("keep-going")
                .help("Run targets that do not depend on a failed target")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Run up to N independent targets at once"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Fail on references to undefined properties")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list")
                .short('p')
                .long("list")
                .alias("projecthelp")
                .help("List targets and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("properties")
                .long("properties")
                .help("Print the resolved properties and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(value_parser!(Shell))
                .help("Print a shell completion script and exit"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no build output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Collect run options from parsed arguments
fn run_options(matches: &ArgMatches) -> Result<RunOptions, RantError> {
    let definitions = matches
        .get_many::<String>("define")
        .into_iter()
        .flatten()
        .map(|d| parse_definition(d))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RunOptions {
        targets: matches
            .get_many::<String>("targets")
            .into_iter()
            .flatten()
            .cloned()
            .collect(),
        definitions,
        keep_going: matches.get_flag("keep-going"),
        jobs: matches.get_one::<usize>("jobs").copied().unwrap_or(1),
        strict: matches.get_flag("strict"),
        verbosity: get_verbosity(matches),
    })
}

/// Run the CLI with the process arguments and return the exit code
pub fn run() -> Result<i32, RantError> {
    run_from(std::env::args_os())
}

/// Run the CLI with explicit arguments
pub fn run_from<I, T>(args: I) -> Result<i32, RantError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().get_matches_from(args);

    if let Some(shell) = matches.get_one::<Shell>("completions") {
        generate(*shell, &mut build_command(), "rant", &mut io::stdout());
        return Ok(0);
    }

    let options = run_options(&matches)?;
    init_logging(options.verbosity);

    let app = App::load(matches.get_one::<PathBuf>("file").cloned())?;

    if matches.get_flag("list") {
        app.list_targets();
        return Ok(0);
    }

    if matches.get_flag("properties") {
        let store = app.properties(&options.definitions)?;
        for (name, value) in store.snapshot() {
            println!("{}={}", name, value);
        }
        return Ok(0);
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    app.run(&options, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(args: &[&str]) -> ArgMatches {
        build_command().get_matches_from(args)
    }

    #[test]
    fn test_get_verbosity_normal() {
        assert_eq!(get_verbosity(&matches(&["rant"])), Verbosity::Normal);
        assert_eq!(get_verbosity(&matches(&["rant", "-v"])), Verbosity::Verbose);
        assert_eq!(get_verbosity(&matches(&["rant", "-q", "-v"])), Verbosity::Quiet);
    }

    #[test]
    fn test_run_options() {
        let options = run_options(&matches(&[
            "rant", "-k", "-j", "4", "-D", "mode=release", "-Dskip=true", "dist", "test",
        ]))
        .unwrap();

        assert_eq!(options.targets, vec!["dist", "test"]);
        assert_eq!(
            options.definitions,
            vec![
                ("mode".to_string(), "release".to_string()),
                ("skip".to_string(), "true".to_string()),
            ]
        );
        assert!(options.keep_going);
        assert_eq!(options.jobs, 4);
        assert!(!options.strict);
    }

    #[test]
    fn test_bad_definition() {
        assert!(run_options(&matches(&["rant", "-D", "nope"])).is_err());
    }

    #[test]
    fn test_command_is_consistent() {
        build_command().debug_assert();
    }
}
