//! `taski run <task> [--workers N] [--arg key=value]...` — runs one
//! registered task/section by name from the command line (spec 6),
//! grounded in `dagrs`'s own small `clap`-derive CLI binary.

use clap::{Parser, Subcommand};
use taski::{all_task_classes, Args, TaskClass, Taski};

#[derive(Parser)]
#[command(name = "taski", about = "Run a taski task graph from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a task (and its dependencies) to completion.
    Run {
        /// Simple or module-qualified task/section name, e.g. `Deploy` or
        /// `myapp::tasks::Deploy`.
        task: String,

        /// Override the worker pool size (default: cores clamped to 2-8).
        #[arg(long)]
        workers: Option<usize>,

        /// `key=value` pairs forwarded as the run's `Args`; repeatable.
        #[arg(long = "arg", value_parser = parse_kv)]
        args: Vec<(String, String)>,

        /// Run the clean pass immediately after a successful run.
        #[arg(long)]
        clean: bool,
    },
    /// List every task/section this binary knows about.
    List,
}

fn parse_kv(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn find_task(name: &str) -> Option<&'static TaskClass> {
    all_task_classes()
        .find(|tc| tc.qualified_name() == name)
        .or_else(|| all_task_classes().find(|tc| tc.name == name))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            for class in all_task_classes() {
                println!("{} ({:?})", class.qualified_name(), class.kind);
            }
        }
        Command::Run {
            task,
            workers,
            args,
            clean,
        } => {
            let Some(class) = find_task(&task) else {
                eprintln!("no such task: {task}");
                std::process::exit(1);
            };

            let mut run_args = Args::new();
            if let Some(workers) = workers {
                run_args.set("_workers", workers);
            }
            for (key, value) in args {
                run_args.set(key, value);
            }

            let result = if clean {
                Taski::execute_with_clean(class, run_args)
            } else {
                Taski::execute(class, run_args)
            };

            if let Err(err) = result {
                eprintln!("execution failed: {err}");
                std::process::exit(1);
            }
        }
    }
}
