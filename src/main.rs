use std::{
    io::{self, Read},
    path::PathBuf,
};

use clap::{Parser as ClapParser, Subcommand};
use sandquery::{
    Backend,
    cli::{self, CliError, EvalOptions, EvalOutcome},
};

#[derive(ClapParser)]
#[command(name = "sandquery")]
#[command(about = "sandquery - evaluate sandboxed query expressions against JSON data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a query
    Eval {
        /// The query to evaluate
        query: String,

        /// JSON object of variables (reads from stdin if not provided)
        #[arg(short, long)]
        context: Option<String>,

        /// Execution strategy
        #[arg(short, long, value_enum, default_value_t = Backend::Interpreted)]
        backend: Backend,

        /// Directory for cached units (transpiled backend)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't evaluate
        #[arg(long)]
        syntax_only: bool,
    },

    /// Print the unit generated for a query
    Compile {
        /// The query to compile
        query: String,
    },

    /// Delete all cached units in a directory
    ClearCache {
        #[arg(long)]
        cache_dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Eval {
            query,
            context,
            backend,
            cache_dir,
            pretty,
            syntax_only,
        } => run_eval(
            EvalOptions {
                query,
                context,
                backend,
                cache_dir,
                syntax_only,
            },
            pretty,
        ),
        Commands::Compile { query } => cli::compile_unit(&query).map(|unit| print!("{}", unit)),
        Commands::ClearCache { cache_dir } => cli::clear_cache(&cache_dir)
            .map(|removed| println!("Removed {} cached unit(s)", removed)),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Log level comes from RUST_LOG, warnings only by default.
fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_eval(mut options: EvalOptions, pretty: bool) -> Result<(), CliError> {
    if options.context.is_none() && !options.syntax_only && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        if !buffer.trim().is_empty() {
            options.context = Some(buffer);
        }
    }

    match cli::execute_eval(&options)? {
        EvalOutcome::SyntaxValid => println!("Syntax is valid"),
        EvalOutcome::Success(output) => {
            let json = if pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            }?;
            println!("{}", json);
        }
    }
    Ok(())
}
