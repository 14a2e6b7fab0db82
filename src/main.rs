use std::{fs::OpenOptions, path::Path, sync::Mutex};

use clap::{Args, CommandFactory, Parser, Subcommand, error::ErrorKind};
use god::{Result, cmd, config, types::QueryKind};
use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::Directive};

/// Command-line arguments for god
#[derive(Parser)]
#[command(name = "god")]
#[command(about = "Source-navigation queries answered by a background daemon")]
#[command(version)]
struct Cli {
   #[arg(short = 'd', long = "daemon", help = "Run the daemon in the foreground")]
   daemon: bool,

   #[arg(long, value_name = "HOST:PORT", help = "Daemon address (default from config)")]
   addr: Option<String>,

   #[arg(long, global = true, help = "JSON output")]
   json: bool,

   #[command(subcommand)]
   command: Option<Cmd>,
}

#[derive(Args)]
struct QueryArgs {
   #[arg(help = "Source position as file:#offset")]
   position: String,

   #[arg(long, help = "Comma-separated compilation units to limit the analysis to")]
   scope: Option<String>,

   #[arg(long, value_name = "TAGS", help = "Build tags to apply, space or comma separated")]
   tags: Option<String>,
}

#[derive(Subcommand)]
enum Cmd {
   #[command(about = "Show the declaration of the identifier")]
   Definition(QueryArgs),

   #[command(about = "Show possible targets of the call")]
   Callees(QueryArgs),

   #[command(about = "Show possible callers of the function")]
   Callers(QueryArgs),

   #[command(name = "callstack", about = "Show a path from the root to the function")]
   CallStack(QueryArgs),

   #[command(about = "Describe the selected syntax and its type")]
   Describe(QueryArgs),

   #[command(name = "freevars", about = "Show free variables of the selection")]
   FreeVars(QueryArgs),

   #[command(about = "Show implements relations for the type or method")]
   Implements(QueryArgs),

   #[command(about = "Show send/receive operations that may alias the channel")]
   Peers(QueryArgs),

   #[command(name = "pointsto", about = "Show what the pointer may point to")]
   PointsTo(QueryArgs),

   #[command(about = "Show all references to the identifier")]
   Referrers(QueryArgs),

   #[command(about = "Show basic information about the selected syntax")]
   What(QueryArgs),

   #[command(name = "whicherrs", about = "Show possible values of the error variable")]
   WhichErrs(QueryArgs),

   #[command(about = "Stop the running daemon")]
   Stop,

   #[command(about = "Show whether a daemon is running")]
   Status,
}

impl Cmd {
   fn into_query(self) -> Option<(QueryKind, QueryArgs)> {
      let query = match self {
         Self::Definition(args) => (QueryKind::Definition, args),
         Self::Callees(args) => (QueryKind::Callees, args),
         Self::Callers(args) => (QueryKind::Callers, args),
         Self::CallStack(args) => (QueryKind::CallStack, args),
         Self::Describe(args) => (QueryKind::Describe, args),
         Self::FreeVars(args) => (QueryKind::FreeVars, args),
         Self::Implements(args) => (QueryKind::Implements, args),
         Self::Peers(args) => (QueryKind::Peers, args),
         Self::PointsTo(args) => (QueryKind::PointsTo, args),
         Self::Referrers(args) => (QueryKind::Referrers, args),
         Self::What(args) => (QueryKind::What, args),
         Self::WhichErrs(args) => (QueryKind::WhichErrs, args),
         Self::Stop | Self::Status => return None,
      };
      Some(query)
   }
}

fn init_tracing(log_file: Option<&Path>) {
   let mut filter = EnvFilter::from_default_env().add_directive(Level::WARN.into());
   if std::env::var_os("GOD_DEBUG").is_some_and(|v| !v.is_empty())
      && let Ok(directive) = "god=debug".parse::<Directive>()
   {
      filter = filter.add_directive(directive);
   }

   let file = log_file.and_then(|path| {
      OpenOptions::new()
         .create(true)
         .append(true)
         .open(path)
         .inspect_err(|e| eprintln!("failed to open log file {}: {e}", path.display()))
         .ok()
   });

   match file {
      Some(file) => tracing_subscriber::fmt()
         .with_env_filter(filter)
         .with_ansi(false)
         .with_writer(Mutex::new(file))
         .init(),
      None => tracing_subscriber::fmt()
         .with_env_filter(filter)
         .with_writer(std::io::stderr)
         .init(),
   }
}

#[tokio::main]
async fn main() {
   let cli = Cli::parse();
   let cfg = config::get();
   init_tracing(if cli.daemon { cfg.log_file.as_deref() } else { None });

   if let Err(err) = run(cli, cfg).await {
      eprintln!("{err}");
      std::process::exit(err.exit_code());
   }
}

async fn run(cli: Cli, cfg: &config::Config) -> Result<()> {
   cfg.validate()?;
   let addr = cli.addr.unwrap_or_else(|| cfg.address());

   if cli.daemon {
      return cmd::serve::execute(cfg, addr).await;
   }

   let Some(command) = cli.command else {
      Cli::command()
         .error(ErrorKind::MissingSubcommand, "a subcommand is required unless -d is given")
         .exit();
   };

   match command {
      Cmd::Stop => cmd::stop::execute(cfg, &addr).await,
      Cmd::Status => cmd::status::execute(cfg, &addr, cli.json).await,
      query => match query.into_query() {
         Some((kind, args)) => {
            let options = cmd::query::Options {
               scope: args.scope.as_deref(),
               tags:  args.tags.as_deref(),
               json:  cli.json,
            };
            cmd::query::execute(cfg, &addr, kind, &args.position, options).await
         },
         None => Ok(()),
      },
   }
}
