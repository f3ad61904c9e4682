use clap::Parser;

use fileserver::config::{self, Config, Overrides};
use fileserver::{logger, server, Handler};

/// Serve local paths, or the contents of a zip archive, over HTTP
#[derive(Debug, Parser)]
#[command(name = "fileserver", version, about)]
struct Cli {
    /// Config file (extension optional; missing file is ignored)
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Treat the pathspec as a zip archive and serve its contents
    #[arg(short, long)]
    zip: bool,

    /// Log every request
    #[arg(short, long)]
    debug: bool,

    /// Runtime worker threads (defaults to CPU cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// `path[:alias]` entries; joined with spaces into the pathspec
    paths: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            workers: self.workers,
            pathspec: (!self.paths.is_empty()).then(|| self.paths.join(" ")),
            zip: self.zip.then_some(true),
            debug: self.debug.then_some(true),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config, &cli.overrides())?;
    logger::init(&cfg.logging)?;

    // Build the Tokio runtime with the configured worker count
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("Using {workers} worker threads"));
    } else {
        logger::log_info("Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let files = &cfg.files;
    let handler = fileserver::new(&files.pathspec, files.zip, files.debug)?;
    log_backend(&handler);

    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, handler.backend_name(), handler.debug());

    server::serve_with_shutdown(listener, handler, server::shutdown_signal()).await?;
    Ok(())
}

fn log_backend(handler: &Handler) {
    if let Some(archive) = handler.archive() {
        logger::log_archive(archive.source(), archive.file_count());
    }
    if let Some(aliases) = handler.aliases() {
        logger::log_aliases(aliases);
        for (alias, target) in aliases.iter() {
            if !target.exists() {
                logger::log_warning(&format!(
                    "Alias /{alias} points at missing path {}",
                    target.display()
                ));
            }
        }
    }
}
