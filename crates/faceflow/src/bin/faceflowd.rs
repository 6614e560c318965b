//! Faceflow daemon and control CLI.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};
use tracing_subscriber::EnvFilter;

use faceflow::config::Config;
use faceflow::db::{Database, JobRepository, JobStatus, TemplateRepository};
use faceflow::pipeline::{SubprocessRunner, SwapPipeline, Watermark};
use faceflow::producer::{NewSwapJob, Producer};
use faceflow::queue::SqliteChannel;
use faceflow::storage::{CdnPaths, FsObjectStore, TemplateCache};
use faceflow::worker::{FaceExtractOrchestrator, SwapOrchestrator};
use faceflow::{load_config, FaceflowError};

#[derive(Parser)]
#[command(name = "faceflowd", version, about = "Face-swap job distribution daemon")]
struct Cli {
    /// Path of the JSON configuration file.
    #[arg(short, long, default_value = "faceflow.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the swap worker loop.
    SwapWorker,
    /// Run the face extraction worker loop.
    FaceWorker,
    /// Submit a swap job.
    Submit {
        /// Template to swap onto.
        #[arg(long)]
        template_id: String,
        /// Storage key of the template source; derived from the
        /// template id when omitted.
        #[arg(long, default_value = "")]
        source: String,
        /// Extension of the source, dot included.
        #[arg(long)]
        extension: String,
        /// Treat the source as a single photo.
        #[arg(long)]
        image: bool,
        /// Stamp the result with the configured watermark.
        #[arg(long)]
        watermark: bool,
        /// Directory holding from_face/ and to_face/ pair images.
        #[arg(long)]
        pairs_dir: Option<PathBuf>,
        /// Mark this as the first job of a freshly ingested template.
        #[arg(long)]
        new_template: bool,
        #[arg(long)]
        premium: bool,
    },
    /// Submit a face extraction request for a template.
    Extract {
        #[arg(long)]
        template_id: String,
        /// Local path of the template media.
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        extension: String,
        #[arg(long)]
        image: bool,
    },
    /// Print job counts per status.
    Status {
        /// Also drain and print the descriptors waiting on a channel.
        /// Draining is destructive; only use it on an idle system.
        #[arg(long)]
        drain: Option<String>,
    },
}

fn main() {
    // Route log-crate records through the tracing subscriber.
    tracing_log::LogTracer::init().expect("log tracer");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("tracing subscriber");

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), FaceflowError> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::SwapWorker => run_swap_worker(&config),
        Command::FaceWorker => run_face_worker(&config),
        Command::Submit {
            template_id,
            source,
            extension,
            image,
            watermark,
            pairs_dir,
            new_template,
            premium,
        } => {
            let job_id = producer(&config)?.submit(NewSwapJob {
                template_id,
                source_location: source,
                watermark,
                is_image: image,
                source_extension: extension,
                face_pairs_dir: pairs_dir,
                is_new_template: new_template,
                premium,
            })?;
            println!("{}", job_id);
            Ok(())
        }
        Command::Extract {
            template_id,
            source,
            extension,
            image,
        } => {
            producer(&config)?.submit_extract(
                template_id,
                source.to_string_lossy().into_owned(),
                image,
                extension,
            )?;
            Ok(())
        }
        Command::Status { drain } => {
            let jobs = JobRepository::new(open_database(&config)?);
            for status in [
                JobStatus::Queued,
                JobStatus::InWork,
                JobStatus::Done,
                JobStatus::Error,
            ] {
                println!("{:>8}  {}", status.as_str(), jobs.count_by_status(status)?);
            }
            if let Some(channel) = drain {
                for descriptor in producer(&config)?.poll_channel(&channel)? {
                    println!("{}  {}", descriptor.job_id, descriptor.template_id);
                }
            }
            Ok(())
        }
    }
}

fn open_database(config: &Config) -> Result<Database, FaceflowError> {
    Ok(Database::open(std::path::Path::new(&config.database.path))?)
}

fn cdn_paths(config: &Config) -> CdnPaths {
    CdnPaths {
        public_base: config.cdn.public_base.clone(),
        results_prefix: config.cdn.results_prefix.clone(),
        sources_prefix: config.cdn.sources_prefix.clone(),
        faces_prefix: config.cdn.faces_prefix.clone(),
    }
}

fn producer(config: &Config) -> Result<Producer, FaceflowError> {
    Ok(Producer::new(
        Arc::new(SqliteChannel::new(&config.broker.path)),
        JobRepository::new(open_database(config)?),
        config.broker.swap_channel.clone(),
        config.broker.faces_channel.clone(),
    ))
}

fn stage_runner(config: &Config) -> Result<Arc<SubprocessRunner>, FaceflowError> {
    let command = config.stages.command.as_ref().ok_or_else(|| {
        faceflow::ConfigError::Validation {
            message: "stages.command must be set to run a worker".to_string(),
        }
    })?;
    Ok(Arc::new(SubprocessRunner::new(command)))
}

fn shutdown_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let handle = stop.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown requested");
        handle.store(true, Ordering::Relaxed);
    })
    .expect("ctrl-c handler");
    stop
}

fn run_swap_worker(config: &Config) -> Result<(), FaceflowError> {
    let store = Arc::new(FsObjectStore::new(&config.cdn.store_root));
    let runner = stage_runner(config)?;

    let mut pipeline = SwapPipeline::new(
        store,
        runner,
        TemplateCache::new(&config.paths.cache_dir),
        cdn_paths(config),
        PathBuf::from(&config.paths.work_dir),
    )
    .with_enhancement(config.stages.enhancement_enabled);

    if let Some(path) = &config.paths.watermark {
        pipeline = pipeline.with_watermark(Watermark::open(std::path::Path::new(path))?);
    }

    let mut orchestrator = SwapOrchestrator::new(
        Arc::new(SqliteChannel::new(&config.broker.path)),
        config.broker.swap_channel.clone(),
        JobRepository::new(open_database(config)?),
        pipeline,
    );
    if let Some(server) = &config.server {
        orchestrator = orchestrator.with_server(server.clone());
    }

    let stop = shutdown_flag();
    orchestrator.run(&stop);
    info!("Swap worker stopped");
    Ok(())
}

fn run_face_worker(config: &Config) -> Result<(), FaceflowError> {
    let orchestrator = FaceExtractOrchestrator::new(
        Arc::new(SqliteChannel::new(&config.broker.path)),
        config.broker.faces_channel.clone(),
        TemplateRepository::new(open_database(config)?),
        stage_runner(config)?,
        Arc::new(FsObjectStore::new(&config.cdn.store_root)),
        cdn_paths(config),
        PathBuf::from(&config.paths.faces_dir),
        config.stages.frame_stride,
    );

    let stop = shutdown_flag();
    orchestrator.run(&stop);
    info!("Face worker stopped");
    Ok(())
}
