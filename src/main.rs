use std::{path::PathBuf, process, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use xnat_rs::{
    local, utils, ConnectionConfig, Connector, ErrorKind, JobConfig, QueueOutcome, Result,
    XnatError,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a JSON login file holding server, user and password
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Override the XNAT server from the login file or environment variable
    #[clap(short, long)]
    server: Option<String>,
    /// Override the XNAT user from the login file or environment variable
    #[clap(short, long)]
    user: Option<String>,
    /// Override the XNAT password from the login file or environment variable
    #[clap(short, long)]
    password: Option<String>,
    /// Set the log level
    #[arg(value_enum)]
    #[clap(short = 'L', long, default_value = "info")]
    log_level: LogLevel,
    /// Display timestamps with log messages
    #[clap(short = 'T', long)]
    timestamp: bool,
    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand, Debug)]
enum Stage {
    /// Print the import queue of a project once
    Status {
        #[clap(long)]
        project: String,
    },
    /// Find the job's studies on the PACS, import them and watch the queue
    Import { job: PathBuf },
    /// Run the job's container commands and save the results
    Run { job: PathBuf },
    /// Download the JSON files of the job's resource into one CSV file
    Collect { job: PathBuf },
    /// Import, run and collect in sequence
    Pipeline { job: PathBuf },
}

#[derive(Copy, Clone, ValueEnum, Debug)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Quiet,
}

#[tokio::main]
pub async fn main() {
    let args = Args::parse();

    tracing_subscriber_handler(&args);

    let config = match connection_from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_stage(&args.stage, &config).await {
        error!("Error: {}", e);
        process::exit(1);
    }

    info!("Process complete.");
}

/// Login file or environment first, then the command line overrides.
fn connection_from_args(args: &Args) -> Result<ConnectionConfig> {
    let config = match &args.config {
        Some(path) => ConnectionConfig::from_file(path)?,
        None => ConnectionConfig::from_env()?,
    };
    let config = config.with_overrides(
        args.server.clone(),
        args.user.clone(),
        args.password.clone(),
    );
    config.validate()?;
    Ok(config)
}

async fn connect(config: &ConnectionConfig, project: &str) -> Result<Connector> {
    let xnat = Connector::connect(config, Some(project.to_string()))?;
    if !xnat.is_connected().await {
        return Err(XnatError::Config(format!(
            "Unable to reach {} as {}.",
            config.server, config.user
        )));
    }
    Ok(xnat)
}

async fn run_stage(stage: &Stage, config: &ConnectionConfig) -> Result<()> {
    match stage {
        Stage::Status { project } => {
            let xnat = connect(config, project).await?;
            print_queue(&xnat, project).await
        }
        Stage::Import { job } => {
            let job = JobConfig::from_file(job)?;
            let mut xnat = connect(config, &job.project).await?;
            import(&mut xnat, &job).await
        }
        Stage::Run { job } => {
            let job = JobConfig::from_file(job)?;
            let mut xnat = connect(config, &job.project).await?;
            run(&mut xnat, &job).await.map(|_| ())
        }
        Stage::Collect { job } => {
            let job = JobConfig::from_file(job)?;
            let mut xnat = connect(config, &job.project).await?;
            collect(&mut xnat, &job).await
        }
        Stage::Pipeline { job } => {
            let job = JobConfig::from_file(job)?;
            let mut xnat = connect(config, &job.project).await?;
            pipeline(&mut xnat, &job).await
        }
    }
}

/// Import, run and collect. Import and run failures are logged instead of
/// returned, except for configuration and file errors.
async fn pipeline(xnat: &mut Connector, job: &JobConfig) -> Result<()> {
    // a failed import still leaves earlier data to process
    if let Err(e) = import(xnat, job).await {
        match e.kind() {
            ErrorKind::Config | ErrorKind::Io => return Err(e),
            _ => error!("Import failed: {}", e),
        }
    }

    match run(xnat, job).await {
        Ok(true) => collect(xnat, job).await?,
        Ok(false) => warn!("No command results, skipping collection."),
        Err(e) => error!("Run failed: {}", e),
    }
    Ok(())
}

async fn print_queue(xnat: &Connector, project: &str) -> Result<()> {
    let queue = xnat.importer().check_import_queue().await?;
    if queue.is_empty() {
        info!("No items in the import queue of {}.", project);
        return Ok(());
    }

    info!(
        "{} session(s) and {} scan(s) queued for {}:",
        queue.total_sessions, queue.total_scans, project
    );
    for session in &queue.sessions {
        info!(
            ">> {} {} ({} scan(s), queued for {})",
            session.status,
            session.study_uid,
            session.num_scans,
            utils::convert_seconds(session.sec_queued, None)
        );
    }
    Ok(())
}

async fn import(xnat: &mut Connector, job: &JobConfig) -> Result<()> {
    let mut uids = job.uids.clone();
    if let Some(dir) = &job.dicom_dir {
        let found = local::uids_from_paths(dir, job.recursive)?;
        uids.extend(found.iter().cloned());
    }

    let importer = xnat.importer_mut();
    importer.set_uids(uids);
    importer.set_filters(job.filters.clone());

    if importer.find_studies().await == 0 {
        warn!("No studies to import into {}.", job.project);
        return Ok(());
    }
    if !importer.import_studies().await {
        return Ok(());
    }

    let outcome = importer
        .monitor_import_queue(Duration::from_secs(job.timeout), job.refresh_on_change)
        .await?;
    if let QueueOutcome::TimedOut { sessions, scans } = outcome {
        warn!(
            "{} session(s) and {} scan(s) were still queued when monitoring stopped.",
            sessions, scans
        );
    }
    Ok(())
}

/// Returns whether any command produced results.
async fn run(xnat: &mut Connector, job: &JobConfig) -> Result<bool> {
    let utility = xnat.commands_mut();
    utility.set_commands(job.commands.clone());
    utility.find_project_experiments(None).await?;

    if !utility.has_experiments() {
        return Err(XnatError::Precondition(format!(
            "No scans or sessions found in {}.",
            job.project
        )));
    }

    utility.run_commands(None, None).await?;
    utility.save_results(&job.results_file)?;
    Ok(!utility.get_results().is_empty())
}

async fn collect(xnat: &mut Connector, job: &JobConfig) -> Result<()> {
    let records = xnat
        .commands_mut()
        .download_json_files(None, job.resource.as_deref())
        .await?;
    if records.is_empty() {
        warn!("No JSON files found in {}, nothing to collect.", job.project);
        return Ok(());
    }

    let path = utils::json_to_csv(&records, &job.results_csv, &job.csv_keys)?;
    info!("Saved {} record(s) to {}", records.len(), path.display());
    Ok(())
}

fn tracing_subscriber_handler(args: &Args) {
    let env_filter = match args.log_level {
        LogLevel::Debug => "xnat_rs=debug",
        LogLevel::Info => "xnat_rs=info",
        LogLevel::Warn => "xnat_rs=warn",
        LogLevel::Error => "xnat_rs=error",
        LogLevel::Quiet => "xnat_rs=off",
    };

    // The builder yields a different type without time, hence no match.
    let installed = if args.timestamp {
        let sub = tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .finish();
        tracing::subscriber::set_global_default(sub)
    } else {
        let sub = tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(sub)
    };
    if let Err(e) = installed {
        eprintln!("Error while setting subscriber for tracing: {}", e);
    }
}
