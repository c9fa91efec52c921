use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glstep::config::Config;
use glstep::params::{parse_field, StepAction, StepParams, DEFAULT_REF};
use glstep::{GitLabStep, StepOutcome};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// GitLab automation step
#[derive(Parser, Debug)]
#[command(name = "glstep", version, about, long_about = None)]
struct Args {
    /// GitLab instance URL
    #[arg(long, env = "GITLAB_URL", global = true)]
    url: Option<String>,

    /// Private access token
    #[arg(long, env = "GITLAB_PRIVATE_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a project unless OWNER/NAME already exists
    CreateProject {
        /// Project name
        name: String,
        /// Namespace (user or group path) to create the project in
        #[arg(long)]
        owner: Option<String>,
        /// Extra creation field, as key=value (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Trigger a pipeline on a project that already has pipelines
    CreatePipeline {
        name: String,
        #[arg(long)]
        owner: String,
        /// Branch or tag to run the pipeline for
        #[arg(long = "ref", default_value = DEFAULT_REF)]
        git_ref: String,
    },
    /// Add, update or invite project members
    AddMembers {
        name: String,
        #[arg(long)]
        owner: String,
        /// Members list, e.g. "[{'member': 'jane@example.com', 'accesslevel': 30}]"
        #[arg(long)]
        members: String,
    },
    /// Run a step described by a YAML parameters file
    Run {
        #[arg(long)]
        params: PathBuf,
    },
    /// Save default URL and timeout
    Config {
        #[arg(long)]
        set_url: Option<String>,
        #[arg(long)]
        set_timeout_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    // stdout carries the outcome, logs never go there
    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(writer.with_max_level(tracing_level))
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!("glstep started with log level: {:?}", level);

    Ok(Some(guard))
}

fn collect_fields(raw: &[String]) -> Result<Map<String, Value>> {
    raw.iter().map(|field| parse_field(field)).collect()
}

async fn execute(args: &Args, config: &Config) -> Result<StepOutcome> {
    let token = args
        .token
        .as_deref()
        .context("Missing private token (use --token or GITLAB_PRIVATE_TOKEN)")?;
    let url = config.effective_url(args.url.as_deref());
    let timeout = config.effective_timeout(args.timeout_secs);
    let step = GitLabStep::with_timeout(&url, token, timeout)?;

    let outcome = match &args.command {
        Command::CreateProject {
            name,
            owner,
            fields,
        } => {
            let fields = collect_fields(fields)?;
            step.create_project(name, owner.as_deref(), &fields).await
        }
        Command::CreatePipeline {
            name,
            owner,
            git_ref,
        } => step.create_pipeline(name, owner, git_ref).await,
        Command::AddMembers {
            name,
            owner,
            members,
        } => step.add_member_to_project(name, owner, members).await,
        Command::Run { params } => run_params(&step, &StepParams::load(params)?).await?,
        Command::Config { .. } => anyhow::bail!("config does not run a step"),
    };

    Ok(outcome)
}

async fn run_params(step: &GitLabStep, params: &StepParams) -> Result<StepOutcome> {
    let name = params.project_name.as_str();
    let owner = params.user_id.as_deref();

    let outcome = match params.action {
        StepAction::CreateProject => step.create_project(name, owner, &params.fields).await,
        StepAction::CreatePipeline => {
            let owner = owner.context("createPipeline requires userId")?;
            step.create_pipeline(name, owner, params.git_ref()).await
        }
        StepAction::AddMemberToProject => {
            let owner = owner.context("addMemberToProject requires userId")?;
            let members = params
                .members
                .as_ref()
                .context("addMemberToProject requires members")?
                .to_requests()?;
            step.add_members_to_project(name, owner, &members).await
        }
    };

    Ok(outcome)
}

fn save_config(
    mut config: Config,
    set_url: Option<&str>,
    set_timeout_secs: Option<u64>,
) -> Result<()> {
    if let Some(url) = set_url {
        config.url = Some(url.to_string());
    }
    if let Some(secs) = set_timeout_secs {
        config.timeout_secs = Some(secs);
    }
    config.save()?;

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let config = Config::load();

    if let Command::Config {
        set_url,
        set_timeout_secs,
    } = &args.command
    {
        return match save_config(config, set_url.as_deref(), *set_timeout_secs) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        };
    }

    let outcome = execute(&args, &config)
        .await
        .unwrap_or_else(|err| StepOutcome::failure(&err));

    match serde_json::to_string(&outcome) {
        Ok(line) => println!("{}", line),
        Err(err) => eprintln!("Error: {err}"),
    }

    ExitCode::from(u8::try_from(outcome.code).unwrap_or(1))
}
