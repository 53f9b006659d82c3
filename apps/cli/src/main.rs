//! Workflow Engine CLI
//!
//! Command-line front end for preparing and running workflow documents
//! against a configured Action Catalog Service, and for inspecting the
//! workflow store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use we_catalog_client::CatalogClient;
use we_common::EngineConfig;
use we_domain::{User, WorkflowId};
use we_workflow_engine::{
    parse_workflow_document, prepare_from_catalog, EngineError, ParameterContext, StepDispatcher,
    SystemParameters, UserParameters,
};
use we_workflow_store::{FileWorkflowStore, WorkflowStore};

#[derive(Parser)]
#[command(name = "workflow-engine")]
#[command(about = "Prepare and run declarative workflow documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Workflow document commands
    Workflow {
        #[command(subcommand)]
        action: WorkflowCommands,
    },
    /// Action Catalog commands
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Parse, resolve, and validate a workflow document without dispatching it
    Prepare(RunArgs),
    /// Prepare a workflow document, then dispatch its steps
    Run(RunArgs),
    /// List workflow documents previously saved for a user
    List {
        #[arg(long)]
        user_id: String,
    },
    /// Show one saved workflow document by id
    Show {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        workflow_id: String,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Fetch and print the Action Catalog
    Show,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the workflow document (YAML)
    #[arg(long)]
    document: PathBuf,
    /// Path to a JSON object of user-supplied parameters
    #[arg(long)]
    user_parameters: Option<PathBuf>,
    /// Email identifying the acting user
    #[arg(long)]
    user_email: String,
    /// Display name of the acting user
    #[arg(long, default_value = "CLI User")]
    user_name: String,
    /// OAuth bearer token forwarded to the Action Catalog Service
    #[arg(long, env = "WORKFLOW_OAUTH_TOKEN")]
    oauth_token: String,
    /// IANA timezone name seeded into system parameters
    #[arg(long, default_value = "UTC")]
    timezone: String,
    /// Persist the document (and, for `run`, its execution log) to the workflow store
    #[arg(long)]
    save: bool,
}

impl RunArgs {
    fn document_name(&self) -> String {
        self.document
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "workflow".to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    we_common::init_tracing();
    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    match cli.command {
        Commands::Workflow { action } => match action {
            WorkflowCommands::Prepare(args) => prepare(&config, args, false).await?,
            WorkflowCommands::Run(args) => prepare(&config, args, true).await?,
            WorkflowCommands::List { user_id } => list_workflows(&config, &user_id).await?,
            WorkflowCommands::Show { user_id, workflow_id } => {
                show_workflow(&config, &user_id, &workflow_id).await?
            }
        },
        Commands::Catalog { action } => match action {
            CatalogCommands::Show => show_catalog(&config).await?,
        },
    }

    Ok(())
}

async fn build_context(args: &RunArgs) -> anyhow::Result<(ParameterContext, User)> {
    let user_parameters = match &args.user_parameters {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await?;
            let value: HashMap<String, Value> = serde_json::from_str(&raw)?;
            UserParameters(value)
        }
        None => UserParameters::default(),
    };

    let user = User::new(args.user_email.clone(), args.user_name.clone());
    let system_parameters = SystemParameters::seed(&user, args.oauth_token.clone(), args.timezone.clone(), chrono::Utc::now());
    Ok((ParameterContext::new(user_parameters, system_parameters), user))
}

async fn prepare(config: &EngineConfig, args: RunArgs, dispatch: bool) -> anyhow::Result<()> {
    let document_text = tokio::fs::read_to_string(&args.document).await?;
    let client = CatalogClient::new(config.catalog_base_url.clone(), config.request_timeout)?;

    let (context, user) = build_context(&args).await?;
    let mut plan = prepare_from_catalog(&document_text, context, &client).await?;

    if !plan.is_executable() {
        for error in &plan.validation_errors {
            eprintln!("  - {error}");
        }
        return Err(EngineError::Validation(plan.validation_errors).into());
    }

    println!("prepared {} step(s)", plan.resolved_steps.len());

    if dispatch {
        let document = parse_workflow_document(&document_text)?;
        let dispatcher = StepDispatcher::new(client, config.max_workers);
        let run_timeout = document.execution_config.timeout_seconds.map(Duration::from_secs);
        dispatcher.dispatch(&mut plan, document.execution_config.mode, run_timeout).await;

        let mut log_lines = Vec::with_capacity(plan.resolved_steps.len());
        let mut failures = Vec::new();
        for step in &plan.resolved_steps {
            let line = match &step.error {
                Some(error) => format!("{}: {:?} ({error})", step.id, step.status),
                None => format!("{}: {:?}", step.id, step.status),
            };
            println!("{line}");
            if step.status == we_workflow_engine::StepStatus::Failed {
                failures.push(format!("{}: {}", step.id, step.error.clone().unwrap_or_default()));
            }
            log_lines.push(line);
        }

        if args.save {
            let store = FileWorkflowStore::new(&config.store_root);
            let saved = store.save(&user.id.to_string(), &args.document_name(), &document_text).await?;
            store
                .save_execution_log(&user.id.to_string(), &saved.id, &log_lines.join("\n"))
                .await?;
            println!("saved run under workflow {}", saved.id);
        }

        if !failures.is_empty() {
            return Err(EngineError::Dispatch(failures.join("; ")).into());
        }
    } else if args.save {
        let store = FileWorkflowStore::new(&config.store_root);
        let saved = store.save(&user.id.to_string(), &args.document_name(), &document_text).await?;
        println!("saved workflow {}", saved.id);
    }

    Ok(())
}

async fn list_workflows(config: &EngineConfig, user_id: &str) -> anyhow::Result<()> {
    let store = FileWorkflowStore::new(&config.store_root);
    let files = store.list(user_id).await?;
    for file in files {
        println!("{}  {}  {}", file.id, file.status, file.name);
    }
    Ok(())
}

async fn show_workflow(config: &EngineConfig, user_id: &str, workflow_id: &str) -> anyhow::Result<()> {
    let store = FileWorkflowStore::new(&config.store_root);
    let id: WorkflowId = workflow_id.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
    let file = store.get(user_id, &id).await?;
    println!("{}", file.content);
    Ok(())
}

async fn show_catalog(config: &EngineConfig) -> anyhow::Result<()> {
    let client = CatalogClient::new(config.catalog_base_url.clone(), config.request_timeout)?;
    let catalog = client.get_service_catalog().await?;
    for provider in catalog.providers.values() {
        println!("{}", provider.display_name);
        for (service_name, service) in &provider.services {
            println!("  {service_name} ({})", service.display_name);
            for function_name in service.functions.keys() {
                println!("    {service_name}.{function_name}");
            }
        }
    }
    Ok(())
}
