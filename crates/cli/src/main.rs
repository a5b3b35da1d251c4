use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value as Json};
use tfk8s_core::{ResourceId, Value};
use tfk8s_kubehub::{Session, SessionConfig};
use tfk8s_patch::{diff_summary, summarize};
use tfk8s_resources::{Registry, ResourceKind};
use tracing::info;

mod input;

use input::{load_config, load_doc, load_prior};

#[derive(Parser, Debug)]
#[command(name = "tfk8sctl", version, about = "Declarative Kubernetes object mapping")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespace for objects that do not set one (default: TFK8S_DEFAULT_NAMESPACE or "default")
    #[arg(long = "ns", global = true, env = "TFK8S_DEFAULT_NAMESPACE")]
    namespace: Option<String>,

    /// Server-side dry run for cluster commands
    #[arg(long = "dry-run", global = true, action = ArgAction::SetTrue)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List supported resource kinds
    Kinds,
    /// Validate a configuration file against a kind's schema
    Validate { kind: String, file: PathBuf },
    /// Print the API object a configuration expands to
    Expand { kind: String, file: PathBuf },
    /// Flatten an API object (JSON or YAML) into configuration form
    Flatten {
        kind: String,
        object: PathBuf,
        /// Prior configuration, used to keep user-set internal keys
        #[arg(long = "prior")]
        prior: Option<PathBuf>,
    },
    /// Show the JSON patch that moves a live object from one configuration to another
    Plan { kind: String, old: PathBuf, new: PathBuf },
    /// Create the object described by a configuration
    Create { kind: String, file: PathBuf },
    /// Read an object by ID (`namespace/name` or `name`) and print its configuration form
    Read {
        kind: String,
        id: String,
        #[arg(long = "prior")]
        prior: Option<PathBuf>,
    },
    /// Patch an object from the old configuration to the new one
    Update { kind: String, id: String, old: PathBuf, new: PathBuf },
    /// Delete an object by ID
    Delete { kind: String, id: String },
    /// Submit an arbitrary object manifest
    Raw {
        #[command(subcommand)]
        command: RawCommands,
    },
}

#[derive(Subcommand, Debug)]
enum RawCommands {
    /// Create the manifest's object, or replace it with --replace
    Apply {
        file: PathBuf,
        #[arg(long = "replace", action = ArgAction::SetTrue)]
        replace: bool,
    },
    /// Delete the manifest's object (foreground propagation)
    Delete { file: PathBuf },
}

fn init_tracing() {
    let env = std::env::var("TFK8S_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("TFK8S_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid TFK8S_METRICS_ADDR; expected host:port");
        }
    }
}

fn kind<'a>(registry: &'a Registry, name: &str) -> Result<&'a dyn ResourceKind> {
    registry.get(name).ok_or_else(|| {
        let known: Vec<_> = registry.names().collect();
        anyhow!("unknown kind {:?} (known: {})", name, known.join(", "))
    })
}

fn print_state(output: Output, id: Option<&ResourceId>, state: &Value) -> Result<()> {
    let state = Json::from(state);
    match output {
        Output::Human => {
            if let Some(id) = id { println!("id: {}", id); }
            println!("{}", serde_yaml::to_string(&state)?);
        }
        Output::Json => match id {
            Some(id) => println!("{}", serde_json::to_string_pretty(&json!({"id": id.to_string(), "state": state}))?),
            None => println!("{}", serde_json::to_string_pretty(&state)?),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let mut config = SessionConfig::from_env();
    if let Some(ns) = cli.namespace.clone() { config.default_namespace = ns; }
    config.dry_run |= cli.dry_run;
    let max = config.max_doc_bytes;
    let registry = Registry::builtin();

    match cli.command {
        Commands::Kinds => match cli.output {
            Output::Human => {
                for k in registry.iter() {
                    let ar = k.api_resource();
                    let scope = if k.namespaced() { "namespaced" } else { "cluster" };
                    println!("{} • {} • {} • {}", k.name(), ar.api_version, ar.kind, scope);
                }
                println!("{} • (apiVersion and kind from the manifest)", tfk8s_resources::any::NAME);
            }
            Output::Json => {
                let rows: Vec<_> = registry
                    .iter()
                    .map(|k| {
                        let ar = k.api_resource();
                        json!({"name": k.name(), "api_version": ar.api_version, "kind": ar.kind, "namespaced": k.namespaced()})
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        },
        Commands::Validate { kind: name, file } => {
            let k = kind(&registry, &name)?;
            let cfg = load_config(&file, max)?;
            let errors = k.validate(&cfg);
            info!(kind = k.name(), errors = errors.len(), "validated");
            match cli.output {
                Output::Human => {
                    if errors.is_empty() { println!("ok"); }
                    for e in errors.iter() { println!("{}", e); }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&errors)?),
            }
            if !errors.is_empty() { std::process::exit(1); }
        }
        Commands::Expand { kind: name, file } => {
            let k = kind(&registry, &name)?;
            let obj = tfk8s_kubehub::preview(k, &load_config(&file, max)?)?;
            match cli.output {
                Output::Human => println!("{}", serde_yaml::to_string(&obj)?),
                Output::Json => println!("{}", serde_json::to_string_pretty(&obj)?),
            }
        }
        Commands::Flatten { kind: name, object, prior } => {
            let k = kind(&registry, &name)?;
            let obj = load_doc(&object, max)?;
            let prior = load_prior(prior.as_deref(), max)?;
            let state = k.flatten(&obj, &prior)?;
            let id = k.id_of(&obj).ok();
            print_state(cli.output, id.as_ref(), &state)?;
        }
        Commands::Plan { kind: name, old, new } => {
            let k = kind(&registry, &name)?;
            let (old, new) = (load_config(&old, max)?, load_config(&new, max)?);
            let replace = k.requires_replacement(&old, &new);
            let ops = k.patch(&old, &new)?;
            let summary = summarize(&ops);
            let fields = diff_summary(&k.expand(&new)?, &k.expand(&old)?);
            info!(kind = k.name(), ops = ops.len(), replace = replace.len(), "planned");
            match cli.output {
                Output::Human => {
                    if !replace.is_empty() {
                        println!("replacement required: {}", replace.join(", "));
                    }
                    if ops.is_empty() {
                        println!("no changes");
                    } else {
                        println!("{} to add, {} to change, {} to remove", summary.adds, summary.updates, summary.removes);
                        println!("object fields: +{} ~{} -{}", fields.adds, fields.updates, fields.removes);
                        println!("{}", serde_json::to_string_pretty(&ops.to_json())?);
                    }
                }
                Output::Json => {
                    let out = json!({
                        "replace": replace,
                        "summary": summary,
                        "fields": fields,
                        "patch": ops.to_json(),
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }
        Commands::Create { kind: name, file } => {
            let k = kind(&registry, &name)?;
            let cfg = load_config(&file, max)?;
            let session = Session::connect(config).await?;
            let (id, state) = session.create(k, &cfg).await?;
            print_state(cli.output, Some(&id), &state)?;
        }
        Commands::Read { kind: name, id, prior } => {
            let k = kind(&registry, &name)?;
            let id: ResourceId = id.parse()?;
            let prior = load_prior(prior.as_deref(), max)?;
            let session = Session::connect(config).await?;
            match session.read(k, &id, &prior).await? {
                Some(state) => print_state(cli.output, Some(&id), &state)?,
                None => {
                    eprintln!("{} {} not found", k.name(), id);
                    std::process::exit(1);
                }
            }
        }
        Commands::Update { kind: name, id, old, new } => {
            let k = kind(&registry, &name)?;
            let id: ResourceId = id.parse()?;
            let (old, new) = (load_config(&old, max)?, load_config(&new, max)?);
            let session = Session::connect(config).await?;
            let state = session.update(k, &id, &old, &new).await?;
            print_state(cli.output, Some(&id), &state)?;
        }
        Commands::Delete { kind: name, id } => {
            let k = kind(&registry, &name)?;
            let id: ResourceId = id.parse()?;
            let session = Session::connect(config).await?;
            session.delete(k, &id).await?;
            println!("deleted {}", id);
        }
        Commands::Raw { command } => {
            let session = Session::connect(config).await?;
            match command {
                RawCommands::Apply { file, replace } => {
                    let doc = load_doc(&file, max)?;
                    let obj = session.parse_raw(&serde_json::to_string(&doc)?)?;
                    let id = if replace { session.replace_raw(&obj).await? } else { session.create_raw(&obj).await? };
                    println!("{} {}", obj.api_version(), id);
                }
                RawCommands::Delete { file } => {
                    let doc = load_doc(&file, max)?;
                    let obj = session.parse_raw(&serde_json::to_string(&doc)?)?;
                    session.delete_raw(&obj).await?;
                    println!("deleted {} {}", obj.api_version(), obj.id());
                }
            }
        }
    }

    Ok(())
}
