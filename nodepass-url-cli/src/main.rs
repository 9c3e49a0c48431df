use anyhow::{Context, anyhow, bail};
use clap::Parser;
use nodepass_url::instance::{InstanceAction, InstancePatch, InstanceRequest};
use nodepass_url::store::MemoryStore;
use nodepass_url::{ControllerConfig, ControllerRegistry, EndpointForm, PairRequest, build_pair_urls, parse};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Parse and build the endpoint urls of NodePass controllers
/// server://[KEY@]TUNNEL_ADDR/TARGET_ADDR?log=..&tls=..  <--->  client://[KEY@]TUNNEL_ADDR/LOCAL_ADDR?log=..&min=..&max=..
#[derive(clap::Parser, Debug)]
#[command(author, version, about, verbatim_doc_comment, long_about = None)]
pub struct NodepassUrl {
    #[command(subcommand)]
    commands: Commands,

    /// Path to config file (YAML format)
    /// Config file holds a 'controllers' list with name, api_url, api_key and tunnel_key
    #[arg(long, global = true, value_name = "FILE_PATH", verbatim_doc_comment)]
    config: Option<std::path::PathBuf>,

    /// Disable color output in logs
    #[arg(long, global = true, verbatim_doc_comment, env = "NO_COLOR")]
    no_color: Option<String>,

    /// Control the log verbosity. i.e: TRACE, DEBUG, INFO, WARN, ERROR, OFF
    /// for more details: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#example-syntax
    #[arg(
        long,
        global = true,
        value_name = "LOG_LEVEL",
        verbatim_doc_comment,
        env = "RUST_LOG",
        default_value = "INFO"
    )]
    log_lvl: String,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Print the fields of an endpoint url
    Parse(ParseArgs),
    /// Build an endpoint url from its fields
    Build(Box<BuildArgs>),
    /// Build a server url and the url of a client dialing it
    Pair(Box<PairArgs>),
    /// Print the body of an instance start/stop/restart request
    Action(ActionArgs),
}

#[derive(clap::Args, Debug)]
pub struct ParseArgs {
    /// Endpoint url, i.e: 'server://key@0.0.0.0:10101/127.0.0.1:8000?log=info&tls=1'
    url: String,

    /// Print as json instead of yaml
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct ControllerArgs {
    /// Name of the controller from the config file running the instance
    #[arg(long, value_name = "NAME")]
    controller: Option<String>,

    /// Api url of the controller, overrides the one from the config file
    #[arg(long, value_name = "URL")]
    api_url: Option<Url>,

    /// Tunnel key of the controller, overrides the one from the config file
    #[arg(long, value_name = "KEY", env = "NODEPASS_TUNNEL_KEY")]
    tunnel_key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    form: EndpointForm,

    #[command(flatten)]
    controller: ControllerArgs,

    /// Print the POST /instances request body instead of the url
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct PairArgs {
    #[command(flatten)]
    request: PairRequest,

    #[command(flatten)]
    controller: ControllerArgs,

    /// Print both POST /instances request bodies instead of the urls
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct ActionArgs {
    #[arg(value_enum)]
    action: InstanceAction,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    controllers: Vec<ControllerConfig>,
}

#[derive(Serialize)]
struct PairRequests {
    server: InstanceRequest,
    client: InstanceRequest,
}

fn load_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config: ConfigFile = serde_yaml::from_reader(reader)?;
    Ok(config)
}

fn load_registry(config: Option<ConfigFile>) -> anyhow::Result<ControllerRegistry<MemoryStore>> {
    let registry = ControllerRegistry::new(MemoryStore::new());
    for controller in config.unwrap_or_default().controllers {
        registry.upsert(controller)?;
    }
    Ok(registry)
}

/// Resolves the controller of the instance. CLI args override config file values.
fn resolve_controller(
    registry: &ControllerRegistry<MemoryStore>,
    args: ControllerArgs,
) -> anyhow::Result<Option<ControllerConfig>> {
    let from_file = match &args.controller {
        Some(name) => Some(
            registry
                .get(name)?
                .ok_or_else(|| anyhow!("unknown controller {name} in config file"))?,
        ),
        None => None,
    };

    let controller = match (from_file, args.api_url) {
        (Some(mut controller), api_url) => {
            if let Some(api_url) = api_url {
                controller.api_url = api_url;
            }
            controller
        }
        (None, Some(api_url)) => ControllerConfig {
            name: api_url.to_string(),
            api_url,
            api_key: None,
            tunnel_key: None,
        },
        (None, None) if args.tunnel_key.is_some() => {
            bail!("A tunnel key belongs to a controller, use --controller or --api-url with it")
        }
        (None, None) => return Ok(None),
    };

    Ok(Some(ControllerConfig {
        tunnel_key: args.tunnel_key.or(controller.tunnel_key),
        ..controller
    }))
}

fn main() -> anyhow::Result<()> {
    let args = NodepassUrl::parse();

    // logs go to stderr, stdout only carries urls and request bodies
    let env_filter = EnvFilter::builder()
        .parse(&args.log_lvl)
        .with_context(|| format!("Invalid log level {}", args.log_lvl))?;
    tracing_subscriber::fmt()
        .with_ansi(args.no_color.is_none())
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let config_file = if let Some(config_path) = &args.config {
        match load_config_file(config_path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Failed to load config file '{}': {}", config_path.display(), e);
                None
            }
        }
    } else {
        None
    };
    let registry = load_registry(config_file)?;

    match args.commands {
        Commands::Parse(args) => {
            let descriptor = parse(&args.url);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&descriptor)?);
            } else {
                print!("{}", serde_yaml::to_string(&descriptor)?);
            }
        }
        Commands::Build(args) => {
            let args = *args;
            let controller = resolve_controller(&registry, args.controller)?;
            let request =
                InstanceRequest::from_form(&args.form, controller.as_ref()).context("Cannot build endpoint url")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&request)?);
            } else {
                println!("{}", request.url);
            }
        }
        Commands::Pair(args) => {
            let args = *args;
            let controller = resolve_controller(&registry, args.controller)?
                .context("Pairing requires the server controller, use --controller or --api-url")?;
            let urls = build_pair_urls(&args.request, &controller).context("Cannot build paired urls")?;
            info!("Client of {} will dial {}", controller.name, urls.client);
            if args.json {
                let requests = PairRequests {
                    server: InstanceRequest { url: urls.server },
                    client: InstanceRequest { url: urls.client },
                };
                println!("{}", serde_json::to_string_pretty(&requests)?);
            } else {
                println!("{}", urls.server);
                println!("{}", urls.client);
            }
        }
        Commands::Action(args) => {
            let patch = InstancePatch { action: args.action };
            println!("{}", serde_json::to_string(&patch)?);
        }
    }

    Ok(())
}
