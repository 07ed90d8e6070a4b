use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use nbsync_cli::{commands, NbsyncConfig};
use nbsync_format::IpynbVersion;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("nbsync")
        .version(nbsync_cli::VERSION)
        .about("Notebook sync tooling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a notebook between formats (by extension)")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("output")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("nbformat")
                        .long("nbformat")
                        .value_parser(["3", "4"])
                        .help("nbformat major version for .ipynb output"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Summarize a notebook")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply newline-delimited JSON actions to a document and save it")
                .arg(
                    Arg::new("document")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Document path relative to the storage root"),
                )
                .arg(
                    Arg::new("actions")
                        .long("actions")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("File of actions, one JSON object per line"),
                )
                .arg(
                    Arg::new("root")
                        .long("root")
                        .value_parser(value_parser!(PathBuf))
                        .help("Storage root (overrides storage.root)"),
                )
                .arg(
                    Arg::new("keep-going")
                        .long("keep-going")
                        .action(ArgAction::SetTrue)
                        .help("Skip rejected actions instead of stopping"),
                )
                .arg(
                    Arg::new("no-create")
                        .long("no-create")
                        .action(ArgAction::SetTrue)
                        .help("Fail if the document does not exist"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<NbsyncConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => Ok(NbsyncConfig::load(path)?),
        None => Ok(NbsyncConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let mut config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("convert", args)) => {
            let (Some(input), Some(output)) = (
                args.get_one::<PathBuf>("input"),
                args.get_one::<PathBuf>("output"),
            ) else {
                anyhow::bail!("convert needs <input> and <output>");
            };
            if let Some(version) = args.get_one::<String>("nbformat") {
                config.storage.ipynb_write_version = match version.as_str() {
                    "4" => IpynbVersion::V4,
                    _ => IpynbVersion::V3,
                };
            }
            let summary = commands::convert(input, output, &config).await?;
            print!("{}", summary.to_text());
        }
        Some(("inspect", args)) => {
            let Some(path) = args.get_one::<PathBuf>("path") else {
                anyhow::bail!("inspect needs <path>");
            };
            let summary = commands::inspect(path, &config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.to_text());
            }
        }
        Some(("apply", args)) => {
            let (Some(document), Some(actions_path)) = (
                args.get_one::<PathBuf>("document"),
                args.get_one::<PathBuf>("actions"),
            ) else {
                anyhow::bail!("apply needs <document> and --actions");
            };
            if let Some(root) = args.get_one::<PathBuf>("root") {
                config.storage.root.clone_from(root);
            }
            if args.get_flag("no-create") {
                config.storage.create_on_read = false;
            }
            let input = tokio::fs::read_to_string(actions_path)
                .await
                .with_context(|| format!("reading {}", actions_path.display()))?;
            let actions = commands::parse_actions(&input)?;
            let report =
                commands::apply(document, actions, args.get_flag("keep-going"), &config).await?;
            println!(
                "applied {}, rejected {}, {} cells{}",
                report.applied,
                report.rejected,
                report.cells,
                if report.created { " (new document)" } else { "" }
            );
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand {other}"),
        None => anyhow::bail!("no subcommand given"),
    }
    Ok(())
}
