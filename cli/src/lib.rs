use anyhow::{anyhow, Error, Result};
use clap::{Parser, Subcommand};
use kiwi::config::{CacheBackend, KiWiConfiguration, RegistryStrategy};
use kiwi::{
    KiWiConnection, KiWiNamespace, KiWiNode, KiWiPersistence, KiWiTriple, KiWiUriResource,
    TriplePattern,
};
use log::info;
use oxigraph::model::Term;
use std::env::current_dir;
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "kiwi")]
#[command(about = "KiWi triple store")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false", global = true)]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false", global = true)]
    debug: bool,
    /// Directory of the store, defaults to .kiwi in the current directory
    #[clap(long, short, global = true)]
    root: Option<PathBuf>,
    /// Cache backend, overrides the value stored in kiwi.json
    #[clap(long, value_enum, global = true)]
    cache_backend: Option<CacheBackend>,
    /// Triple registry strategy, overrides the value stored in kiwi.json
    #[clap(long, value_enum, global = true)]
    registry: Option<RegistryStrategy>,
}

#[derive(Debug, Subcommand)]
enum NamespaceCommands {
    /// Bind a prefix to a namespace URI, replacing an existing binding of the prefix
    Set { prefix: String, uri: String },
    /// List all namespace bindings
    List,
    /// Remove the binding of a prefix
    Remove { prefix: String },
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new store and write its configuration
    Init,
    /// Add a triple. Terms use N-Triples syntax or a bound prefix (ex:name)
    Add {
        subject: String,
        predicate: String,
        object: String,
        /// Named graph of the triple
        #[clap(long, short)]
        context: Option<String>,
    },
    /// Mark a triple as deleted
    Remove {
        subject: String,
        predicate: String,
        object: String,
        #[clap(long, short)]
        context: Option<String>,
    },
    /// Print the triples matching a pattern as N-Quads
    List {
        #[clap(long, short)]
        subject: Option<String>,
        #[clap(long, short)]
        predicate: Option<String>,
        #[clap(long, short)]
        object: Option<String>,
        #[clap(long, short)]
        context: Option<String>,
    },
    /// Manage namespace bindings
    #[command(subcommand)]
    Namespace(NamespaceCommands),
    /// Print node, triple and namespace counts
    Stats,
    /// Delete all data in the store
    Reset {
        #[clap(long, short, action = clap::ArgAction::SetTrue, default_value = "false")]
        force: bool,
    },
}

pub fn run() -> Result<()> {
    kiwi::init_logging();
    let cmd = Cli::parse();
    execute(cmd)
}

pub fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    kiwi::init_logging();
    let cmd = Cli::try_parse_from(args).map_err(Error::from)?;
    execute(cmd)
}

fn execute(cmd: Cli) -> Result<()> {
    // The RUST_LOG env var is set by `init_logging` if KIWI_LOG is present.
    // CLI flags for verbosity take precedence. If nothing is set, we default to "warn".
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();

    let root = match cmd.root {
        Some(root) => root,
        None => current_dir()?.join(".kiwi"),
    };
    let config_path = KiWiConfiguration::config_path(&root);
    let exists = config_path.exists();
    info!("Store at {} exists: {}", root.display(), exists);

    let mut config = if exists {
        KiWiConfiguration::from_file(&config_path)?
    } else {
        KiWiConfiguration::default()
    };
    config.root = root.clone();
    if let Some(backend) = cmd.cache_backend {
        config.cache_backend = backend;
    }
    if let Some(strategy) = cmd.registry {
        config.registry_strategy = strategy;
    }
    if cmd.verbose || cmd.debug {
        config.print();
    }

    if let Commands::Init = cmd.command {
        if exists {
            println!("A KiWi store already exists in: {}", root.display());
        }
        let store = KiWiPersistence::open(config.clone())?;
        config.save_to_file(&config_path)?;
        let stats = store.statistics()?;
        println!(
            "Initialized store at {} ({} nodes, {} triples)",
            root.display(),
            stats.nodes,
            stats.triples
        );
        store.shutdown();
        return Ok(());
    }

    if !exists {
        return Err(anyhow!(
            "No KiWi store found at {}. Run `kiwi init` to create one.",
            root.display()
        ));
    }
    let store = KiWiPersistence::open(config)?;
    let result = run_command(&store, cmd.command);
    store.shutdown();
    result
}

fn run_command(store: &KiWiPersistence, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {}
        Commands::Add {
            subject,
            predicate,
            object,
            context,
        } => {
            let mut conn = store.connection()?;
            let mut triple = parse_triple(&conn, &subject, &predicate, &object, context.as_deref())?;
            let inserted = conn.store_triple(&mut triple)?;
            conn.commit()?;
            let id = triple.id.unwrap_or_default();
            if inserted {
                println!("Added triple {}", id);
            } else {
                println!("Triple already present as {}", id);
            }
        }
        Commands::Remove {
            subject,
            predicate,
            object,
            context,
        } => {
            let mut conn = store.connection()?;
            let mut triple = parse_triple(&conn, &subject, &predicate, &object, context.as_deref())?;
            let deleted = conn.delete_triple(&mut triple)?;
            conn.commit()?;
            if deleted {
                println!("Removed triple {}", triple.id.unwrap_or_default());
            } else {
                println!("No matching triple");
            }
        }
        Commands::List {
            subject,
            predicate,
            object,
            context,
        } => {
            let conn = store.connection()?;
            let pattern = TriplePattern {
                subject: subject.map(|s| parse_node(&conn, &s)).transpose()?,
                predicate: predicate.map(|p| parse_uri(&conn, &p)).transpose()?,
                object: object.map(|o| parse_node(&conn, &o)).transpose()?,
                context: context.map(|c| parse_node(&conn, &c)).transpose()?,
            };
            for triple in conn.list_triples(&pattern)? {
                println!("{}", triple);
            }
            conn.commit()?;
        }
        Commands::Namespace(ns_cmd) => {
            let mut conn = store.connection()?;
            match ns_cmd {
                NamespaceCommands::Set { prefix, uri } => {
                    if let Some(existing) = conn.load_namespace_by_prefix(&prefix)? {
                        if existing.uri != uri {
                            conn.delete_namespace(&existing)?;
                        }
                    }
                    let mut namespace = KiWiNamespace::new(prefix, uri);
                    conn.store_namespace(&mut namespace)?;
                    println!("{}: <{}>", namespace.prefix, namespace.uri);
                }
                NamespaceCommands::List => {
                    for namespace in conn.list_namespaces()? {
                        println!("{}: <{}>", namespace.prefix, namespace.uri);
                    }
                }
                NamespaceCommands::Remove { prefix } => {
                    match conn.load_namespace_by_prefix(&prefix)? {
                        Some(namespace) => {
                            conn.delete_namespace(&namespace)?;
                            println!("Removed prefix {}", prefix);
                        }
                        None => println!("Prefix {} is not bound", prefix),
                    }
                }
            }
            conn.commit()?;
        }
        Commands::Stats => {
            let stats = store.statistics()?;
            println!("Nodes: {}", stats.nodes);
            println!("Triples: {}", stats.triples);
            println!("Deleted triples: {}", stats.deleted_triples);
            println!("Namespaces: {}", stats.namespaces);
        }
        Commands::Reset { force } => {
            if !force {
                let mut input = String::new();
                println!(
                    "Are you sure you want to delete all data in {}? [y/N] ",
                    store.configuration().root.display()
                );
                std::io::stdin().read_line(&mut input)?;
                let input = input.trim();
                if input != "y" && input != "Y" {
                    println!("Aborting...");
                    return Ok(());
                }
            }
            store.clear()?;
            println!("Store cleared.");
        }
    }
    Ok(())
}

/// Expands `prefix:local` when the prefix is bound; anything else is returned as is.
fn expand_prefixed(conn: &KiWiConnection, s: &str) -> Result<String> {
    if s.starts_with('<') || s.starts_with('"') || s.starts_with("_:") {
        return Ok(s.to_string());
    }
    if let Some((prefix, local)) = s.split_once(':') {
        if let Some(namespace) = conn.load_namespace_by_prefix(prefix)? {
            return Ok(format!("<{}{}>", namespace.uri, local));
        }
    }
    Ok(s.to_string())
}

fn parse_node(conn: &KiWiConnection, s: &str) -> Result<KiWiNode> {
    let expanded = expand_prefixed(conn, s)?;
    let term = Term::from_str(&expanded).map_err(|e| anyhow!("Invalid term {}: {}", s, e))?;
    KiWiNode::from_term(term.as_ref())
}

fn parse_uri(conn: &KiWiConnection, s: &str) -> Result<KiWiUriResource> {
    match parse_node(conn, s)? {
        KiWiNode::Uri(uri) => Ok(uri),
        other => Err(anyhow!("Expected a URI but got {}", other)),
    }
}

fn parse_triple(
    conn: &KiWiConnection,
    subject: &str,
    predicate: &str,
    object: &str,
    context: Option<&str>,
) -> Result<KiWiTriple> {
    let subject = parse_node(conn, subject)?;
    if !subject.is_resource() {
        return Err(anyhow!("Subject {} must be a URI or blank node", subject));
    }
    let context = context.map(|c| parse_node(conn, c)).transpose()?;
    Ok(KiWiTriple::new(
        subject,
        parse_uri(conn, predicate)?,
        parse_node(conn, object)?,
        context,
    ))
}
