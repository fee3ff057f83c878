//! Mnemo CLI - scoped knowledge-graph memory for agent runtimes
//!
//! Usage:
//!   mnemo save <key> <value>          - store or overwrite a memory
//!   mnemo recall <key>                - look one up
//!   mnemo link <source> <target>      - relate two memories
//!   mnemo prioritize <context>        - rank memories for a task
//!   mnemo graph                       - dump a scope
//!   mnemo context <context>           - render a markdown context block
//!   mnemo tools                       - print the tool schemas
//!   mnemo call <name> --args '{...}'  - invoke a tool like a runtime would

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mnemo_core::{tools, MemoryBackend};
use mnemo_store::MemoryRegistry;

#[derive(Parser)]
#[command(name = "mnemo")]
#[command(version)]
#[command(about = "Scoped knowledge-graph memory for AI agent runtimes", long_about = None)]
struct Cli {
    /// Data root for all scopes (defaults to ~/.mnemo)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store or overwrite a memory
    Save {
        key: String,
        value: String,
        /// project, global, pattern, or decision
        #[arg(long, default_value = "project")]
        category: String,
        /// Project the memory belongs to; omit for the global scope
        #[arg(long)]
        project: Option<String>,
    },

    /// Look up a memory by key
    Recall {
        key: String,
        #[arg(long)]
        project: Option<String>,
    },

    /// Relate two memories
    Link {
        source: String,
        target: String,
        /// related_to, depends_on, implements, extends, uses, references, or part_of
        #[arg(long, default_value = "related_to")]
        relation: String,
        /// Edge weight between 0.0 and 1.0
        #[arg(long, default_value_t = 1.0)]
        strength: f64,
        /// Also store the mirrored edge
        #[arg(long)]
        bidirectional: bool,
        #[arg(long)]
        project: Option<String>,
    },

    /// Delete a memory and its relations
    Forget {
        key: String,
        #[arg(long)]
        project: Option<String>,
    },

    /// Rank memories against a task context
    Prioritize {
        context: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        project: Option<String>,
    },

    /// Show every memory and relation in a scope
    Graph {
        #[arg(long)]
        project: Option<String>,
    },

    /// Render the top-ranked memories as a markdown context block
    Context {
        context: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        project: Option<String>,
    },

    /// Print the tool schemas as JSON
    Tools,

    /// Invoke a tool handler exactly as an agent runtime would
    Call {
        name: String,
        /// JSON object of tool arguments
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let registry = match cli.data_dir {
        Some(root) => MemoryRegistry::new(root),
        None => MemoryRegistry::open_default()?,
    };

    match cli.command {
        Commands::Save {
            key,
            value,
            category,
            project,
        } => dispatch(
            &registry,
            "save_memory",
            json!({ "key": key, "value": value, "category": category, "projectPath": project }),
        ),

        Commands::Recall { key, project } => dispatch(
            &registry,
            "recall_memory",
            json!({ "key": key, "projectPath": project }),
        ),

        Commands::Link {
            source,
            target,
            relation,
            strength,
            bidirectional,
            project,
        } => dispatch(
            &registry,
            "link_memories",
            json!({
                "sourceKey": source,
                "targetKey": target,
                "relationType": relation,
                "strength": strength,
                "bidirectional": bidirectional,
                "projectPath": project,
            }),
        ),

        Commands::Forget { key, project } => dispatch(
            &registry,
            "forget_memory",
            json!({ "key": key, "projectPath": project }),
        ),

        Commands::Prioritize {
            context,
            limit,
            project,
        } => dispatch(
            &registry,
            "prioritize_memories",
            json!({ "context": context, "limit": limit, "projectPath": project }),
        ),

        Commands::Graph { project } => dispatch(
            &registry,
            "memory_graph",
            json!({ "projectPath": project }),
        ),

        Commands::Context {
            context,
            limit,
            project,
        } => {
            let manager = registry.manager(project.as_deref())?;
            let ranked = manager.prioritize(&context, limit)?;
            if ranked.is_empty() {
                println!("No memories stored yet.");
            } else {
                println!("## Memory Context");
                println!();
                for entry in ranked {
                    println!(
                        "- [{}] {}: {}",
                        entry.record.category, entry.record.key, entry.record.value
                    );
                }
            }
        }

        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tools::tool_schemas())?);
        }

        Commands::Call { name, args } => {
            let args: serde_json::Value = serde_json::from_str(&args)?;
            match tools::execute_tool(&name, &args, &registry) {
                Some(text) => println!("{}", text),
                None => println!("✗ Unknown tool: {}", name),
            }
        }
    }

    Ok(())
}

fn dispatch(registry: &MemoryRegistry, name: &str, args: serde_json::Value) {
    match tools::execute_tool(name, &args, registry) {
        Some(text) => println!("{}", text),
        None => println!("✗ Unknown tool: {}", name),
    }
}
