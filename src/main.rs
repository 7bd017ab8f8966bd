//! tml CLI: elicited expertise to confirmed declarations.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use tml_engine::engine::{Engine, EngineConfig};
use tml_engine::declaration::Declaration;
use tml_engine::export::{DeclarationExporter, DeclarationSummary, JsonExporter, YamlExporter};
use tml_engine::identity::{IdentityProvider, LocalIdentityProvider};
use tml_engine::primitive::{ExtractionSource, PrimitiveId};
use tml_engine::registry::TransitionRequest;
use tml_engine::structure::{JsonStructurer, RawContentBatch};

/// Used when neither `--data-dir` nor the config file names one.
const DEFAULT_DATA_DIR: &str = ".tml";

#[derive(Parser)]
#[command(name = "tml", version, about = "Typed organizational knowledge engine")]
struct Cli {
    /// Data directory for persistent storage.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML engine configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn exporter(self) -> Box<dyn DeclarationExporter> {
        match self {
            Self::Json => Box::new(JsonExporter::pretty()),
            Self::Yaml => Box::new(YamlExporter),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new tml data directory.
    Init,

    /// Ingest a JSON candidate set into a scope.
    Ingest {
        /// Scope the candidates belong to.
        #[arg(long)]
        scope: String,

        /// JSON file: `{"primitives": [...]}` or a bare array.
        #[arg(long)]
        file: PathBuf,

        /// Email of the person performing the ingest.
        #[arg(long, default_value = "cli@localhost")]
        actor: String,

        /// Source family recorded in provenance.
        #[arg(long, default_value = "file")]
        source_type: String,
    },

    /// Confirm a primitive.
    Confirm {
        id: String,
        #[arg(long)]
        actor: String,
        /// Fail unless the primitive is at this revision.
        #[arg(long)]
        expect_revision: Option<u64>,
    },

    /// Correct a primitive's principal text.
    Correct {
        id: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        expect_revision: Option<u64>,
    },

    /// Flag a primitive as wrong.
    Flag {
        id: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        expect_revision: Option<u64>,
    },

    /// Assemble the next declaration version of a scope.
    Assemble {
        scope: String,
        /// Write the declaration here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Export a scope's latest declaration.
    Export {
        scope: String,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Show the completion summary of a scope's latest declaration.
    Status { scope: String },

    /// Compute the organizational graph over the latest declarations of scopes.
    Graph {
        #[arg(required = true)]
        scopes: Vec<String>,
        /// Explicit root scope.
        #[arg(long)]
        root: Option<String>,
        /// Print only the automation candidates, most ready first.
        #[arg(long)]
        candidates: bool,
    },

    /// Show the provenance history of a primitive.
    Provenance { id: String },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };
    config.data_dir = cli
        .data_dir
        .clone()
        .or(config.data_dir)
        .or_else(|| Some(PathBuf::from(DEFAULT_DATA_DIR)));

    let identities = LocalIdentityProvider::new();
    let engine = Engine::new(config)?;

    match cli.command {
        Commands::Init => {
            let data_dir = engine
                .config()
                .data_dir
                .as_deref()
                .unwrap_or(Path::new(DEFAULT_DATA_DIR));
            print_json(&serde_json::json!({
                "data_dir": data_dir.display().to_string(),
                "primitives": engine.registry().len(),
            }))?;
        }

        Commands::Ingest {
            scope,
            file,
            actor,
            source_type,
        } => {
            let actor = identities.resolve(&actor)?;
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let batch = RawContentBatch::new(
                ExtractionSource {
                    source_type,
                    source_identifier: file.display().to_string(),
                    extracted_at: tml_engine::unix_now(),
                },
                content,
            );
            let ids = engine.ingest(&JsonStructurer, &batch, &PrimitiveId::new(scope), &actor)?;
            print_json(&ids)?;
        }

        Commands::Confirm {
            id,
            actor,
            expect_revision,
        } => {
            let actor = identities.resolve(&actor)?;
            let request = guarded(TransitionRequest::confirm(id, actor), expect_revision);
            print_json(&engine.transition(request)?)?;
        }

        Commands::Correct {
            id,
            actor,
            text,
            expect_revision,
        } => {
            let actor = identities.resolve(&actor)?;
            let request = guarded(TransitionRequest::correct(id, actor, text), expect_revision);
            print_json(&engine.transition(request)?)?;
        }

        Commands::Flag {
            id,
            actor,
            reason,
            expect_revision,
        } => {
            let actor = identities.resolve(&actor)?;
            let request = guarded(TransitionRequest::flag(id, actor, reason), expect_revision);
            print_json(&engine.transition(request)?)?;
        }

        Commands::Assemble { scope, out, format } => {
            let declaration = engine.assemble(&scope)?;
            write_declaration(&declaration, format, out.as_deref())?;
        }

        Commands::Export { scope, out, format } => {
            let declaration = engine.latest_declaration(&scope)?;
            write_declaration(&declaration, format, out.as_deref())?;
        }

        Commands::Status { scope } => {
            let declaration = engine.latest_declaration(&scope)?;
            print_json(&DeclarationSummary::from(&declaration))?;
        }

        Commands::Graph {
            scopes,
            root,
            candidates,
        } => {
            let declarations = scopes
                .iter()
                .map(|scope| engine.latest_declaration(scope))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let graph = match root {
                Some(root) => engine.compute_graph_with_root(declarations, &root)?,
                None => engine.compute_graph(declarations)?,
            };
            if candidates {
                print_json(&graph.ranked_candidates())?;
            } else {
                print_json(&graph)?;
            }
        }

        Commands::Provenance { id } => {
            engine.primitive(&id)?;
            print_json(&engine.provenance(&id))?;
        }
    }

    Ok(())
}

fn guarded(request: TransitionRequest, expect_revision: Option<u64>) -> TransitionRequest {
    match expect_revision {
        Some(revision) => request.expecting(revision),
        None => request,
    }
}

/// Export to `out`, printing the summary, or print the export itself.
fn write_declaration(declaration: &Declaration, format: Format, out: Option<&Path>) -> Result<()> {
    let text = format.exporter().export(declaration)?;
    match out {
        Some(path) => {
            std::fs::write(path, text).into_diagnostic()?;
            print_json(&DeclarationSummary::from(declaration))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
