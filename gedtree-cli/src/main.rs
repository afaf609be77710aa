use clap::{Parser, Subcommand, ValueEnum};
use gedtree::validation::validate_branch;
use gedtree::{
    parse_config_str, render_lines, GrammarSchemaStore, LineSpec, PrintPolicy, RecordTree,
    TreeConfig,
};
use std::process;
use std::sync::Arc;

/// gedtree CLI: inspect genealogy grammars and build records from paths
#[derive(Parser)]
#[command(name = "gedtree", version, about)]
struct Cli {
    /// Grammar file to compile
    #[arg(long, short)]
    grammar: String,

    /// Tree configuration (YAML)
    #[arg(long, env = "GEDTREE_CONFIG")]
    config: Option<String>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List structures with their variation counts
    Structures,

    /// Dump the compiled schema of a structure
    Show {
        /// Structure name
        structure: String,
    },

    /// List the structures that use a tag
    Tags {
        /// Tag name
        tag: String,
    },

    /// Build a record from paths and print its lines
    Build {
        /// Structure name of the record
        structure: String,
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Populate a record from the schema and print every line
    Skeleton {
        /// Structure name of the record
        structure: String,
        /// Top-level tag picking a variation
        #[arg(long)]
        tag: Option<String>,
        /// Add one of every line, not only the mandatory ones
        #[arg(long)]
        all: bool,
        /// Descend into the added lines
        #[arg(long)]
        recursive: bool,
    },

    /// Build a record from paths and validate it
    Validate {
        /// Structure name of the record
        structure: String,
        #[command(flatten)]
        record: RecordArgs,
        /// Report content issues as errors
        #[arg(long)]
        strict: bool,
    },
}

#[derive(clap::Args)]
struct RecordArgs {
    /// Path to create, steps separated by '/', optional '=VALUE' or '=@XREF@'
    /// (e.g. --path "FAM/CHIL=@I1@")
    #[arg(long = "path", value_parser = parse_path_arg)]
    paths: Vec<PathArg>,
    /// Top-level tag picking a variation
    #[arg(long)]
    tag: Option<String>,
    /// Always create a new line at the deepest step with room
    #[arg(long)]
    new: bool,
}

#[derive(Clone)]
struct PathArg {
    steps: Vec<String>,
    value: Option<String>,
}

fn parse_path_arg(s: &str) -> Result<PathArg, String> {
    let (path, value) = match s.split_once('=') {
        Some((path, value)) => (path, Some(value.to_string())),
        None => (s, None),
    };
    let steps: Vec<String> = path
        .split('/')
        .filter(|step| !step.trim().is_empty())
        .map(str::to_string)
        .collect();
    if steps.is_empty() {
        return Err(format!("Invalid path '{s}': no steps"));
    }
    Ok(PathArg { steps, value })
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(load_grammar(&cli.grammar)?);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Structures => {
            let structures: Vec<_> = store
                .structure_names()
                .into_iter()
                .map(|name| {
                    serde_json::json!({
                        "name": name,
                        "variations": store.variations(name).len(),
                    })
                })
                .collect();
            print_output(
                &serde_json::json!({
                    "header": store.header(),
                    "structures": structures,
                }),
                &cli.format,
            )?;
        }

        Command::Show { structure } => {
            let variations = store.variations(&structure);
            if variations.is_empty() {
                return Err(format!("Unknown structure '{structure}'").into());
            }
            print_output(&serde_json::to_value(variations)?, &cli.format)?;
        }

        Command::Tags { tag } => {
            let structures: Vec<_> = store
                .structures_with_tag(&tag)
                .iter()
                .map(|s| serde_json::json!({ "name": s.name(), "variation": s.variation() }))
                .collect();
            print_output(
                &serde_json::json!({ "tag": tag, "structures": structures }),
                &cli.format,
            )?;
        }

        Command::Build { structure, record } => {
            let tree = build_tree(&store, &config, &structure, &record)?;
            let lines = render_lines(&tree, &config.print);
            print_output(&serde_json::json!({ "lines": lines }), &cli.format)?;
        }

        Command::Skeleton {
            structure,
            tag,
            all,
            recursive,
        } => {
            let mut tree = new_tree(&store, &config, &structure, tag)?;
            let recursive = recursive || config.recursive_bulk;
            let root = tree.root();
            let added = if all {
                tree.add_all_child_lines(root, recursive)?
            } else {
                tree.add_mandatory_child_lines(root, recursive)?
            };
            log::info!("Added {} lines to {structure}", added.len());
            let lines = render_lines(&tree, &PrintPolicy::print_all());
            print_output(&serde_json::json!({ "lines": lines }), &cli.format)?;
        }

        Command::Validate {
            structure,
            record,
            strict,
        } => {
            let tree = build_tree(&store, &config, &structure, &record)?;
            let result = validate_branch(&tree, tree.root(), strict);
            print_output(&serde_json::to_value(&result)?, &cli.format)?;
        }
    }

    Ok(())
}

fn load_grammar(path: &str) -> Result<GrammarSchemaStore, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read grammar file '{path}': {e}"))?;
    let store = GrammarSchemaStore::parse(&content)?;
    log::debug!(
        "Loaded grammar '{path}' with {} structures",
        store.structures().len()
    );
    Ok(store)
}

fn load_config(path: Option<&str>) -> Result<TreeConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config file '{path}': {e}"))?;
            Ok(parse_config_str(&content)?)
        }
        None => Ok(TreeConfig::default()),
    }
}

fn new_tree(
    store: &Arc<GrammarSchemaStore>,
    config: &TreeConfig,
    structure: &str,
    tag: Option<String>,
) -> Result<RecordTree, Box<dyn std::error::Error>> {
    let mut spec = LineSpec::new(structure);
    if let Some(tag) = tag {
        spec = spec.with_tag(tag);
    }
    Ok(RecordTree::with_spec(store.clone(), spec)?.with_config(config.clone()))
}

fn build_tree(
    store: &Arc<GrammarSchemaStore>,
    config: &TreeConfig,
    structure: &str,
    record: &RecordArgs,
) -> Result<RecordTree, Box<dyn std::error::Error>> {
    let mut tree = new_tree(store, config, structure, record.tag.clone())?;
    let root = tree.root();

    for path in &record.paths {
        let id = if record.new {
            tree.create_path_end(root, &path.steps)?
        } else {
            tree.create_path(root, &path.steps)?
        };
        match path.value.as_deref() {
            Some(xref) if xref.len() > 1 && xref.starts_with('@') && xref.ends_with('@') => {
                tree.set_xref(id, xref)?
            }
            Some(value) => tree.set_value(id, value)?,
            None => tree.set_forced_visible(id, true)?,
        }
    }
    Ok(tree)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
