use std::env;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use facetdb_cli::{dnd5e, parse_selection, render, BarProgress};
use facetdb_core::config::Config;
use facetdb_core::json_source::JsonDirSource;
use facetdb_core::persist::FileSink;
use facetdb_core::registry::TabRegistry;
use facetdb_core::sort::SortDirection;
use facetdb_core::traits::FacetIndex;
use facetdb_engine::{IndexBuilder, PartitionFilter, SortSpec};

#[derive(Parser, Debug)]
#[command(name = "facetdb", version, about = "Faceted search over compendium documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the document directory and rebuild every category index
    Index {
        /// `*` or a comma-separated list of partition ids
        #[arg(long, default_value = "*")]
        partitions: String,
    },
    /// Query one category
    Query {
        /// Category id, e.g. `spells`
        category: String,
        /// Free text for a searchable field: FIELD=TEXT
        #[arg(long = "text", value_name = "FIELD=TEXT")]
        texts: Vec<String>,
        /// Selected options: FIELD=KEY[,KEY...]
        #[arg(long = "select", value_name = "FIELD=KEYS")]
        selects: Vec<String>,
        /// Require a boolean field to be true
        #[arg(long = "check", value_name = "FIELD")]
        checks: Vec<String>,
        /// Inclusive numeric span: FIELD=LOW..HIGH
        #[arg(long = "range", value_name = "FIELD=LOW..HIGH")]
        ranges: Vec<String>,
        /// Field to sort by
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
        /// Print stored records as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show registered categories and the persisted index state
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    let base = env::current_dir()?;
    let documents_dir = settings.documents_dir(&base);
    let index_dir = settings.index_dir(&base);

    let registry = Arc::new(TabRegistry::new());
    dnd5e::register(&registry)?;
    let source = Arc::new(JsonDirSource::open(&documents_dir)?);
    let sink = Arc::new(FileSink::new(&index_dir));
    let builder =
        IndexBuilder::new(registry.clone(), source, sink, settings).with_progress(Arc::new(BarProgress::new()));

    match cli.command {
        Command::Index { partitions } => {
            let filter: PartitionFilter = partitions.parse()?;
            info!(documents = %documents_dir.display(), index = %index_dir.display(), "indexing");
            let report = builder.rebuild(&filter).await?;
            for (category, count) in &report.indexed {
                println!("{category:<12} {count:>6} records");
            }
            for failure in &report.failures {
                println!(
                    "failed: {} {} {}: {}",
                    failure.partition,
                    failure.document.as_deref().unwrap_or("-"),
                    failure.category.as_deref().unwrap_or("-"),
                    failure.error
                );
            }
            for (key, error) in &report.persistence_failures {
                println!("not persisted: {key}: {error}");
            }
            println!(
                "Indexed {} records from {} partitions ({} skipped, {} nested documents ignored)",
                report.total_indexed(),
                report.partitions_scanned,
                report.partitions_skipped,
                report.contained_skipped
            );
        }
        Command::Query { category, texts, selects, checks, ranges, sort, desc, json } => {
            if let Err(e) = builder.load_persisted().await {
                warn!(error = %e, "no usable persisted index, rebuilding");
                builder.rebuild(&PartitionFilter::All).await?;
            }
            let selection = parse_selection(&texts, &selects, &checks, &ranges)?;
            let direction = if desc { SortDirection::Descending } else { SortDirection::Ascending };
            let sort = sort.map(|field| SortSpec::new(field, direction));
            let hits = builder.search(&category, &selection, sort.as_ref()).await?;
            let template = registry.get(&category).map(|c| c.result_template.clone()).unwrap_or_default();
            for hit in &hits {
                if json {
                    println!("{}", serde_json::to_string(&hit.record)?);
                } else if template.is_empty() {
                    println!("{}\t{}", hit.id(), hit.document.name.as_deref().unwrap_or_default());
                } else {
                    println!("{}\t{}", hit.id(), render(&template, &hit.record));
                }
            }
            eprintln!("{} results", hits.len());
        }
        Command::Status => {
            let loaded = builder.load_persisted().await;
            println!("documents: {}", documents_dir.display());
            println!("index:     {}", index_dir.display());
            println!("state:     {}", builder.state());
            if let Err(e) = &loaded {
                println!("persisted: unavailable ({e})");
            }
            let snapshot = builder.snapshot();
            for category in registry.categories() {
                let records = snapshot.as_ref().and_then(|s| s.get(&category.id)).map(|index| index.len());
                let fields: Vec<&str> = category.schema.keys().collect();
                println!(
                    "{:<12} {:<8} {:>6}  [{}]",
                    category.id,
                    category.document_type,
                    records.map_or_else(|| "-".to_string(), |n| n.to_string()),
                    fields.join(", ")
                );
            }
        }
    }
    Ok(())
}
