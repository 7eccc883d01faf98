use std::time::Instant;

use anyhow::{Context, Result};
use comfy_table::Table;
use tracing::{info, info_span, warn};

use cdr_core::{RunContext, load_dimensions, load_extracts, run_pipeline};
use cdr_model::{PipelineConfig, RunReport, StageTable, load_config};
use cdr_stage::CsvStagingStore;
use cdr_cli::report::{list_domains, write_json_report};

use crate::cli::{CheckConfigArgs, DomainsArgs, RunArgs};
use crate::summary::apply_table_style;
use crate::types::RunOutcome;

pub fn run_ingest(args: &RunArgs) -> Result<RunOutcome> {
    let started = Instant::now();
    let mut config = load_config(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    if let Some(limit) = args.limit {
        config.sample_limit = Some(limit);
    }
    if let Some(seed) = args.seed {
        config.sample_seed = Some(seed);
    }
    config.validate().context("validate config overrides")?;

    let span = info_span!("ingest", extract_dir = %args.extract_dir.display());
    let _guard = span.enter();

    let extracts = load_extracts(&args.extract_dir)
        .with_context(|| format!("load extracts from {}", args.extract_dir.display()))?;
    let dims = load_dimensions(args.maps.as_deref(), &config).context("load dimension maps")?;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.extract_dir.join("staging"));
    let mut store = CsvStagingStore::open(
        &output_dir,
        &config.schema,
        &config.stg_pred.db_cols,
        &config.stg_pred_del.db_cols,
    )
    .with_context(|| format!("open staging store {}", output_dir.display()))?;

    let ctx = RunContext::new(&config, &dims);
    let mut report = RunReport::new();
    let summary = run_pipeline(&extracts, &ctx, &mut store, &mut report)?;

    let staged_files = if args.dry_run {
        warn!("dry run, staging files left untouched");
        Vec::new()
    } else {
        store.save().context("save staging tables")?;
        vec![store.path(StageTable::Active), store.path(StageTable::Deleted)]
    };
    if let Some(path) = &args.report {
        write_json_report(path, &summary, &report)?;
    }

    info!(
        domains = summary.domains.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingest complete"
    );
    Ok(RunOutcome {
        summary,
        report,
        staged_files,
        report_path: args.report.clone(),
        dry_run: args.dry_run,
    })
}

pub fn run_domains(args: &DomainsArgs) -> Result<()> {
    let config = args
        .config
        .as_deref()
        .map(|path| load_config(path).with_context(|| format!("load config {}", path.display())))
        .transpose()?;
    let extracts = load_extracts(&args.extract_dir)
        .with_context(|| format!("load extracts from {}", args.extract_dir.display()))?;

    let mut table = Table::new();
    table.set_header(vec!["Label", "Domain", "Needed", "Rows", "Columns"]);
    apply_table_style(&mut table);
    for listing in list_domains(&extracts, config.as_ref()) {
        let needed = match listing.needed {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };
        table.add_row(vec![
            listing.label,
            listing.domain_name.unwrap_or_else(|| "malformed".to_string()),
            needed.to_string(),
            listing.rows.to_string(),
            listing.columns.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_check_config(args: &CheckConfigArgs) -> Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    println!("{} is valid", args.config.display());
    println!("{}", config_table(&config));
    Ok(())
}

fn config_table(config: &PipelineConfig) -> Table {
    let columns = config.source_columns();
    let needed = if config.needed_domains.is_empty() {
        "(none)".to_string()
    } else {
        config.needed_domains.join(", ")
    };
    let sampling = match (config.sample_limit, config.sample_seed) {
        (Some(limit), Some(seed)) => format!("{limit} rows, seed {seed}"),
        (Some(limit), None) => format!("{limit} rows, unseeded"),
        (None, _) => "off".to_string(),
    };
    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    apply_table_style(&mut table);
    let rows = [
        ("schema", config.schema.clone()),
        ("source system", format!("{:?}", config.source_system).to_lowercase()),
        ("subject column", columns.subject),
        ("last modified column", columns.last_modified),
        ("audit column", columns.audit_action),
        ("delete marker", config.delete_marker.clone()),
        ("needed domains", needed),
        ("base columns", config.base_cols.len().to_string()),
        (
            StageTable::Active.table_name(),
            format!("{} columns", config.stg_pred.db_cols.len()),
        ),
        (
            StageTable::Deleted.table_name(),
            format!("{} columns", config.stg_pred_del.db_cols.len()),
        ),
        ("dimensions", config.dimensions.len().to_string()),
        ("sampling", sampling),
    ];
    for (setting, value) in rows {
        table.add_row(vec![setting.to_string(), value]);
    }
    table
}
