//! Run orchestration.
//!
//! Domains are processed one at a time in label order:
//!
//! 1. normalize the label into a domain name
//! 2. unflatten (preconditions, sampling, pivot, rename)
//! 3. resolve dimensions and apply column copies
//! 4. split on the audit column
//! 5. reconcile each stream against its staging table
//! 6. route active upserts, then deletion moves
//!
//! Problems inside a domain become issues; only configuration and input
//! loading errors end the run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use cdr_ingest::CsvDimensionProvider;
use cdr_model::{
    DimensionKind, DimensionMap, DomainExtract, Issue, IssueKind, IssueSink, PipelineConfig,
    TIMESTAMP_FORMAT,
};
use cdr_stage::{AuditRouter, StagingGateway, partition_frame};
use cdr_transform::{
    Reconciler, TransformError, Unflattener, apply_column_copies, normalize_domain_label,
    resolve_dimensions,
};

use crate::context::RunContext;
use crate::error::Result;
use crate::summary::{DomainStatus, DomainSummary, RunSummary};

/// Load every extract in `extract_dir`, keyed by raw domain label.
pub fn load_extracts(extract_dir: &Path) -> Result<BTreeMap<String, DomainExtract>> {
    Ok(cdr_ingest::load_extracts(extract_dir)?)
}

/// Load the dimensions the configured bindings need.
///
/// Without a map directory the result is empty and every binding resolves
/// to the sentinel id.
pub fn load_dimensions(maps_dir: Option<&Path>, config: &PipelineConfig) -> Result<DimensionMap> {
    let kinds: BTreeSet<DimensionKind> = config
        .dimensions
        .iter()
        .map(|binding| binding.kind)
        .collect();
    let Some(dir) = maps_dir else {
        if !kinds.is_empty() {
            tracing::warn!("no map directory given, dimension lookups are empty");
        }
        return Ok(DimensionMap::new());
    };
    let provider = CsvDimensionProvider::new(dir);
    Ok(DimensionMap::load(&provider, kinds)?)
}

/// Run every extract through the pipeline, writing through `gateway`.
pub fn run_pipeline<G: StagingGateway>(
    extracts: &BTreeMap<String, DomainExtract>,
    ctx: &RunContext<'_>,
    gateway: &mut G,
    sink: &mut dyn IssueSink,
) -> Result<RunSummary> {
    ctx.config.validate()?;

    let span = tracing::info_span!("run", schema = %ctx.config.schema);
    let _enter = span.enter();
    tracing::info!(domains = extracts.len(), "starting run");

    let mut summary = RunSummary {
        started_at: ctx.started_at.format(TIMESTAMP_FORMAT).to_string(),
        ..RunSummary::default()
    };
    let mut router = AuditRouter::new(ctx.config, &mut *gateway);

    for (label, extract) in extracts {
        let span = tracing::info_span!("domain", domain = %label);
        let _enter = span.enter();

        match process_domain(extract, ctx, &mut router, sink) {
            Ok(domain) => summary.domains.push(domain),
            Err(TransformError::Cancelled) => {
                tracing::warn!("run cancelled");
                sink.report(Issue::new(
                    IssueKind::Cancelled,
                    label.as_str(),
                    "run cancelled before the domain finished",
                ));
                summary
                    .domains
                    .push(DomainSummary::new(label.as_str(), DomainStatus::Cancelled));
                summary.cancelled = true;
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "domain failed");
                sink.report(Issue::new(
                    IssueKind::DomainFailed,
                    label.as_str(),
                    format!("{label} failed: {err}"),
                ));
                summary
                    .domains
                    .push(DomainSummary::new(label.as_str(), DomainStatus::Failed));
            }
        }
    }

    tracing::info!(
        staged = summary.count_status(DomainStatus::Staged),
        skipped = summary.count_status(DomainStatus::Skipped),
        failed = summary.count_status(DomainStatus::Failed),
        records = summary.total_records(),
        "run finished"
    );
    Ok(summary)
}

fn process_domain<G: StagingGateway>(
    extract: &DomainExtract,
    ctx: &RunContext<'_>,
    router: &mut AuditRouter<'_, G>,
    sink: &mut dyn IssueSink,
) -> std::result::Result<DomainSummary, TransformError> {
    ctx.cancel.check()?;
    let config = ctx.config;
    let label = extract.domain_label.as_str();
    let mut summary = DomainSummary::new(label, DomainStatus::Skipped);
    summary.source_rows = extract.row_count();

    let domain_name = match normalize_domain_label(label) {
        Ok(name) => name,
        Err(err) => {
            sink.report(Issue::new(
                IssueKind::MalformedDomainLabel,
                label,
                err.to_string(),
            ));
            return Ok(summary);
        }
    };
    summary.domain_name = Some(domain_name.clone());

    let unflattener = Unflattener::new(config, ctx.started_at).with_cancel(ctx.cancel.clone());
    let Some(mut long) = unflattener.unflatten(extract, &domain_name, sink)? else {
        return Ok(summary);
    };
    summary.subjects = long.subject_count;
    summary.records = long.record_count();

    let resolved = resolve_dimensions(&mut long.frame, ctx.dims, &config.dimensions, label, sink)?;
    summary.unresolved = resolved.iter().map(|stats| stats.unresolved).sum();
    apply_column_copies(&mut long.frame, &config.column_copies, label)?;

    let audit_column = config.source_columns().audit_action;
    let audit_column = config.renamed(&audit_column);
    let partition = partition_frame(&long.frame, audit_column, &config.delete_marker)?;
    if !partition.audit_column_present {
        sink.report(
            Issue::new(
                IssueKind::MissingAuditColumn,
                label,
                format!("{audit_column} not in {label}, treating every record as active"),
            )
            .with_column(audit_column),
        );
    }

    let reconciler = Reconciler::new(config, ctx.started_at);
    let active = reconciler.reconcile(&partition.active, &config.stg_pred.db_cols, label, sink)?;
    let deleted =
        reconciler.reconcile(&partition.deleted, &config.stg_pred_del.db_cols, label, sink)?;
    ctx.cancel.check()?;

    router.set_subject_column(long.subject_column());
    let mut stats = router.route_active(active, label, sink);
    stats.merge(router.route_deleted(deleted, label, sink));

    summary.status = DomainStatus::Staged;
    summary.active = stats.upserted;
    summary.replaced = stats.replaced;
    summary.deleted = stats.moved;
    summary.orphans = stats.orphaned;
    summary.failures = stats.failed;
    tracing::info!(
        domain_name = %domain_name,
        records = summary.records,
        active = summary.active,
        replaced = summary.replaced,
        unresolved = summary.unresolved,
        deleted = summary.deleted,
        orphans = summary.orphans,
        failures = summary.failures,
        "staged domain"
    );
    Ok(summary)
}
