//! Dimension resolution on the long frame.
//!
//! Natural keys (item names, form names, ...) are swapped for warehouse
//! surrogate ids. Misses get [`UNRESOLVED_ID`] and are reported once per
//! distinct key with an occurrence count.

use std::collections::BTreeMap;

use polars::prelude::*;

use cdr_common::any_to_text;
use cdr_model::{
    ColumnCopy, DimensionBinding, DimensionMap, Issue, IssueKind, IssueSink, NULL_SENTINEL,
    SurrogateId, UNRESOLVED_ID,
};

use crate::error::Result;

/// Outcome of resolving one binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: usize,
    pub unresolved: usize,
}

/// Resolve every binding, writing surrogate ids into the target columns.
pub fn resolve_dimensions(
    frame: &mut DataFrame,
    dims: &DimensionMap,
    bindings: &[DimensionBinding],
    domain_label: &str,
    sink: &mut dyn IssueSink,
) -> Result<Vec<ResolveStats>> {
    bindings
        .iter()
        .map(|binding| resolve_binding(frame, dims, binding, domain_label, sink))
        .collect()
}

fn resolve_binding(
    frame: &mut DataFrame,
    dims: &DimensionMap,
    binding: &DimensionBinding,
    domain_label: &str,
    sink: &mut dyn IssueSink,
) -> Result<ResolveStats> {
    let height = frame.height();
    let source = binding.source_column.as_str();
    let target = binding.target_column.as_str();

    if frame.column(source).is_err() {
        frame.with_column(Column::new(target.into(), vec![UNRESOLVED_ID; height]))?;
        if height > 0 {
            sink.report(
                Issue::new(
                    IssueKind::UnresolvedDimensionKey,
                    domain_label,
                    format!(
                        "{source} not present, {target} set to {UNRESOLVED_ID} for every record"
                    ),
                )
                .with_column(source)
                .with_count(height as u64),
            );
        }
        return Ok(ResolveStats {
            resolved: 0,
            unresolved: height,
        });
    }

    let keys = frame.column(source)?;
    let mut ids: Vec<SurrogateId> = Vec::with_capacity(height);
    let mut misses: BTreeMap<String, u64> = BTreeMap::new();
    for idx in 0..height {
        let key = any_to_text(keys.get(idx)?);
        let id = key
            .as_deref()
            .and_then(|key| dims.resolve(binding.kind, key));
        match id {
            Some(id) => ids.push(id),
            None => {
                ids.push(UNRESOLVED_ID);
                let key = key.unwrap_or_else(|| NULL_SENTINEL.to_string());
                *misses.entry(key).or_default() += 1;
            }
        }
    }
    frame.with_column(Column::new(target.into(), ids))?;

    let unresolved = misses.values().sum::<u64>() as usize;
    if !dims.contains(binding.kind) {
        if unresolved > 0 {
            sink.report(
                Issue::new(
                    IssueKind::UnresolvedDimensionKey,
                    domain_label,
                    format!("{} lookup not loaded, {target} set to {UNRESOLVED_ID}", binding.kind),
                )
                .with_column(source)
                .with_count(unresolved as u64),
            );
        }
    } else {
        for (key, count) in misses {
            sink.report(
                Issue::new(
                    IssueKind::UnresolvedDimensionKey,
                    domain_label,
                    format!("{} key '{key}' not in {}", binding.kind, binding.kind.table_name()),
                )
                .with_column(source)
                .with_count(count),
            );
        }
    }

    tracing::debug!(
        domain = %domain_label,
        dimension = %binding.kind,
        resolved = height - unresolved,
        unresolved,
        "resolved dimension"
    );
    Ok(ResolveStats {
        resolved: height - unresolved,
        unresolved,
    })
}

/// Duplicate columns under additional names (`formname` into `formrefname`).
///
/// Copies whose source is absent are skipped; the reconciler fills the target.
pub fn apply_column_copies(
    frame: &mut DataFrame,
    copies: &[ColumnCopy],
    domain_label: &str,
) -> Result<()> {
    for copy in copies {
        let Ok(column) = frame.column(&copy.from) else {
            tracing::debug!(
                domain = %domain_label,
                from = %copy.from,
                to = %copy.to,
                "copy source not present"
            );
            continue;
        };
        let copied = column.clone().with_name(copy.to.as_str().into());
        frame.with_column(copied)?;
    }
    Ok(())
}
