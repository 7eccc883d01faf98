use std::cmp::Ordering;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use cdr_cli::logging::redact_value;
use cdr_core::{DomainStatus, DomainSummary};
use cdr_model::{Issue, IssueSeverity};

use crate::types::RunOutcome;

pub fn print_summary(outcome: &RunOutcome) {
    let summary = &outcome.summary;
    println!("Run started: {}", summary.started_at);
    if outcome.dry_run {
        println!("Dry run: staging files not written");
    }
    for path in &outcome.staged_files {
        println!("Staged: {}", path.display());
    }
    if let Some(path) = &outcome.report_path {
        println!("Report: {}", path.display());
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Extract"),
        header_cell("Domain"),
        header_cell("Status"),
        header_cell("Rows"),
        header_cell("Subjects"),
        header_cell("Records"),
        header_cell("Active"),
        header_cell("Replaced"),
        header_cell("Unresolved"),
        header_cell("Deleted"),
        header_cell("Orphans"),
        header_cell("Failures"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 3..12 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    align_column(&mut table, 2, CellAlignment::Center);

    for domain in &summary.domains {
        table.add_row(vec![
            Cell::new(&domain.label),
            domain_cell(domain),
            status_cell(domain.status),
            Cell::new(domain.source_rows),
            Cell::new(domain.subjects),
            Cell::new(domain.records),
            Cell::new(domain.active),
            count_cell(domain.replaced, Color::Yellow),
            count_cell(domain.unresolved, Color::Yellow),
            Cell::new(domain.deleted),
            count_cell(domain.orphans, Color::Red),
            count_cell(domain.failures, Color::Red),
        ]);
    }
    let total = |field: fn(&DomainSummary) -> usize| -> usize {
        summary.domains.iter().map(field).sum()
    };
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        Cell::new(total(|d| d.source_rows)).add_attribute(Attribute::Bold),
        Cell::new(total(|d| d.subjects)).add_attribute(Attribute::Bold),
        Cell::new(summary.total_records()).add_attribute(Attribute::Bold),
        Cell::new(summary.total_active()).add_attribute(Attribute::Bold),
        count_cell(total(|d| d.replaced), Color::Yellow).add_attribute(Attribute::Bold),
        count_cell(total(|d| d.unresolved), Color::Yellow).add_attribute(Attribute::Bold),
        Cell::new(summary.total_deleted()).add_attribute(Attribute::Bold),
        count_cell(total(|d| d.orphans), Color::Red).add_attribute(Attribute::Bold),
        count_cell(total(|d| d.failures), Color::Red).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    if summary.cancelled {
        eprintln!("Run cancelled; remaining domains were not processed.");
    }
    print_issue_table(&outcome.report.issues);
    println!(
        "{} errors, {} warnings",
        outcome.report.error_count(),
        outcome.report.warning_count()
    );
}

fn print_issue_table(issues: &[Issue]) {
    if issues.is_empty() {
        return;
    }
    let mut ordered: Vec<&Issue> = issues.iter().collect();
    ordered.sort_by(|a, b| {
        let severity = b.severity.cmp(&a.severity);
        if severity != Ordering::Equal {
            return severity;
        }
        a.domain
            .cmp(&b.domain)
            .then_with(|| a.kind.code().cmp(b.kind.code()))
    });

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Extract"),
        header_cell("Severity"),
        header_cell("Kind"),
        header_cell("Column"),
        header_cell("Subject"),
        header_cell("Count"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    align_column(&mut table, 5, CellAlignment::Right);
    for issue in ordered {
        table.add_row(vec![
            Cell::new(&issue.domain),
            severity_cell(issue.severity),
            Cell::new(issue.kind.code()),
            optional_cell(issue.column.as_deref()),
            optional_cell(issue.subject.as_deref().map(redact_value)),
            issue
                .count
                .map_or_else(|| dim_cell("-"), Cell::new),
            Cell::new(&issue.message),
        ]);
    }
    println!();
    println!("Issues:");
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(180);
    if table.column_count() >= 7 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Fixed(16)),
            ColumnConstraint::UpperBoundary(Width::Fixed(9)),
            ColumnConstraint::UpperBoundary(Width::Fixed(26)),
            ColumnConstraint::UpperBoundary(Width::Fixed(16)),
            ColumnConstraint::UpperBoundary(Width::Fixed(12)),
            ColumnConstraint::LowerBoundary(Width::Fixed(5)),
            ColumnConstraint::UpperBoundary(Width::Percentage(50)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn domain_cell(domain: &DomainSummary) -> Cell {
    match &domain.domain_name {
        Some(name) => Cell::new(name)
            .fg(Color::Blue)
            .add_attribute(Attribute::Bold),
        None => dim_cell("-"),
    }
}

fn status_cell(status: DomainStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        DomainStatus::Staged => cell.fg(Color::Green),
        DomainStatus::Skipped => cell.fg(Color::DarkGrey),
        DomainStatus::Failed => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        DomainStatus::Cancelled => cell.fg(Color::Yellow),
    }
}

fn severity_cell(severity: IssueSeverity) -> Cell {
    match severity {
        IssueSeverity::Error => Cell::new("ERROR").fg(Color::Red),
        IssueSeverity::Warning => Cell::new("WARN").fg(Color::Yellow),
        IssueSeverity::Info => dim_cell("INFO"),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) if !value.is_empty() => Cell::new(value),
        _ => dim_cell("-"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
