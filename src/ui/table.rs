use crate::graph::GraphStats;
use crate::language::LanguageRegistry;
use crate::storage::StoreStats;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct LanguageRow {
    #[tabled(rename = "Language")]
    language: String,
    #[tabled(rename = "Extensions")]
    extensions: String,
    #[tabled(rename = "Server")]
    server: String,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

fn row(metric: impl Into<String>, value: impl ToString) -> MetricRow {
    MetricRow {
        metric: metric.into(),
        value: value.to_string(),
    }
}

/// Counts of an in-memory graph
pub fn stats_table(stats: &GraphStats) -> String {
    let mut rows = vec![row("Files", stats.files), row("Nodes", stats.total_nodes())];
    rows.extend(
        stats
            .nodes_by_label
            .iter()
            .map(|(label, count)| row(format!("  {}", label), count)),
    );
    rows.push(row("Relationships", stats.total_relationships()));
    rows.extend(
        stats
            .relationships_by_type
            .iter()
            .map(|(kind, count)| row(format!("  {}", kind), count)),
    );
    rows.push(row("External relationships", stats.external_relationships));
    render(&rows)
}

/// Counts of a persisted graph
pub fn store_stats_table(stats: &StoreStats) -> String {
    let mut rows = vec![row("Nodes", stats.nodes)];
    rows.extend(
        stats
            .nodes_by_label
            .iter()
            .map(|(label, count)| row(format!("  {}", label), count)),
    );
    rows.push(row("Edges", stats.edges));
    rows.extend(
        stats
            .edges_by_type
            .iter()
            .map(|(kind, count)| row(format!("  {}", kind), count)),
    );
    render(&rows)
}

/// Registered languages with their extensions and configured server command
pub fn languages_table(registry: &LanguageRegistry, server_for: impl Fn(crate::Language) -> Option<String>) -> String {
    let rows: Vec<LanguageRow> = registry
        .languages()
        .map(|language| {
            let mut extensions: Vec<String> = registry
                .extension_table()
                .into_iter()
                .filter(|(_, l)| *l == language)
                .map(|(ext, _)| format!(".{}", ext))
                .collect();
            extensions.sort();
            LanguageRow {
                language: language.to_string(),
                extensions: extensions.join(" "),
                server: server_for(language).unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();
    render(&rows)
}
