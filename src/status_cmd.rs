//! Rendering for the `status` and `stats` CLI commands.

use crate::models::{IndexRecord, IndexStatistics, IndexingStatus, LibraryStatistics};

pub fn format_bytes(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GiB", b / GB)
    } else if b >= MB {
        format!("{:.2} MiB", b / MB)
    } else if b >= KB {
        format!("{:.2} KiB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

pub fn render_statuses(statuses: &[IndexingStatus]) -> String {
    if statuses.is_empty() {
        return "No indexing activity recorded.".to_string();
    }
    let mut out = format!(
        "{:<12} {:<10} {:>9}  {}\n",
        "DOCUMENT", "STATE", "PROGRESS", "ERROR"
    );
    for status in statuses {
        out.push_str(&format!(
            "{:<12} {:<10} {:>8.0}%  {}\n",
            status.document_id,
            status.state.as_str(),
            status.progress * 100.0,
            status.error_message.as_deref().unwrap_or("-"),
        ));
    }
    out
}

pub fn render_indexes(indexes: &[(IndexRecord, IndexStatistics)]) -> String {
    if indexes.is_empty() {
        return "No indexes.".to_string();
    }
    let mut out = format!(
        "{:<8} {:<10} {:<10} {:<28} {:>6} {:>8} {:>10}\n",
        "INDEX", "DOCUMENT", "PROVIDER", "MODEL", "DIMS", "CHUNKS", "SIZE"
    );
    for (index, stats) in indexes {
        out.push_str(&format!(
            "{:<8} {:<10} {:<10} {:<28} {:>6} {:>8} {:>10}\n",
            index.index_id,
            index.document_id,
            index.provider,
            index.model_name,
            index.dimensions,
            stats.chunk_count,
            format_bytes(stats.storage_bytes),
        ));
    }
    out
}

pub fn render_library_statistics(stats: &LibraryStatistics) -> String {
    format!(
        "Documents:  {} total, {} indexed ({:.1}% coverage)\nChunks:     {}\n",
        stats.total_documents,
        stats.indexed_documents,
        stats.coverage_percent,
        stats.total_chunks,
    )
}
