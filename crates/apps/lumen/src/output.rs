//! Plain-text rendering of entries

use fuel::{FuelEntry, SyncStatus};
use std::fmt::Write;

/// Characters of the entry ID shown in tables
const SHORT_ID_LEN: usize = 8;

fn short_id(entry: &FuelEntry) -> &str {
    let id = entry.id.as_str();
    id.char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(id, |(end, _)| &id[..end])
}

/// One-line description of a saved entry and its sync result
pub fn entry_summary(entry: &FuelEntry) -> String {
    let head = format!(
        "{} {}: {:.3} gal, {:.0} mi, ${:.2}",
        short_id(entry),
        entry.date,
        entry.gallons,
        entry.miles,
        entry.cost
    );
    match entry.status {
        SyncStatus::Synced => match entry.sheet_url() {
            Some(url) => format!("{} (synced: {})", head, url),
            None => format!("{} (synced)", head),
        },
        SyncStatus::Pending => format!("{} (saved locally; no spreadsheet selected)", head),
        SyncStatus::Error => format!(
            "{} (sync failed: {})",
            head,
            entry.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Table of entries, oldest first
pub fn entry_table(entries: &[FuelEntry]) -> String {
    let mut sorted: Vec<&FuelEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.date.cmp(&b.date).then(a.miles.total_cmp(&b.miles)));

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8}  {:<10}  {:>10}  {:>8}  {:>8}  {:>7}  STATUS",
        "ID", "DATE", "ODOMETER", "GALLONS", "COST", "$/GAL"
    );
    for entry in sorted {
        let price = entry
            .price_per_gallon()
            .map(|p| format!("{:.3}", p))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<8}  {:<10}  {:>10.0}  {:>8.3}  {:>8.2}  {:>7}  {}",
            short_id(entry),
            entry.date.to_string(),
            entry.miles,
            entry.gallons,
            entry.cost,
            price,
            entry.status.as_str()
        );
    }
    out
}

/// "3 (2 synced, 1 pending, 0 failed)"
pub fn status_counts(entries: &[FuelEntry]) -> String {
    let count = |status: SyncStatus| entries.iter().filter(|e| e.status == status).count();
    format!(
        "{} ({} synced, {} pending, {} failed)",
        entries.len(),
        count(SyncStatus::Synced),
        count(SyncStatus::Pending),
        count(SyncStatus::Error)
    )
}
