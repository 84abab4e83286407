// src/gui/table.rs
//
// Read-only tables. Purely a view over a snapshot or a diff.

use chrono::SecondsFormat;
use eframe::egui::{self, RichText};
use egui_extras::{Column, TableBuilder};

use crate::config::consts::{KEY_COLUMN, TIME_COLUMN};
use crate::diff::DiffResult;
use crate::record::{FieldValue, Record};
use crate::snapshot::Snapshot;

const ROW_H: f32 = 20.0;

fn header_row<'a>(headers: &'a [&'a str]) -> impl FnOnce(egui_extras::TableRow<'_, '_>) + 'a {
    move |mut row| {
        for h in headers {
            row.col(|ui| {
                ui.label(RichText::new(*h).strong());
            });
        }
    }
}

/// Fields searched by the snapshot filter, besides the key.
const FILTER_FIELDS: [&str; 2] = ["title", "text"];

/// Case-insensitive keyword match on title (books), text (quotes) or key.
/// An empty or blank filter keeps everything.
pub(crate) fn matches(rec: &Record, filter: &str) -> bool {
    let needle = filter.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    rec.key.to_lowercase().contains(&needle)
        || FILTER_FIELDS.iter().any(|f| match rec.get(f) {
            Some(FieldValue::Text(s)) => s.to_lowercase().contains(&needle),
            _ => false,
        })
}

pub fn snapshot(ui: &mut egui::Ui, snap: &Snapshot, filter: &str) {
    let schema = snap.source().schema();
    let mut headers = vec![KEY_COLUMN];
    headers.extend(schema.iter().map(|f| f.name));
    headers.push(TIME_COLUMN);

    let records: Vec<&Record> = snap.records().iter().filter(|r| matches(r, filter)).collect();
    let taken = snap
        .taken_at()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| s!("never"));
    if records.len() == snap.len() {
        ui.label(format!("{} records, taken {taken}", snap.len()));
    } else {
        ui.label(format!("{} of {} records match, taken {taken}", records.len(), snap.len()));
    }

    egui::ScrollArea::horizontal().id_salt(("snapshot_hscroll", snap.source().slug())).show(ui, |ui| {
        let mut table = TableBuilder::new(ui).striped(true).min_scrolled_height(0.0);
        for _ in &headers {
            table = table.column(Column::auto().at_least(60.0).resizable(true).clip(true));
        }
        table.header(ROW_H, header_row(&headers)).body(|body| {
            body.rows(ROW_H, records.len(), |mut row| {
                let rec = records[row.index()];
                row.col(|ui| {
                    ui.label(&rec.key);
                });
                for spec in schema {
                    let text = rec.get(spec.name).map(FieldValue::to_string).unwrap_or_default();
                    row.col(|ui| {
                        ui.label(text);
                    });
                }
                row.col(|ui| {
                    ui.label(rec.fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true));
                });
            });
        });
    });
}

/// One line per added/removed record and per changed field.
pub fn diff(ui: &mut egui::Ui, d: &DiffResult) {
    let mut lines: Vec<[String; 5]> = Vec::new();
    for r in &d.added {
        lines.push([s!("added"), r.key.clone(), s!(), s!(), s!()]);
    }
    for r in &d.removed {
        lines.push([s!("removed"), r.key.clone(), s!(), s!(), s!()]);
    }
    for ch in &d.changed {
        for delta in &ch.deltas {
            let show = |v: &Option<FieldValue>| v.as_ref().map(FieldValue::to_string).unwrap_or_default();
            lines.push([s!("changed"), ch.key.clone(), delta.field.clone(), show(&delta.before), show(&delta.after)]);
        }
    }

    let c = d.counts();
    ui.label(format!("{} added, {} removed, {} changed, {} unchanged", c.added, c.removed, c.changed, c.unchanged));
    if lines.is_empty() {
        ui.label("No differences.");
        return;
    }

    let headers = ["status", KEY_COLUMN, "field", "before", "after"];
    TableBuilder::new(ui)
        .striped(true)
        .column(Column::exact(70.0))
        .column(Column::auto().at_least(120.0).resizable(true))
        .column(Column::auto().at_least(80.0))
        .column(Column::remainder().clip(true))
        .column(Column::remainder().clip(true))
        .header(ROW_H, header_row(&headers))
        .body(|body| {
            body.rows(ROW_H, lines.len(), |mut row| {
                let line = &lines[row.index()];
                for cell in line {
                    row.col(|ui| {
                        ui.label(cell);
                    });
                }
            });
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceId;
    use chrono::Utc;

    #[test]
    fn filter_matches_title_text_or_key_ignoring_case() {
        let book = Record::new(SourceId::Static, "http://x/the-requiem-red_995/", Utc::now())
            .with("title", "The Requiem Red")
            .with("price", 22.65);
        let quote = Record::new(SourceId::Dynamic, "q1", Utc::now()).with("text", "A day without sunshine is like night.");

        assert!(matches(&book, ""));
        assert!(matches(&book, "   "));
        assert!(matches(&book, "requiem"));
        assert!(matches(&book, " RED "));
        assert!(matches(&book, "_995"));
        assert!(!matches(&book, "22.65"));
        assert!(matches(&quote, "SUNSHINE"));
        assert!(!matches(&quote, "moonlight"));
    }
}
