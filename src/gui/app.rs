// src/gui/app.rs
use std::collections::HashMap;
use std::error::Error;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};

use eframe::egui::{self, widgets::Spinner, DragValue};
use tracing::{debug, info, warn};

use super::{actions, table};
use crate::config::state::{AppState, View};
use crate::crawler::{Crawler, RunReport};
use crate::diff::DiffResult;
use crate::record::SourceId;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// What the crawl thread sends back.
pub type CrawlDone = (SourceId, Result<RunReport, String>);

pub fn run(options: eframe::NativeOptions, state: AppState) -> Result<(), Box<dyn Error>> {
    eframe::run_native(
        "toscrape",
        options,
        Box::new(|_cc| Ok(Box::new(App::new(state)))),
    )?;
    Ok(())
}

pub struct App {
    // single source of truth (UI thread only)
    pub state: AppState,
    pub crawler: Crawler,

    // current snapshot per source, as last loaded from disk
    pub snapshots: HashMap<SourceId, Snapshot>,
    // last computed previous -> current diff per source
    pub diffs: HashMap<SourceId, DiffResult>,
    // keyword filter over the snapshot table
    pub filter: String,

    // status/progress (workers write here)
    pub status: Arc<Mutex<String>>,
    pub pending: Option<Receiver<CrawlDone>>,
}

impl App {
    pub fn new(state: AppState) -> Self {
        let store = SnapshotStore::new(&state.options.store.root)
            .with_retain_previous(state.options.store.retain_previous);
        let mut app = Self {
            state,
            crawler: Crawler::new(store),
            snapshots: HashMap::new(),
            diffs: HashMap::new(),
            filter: String::new(),
            status: Arc::new(Mutex::new(s!("Idle"))),
            pending: None,
        };
        for source in SourceId::ALL {
            actions::reload(&mut app, source);
        }
        let loaded: Vec<_> = app.snapshots.iter().map(|(s, snap)| (s.slug(), snap.len())).collect();
        info!(?loaded, "UI: init");
        if !app.snapshots.is_empty() {
            app.status("Loaded local snapshots");
        }
        app
    }

    pub fn status<T: Into<String>>(&self, msg: T) {
        if let Ok(mut s) = self.status.lock() {
            *s = msg.into();
        }
    }

    pub fn status_text(&self) -> String {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Pick up a finished crawl, if any.
    fn poll_crawl(&mut self) {
        let Some(rx) = &self.pending else { return };
        match rx.try_recv() {
            Ok((source, outcome)) => {
                self.pending = None;
                match outcome {
                    Ok(r) if r.saved => {
                        actions::reload(self, source);
                        self.status(format!(
                            "{}: +{} added, {} updated, {} unchanged ({} total)",
                            source.label(), r.stats.added, r.stats.updated, r.stats.unchanged, r.total
                        ));
                    }
                    Ok(_) => self.status(format!("{}: nothing fetched, snapshot unchanged", source.label())),
                    Err(e) => {
                        warn!(%source, error = %e, "UI: crawl failed");
                        self.status(format!("Error: {e}"));
                    }
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                self.status("Error: crawl worker exited without a result");
            }
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            ui.spacing_mut().item_spacing.x = 8.0;

            for source in SourceId::ALL {
                let selected = self.state.gui.source == source;
                if ui.selectable_label(selected, source.label()).clicked() && !selected {
                    debug!(from = %self.state.gui.source, to = %source, "UI: tab switch");
                    self.state.gui.source = source;
                }
            }

            ui.separator();
            ui.selectable_value(&mut self.state.gui.view, View::Snapshot, "Snapshot");
            if ui.selectable_value(&mut self.state.gui.view, View::Diff, "Diff vs previous").clicked() {
                actions::diff_previous(self);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Pages:");
            ui.add(DragValue::new(&mut self.state.gui.pages).range(0..=1000));

            let running = self.pending.is_some();
            if ui.add_enabled(!running, egui::Button::new("Crawl")).clicked() {
                actions::crawl(self);
            }
            if running {
                ui.add(Spinner::new());
            }
            ui.label(self.status_text());
        });
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_crawl();
        if self.pending.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| self.top_bar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let source = self.state.gui.source;
            match self.state.gui.view {
                View::Snapshot => match self.snapshots.get(&source) {
                    Some(snap) => {
                        ui.horizontal(|ui| {
                            ui.label("Filter:");
                            ui.add(egui::TextEdit::singleline(&mut self.filter).hint_text("title keyword"));
                            if !self.filter.is_empty() && ui.button("Clear").clicked() {
                                self.filter.clear();
                            }
                        });
                        table::snapshot(ui, snap, &self.filter);
                    }
                    None => {
                        ui.label("No snapshot yet. Press Crawl to fetch one.");
                    }
                },
                View::Diff => match self.diffs.get(&source) {
                    Some(d) => table::diff(ui, d),
                    None => {
                        ui.label("No diff available (needs a previous snapshot).");
                    }
                },
            }
        });
    }
}
