// src/bin/gui.rs
#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]
use eframe::egui::ViewportBuilder;

use toscrape::config::consts::LOG_FILE;
use toscrape::config::options::AppOptions;
use toscrape::config::state::AppState;
use toscrape::gui;
use toscrape::logging::{self, LogOptions};

fn main() {
    let (options, config_err) = match AppOptions::load(None) {
        Ok(o) => (o, None),
        Err(e) => (AppOptions::default(), Some(e)),
    };
    logging::init(&LogOptions { verbose: 0, file: Some(options.store.root.join(LOG_FILE)), quiet: false });
    if let Some(e) = config_err {
        tracing::warn!(error = %e, "config ignored, using defaults");
    }

    let state = AppState { options, ..AppState::default() };
    let native = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([state.gui.window_w as f32, state.gui.window_h as f32]),
        ..Default::default()
    };

    if let Err(e) = gui::run(native, state) {
        eprintln!("GUI failed: {}", e);
        std::process::exit(1);
    }
}
