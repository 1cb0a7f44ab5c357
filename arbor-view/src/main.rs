//! Application entry point for the 3D tree viewer.
//!
//! This binary sets up logging and eframe/egui and delegates all
//! interactive logic and rendering to [`Viewer`] from the `viewer` module.
//!
//! Usage: `arbor-view [config.toml]`

mod viewer;

use arbor_core::TreeConfig;
use viewer::Viewer;

/// Loads the optional config file named on the command line.
///
/// Falls back to [`TreeConfig::default`] when no path is given or the
/// file cannot be used.
fn load_config() -> TreeConfig {
    let Some(path) = std::env::args().nth(1) else {
        return TreeConfig::default();
    };
    match TreeConfig::load(&path) {
        Ok(cfg) => {
            tracing::info!("loaded config from {path}");
            cfg
        }
        Err(err) => {
            tracing::warn!("{err}; using defaults");
            TreeConfig::default()
        }
    }
}

/// Starts the native eframe application.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if eframe fails to create the native window or event loop.
fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = load_config();
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Arbor",
        options,
        Box::new(|_cc| Ok(Box::new(Viewer::new(cfg)))),
    )
}
