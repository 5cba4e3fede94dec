mod cache;
mod command;
mod config;
mod debounce;
mod error;
mod filter;
mod launch;
mod loader;
mod metrics;
mod model;
mod normalize;
mod presets;
mod selection;
mod session;
mod slider;
mod stats;
mod status;
mod ui;

use clap::Parser;
use config::{ViewerConfig, DEFAULT_CONFIG_FILE};
use eframe::egui;
use loader::{DirSnapshotSource, SnapshotSource};
use session::DashboardSession;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ui::MarketViewerApp;

/// Desktop viewer for scraped market price snapshots.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON settings file; missing means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory holding price_data_*.csv snapshots.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for preset files shared with the scraper.
    #[arg(long)]
    presets_dir: Option<PathBuf>,
}

// Fonts with CJK coverage, tried in order.
const CJK_FONTS: &[&str] = &[
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
];

fn install_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();

    let found = CJK_FONTS
        .iter()
        .find_map(|path| std::fs::read(path).ok().map(|data| (*path, data)));
    match found {
        Some((path, data)) => {
            fonts
                .font_data
                .insert("cjk".to_owned(), egui::FontData::from_owned(data).into());
            for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
                if let Some(list) = fonts.families.get_mut(&family) {
                    list.push("cjk".to_owned());
                }
            }
            info!(path, "loaded CJK font");
        }
        None => warn!("no CJK font found, item names may not render"),
    }

    ctx.set_fonts(fonts);
}

fn main() -> eframe::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args = Args::parse();

    let mut config = ViewerConfig::load(&args.config).unwrap_or_else(|e| {
        warn!(error = %e, path = %args.config.display(), "bad config, using defaults");
        ViewerConfig::default()
    });
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.presets_dir {
        config.presets_dir = dir;
    }
    info!(data_dir = %config.data_dir.display(), presets_dir = %config.presets_dir.display(), "starting viewer");

    let source = Arc::new(DirSnapshotSource::new(&config.data_dir));
    match source.latest() {
        Ok(Some(name)) => info!(file = %name, "newest snapshot"),
        Ok(None) => warn!(dir = %source.dir().display(), "no snapshots yet"),
        Err(e) => warn!(dir = %source.dir().display(), error = %e, "cannot read snapshot directory"),
    }
    let session = DashboardSession::new(config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1600.0, 1000.0])
            .with_min_inner_size([1200.0, 700.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Market Price Viewer",
        options,
        Box::new(|cc| {
            install_fonts(&cc.egui_ctx);
            ui::set_custom_style(&cc.egui_ctx);
            Ok(Box::new(MarketViewerApp::new(session, source)))
        }),
    )
}
