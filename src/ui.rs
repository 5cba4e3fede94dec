use crate::error::ViewerError;
use crate::filter::{SortColumn, SortOrder, SortSpec};
use crate::loader::{display_name, SnapshotSource};
use crate::model::{NormalizedItem, Preset, Snapshot, ALL_CATEGORIES};
use crate::launch::ScriptLauncher;
use crate::normalize::{build_snapshot, parse_price_list};
use crate::presets::{FilePresetStore, LocalPreset, LocalPresetStore, PresetStore};
use crate::session::{DashboardSession, LoadRequest, LoadTicket, NoticeLevel};
use crate::slider::UI_MAX;
use crate::status::{StatusHub, StatusMessage, StatusSubscription};
use eframe::egui;
use egui::{Color32, Context, FontId, Margin, RichText, Stroke, Vec2, Visuals};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Bar, BarChart, Legend, Plot};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const ACCENT: Color32 = Color32::from_rgb(96, 165, 250);
const TEXT: Color32 = Color32::from_rgb(226, 232, 240);
const MUTED: Color32 = Color32::from_rgb(148, 163, 184);
const POSITIVE: Color32 = Color32::from_rgb(74, 222, 128);
const NEGATIVE: Color32 = Color32::from_rgb(248, 113, 113);
const SPECIAL: Color32 = Color32::from_rgb(249, 115, 22);

pub fn set_custom_style(ctx: &Context) {
    // Slate dark theme
    let mut visuals = Visuals::dark();

    visuals.panel_fill = Color32::from_rgb(15, 23, 42);
    visuals.window_fill = Color32::from_rgb(30, 41, 59);
    visuals.extreme_bg_color = Color32::from_rgb(30, 41, 59);
    visuals.faint_bg_color = Color32::from_rgb(22, 32, 51);

    visuals.widgets.inactive.bg_fill = Color32::from_rgb(30, 41, 59);
    visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, Color32::from_rgb(51, 65, 85));

    visuals.widgets.hovered.bg_fill = Color32::from_rgb(51, 65, 85);
    visuals.widgets.hovered.bg_stroke = Stroke::new(2.0, ACCENT);

    visuals.widgets.active.bg_fill = Color32::from_rgb(37, 99, 235);
    visuals.widgets.active.bg_stroke = Stroke::new(2.0, Color32::from_rgb(147, 197, 253));

    visuals.selection.bg_fill = Color32::from_rgb(30, 64, 175);
    visuals.selection.stroke = Stroke::new(1.0, Color32::from_rgb(191, 219, 254));

    ctx.set_visuals(visuals);

    let mut style = (*ctx.style()).clone();

    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    style.spacing.window_margin = Margin::same(12);
    style.spacing.button_padding = egui::vec2(10.0, 6.0);

    style
        .text_styles
        .insert(egui::TextStyle::Body, FontId::proportional(15.0));
    style
        .text_styles
        .insert(egui::TextStyle::Heading, FontId::proportional(20.0));

    ctx.set_style(style);
}

fn rarity_color(rarity: &str) -> Color32 {
    match rarity {
        "改良" => Color32::from_rgb(16, 185, 129),
        "稀有" => Color32::from_rgb(59, 130, 246),
        "史诗" => Color32::from_rgb(249, 115, 22),
        "传说" => Color32::from_rgb(139, 92, 246),
        _ => Color32::from_rgb(156, 163, 175),
    }
}

fn signed_color(value: f64) -> Color32 {
    if value > 0.0 {
        POSITIVE
    } else {
        NEGATIVE
    }
}

/// Thousands separators, e.g. `1,234,567`.
fn format_price(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

type LoadResult = (LoadTicket, crate::error::Result<Snapshot>);

pub struct MarketViewerApp {
    session: DashboardSession,
    source: Arc<dyn SnapshotSource>,

    load_tx: Sender<LoadResult>,
    load_rx: Receiver<LoadResult>,

    // Presets
    server_presets: FilePresetStore,
    server_preset_list: Vec<Preset>,
    local_presets: Option<LocalPresetStore>,
    local_preset_list: Vec<LocalPreset>,
    presets_open: bool,
    preset_name: String,

    // Script
    hub: StatusHub,
    launcher: ScriptLauncher,
    status: Option<StatusSubscription>,
    script_log: String,
    start_category: u32,
    start_item: u32,
    show_script_settings: bool,

    // UI state
    min_price_input: String,
    max_price_input: String,
    expanded: Option<usize>,
}

impl MarketViewerApp {
    pub fn new(session: DashboardSession, source: Arc<dyn SnapshotSource>) -> Self {
        let config = session.config().clone();
        let (load_tx, load_rx) = mpsc::channel();

        let local_presets = match LocalPresetStore::open(&config.local_presets_db) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "local presets unavailable");
                None
            }
        };
        let hub = StatusHub::new();

        let mut app = Self {
            session,
            source,
            load_tx,
            load_rx,
            server_presets: FilePresetStore::new(&config.presets_dir),
            server_preset_list: Vec::new(),
            local_presets,
            local_preset_list: Vec::new(),
            presets_open: false,
            preset_name: String::new(),
            launcher: ScriptLauncher::new(hub.clone()),
            hub,
            status: None,
            script_log: String::new(),
            start_category: 1,
            start_item: 1,
            show_script_settings: false,
            min_price_input: String::new(),
            max_price_input: String::new(),
            expanded: None,
        };
        app.reload_presets();
        app.refresh_listing();
        app
    }

    fn refresh_listing(&mut self) {
        let listing = self.source.list_recent(self.session.config().recent_limit);
        if let Some(request) = self.session.set_recent_files(listing) {
            self.dispatch(request);
        }
    }

    fn open_tab(&mut self, tab: usize) {
        let Some(file) = self.session.recent_files().get(tab).cloned() else {
            return;
        };
        let request = self.session.begin_load(&file, tab);
        self.dispatch(request);
    }

    /// Cache misses are fetched and normalized on a worker thread.
    fn dispatch(&mut self, request: LoadRequest) {
        self.expanded = None;
        self.sync_price_inputs();
        let LoadRequest::Fetch(ticket) = request else {
            return;
        };
        let source = Arc::clone(&self.source);
        let tx = self.load_tx.clone();
        let marker = self.session.config().special_marker.clone();
        std::thread::spawn(move || {
            let started = Instant::now();
            let result = source
                .fetch_rows(&ticket.file_name)
                .map(|rows| build_snapshot(&ticket.file_name, &rows, &marker));
            info!(
                file = %ticket.file_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "snapshot fetch finished"
            );
            let _ = tx.send((ticket, result));
        });
    }

    fn sync_price_inputs(&mut self) {
        let (low, high) = self.session.filter().price_range;
        self.min_price_input = format!("{low:.0}");
        self.max_price_input = format!("{high:.0}");
    }

    fn reload_presets(&mut self) {
        match self.server_presets.list() {
            Ok(list) => self.server_preset_list = list,
            Err(e) => warn!(error = %e, "could not list presets"),
        }
        if let Some(store) = &self.local_presets {
            match store.entries() {
                Ok(list) => self.local_preset_list = list,
                Err(e) => warn!(error = %e, "could not list local presets"),
            }
        }
    }

    fn poll_background(&mut self, now: Instant) {
        while let Ok((ticket, result)) = self.load_rx.try_recv() {
            if self.session.finish_load(ticket, result) {
                self.expanded = None;
                self.sync_price_inputs();
            }
        }

        if let Some(sub) = self.status.as_mut() {
            match sub.drain() {
                Ok(messages) => {
                    for message in &messages {
                        self.script_log.push_str(message.text());
                        self.script_log.push('\n');
                        self.session.on_status(message, now);
                    }
                    if messages.iter().any(StatusMessage::is_finished) {
                        self.status = None;
                    }
                }
                Err(e) => {
                    self.session.on_status_error(&e);
                    self.status = None;
                }
            }
        }

        if self.session.tick(now) {
            self.refresh_listing();
        }
    }

    fn copy_command(&mut self, ctx: &Context) {
        match self
            .session
            .script_invocation(&self.server_presets, self.start_category, self.start_item)
        {
            Ok(invocation) => {
                let command = invocation.to_string();
                ctx.copy_text(command.clone());
                self.script_log = format!(
                    "Command:\n\n{command}\n\nPreset file: {}\nWorking directory: {}\n",
                    invocation
                        .preset_file
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    invocation.working_dir.display()
                );
                self.session.notify(
                    NoticeLevel::Success,
                    "Command copied",
                    "Paste it into a terminal to run the scraper",
                );
            }
            Err(e) => self
                .session
                .notify(NoticeLevel::Error, "Could not build command", e.to_string()),
        }
    }

    fn run_script(&mut self) {
        let result = self
            .session
            .script_invocation(&self.server_presets, self.start_category, self.start_item)
            .and_then(|invocation| {
                self.status = Some(self.hub.subscribe());
                self.script_log = format!("Starting: {invocation}\n");
                self.launcher.launch(&invocation)
            });
        if let Err(e) = result {
            self.status = None;
            self.session
                .notify(NoticeLevel::Error, "Script failed to start", e.to_string());
        }
    }

    fn stop_script(&mut self) {
        match self.launcher.stop() {
            Ok(true) => self
                .session
                .notify(NoticeLevel::Success, "Stopped", "The scraper was stopped"),
            Ok(false) => {}
            Err(e) => self
                .session
                .notify(NoticeLevel::Error, "Stop failed", e.to_string()),
        }
    }

    fn save_preset(&mut self, local: bool) {
        let items = self.session.visible_preset_items();
        let result = if local {
            match &self.local_presets {
                Some(store) => store.save(&self.preset_name, &items),
                None => Err(ViewerError::PresetSave("local store unavailable".to_string())),
            }
        } else {
            self.server_presets.save(&self.preset_name, &items)
        };
        match result {
            Ok(()) => {
                self.session.notify(
                    NoticeLevel::Success,
                    "Preset saved",
                    format!("Saved \"{}\" with {} items", self.preset_name.trim(), items.len()),
                );
                self.preset_name.clear();
                self.reload_presets();
            }
            Err(e) => self
                .session
                .notify(NoticeLevel::Error, "Preset not saved", e.to_string()),
        }
    }

    fn notices_ui(&mut self, ui: &mut egui::Ui) {
        let mut dismissed = None;
        for (i, notice) in self.session.notices().iter().enumerate() {
            let color = match notice.level {
                NoticeLevel::Success => POSITIVE,
                NoticeLevel::Warning => SPECIAL,
                NoticeLevel::Error => NEGATIVE,
            };
            ui.horizontal(|ui| {
                ui.label(RichText::new(&notice.title).color(color).strong());
                ui.label(RichText::new(&notice.detail).color(MUTED));
                if ui.small_button("✖").clicked() {
                    dismissed = Some(i);
                }
            });
        }
        if let Some(i) = dismissed {
            self.session.dismiss(i);
        }
    }

    fn stats_ui(&self, ui: &mut egui::Ui) {
        let stats = self.session.summary();
        ui.horizontal(|ui| {
            let card = |ui: &mut egui::Ui, title: &str, value: String, color: Color32| {
                egui::Frame::new()
                    .fill(Color32::from_rgb(30, 41, 59))
                    .stroke(Stroke::new(1.0, Color32::from_rgb(51, 65, 85)))
                    .inner_margin(Margin::same(10))
                    .show(ui, |ui| {
                        ui.set_min_width(180.0);
                        ui.label(RichText::new(title).color(MUTED).small());
                        ui.label(RichText::new(value).color(color).size(22.0).strong());
                    });
            };
            card(ui, "Items", stats.total_items.to_string(), TEXT);
            card(
                ui,
                "Profitable",
                format!("{} / {}", stats.profitable_items, stats.total_items),
                POSITIVE,
            );
            card(ui, "Highest spread", format_price(stats.highest_spread as f64), POSITIVE);
            card(
                ui,
                "Average spread",
                format_price(stats.average_spread as f64),
                signed_color(stats.average_spread as f64),
            );
        });
    }

    fn script_ui(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let running = self.launcher.is_running();

        ui.horizontal(|ui| {
            if ui.button("▶ Copy scraper command").clicked() {
                self.copy_command(&ctx);
            }
            if ui.add_enabled(!running, egui::Button::new("🚀 Run scraper")).clicked() {
                self.run_script();
            }
            if ui.add_enabled(running, egui::Button::new("⏹ Stop")).clicked() {
                self.stop_script();
            }
            if ui.button("📂 Presets").clicked() {
                self.reload_presets();
                self.presets_open = true;
            }
            let toggle = if self.show_script_settings { "Hide settings" } else { "Settings" };
            if ui.button(toggle).clicked() {
                self.show_script_settings = !self.show_script_settings;
            }
            let selected = self.session.selection().len();
            if ui
                .add_enabled(selected > 0, egui::Button::new("📋 Copy selection"))
                .clicked()
            {
                ctx.copy_text(self.session.selection_report());
            }
            ui.label(
                RichText::new(format!(
                    "Filtered: {} · Selected: {}",
                    self.session.visible_keys().len(),
                    selected
                ))
                .color(ACCENT),
            );
        });

        if self.show_script_settings {
            ui.horizontal(|ui| {
                ui.label("Start category (1-based)");
                ui.add(egui::DragValue::new(&mut self.start_category).range(1..=999));
                ui.label("Start item (1-based)");
                ui.add(egui::DragValue::new(&mut self.start_item).range(1..=999));
            });
        }

        if !self.script_log.is_empty() {
            egui::CollapsingHeader::new("Script log")
                .default_open(true)
                .show(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .max_height(140.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            ui.label(RichText::new(&self.script_log).monospace().color(MUTED));
                        });
                });
        }
    }

    fn tabs_ui(&mut self, ui: &mut egui::Ui) {
        let mut open = None;
        ui.horizontal_wrapped(|ui| {
            for (i, file) in self.session.recent_files().iter().enumerate() {
                let active = i == self.session.active_tab();
                if ui.selectable_label(active, display_name(file)).clicked() && !active {
                    open = Some(i);
                }
            }
            if self.session.is_loading() {
                ui.spinner();
            }
        });
        if let Some(tab) = open {
            self.open_tab(tab);
        }
    }

    fn filters_ui(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        let slider = self.session.slider();

        ui.label(RichText::new("🔎 Search").strong());
        let mut search = self.session.search_input().to_string();
        if ui
            .add(egui::TextEdit::singleline(&mut search).hint_text("Words in the name..."))
            .changed()
        {
            self.session.set_search_input(&search, now);
        }
        if self.session.search_pending() {
            ui.label(RichText::new("searching...").color(MUTED).small());
        }

        ui.add_space(8.0);
        ui.label(RichText::new("💰 Max buying price").strong());
        let (mut low, mut high) = self.session.slider_range();
        let fmt = move |v: f64, _: std::ops::RangeInclusive<usize>| format_price(slider.to_price(v));
        let low_changed = ui
            .add(egui::Slider::new(&mut low, 0.0..=UI_MAX).custom_formatter(fmt).text("from"))
            .changed();
        let high_changed = ui
            .add(egui::Slider::new(&mut high, 0.0..=UI_MAX).custom_formatter(fmt).text("to"))
            .changed();
        ui.horizontal_wrapped(|ui| {
            for (_, price) in slider.marks().into_iter().step_by(5) {
                ui.label(RichText::new(format_price(price)).color(MUTED).small());
            }
        });
        if low_changed || high_changed {
            self.session.set_slider_range(low, high);
            self.sync_price_inputs();
        }

        ui.horizontal(|ui| {
            ui.label("Min");
            let r = ui.add(egui::TextEdit::singleline(&mut self.min_price_input).desired_width(80.0));
            if r.lost_focus() {
                let accepted = self
                    .min_price_input
                    .trim()
                    .parse::<f64>()
                    .is_ok_and(|v| self.session.set_min_price(v));
                if !accepted {
                    self.sync_price_inputs();
                }
            }
            ui.label("Max");
            let r = ui.add(egui::TextEdit::singleline(&mut self.max_price_input).desired_width(100.0));
            if r.lost_focus() {
                let accepted = self
                    .max_price_input
                    .trim()
                    .parse::<f64>()
                    .is_ok_and(|v| self.session.set_max_price(v));
                if !accepted {
                    self.sync_price_inputs();
                }
            }
        });

        ui.add_space(8.0);
        ui.label(RichText::new("📦 Category").strong());
        let categories = self
            .session
            .snapshot()
            .map(|s| s.categories.clone())
            .unwrap_or_else(|| vec![ALL_CATEGORIES.to_string()]);
        let current = self.session.filter().category.clone();
        egui::ComboBox::from_id_salt("category")
            .selected_text(&current)
            .show_ui(ui, |ui| {
                for category in &categories {
                    if ui.selectable_label(*category == current, category).clicked() {
                        self.session.set_category(category);
                    }
                }
            });

        ui.add_space(8.0);
        let mut include = self.session.filter().include_special;
        if ui.checkbox(&mut include, "Include special items").changed() {
            self.session.set_include_special(include);
        }

        ui.add_space(8.0);
        ui.separator();
        ui.label(RichText::new("📊 Sort by").strong());
        let mut sort = self.session.sort();
        egui::ComboBox::from_id_salt("sort_by")
            .selected_text(format!("{:?}", sort.column))
            .show_ui(ui, |ui| {
                for column in SortColumn::ALL {
                    ui.selectable_value(&mut sort.column, column, format!("{column:?}"));
                }
            });
        ui.horizontal(|ui| {
            ui.selectable_value(&mut sort.order, SortOrder::Descending, "⬇ Desc");
            ui.selectable_value(&mut sort.order, SortOrder::Ascending, "⬆ Asc");
        });
        if sort != self.session.sort() {
            self.session.set_sort(sort);
        }

        ui.add_space(8.0);
        ui.separator();
        ui.label(RichText::new("✅ Selection").strong());
        ui.horizontal(|ui| {
            if ui.button("Select visible").clicked() {
                self.session.select_all_visible();
            }
            if ui.button("Clear").clicked() {
                self.session.clear_selection();
            }
        });
        let mut removed = None;
        for item in self.session.selection().items() {
            ui.horizontal(|ui| {
                if ui.small_button("✖").clicked() {
                    removed = Some(item.name.clone());
                }
                ui.label(RichText::new(&item.name).color(TEXT));
                ui.label(RichText::new(&item.category).color(MUTED).small());
            });
        }
        if let Some(name) = removed {
            self.session.deselect(&name);
        }

        ui.add_space(8.0);
        if ui
            .button(RichText::new("🔄 Reset filters").color(NEGATIVE))
            .clicked()
        {
            self.session.set_search_input("", now);
            self.session.set_category(ALL_CATEGORIES);
            self.session.set_include_special(false);
            self.session.set_slider_range(0.0, UI_MAX);
            self.session.set_sort(SortSpec::default());
            self.sync_price_inputs();
        }
    }

    fn table_ui(&mut self, ui: &mut egui::Ui) {
        let Some(snapshot) = self.session.snapshot().cloned() else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No snapshot loaded yet").size(20.0).color(MUTED));
            });
            return;
        };
        if self.session.visible_keys().is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No items match your filters").size(20.0).color(MUTED));
            });
            return;
        }

        let keys = self.session.visible_keys().to_vec();
        let mut toggled = Vec::new();
        let mut expand = None;
        let selection = self.session.selection();

        TableBuilder::new(ui)
            .striped(true)
            .vscroll(true)
            .max_scroll_height(if self.expanded.is_some() { 360.0 } else { f32::INFINITY })
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::exact(32.0)) // Selected
            .column(Column::remainder().at_least(200.0).clip(true)) // Name
            .column(Column::exact(110.0)) // Category
            .column(Column::exact(110.0)) // Max buying
            .column(Column::exact(110.0)) // Min selling
            .column(Column::exact(100.0)) // Spread
            .column(Column::exact(80.0)) // Profit
            .column(Column::exact(70.0)) // Bids
            .column(Column::exact(70.0)) // Listings
            .column(Column::exact(160.0)) // Updated
            .header(28.0, |mut header| {
                for title in [
                    "✔", "Name", "Category", "Max buying", "Min selling", "Spread", "Profit",
                    "Bids", "Listings", "Updated",
                ] {
                    header.col(|ui| {
                        ui.label(RichText::new(title).color(MUTED).strong());
                    });
                }
            })
            .body(|body| {
                body.rows(30.0, keys.len(), |mut row| {
                    let Some(item) = snapshot.get(keys[row.index()]) else {
                        return;
                    };
                    let mut checked = selection.is_key_selected(item.key);
                    row.set_selected(checked);

                    row.col(|ui| {
                        if ui.checkbox(&mut checked, "").changed() {
                            toggled.push(item.key);
                        }
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(&item.name).color(rarity_color(&item.rarity)));
                        if item.is_special {
                            ui.label(RichText::new("special").color(SPECIAL).small());
                        }
                    });
                    row.col(|ui| {
                        ui.label(&item.category);
                    });
                    row.col(|ui| {
                        ui.label(format_price(item.max_buying as f64));
                    });
                    row.col(|ui| {
                        ui.label(format_price(item.min_selling as f64));
                    });
                    row.col(|ui| match item.spread.and_then(|s| s.value()) {
                        Some(v) => {
                            ui.label(RichText::new(format_price(v as f64)).color(signed_color(v as f64)));
                        }
                        None => {
                            ui.label("N/A");
                        }
                    });
                    row.col(|ui| {
                        let text = RichText::new(item.profit_ratio.to_string());
                        match item.profit_ratio.percent() {
                            Some(p) => ui.label(text.color(signed_color(p))),
                            None => ui.label(text),
                        };
                    });
                    row.col(|ui| {
                        if ui.link(item.bid_count.to_string()).on_hover_text("Show prices").clicked() {
                            expand = Some(item.key);
                        }
                    });
                    row.col(|ui| {
                        if ui.link(item.listing_count.to_string()).on_hover_text("Show prices").clicked() {
                            expand = Some(item.key);
                        }
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(&item.timestamp).color(MUTED).small());
                    });
                });
            });

        for key in toggled {
            self.session.toggle_selected(key);
        }
        if let Some(key) = expand {
            self.expanded = if self.expanded == Some(key) { None } else { Some(key) };
        }

        if let Some(item) = self.expanded.and_then(|k| snapshot.get(k)) {
            ui.add_space(8.0);
            price_detail_ui(ui, item);
        }
    }

    fn presets_ui(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Save current filter").strong());
        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.preset_name).hint_text("Preset name"));
            let ready = !self.preset_name.trim().is_empty();
            if ui.add_enabled(ready, egui::Button::new("Save locally")).clicked() {
                self.save_preset(true);
            }
            if ui.add_enabled(ready, egui::Button::new("Save to presets folder")).clicked() {
                self.save_preset(false);
            }
        });
        ui.label(
            RichText::new(format!("{} items match the current filter", self.session.visible_keys().len()))
                .color(MUTED)
                .small(),
        );

        ui.separator();
        let mut apply = None;
        let mut delete = None;

        ui.label(RichText::new("Local presets").strong());
        if self.local_preset_list.is_empty() {
            ui.label(RichText::new("No saved presets").color(MUTED));
        }
        for entry in &self.local_preset_list {
            ui.horizontal(|ui| {
                ui.label(&entry.preset.name);
                ui.label(
                    RichText::new(format!("{} items · {}", entry.preset.items.len(), entry.preset.timestamp))
                        .color(MUTED)
                        .small(),
                );
                if ui.small_button("Load").clicked() {
                    apply = Some(entry.preset.clone());
                }
                if ui.small_button("Delete").clicked() {
                    delete = Some(entry.id);
                }
            });
        }

        ui.add_space(6.0);
        ui.label(RichText::new("Presets folder").strong());
        if self.server_preset_list.is_empty() {
            ui.label(RichText::new("No saved presets").color(MUTED));
        }
        for preset in &self.server_preset_list {
            ui.horizontal(|ui| {
                ui.label(&preset.name);
                ui.label(
                    RichText::new(format!("{} items · {}", preset.items.len(), preset.timestamp))
                        .color(MUTED)
                        .small(),
                );
                if ui.small_button("Load").clicked() {
                    apply = Some(preset.clone());
                }
            });
        }

        if let Some(preset) = apply {
            self.session.apply_preset(&preset);
            self.presets_open = false;
        }
        if let Some(id) = delete {
            if let Some(Err(e)) = self.local_presets.as_ref().map(|store| store.delete(id)) {
                warn!(error = %e, id, "could not delete local preset");
            }
            self.reload_presets();
        }
    }
}

fn price_detail_ui(ui: &mut egui::Ui, item: &NormalizedItem) {
    let mut buying = parse_price_list(&item.buying_prices_raw);
    buying.sort_unstable_by(|a, b| b.cmp(a));
    let mut selling = parse_price_list(&item.selling_prices_raw);
    selling.sort_unstable();

    egui::Frame::new()
        .fill(Color32::from_rgb(22, 32, 51))
        .stroke(Stroke::new(1.0, Color32::from_rgb(51, 65, 85)))
        .inner_margin(Margin::same(12))
        .show(ui, |ui| {
            ui.label(RichText::new(&item.name).color(rarity_color(&item.rarity)).strong().size(16.0));
            ui.columns(2, |cols| {
                cols[0].label(RichText::new("Buy orders").color(TEXT).strong());
                if buying.is_empty() {
                    cols[0].label(RichText::new("No buy prices").color(MUTED));
                }
                for (i, price) in buying.iter().enumerate() {
                    let text = RichText::new(format_price(*price as f64)).color(SPECIAL);
                    cols[0].label(if i == 0 { text.strong() } else { text });
                }
                cols[1].label(RichText::new("Sell listings").color(TEXT).strong());
                if selling.is_empty() {
                    cols[1].label(RichText::new("No sell prices").color(MUTED));
                }
                for (i, price) in selling.iter().enumerate() {
                    let text = RichText::new(format_price(*price as f64)).color(ACCENT);
                    cols[1].label(if i == 0 { text.strong() } else { text });
                }
            });

            let buy_bars: Vec<Bar> = buying
                .iter()
                .enumerate()
                .map(|(i, p)| Bar::new(i as f64, *p as f64).width(0.4))
                .collect();
            let sell_bars: Vec<Bar> = selling
                .iter()
                .enumerate()
                .map(|(i, p)| Bar::new(i as f64 + 0.4, *p as f64).width(0.4))
                .collect();
            Plot::new(("price_detail", item.key))
                .height(140.0)
                .legend(Legend::default())
                .allow_scroll(false)
                .show(ui, |plot_ui| {
                    plot_ui.bar_chart(BarChart::new("Buy", buy_bars).color(SPECIAL));
                    plot_ui.bar_chart(BarChart::new("Sell", sell_bars).color(ACCENT));
                });
        });
}

impl eframe::App for MarketViewerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.poll_background(now);

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.heading(RichText::new("⚓ Market Price Viewer").color(TEXT).strong().size(24.0));
                ui.separator();
                let source = self
                    .session
                    .snapshot()
                    .map(|s| display_name(&s.file_name))
                    .unwrap_or_else(|| "loading...".to_string());
                ui.label(RichText::new(format!("Data: {source}")).color(MUTED));
                if ui
                    .add_sized(Vec2::new(90.0, 28.0), egui::Button::new("⟳ Refresh"))
                    .clicked()
                {
                    self.refresh_listing();
                }
            });
            self.notices_ui(ui);
            ui.add_space(4.0);
            self.stats_ui(ui);
            ui.add_space(4.0);
            self.script_ui(ui);
            ui.add_space(4.0);
            self.tabs_ui(ui);
            ui.add_space(2.0);
        });

        egui::SidePanel::right("filters")
            .min_width(260.0)
            .max_width(360.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.filters_ui(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| self.table_ui(ui));

        if self.presets_open {
            let mut open = true;
            egui::Window::new("Presets")
                .open(&mut open)
                .default_width(480.0)
                .show(ctx, |ui| self.presets_ui(ui));
            self.presets_open &= open;
        }

        // Wake up for the debounce timer, the refresh delay and background work.
        if self.session.is_loading() || self.status.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
        if let Some(wait) = self.session.time_to_next_tick(now) {
            ctx.request_repaint_after(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_get_thousands_separators() {
        assert_eq!(format_price(0.0), "0");
        assert_eq!(format_price(999.0), "999");
        assert_eq!(format_price(1000.0), "1,000");
        assert_eq!(format_price(1_234_567.4), "1,234,567");
        assert_eq!(format_price(-25_000.0), "-25,000");
    }

    #[test]
    fn unknown_rarity_uses_common_color() {
        assert_eq!(rarity_color("普通"), rarity_color("whatever"));
        assert_ne!(rarity_color("传说"), rarity_color("普通"));
    }
}
