use crate::cache::SnapshotCache;
use crate::command::{build_invocation, ScriptInvocation};
use crate::config::ViewerConfig;
use crate::debounce::Debouncer;
use crate::error::{Result, ViewerError};
use crate::filter::{self, FilterState, SortSpec};
use crate::model::{NormalizedItem, Preset, PresetItem, SelectedItem, Snapshot};
use crate::presets::FilePresetStore;
use crate::selection::SelectionTracker;
use crate::slider::{PriceSlider, UI_MAX};
use crate::stats::{summarize, SummaryStats};
use crate::status::StatusMessage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: String,
}

/// A fetch the caller has to run; hand the result back to `finish_load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub file_name: String,
    pub tab: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    /// Served from the cache and already on screen.
    Cached,
    Fetch(LoadTicket),
}

/// All state behind one dashboard window. Events are applied one at a time
/// from the UI thread.
pub struct DashboardSession {
    config: ViewerConfig,
    cache: SnapshotCache,

    recent_files: Vec<String>,
    active_tab: usize,
    snapshot: Option<Arc<Snapshot>>,

    filter: FilterState,
    search_input: String,
    search: Debouncer<String>,
    sort: SortSpec,
    visible: Vec<usize>,

    slider: PriceSlider,
    slider_range: (f64, f64),

    selection: SelectionTracker,

    generation: u64,
    loading: bool,
    refresh_at: Option<Instant>,
    notices: Vec<Notice>,
}

impl DashboardSession {
    pub fn new(config: ViewerConfig) -> Self {
        let search = Debouncer::new(config.search_debounce());
        Self {
            config,
            cache: SnapshotCache::new(),
            recent_files: Vec::new(),
            active_tab: 0,
            snapshot: None,
            filter: FilterState::default(),
            search_input: String::new(),
            search,
            sort: SortSpec::default(),
            visible: Vec::new(),
            slider: PriceSlider::new(0.0),
            slider_range: (0.0, UI_MAX),
            selection: SelectionTracker::new(),
            generation: 0,
            loading: false,
            refresh_at: None,
            notices: Vec::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn recent_files(&self) -> &[String] {
        &self.recent_files
    }

    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }

    #[cfg(test)]
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn slider(&self) -> PriceSlider {
        self.slider
    }

    pub fn slider_range(&self) -> (f64, f64) {
        self.slider_range
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn notify(&mut self, level: NoticeLevel, title: impl Into<String>, detail: impl Into<String>) {
        self.notices.push(Notice {
            level,
            title: title.into(),
            detail: detail.into(),
        });
    }

    pub fn dismiss(&mut self, index: usize) {
        if index < self.notices.len() {
            self.notices.remove(index);
        }
    }

    // ---- snapshot lifecycle -------------------------------------------------

    /// Takes a fresh listing and starts loading the newest file. A failed
    /// listing leaves the current tabs and table alone.
    pub fn set_recent_files(&mut self, listing: Result<Vec<String>>) -> Option<LoadRequest> {
        match listing {
            Ok(files) => {
                info!(count = files.len(), "snapshot listing refreshed");
                self.recent_files = files;
                let first = self.recent_files.first().cloned()?;
                Some(self.begin_load(&first, 0))
            }
            Err(e) => {
                warn!(error = %e, "snapshot listing failed");
                self.notify(NoticeLevel::Error, "Load failed", "Could not list recent snapshot files");
                None
            }
        }
    }

    /// Starts showing `file_name`. Any load still in flight becomes stale.
    pub fn begin_load(&mut self, file_name: &str, tab: usize) -> LoadRequest {
        self.generation += 1;

        if let Some(snapshot) = self.cache.get(file_name) {
            debug!(file = file_name, "using cached snapshot");
            self.loading = false;
            self.active_tab = tab;
            self.commit(snapshot);
            return LoadRequest::Cached;
        }

        self.loading = true;
        LoadRequest::Fetch(LoadTicket {
            generation: self.generation,
            file_name: file_name.to_string(),
            tab,
        })
    }

    /// Applies a finished fetch. Returns whether it made it onto the screen;
    /// results for superseded tickets only warm the cache.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<Snapshot>) -> bool {
        let current = ticket.generation == self.generation;
        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.cache.put(&ticket.file_name, Arc::clone(&snapshot));
                debug!(file = %ticket.file_name, cached = self.cache.len(), "snapshot cached");
                if !current {
                    debug!(file = %ticket.file_name, "discarding stale snapshot response");
                    return false;
                }
                self.loading = false;
                self.active_tab = ticket.tab;
                self.commit(snapshot);
                true
            }
            Err(e) => {
                if !current {
                    return false;
                }
                warn!(file = %ticket.file_name, error = %e, "snapshot load failed");
                self.loading = false;
                self.notify(
                    NoticeLevel::Error,
                    "Load failed",
                    format!("Could not load {}", ticket.file_name),
                );
                false
            }
        }
    }

    fn commit(&mut self, snapshot: Arc<Snapshot>) {
        self.slider = PriceSlider::new(snapshot.price_ceiling);
        self.slider_range = (0.0, UI_MAX);
        self.filter.price_range = (0.0, self.slider.ceiling());
        self.selection.reconcile(&snapshot);
        info!(
            file = %snapshot.file_name,
            items = snapshot.items.len(),
            "snapshot shown"
        );
        self.snapshot = Some(snapshot);
        self.recompute();
    }

    // ---- filters ------------------------------------------------------------

    fn recompute(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            self.visible.clear();
            return;
        };
        let mut keys = filter::apply(snapshot, &self.filter);
        filter::sort_keys(snapshot, &mut keys, self.sort);
        self.visible = keys;
    }

    /// Records a keystroke; the filter catches up once typing pauses.
    pub fn set_search_input(&mut self, text: &str, now: Instant) {
        self.search_input = text.to_string();
        self.search.schedule(self.search_input.clone(), now);
    }

    /// Drives timers. Returns true when a snapshot re-listing is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Some(text) = self.search.poll(now) {
            if text != self.filter.search_text {
                self.filter.search_text = text;
                self.recompute();
            }
        }
        match self.refresh_at {
            Some(at) if now >= at => {
                self.refresh_at = None;
                true
            }
            _ => false,
        }
    }

    /// How long until `tick` has something to do.
    pub fn time_to_next_tick(&self, now: Instant) -> Option<Duration> {
        let refresh = self.refresh_at.map(|at| at.saturating_duration_since(now));
        match (self.search.remaining(now), refresh) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Typed search text not applied yet.
    pub fn search_pending(&self) -> bool {
        self.search.is_pending()
    }

    pub fn set_category(&mut self, category: &str) {
        self.filter.category = category.to_string();
        self.recompute();
    }

    pub fn set_include_special(&mut self, include: bool) {
        self.filter.include_special = include;
        self.recompute();
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
        self.recompute();
    }

    pub fn set_slider_range(&mut self, low: f64, high: f64) {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        self.slider_range = (low, high);
        self.filter.price_range = (self.slider.to_price(low), self.slider.to_price(high));
        self.recompute();
    }

    /// Typed lower bound; ignored unless `0 <= price <= high`.
    pub fn set_min_price(&mut self, price: f64) -> bool {
        if !(0.0..=self.filter.price_range.1).contains(&price) {
            return false;
        }
        self.filter.price_range.0 = price;
        self.slider_range.0 = self.slider.to_ui(price);
        self.recompute();
        true
    }

    /// Typed upper bound; ignored unless `low <= price <= ceiling`.
    pub fn set_max_price(&mut self, price: f64) -> bool {
        if !(self.filter.price_range.0..=self.slider.ceiling()).contains(&price) {
            return false;
        }
        self.filter.price_range.1 = price;
        self.slider_range.1 = self.slider.to_ui(price);
        self.recompute();
        true
    }

    pub fn visible_keys(&self) -> &[usize] {
        &self.visible
    }

    pub fn visible_items(&self) -> impl Iterator<Item = &NormalizedItem> + '_ {
        let snapshot = self.snapshot.as_deref();
        self.visible
            .iter()
            .filter_map(move |&key| snapshot.and_then(|s| s.get(key)))
    }

    pub fn summary(&self) -> SummaryStats {
        match &self.snapshot {
            Some(snapshot) => summarize(snapshot, &self.visible),
            None => SummaryStats::default(),
        }
    }

    // ---- selection ----------------------------------------------------------

    /// Replaces the highlighted rows with `keys` and adds them to the selection.
    pub fn select_keys(&mut self, keys: &[usize]) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        self.selection.select(keys.iter().filter_map(|&k| snapshot.get(k)));
    }

    pub fn toggle_selected(&mut self, key: usize) {
        if let Some(item) = self.snapshot.as_ref().and_then(|s| s.get(key)) {
            self.selection.toggle(item);
        }
    }

    pub fn select_all_visible(&mut self) {
        let mut keys: Vec<usize> = self.selection.active_keys().collect();
        keys.extend(self.visible.iter().copied());
        self.select_keys(&keys);
    }

    pub fn deselect(&mut self, name: &str) {
        self.selection.remove(name);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn apply_preset(&mut self, preset: &Preset) {
        self.selection.replace_all(
            preset.items.iter().map(SelectedItem::from),
            self.snapshot.as_deref(),
        );
        self.notify(
            NoticeLevel::Success,
            "Preset loaded",
            format!("Loaded \"{}\" ({} items)", preset.name, preset.items.len()),
        );
    }

    /// (name, category) of every visible row, for saving the filter as a preset.
    pub fn visible_preset_items(&self) -> Vec<PresetItem> {
        self.visible_items().map(PresetItem::from).collect()
    }

    pub fn selected_preset_items(&self) -> Vec<PresetItem> {
        self.selection.items().iter().map(PresetItem::from).collect()
    }

    /// Plain-text table of the selection for the clipboard.
    pub fn selection_report(&self) -> String {
        let mut out = String::new();
        if let Some((first, last)) = self.selection.timestamp_range() {
            if first == last {
                out.push_str(&format!("Data time: {first}\n"));
            } else {
                out.push_str(&format!("Data time: {first} ~ {last}\n"));
            }
        }
        out.push_str("Name\tCategory\tMax buying\tMin selling\tSpread\tProfit\tBids\tListings\n");
        for item in self.selection.items() {
            match &item.detail {
                Some(d) => out.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                    item.name,
                    item.category,
                    d.max_buying,
                    d.min_selling,
                    d.spread.map(|s| s.to_string()).unwrap_or_else(|| "N/A".to_string()),
                    d.profit_ratio,
                    d.bid_count,
                    d.listing_count,
                )),
                None => out.push_str(&format!("{}\t{}\t-\t-\t-\t-\t-\t-\n", item.name, item.category)),
            }
        }
        out
    }

    // ---- script -------------------------------------------------------------

    /// Builds the scraper invocation, writing a temporary preset first when
    /// something is selected. Indices are one-based as typed in the panel.
    pub fn script_invocation(
        &self,
        presets: &FilePresetStore,
        start_category: u32,
        start_item: u32,
    ) -> Result<ScriptInvocation> {
        let selected = self.selected_preset_items();
        let preset_file = if selected.is_empty() {
            None
        } else {
            Some(presets.write_temp_preset(&selected)?)
        };
        Ok(build_invocation(
            &self.config.script,
            start_category.saturating_sub(1),
            start_item.saturating_sub(1),
            preset_file.as_deref(),
        ))
    }

    /// Reacts to script output; the finish message schedules a re-listing
    /// once the scraper has had time to write its file.
    pub fn on_status(&mut self, message: &StatusMessage, now: Instant) {
        if message.is_finished() {
            info!("script finished, refreshing snapshots shortly");
            self.refresh_at = Some(now + self.config.refresh_settle());
        }
    }

    pub fn on_status_error(&mut self, error: &ViewerError) {
        warn!(%error, "script status stream failed");
        self.notify(
            NoticeLevel::Warning,
            "Status updates stopped",
            "Refresh manually to see new data",
        );
    }
}
