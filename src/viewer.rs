//! View controller: one presentation at a time, whatever the host throws at it
//!
//! **Why**: Navigation, rotation, resize storms, deletes and shutdown all
//! race against in-flight decode and playback. The controller serializes
//! them: every context switch cancels and joins the previous task before the
//! next one may touch the display sink, so the sink always has exactly one
//! writer.
//!
//! **Used by**: the shell binary; any host that owns a display surface
//!
//! # State machine
//!
//! `Idle` -> `LoadingStatic` -> `Idle` for stills;
//! `Idle` -> `LoadingAnimated` -> `PlayingAnimated` for animations, which
//! keep playing until the next switch cancels them.
//!
//! # Debounce and throttle
//!
//! Resize events only record a timestamp; the host pumps `update()` and the
//! actual clear-cache-and-reload happens once no further resize arrived for
//! the quiescence window, timed from the last event. Manual navigation and
//! rotation are gated by a minimum interval against runaway key repeats;
//! resize- and delete-driven re-shows are exempt.

use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};

use crate::animation::Animation;
use crate::cache::BoundedCache;
use crate::fit::fit_within;
use crate::frame::DisplayFrame;
use crate::media;
use crate::pipeline::{ANIMATION_WORKERS, AnimationCache, INDICATOR_WORKERS, Pipeline};
use crate::player;
use crate::source::{ConfirmPrompt, DisplaySink, SourceProvider, Trash};
use crate::task::{StopToken, Task};

/// Controller states, observable by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    LoadingStatic,
    LoadingAnimated,
    PlayingAnimated,
}

/// Controller errors surfaced to the host
#[derive(Debug)]
pub enum ViewerError {
    /// Listing the folder failed; the previous list stays active
    ListFailed(anyhow::Error),
    /// Storage refused the delete; the item and display are unchanged
    DeleteFailed(anyhow::Error),
}

impl std::fmt::Display for ViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerError::ListFailed(e) => write!(f, "failed to list folder: {}", e),
            ViewerError::DeleteFailed(e) => write!(f, "failed to delete item: {}", e),
        }
    }
}

impl std::error::Error for ViewerError {}

/// Controller tunables. Defaults match the classic viewer behavior.
pub struct ViewerConfig {
    /// Initial canvas geometry
    pub width: u32,
    pub height: u32,
    /// Cache budget in bytes of decoded frames
    pub cache_budget: usize,
    /// Transform pool size for full animated decodes
    pub animation_workers: usize,
    /// Transform pool size for the loading indicator
    pub indicator_workers: usize,
    /// Minimum interval between manual navigation/rotation inputs
    pub switch_interval: Duration,
    /// Resize quiescence window before clear-and-reload
    pub resize_quiescence: Duration,
    /// Optional animated source shown while a decode is in flight
    pub loading_indicator: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            cache_budget: 1 << 30, // 1 GiB of decoded frames
            animation_workers: ANIMATION_WORKERS,
            indicator_workers: INDICATOR_WORKERS,
            switch_interval: Duration::from_millis(140),
            resize_quiescence: Duration::from_millis(100),
            loading_indicator: None,
        }
    }
}

/// Current canvas geometry, shared with the record factory so fresh records
/// capture the dimensions that are live at their creation.
struct Canvas {
    size: Mutex<(u32, u32)>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new((width, height)),
        }
    }

    fn get(&self) -> (u32, u32) {
        *self.size.lock().expect("lock")
    }

    fn set(&self, width: u32, height: u32) {
        *self.size.lock().expect("lock") = (width, height);
    }
}

#[derive(Clone)]
struct Indicator {
    id: String,
    record: Arc<Animation>,
}

/// The view controller. Owns the record cache and at most one active
/// show/playback task.
pub struct Viewer {
    provider: Arc<dyn SourceProvider>,
    sink: Arc<dyn DisplaySink>,
    prompt: Box<dyn ConfirmPrompt>,
    trash: Box<dyn Trash>,

    animation_workers: usize,
    indicator_workers: usize,
    switch_interval: Duration,
    resize_quiescence: Duration,

    canvas: Arc<Canvas>,
    cache: Arc<AnimationCache>,
    state: Arc<Mutex<ViewState>>,

    folder: Option<String>,
    images: Vec<String>,
    index: usize,
    rotation: u8,

    last_switch: Option<Instant>,
    last_resize: Option<Instant>,

    indicator: Option<Indicator>,
    active: Option<Task>,
}

impl Viewer {
    pub fn new(
        config: ViewerConfig,
        provider: Arc<dyn SourceProvider>,
        sink: Arc<dyn DisplaySink>,
        prompt: Box<dyn ConfirmPrompt>,
        trash: Box<dyn Trash>,
    ) -> Self {
        let canvas = Arc::new(Canvas::new(config.width, config.height));
        let factory_canvas = Arc::clone(&canvas);
        let cache = Arc::new(BoundedCache::with_factory(
            config.cache_budget,
            |record: &Arc<Animation>| record.mem(),
            move || {
                let (w, h) = factory_canvas.get();
                Arc::new(Animation::new(w, h))
            },
        ));
        let indicator = config.loading_indicator.map(|id| Indicator {
            record: Arc::new(Animation::new(config.width, config.height)),
            id,
        });

        Self {
            provider,
            sink,
            prompt,
            trash,
            animation_workers: config.animation_workers,
            indicator_workers: config.indicator_workers,
            switch_interval: config.switch_interval,
            resize_quiescence: config.resize_quiescence,
            canvas,
            cache,
            state: Arc::new(Mutex::new(ViewState::Idle)),
            folder: None,
            images: Vec::new(),
            index: 0,
            rotation: 0,
            last_switch: None,
            last_resize: None,
            indicator,
            active: None,
        }
    }

    pub fn state(&self) -> ViewState {
        *self.state.lock().expect("lock")
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    pub fn item_count(&self) -> usize {
        self.images.len()
    }

    /// Identifier currently shown, if the list is non-empty.
    pub fn current_id(&self) -> Option<String> {
        self.images.get(self.index).cloned()
    }

    /// (used bytes estimate, budget bytes) of the record cache
    pub fn cache_stats(&self) -> (usize, usize) {
        (self.cache.total_size(), self.cache.budget())
    }

    /// Point the viewer at a folder. An actual folder change drops all
    /// cached records and restarts at the first item.
    pub fn set_folder(&mut self, folder: &str) -> Result<(), ViewerError> {
        let images = self
            .provider
            .list(folder)
            .map_err(ViewerError::ListFailed)?;
        info!("Listed {} items in {}", images.len(), folder);

        if self.folder.as_deref() != Some(folder) {
            self.cancel_active();
            self.cache.clear();
            self.index = 0;
            self.rotation = 0;
            self.folder = Some(folder.to_string());
        }
        self.images = images;
        if self.index >= self.images.len() {
            self.index = self.images.len().saturating_sub(1);
        }
        self.show_current();
        Ok(())
    }

    /// Advance to the next item (throttled).
    pub fn next(&mut self) {
        if !self.switch_elapsed() {
            return;
        }
        if self.index + 1 < self.images.len() {
            self.index += 1;
            self.rotation = 0;
        }
        self.show_current();
    }

    /// Go back to the previous item (throttled).
    pub fn prev(&mut self) {
        if !self.switch_elapsed() {
            return;
        }
        if self.index > 0 {
            self.index -= 1;
            self.rotation = 0;
        }
        self.show_current();
    }

    /// Rotate the current item a quarter turn clockwise (throttled).
    pub fn rotate_cw(&mut self) {
        self.rotate(1);
    }

    /// Rotate the current item a quarter turn counter-clockwise (throttled).
    pub fn rotate_ccw(&mut self) {
        self.rotate(3);
    }

    fn rotate(&mut self, delta: u8) {
        if !self.switch_elapsed() {
            return;
        }
        self.cancel_active();
        self.rotation = (self.rotation + delta) % 4;
        // Re-derive the cached record from its parked source; the reset must
        // come after the join above so no writer is mid-append
        if let Some(id) = self.current_id() {
            if let Some(record) = self.cache.get(&id) {
                record.reset_frames();
            }
        }
        debug!("Rotation now {} quarter turns", self.rotation);
        self.show_current();
    }

    /// Record a canvas geometry change. Cheap; the actual reload happens in
    /// `update()` once the resize storm settles.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if self.canvas.get() == (width, height) {
            return;
        }
        self.canvas.set(width, height);
        self.last_resize = Some(Instant::now());
    }

    /// Host-pumped tick: settles pending resizes after the quiescence window.
    pub fn update(&mut self) {
        let settled = self
            .last_resize
            .is_some_and(|t| t.elapsed() >= self.resize_quiescence);
        if !settled {
            return;
        }
        self.last_resize = None;

        let (w, h) = self.canvas.get();
        info!("Resize settled at {}x{}: dropping cached records", w, h);
        self.cancel_active();
        // Every cached record is keyed by now-stale geometry
        self.cache.clear();
        self.refresh_indicator();
        self.show_current();
    }

    /// Delete the current item after confirmation. A storage failure aborts
    /// with the display and list unchanged.
    pub fn delete_current(&mut self) -> Result<(), ViewerError> {
        let Some(id) = self.current_id() else {
            return Ok(());
        };
        if !self.prompt.ask_yes_no(&format!("Delete {}?", id)) {
            debug!("Delete of {} declined", id);
            return Ok(());
        }
        if let Err(e) = self.trash.delete(&id) {
            warn!("Delete of {} failed: {}", id, e);
            return Err(ViewerError::DeleteFailed(e));
        }
        info!("Deleted {}", id);

        self.cancel_active();
        self.cache.remove(&id);
        self.images.remove(self.index);
        if self.index >= self.images.len() && self.index > 0 {
            self.index = self.images.len() - 1;
        }
        // The next item has taken this index (or the previous, if the
        // deleted item was last)
        self.show_current();
        Ok(())
    }

    /// Cancel whatever is loading or playing and go idle.
    pub fn stop(&mut self) {
        self.cancel_active();
    }

    /// Present the item at the current index. Exempt from the navigation
    /// throttle; resize/delete/folder flows re-enter through here.
    pub fn show_current(&mut self) {
        self.cancel_active();
        let Some(id) = self.current_id() else {
            debug!("Nothing to show: source list is empty");
            return;
        };

        let target = self.canvas.get();
        let rotation = self.rotation;
        let provider = Arc::clone(&self.provider);
        let sink = Arc::clone(&self.sink);
        let state = Arc::clone(&self.state);

        if media::is_animated(Path::new(&id)) {
            self.set_state(ViewState::LoadingAnimated);
            let cache = Arc::clone(&self.cache);
            let indicator = self.indicator.clone();
            let workers = self.animation_workers;
            let indicator_workers = self.indicator_workers;
            self.active = Some(Task::spawn("flipview-show-animated", move |stop| {
                show_animated(
                    cache,
                    provider,
                    sink,
                    state,
                    indicator,
                    id,
                    target,
                    rotation,
                    workers,
                    indicator_workers,
                    stop,
                );
            }));
        } else {
            self.set_state(ViewState::LoadingStatic);
            self.active = Some(Task::spawn("flipview-show-static", move |stop| {
                show_static(provider.as_ref(), sink.as_ref(), &id, target, rotation, &stop);
                *state.lock().expect("lock") = ViewState::Idle;
            }));
        }
    }

    fn cancel_active(&mut self) {
        if let Some(task) = self.active.take() {
            task.cancel();
        }
        self.set_state(ViewState::Idle);
    }

    fn set_state(&self, state: ViewState) {
        *self.state.lock().expect("lock") = state;
    }

    /// Minimum-interval gate for manual inputs.
    fn switch_elapsed(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_switch {
            if now.duration_since(last) < self.switch_interval {
                return false;
            }
        }
        self.last_switch = Some(now);
        true
    }

    /// Records never resize in place: after a geometry change the indicator
    /// gets a fresh record, inheriting the parked source handle.
    fn refresh_indicator(&mut self) {
        let (w, h) = self.canvas.get();
        if let Some(ind) = &mut self.indicator {
            let fresh = Animation::new(w, h);
            if let Some(source) = ind.record.take_source() {
                fresh.store_source(source);
            }
            ind.record = Arc::new(fresh);
        }
    }
}

/// Animated show task: optional loading indicator while the pipeline runs,
/// then looping playback of the (possibly partial) record.
#[allow(clippy::too_many_arguments)]
fn show_animated(
    cache: Arc<AnimationCache>,
    provider: Arc<dyn SourceProvider>,
    sink: Arc<dyn DisplaySink>,
    state: Arc<Mutex<ViewState>>,
    indicator: Option<Indicator>,
    id: String,
    target: (u32, u32),
    rotation: u8,
    workers: usize,
    indicator_workers: usize,
    stop: StopToken,
) {
    let indicator_task = indicator.map(|ind| {
        let provider = Arc::clone(&provider);
        let sink = Arc::clone(&sink);
        Task::spawn("flipview-indicator", move |ind_stop| {
            if !ind.record.finished_loading() {
                let pipeline = Pipeline::new(indicator_workers);
                if let Err(e) =
                    pipeline.decode_record(&ind.record, provider.as_ref(), &ind.id, 0, &ind_stop)
                {
                    warn!("Loading indicator unavailable: {}", e);
                    return;
                }
            }
            if !ind_stop.is_stopped() {
                player::play(&ind.record, sink.as_ref(), &ind_stop);
            }
        })
    });

    let pipeline = Pipeline::new(workers);
    let result = pipeline.decode(&cache, &id, provider.as_ref(), target, rotation, &stop);

    // The real record takes over the sink; the indicator must be gone first
    if let Some(task) = indicator_task {
        task.cancel();
    }

    match result {
        Ok(record) => {
            if stop.is_stopped() {
                return;
            }
            *state.lock().expect("lock") = ViewState::PlayingAnimated;
            player::play(&record, sink.as_ref(), &stop);
        }
        Err(e) => {
            warn!("Failed to load {}: {}", id, e);
            *state.lock().expect("lock") = ViewState::Idle;
        }
    }
}

/// Static show task: one decode, rotate, fit, present. No concurrency.
fn show_static(
    provider: &dyn SourceProvider,
    sink: &dyn DisplaySink,
    id: &str,
    target: (u32, u32),
    rotation: u8,
    stop: &StopToken,
) {
    let mut source = match provider.open(id) {
        Ok(source) => source,
        Err(e) => {
            warn!("Failed to open {}: {}", id, e);
            return;
        }
    };
    let raw = match source.frame(0) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            warn!("{} contains no frames", id);
            return;
        }
        Err(e) => {
            warn!("Failed to decode {}: {}", id, e);
            return;
        }
    };
    if stop.is_stopped() {
        return;
    }

    // Unlike the animated path, stills fit the box after rotation
    let rotated = match rotation % 4 {
        1 => imageops::rotate90(&raw.image),
        2 => imageops::rotate180(&raw.image),
        3 => imageops::rotate270(&raw.image),
        _ => raw.image,
    };
    let (w, h) = rotated.dimensions();
    let (fit_w, fit_h) = fit_within(w, h, target.0, target.1);
    let resized = if (fit_w, fit_h) != (w, h) {
        imageops::resize(&rotated, fit_w, fit_h, FilterType::CatmullRom)
    } else {
        rotated
    };

    if stop.is_stopped() {
        return;
    }
    sink.present(&DisplayFrame::from_rgba(resized));
    debug!("Presented {} at {}x{}", id, fit_w, fit_h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{FsProvider, FsTrash};
    use crate::source::{ImageSource, RawFrame, SourceError};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread::sleep;

    struct SeqSource {
        frames: usize,
        native: (u32, u32),
        delay: Duration,
    }

    impl ImageSource for SeqSource {
        fn dimensions(&self) -> (u32, u32) {
            self.native
        }

        fn frame(&mut self, index: usize) -> Result<Option<RawFrame>, SourceError> {
            if index >= self.frames {
                return Ok(None);
            }
            Ok(Some(RawFrame {
                image: RgbaImage::from_pixel(
                    self.native.0,
                    self.native.1,
                    Rgba([index as u8, 0, 0, 255]),
                ),
                delay: self.delay,
            }))
        }
    }

    /// Provider serving a fixed item list; .gif ids get 3-frame sources
    struct MockProvider {
        items: Vec<String>,
        opens: AtomicUsize,
    }

    impl MockProvider {
        fn new(items: &[&str]) -> Self {
            Self {
                items: items.iter().map(|s| s.to_string()).collect(),
                opens: AtomicUsize::new(0),
            }
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    impl SourceProvider for MockProvider {
        fn list(&self, _folder: &str) -> anyhow::Result<Vec<String>> {
            Ok(self.items.clone())
        }

        fn open(&self, id: &str) -> Result<Box<dyn ImageSource>, SourceError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let frames = if id.ends_with(".gif") { 3 } else { 1 };
            Ok(Box::new(SeqSource {
                frames,
                native: (20, 10),
                delay: Duration::from_millis(10),
            }))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        presents: AtomicUsize,
    }

    impl CountingSink {
        fn count(&self) -> usize {
            self.presents.load(Ordering::SeqCst)
        }
    }

    impl DisplaySink for CountingSink {
        fn present(&self, _frame: &DisplayFrame) {
            self.presents.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedPrompt(bool);

    impl ConfirmPrompt for FixedPrompt {
        fn ask_yes_no(&self, _message: &str) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingTrash {
        deleted: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl Trash for RecordingTrash {
        fn delete(&self, id: &str) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("storage said no");
            }
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn quick_config() -> ViewerConfig {
        ViewerConfig {
            width: 50,
            height: 50,
            animation_workers: 2,
            indicator_workers: 1,
            switch_interval: Duration::ZERO,
            resize_quiescence: Duration::from_millis(50),
            ..ViewerConfig::default()
        }
    }

    fn viewer_with(
        provider: Arc<MockProvider>,
        sink: Arc<CountingSink>,
        config: ViewerConfig,
    ) -> Viewer {
        Viewer::new(
            config,
            provider,
            sink,
            Box::new(FixedPrompt(true)),
            Box::new(RecordingTrash::default()),
        )
    }

    /// Wait until `cond` holds or the deadline passes
    fn wait_for(mut cond: impl FnMut() -> bool, deadline: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            sleep(Duration::from_millis(5));
        }
        cond()
    }

    /// Test: a static item is decoded, presented once, and the controller
    /// returns to Idle
    #[test]
    fn test_static_show() {
        let provider = Arc::new(MockProvider::new(&["a.png"]));
        let sink = Arc::new(CountingSink::default());
        let mut viewer = viewer_with(Arc::clone(&provider), Arc::clone(&sink), quick_config());

        viewer.set_folder("/pics").unwrap();

        assert!(wait_for(|| viewer.state() == ViewState::Idle, Duration::from_secs(2)));
        assert!(wait_for(|| sink.count() == 1, Duration::from_secs(2)));
        sleep(Duration::from_millis(100));
        assert_eq!(sink.count(), 1, "static path must present exactly once");
    }

    /// Test: an animated item reaches PlayingAnimated and loops; stopping
    /// freezes the sink
    #[test]
    fn test_animated_playback_and_stop() {
        let provider = Arc::new(MockProvider::new(&["a.gif"]));
        let sink = Arc::new(CountingSink::default());
        let mut viewer = viewer_with(Arc::clone(&provider), Arc::clone(&sink), quick_config());

        viewer.set_folder("/pics").unwrap();

        assert!(wait_for(
            || viewer.state() == ViewState::PlayingAnimated,
            Duration::from_secs(2)
        ));
        // 3 frames looping: the count keeps climbing past one pass
        assert!(wait_for(|| sink.count() > 6, Duration::from_secs(2)));

        viewer.stop();
        assert_eq!(viewer.state(), ViewState::Idle);
        let frozen = sink.count();
        sleep(Duration::from_millis(150));
        assert_eq!(sink.count(), frozen, "sink called after cancel completed");
    }

    /// Test: navigating away from an animation cancels it before the next
    /// item is shown
    #[test]
    fn test_navigate_away_cancels() {
        let provider = Arc::new(MockProvider::new(&["a.gif", "b.png"]));
        let sink = Arc::new(CountingSink::default());
        let mut viewer = viewer_with(Arc::clone(&provider), Arc::clone(&sink), quick_config());

        viewer.set_folder("/pics").unwrap();
        assert!(wait_for(|| sink.count() > 3, Duration::from_secs(2)));

        viewer.next();
        assert_eq!(viewer.index(), 1);
        assert!(wait_for(|| viewer.state() == ViewState::Idle, Duration::from_secs(2)));
        let after_static = sink.count();
        sleep(Duration::from_millis(150));
        assert_eq!(sink.count(), after_static, "old playback leaked into sink");
    }

    /// Test: the switch throttle gates rapid navigation, resize re-shows
    /// are exempt
    #[test]
    fn test_switch_throttle() {
        let provider = Arc::new(MockProvider::new(&["a.png", "b.png", "c.png"]));
        let sink = Arc::new(CountingSink::default());
        let config = ViewerConfig {
            switch_interval: Duration::from_millis(140),
            ..quick_config()
        };
        let mut viewer = viewer_with(Arc::clone(&provider), Arc::clone(&sink), config);
        viewer.set_folder("/pics").unwrap();

        viewer.next();
        assert_eq!(viewer.index(), 1);
        viewer.next(); // inside the 140ms window: ignored
        assert_eq!(viewer.index(), 1);

        sleep(Duration::from_millis(150));
        viewer.next();
        assert_eq!(viewer.index(), 2);
    }

    /// Test: rotation survives resize but resets on index change
    #[test]
    fn test_rotation_reset_rules() {
        let provider = Arc::new(MockProvider::new(&["a.png", "b.png"]));
        let sink = Arc::new(CountingSink::default());
        let mut viewer = viewer_with(Arc::clone(&provider), Arc::clone(&sink), quick_config());
        viewer.set_folder("/pics").unwrap();

        viewer.rotate_cw();
        assert_eq!(viewer.rotation(), 1);
        assert!(wait_for(|| provider.opens() >= 2, Duration::from_secs(2)));

        // Resize settles into a reload: rotation must be preserved
        viewer.on_resize(80, 80);
        assert!(wait_for(
            || {
                viewer.update();
                provider.opens() >= 3
            },
            Duration::from_secs(2)
        ));
        assert_eq!(viewer.rotation(), 1);

        // Index change: rotation resets
        viewer.next();
        assert_eq!(viewer.rotation(), 0);
    }

    /// Test: N resize events inside the window produce exactly one
    /// clear-and-reload, timed from the last event
    #[test]
    fn test_resize_debounce() {
        let provider = Arc::new(MockProvider::new(&["a.png"]));
        let sink = Arc::new(CountingSink::default());
        let config = ViewerConfig {
            resize_quiescence: Duration::from_millis(150),
            ..quick_config()
        };
        let mut viewer = viewer_with(Arc::clone(&provider), Arc::clone(&sink), config);
        viewer.set_folder("/pics").unwrap();
        assert!(wait_for(|| sink.count() == 1, Duration::from_secs(2)));
        let opens_before = provider.opens();

        // A burst of resizes, each well inside the window of the previous
        for i in 0..4 {
            viewer.on_resize(60 + i, 60 + i);
            viewer.update();
            sleep(Duration::from_millis(30));
            viewer.update();
        }
        // The last event is fresher than the quiescence window
        assert_eq!(provider.opens(), opens_before, "reload fired mid-burst");

        // Let the burst settle and pump
        assert!(wait_for(
            || {
                viewer.update();
                provider.opens() == opens_before + 1
            },
            Duration::from_secs(2)
        ));
        sleep(Duration::from_millis(120));
        viewer.update();
        assert_eq!(provider.opens(), opens_before + 1, "more than one reload");
    }

    /// Test: confirmed delete removes the item and re-shows at the same
    /// index; declined and failed deletes change nothing
    #[test]
    fn test_delete_flow() {
        let provider = Arc::new(MockProvider::new(&["a.png", "b.png", "c.png"]));
        let sink = Arc::new(CountingSink::default());
        let trash = Arc::new(RecordingTrash::default());

        struct SharedTrash(Arc<RecordingTrash>);
        impl Trash for SharedTrash {
            fn delete(&self, id: &str) -> anyhow::Result<()> {
                self.0.delete(id)
            }
        }
        struct SharedPrompt(Arc<AtomicBool>);
        impl ConfirmPrompt for SharedPrompt {
            fn ask_yes_no(&self, _message: &str) -> bool {
                self.0.load(Ordering::SeqCst)
            }
        }

        let answer = Arc::new(AtomicBool::new(false));
        let mut viewer = Viewer::new(
            quick_config(),
            Arc::clone(&provider) as Arc<dyn SourceProvider>,
            Arc::clone(&sink) as Arc<dyn DisplaySink>,
            Box::new(SharedPrompt(Arc::clone(&answer))),
            Box::new(SharedTrash(Arc::clone(&trash))),
        );
        viewer.set_folder("/pics").unwrap();

        // Declined: nothing happens
        viewer.delete_current().unwrap();
        assert_eq!(viewer.item_count(), 3);
        assert!(trash.deleted.lock().unwrap().is_empty());

        // Confirmed: item gone, next item takes its index
        answer.store(true, Ordering::SeqCst);
        viewer.delete_current().unwrap();
        assert_eq!(viewer.item_count(), 2);
        assert_eq!(viewer.index(), 0);
        assert_eq!(viewer.current_id().as_deref(), Some("b.png"));
        assert_eq!(*trash.deleted.lock().unwrap(), vec!["a.png".to_string()]);

        // Storage failure: surfaced, list unchanged
        trash.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            viewer.delete_current(),
            Err(ViewerError::DeleteFailed(_))
        ));
        assert_eq!(viewer.item_count(), 2);

        // Deleting the last item steps the index back
        trash.fail.store(false, Ordering::SeqCst);
        viewer.next();
        assert_eq!(viewer.index(), 1);
        viewer.delete_current().unwrap();
        assert_eq!(viewer.item_count(), 1);
        assert_eq!(viewer.index(), 0);
    }

    /// Test: end-to-end over a real folder: PNG shows, GIF loops, leaving
    /// the GIF cancels cleanly
    #[test]
    fn test_end_to_end_fs() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(40, 30, Rgba([1, 2, 3, 255]))
            .save(dir.path().join("photo.png"))
            .unwrap();
        std::fs::write(dir.path().join("anim.gif"), media::gif_bytes(4, 16, 16)).unwrap();

        let sink = Arc::new(CountingSink::default());
        let mut viewer = Viewer::new(
            quick_config(),
            Arc::new(FsProvider),
            Arc::clone(&sink) as Arc<dyn DisplaySink>,
            Box::new(FixedPrompt(false)),
            Box::new(FsTrash),
        );
        viewer.set_folder(dir.path().to_str().unwrap()).unwrap();

        // Sorted listing: anim.gif first, photo.png second
        assert_eq!(viewer.item_count(), 2);
        assert!(viewer.current_id().unwrap().ends_with("anim.gif"));

        assert!(wait_for(
            || viewer.state() == ViewState::PlayingAnimated,
            Duration::from_secs(5)
        ));
        assert!(wait_for(|| sink.count() > 8, Duration::from_secs(5)), "gif not looping");

        viewer.next();
        assert!(viewer.current_id().unwrap().ends_with("photo.png"));
        assert!(wait_for(|| viewer.state() == ViewState::Idle, Duration::from_secs(5)));
        let settled = sink.count();
        sleep(Duration::from_millis(150));
        assert_eq!(sink.count(), settled, "cancelled playback still presenting");
    }
}
