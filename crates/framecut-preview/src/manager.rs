//! Preview manager: per-chunk render state for timeline pre-rendering.
//!
//! Chunks move `Dirty -> Pending` when handed to the render engine and
//! `Pending -> Rendered` only on a matching completion report. Any structural
//! change over a chunk sends it back to `Dirty`, whatever its state.
//! Chunks that were never part of a preview zone are not tracked at all.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use framecut_core::{FrameRange, RationalTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::{ChunkGrid, ChunkState};
use crate::config::PreviewConfig;
use crate::error::PreviewResult;
use crate::persist::{CacheDirProbe, ChunkProbe, PreviewProperties};
use crate::render::{CancelToken, RenderEvent, RenderRequest, RenderTicket};

/// State of the injected preview track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewTrack {
    #[default]
    Absent,
    Connected,
    /// Built but unplugged from the output.
    Disconnected,
}

pub struct PreviewManager {
    document_id: Uuid,
    config: PreviewConfig,
    grid: ChunkGrid,
    chunks: BTreeMap<i64, ChunkState>,
    /// Ticket of the outstanding request per pending chunk.
    tickets: HashMap<i64, RenderTicket>,
    next_ticket: u64,
    cancel: CancelToken,
    render_tx: Sender<RenderEvent>,
    render_rx: Receiver<RenderEvent>,
    working: Option<i64>,
    preview_track: PreviewTrack,
    overlay: bool,
    enabled: bool,
    last_render: Option<DateTime<Utc>>,
}

impl PreviewManager {
    pub fn new(document_id: Uuid, config: PreviewConfig) -> Self {
        let (render_tx, render_rx) = unbounded();
        Self {
            document_id,
            grid: ChunkGrid::new(config.chunk_size),
            config,
            chunks: BTreeMap::new(),
            tickets: HashMap::new(),
            next_ticket: 1,
            cancel: CancelToken::new(),
            render_tx,
            render_rx,
            working: None,
            preview_track: PreviewTrack::Absent,
            overlay: false,
            enabled: true,
            last_render: None,
        }
    }

    /// Create the document's cache directory.
    pub fn initialize(&self) -> PreviewResult<()> {
        std::fs::create_dir_all(self.cache_dir())?;
        debug!(dir = %self.cache_dir().display(), "preview cache ready");
        Ok(())
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn chunk_size(&self) -> i64 {
        self.grid.size()
    }

    /// `<cache_root>/<document id>`
    pub fn cache_dir(&self) -> PathBuf {
        self.config.cache_root.join(self.document_id.to_string())
    }

    pub fn cache_probe(&self) -> CacheDirProbe {
        CacheDirProbe {
            dir: self.cache_dir(),
            extension: self.config.extension.clone(),
        }
    }

    pub fn state(&self, chunk: i64) -> Option<ChunkState> {
        self.chunks.get(&chunk).copied()
    }

    fn chunks_in_state(&self, state: ChunkState) -> Vec<i64> {
        self.chunks
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn dirty_chunks(&self) -> Vec<i64> {
        self.chunks_in_state(ChunkState::Dirty)
    }

    pub fn rendered_chunks(&self) -> Vec<i64> {
        self.chunks_in_state(ChunkState::Rendered)
    }

    pub fn pending_chunks(&self) -> Vec<i64> {
        self.chunks_in_state(ChunkState::Pending)
    }

    /// Chunk the engine reported as currently rendering.
    pub fn working_preview(&self) -> Option<i64> {
        self.working
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn last_render(&self) -> Option<DateTime<Utc>> {
        self.last_render
    }

    // ── Invalidation ────────────────────────────────────────────

    /// A structural change touched `range`: every tracked chunk intersecting
    /// it becomes dirty. Returns how many chunks changed state.
    pub fn invalidate_range(&mut self, range: FrameRange) -> usize {
        let mut changed = 0;
        for chunk in self.grid.chunks_in(range) {
            if let Some(state) = self.chunks.get_mut(&chunk) {
                if *state != ChunkState::Dirty {
                    *state = ChunkState::Dirty;
                    changed += 1;
                }
                self.tickets.remove(&chunk);
                if self.working == Some(chunk) {
                    self.working = None;
                }
            }
        }
        if changed > 0 {
            debug!(%range, changed, "preview chunks invalidated");
        }
        changed
    }

    /// Add `zone` to the preview (every non-rendered chunk becomes dirty), or
    /// remove it (its chunks are forgotten).
    pub fn add_preview_range(&mut self, zone: FrameRange, add: bool) {
        for chunk in self.grid.chunks_in(zone) {
            if add {
                self.chunks.entry(chunk).or_insert(ChunkState::Dirty);
            } else {
                self.chunks.remove(&chunk);
                self.tickets.remove(&chunk);
            }
        }
        debug!(%zone, add, "preview zone updated");
    }

    /// Forget every chunk and stop rendering.
    pub fn clear_preview_range(&mut self) {
        self.abort_rendering();
        self.chunks.clear();
        self.tickets.clear();
        debug!("preview zones cleared");
    }

    // ── Rendering ───────────────────────────────────────────────

    /// Sender the render engine reports on.
    pub fn render_sender(&self) -> Sender<RenderEvent> {
        self.render_tx.clone()
    }

    /// Hand every dirty chunk to the engine.
    pub fn start_render(&mut self) -> Vec<RenderRequest> {
        if self.cancel.is_cancelled() {
            self.cancel = CancelToken::new();
        }
        let probe = self.cache_probe();
        let mut requests = Vec::new();
        for chunk in self.dirty_chunks() {
            let ticket = RenderTicket(self.next_ticket);
            self.next_ticket += 1;
            self.chunks.insert(chunk, ChunkState::Pending);
            self.tickets.insert(chunk, ticket);
            let range = self.grid.range_of(chunk);
            let rate = self.config.frame_rate;
            requests.push(RenderRequest {
                chunk,
                range,
                start: RationalTime::from_frames(range.start, rate),
                end: RationalTime::from_frames(range.end(), rate),
                ticket,
                output: probe.chunk_path(chunk),
                cancel: self.cancel.clone(),
            });
        }
        if !requests.is_empty() {
            info!(chunks = requests.len(), "preview render started");
        }
        requests
    }

    /// Apply every report received so far. Returns how many were applied
    /// (stale reports are dropped and not counted).
    pub fn process_render_events(&mut self) -> usize {
        let events: Vec<RenderEvent> = self.render_rx.try_iter().collect();
        events
            .into_iter()
            .filter(|event| self.apply_render_event(event))
            .count()
    }

    fn apply_render_event(&mut self, event: &RenderEvent) -> bool {
        let chunk = event.chunk();
        if self.tickets.get(&chunk) != Some(&event.ticket()) {
            debug!(chunk, ticket = event.ticket().0, "stale render report ignored");
            return false;
        }
        match event {
            RenderEvent::Started { .. } => {
                self.working = Some(chunk);
            }
            RenderEvent::Completed { .. } => {
                self.tickets.remove(&chunk);
                self.chunks.insert(chunk, ChunkState::Rendered);
                self.last_render = Some(Utc::now());
                if self.working == Some(chunk) {
                    self.working = None;
                }
                debug!(chunk, "preview chunk rendered");
            }
            RenderEvent::Failed { reason, .. } => {
                self.tickets.remove(&chunk);
                self.chunks.insert(chunk, ChunkState::Dirty);
                if self.working == Some(chunk) {
                    self.working = None;
                }
                warn!(chunk, %reason, "preview chunk render failed");
            }
        }
        true
    }

    /// Cancel in-flight renders; pending chunks go back to dirty.
    pub fn abort_rendering(&mut self) {
        self.cancel.cancel();
        let pending = self.pending_chunks();
        for chunk in &pending {
            self.chunks.insert(*chunk, ChunkState::Dirty);
        }
        self.tickets.clear();
        self.working = None;
        if !pending.is_empty() {
            info!(chunks = pending.len(), "preview render aborted");
        }
    }

    pub fn is_rendering(&self) -> bool {
        !self.tickets.is_empty()
    }

    // ── Preview and overlay tracks ──────────────────────────────

    /// Build the preview track. Returns `false` when one already exists.
    pub fn build_preview_track(&mut self) -> bool {
        if self.preview_track != PreviewTrack::Absent {
            return false;
        }
        self.preview_track = PreviewTrack::Connected;
        true
    }

    pub fn delete_preview_track(&mut self) {
        self.abort_rendering();
        self.preview_track = PreviewTrack::Absent;
    }

    pub fn disconnect_track(&mut self) {
        if self.preview_track == PreviewTrack::Connected {
            self.preview_track = PreviewTrack::Disconnected;
        }
    }

    pub fn reconnect_track(&mut self) {
        if self.preview_track == PreviewTrack::Disconnected {
            self.preview_track = PreviewTrack::Connected;
        }
    }

    pub fn preview_track(&self) -> PreviewTrack {
        self.preview_track
    }

    pub fn set_overlay_track(&mut self) {
        self.overlay = true;
    }

    pub fn remove_overlay_track(&mut self) {
        self.overlay = false;
    }

    pub fn has_overlay_track(&self) -> bool {
        self.overlay
    }

    /// Tracks this manager injected into the output, invisible to the user.
    pub fn added_tracks(&self) -> usize {
        usize::from(self.preview_track == PreviewTrack::Connected) + usize::from(self.overlay)
    }

    // ── Persistence ─────────────────────────────────────────────

    pub fn properties(&self) -> PreviewProperties {
        PreviewProperties {
            rendered: self.rendered_chunks(),
            // Pending work is lost with the session; store it as dirty.
            dirty: self
                .chunks
                .iter()
                .filter(|(_, s)| **s != ChunkState::Rendered)
                .map(|(c, _)| *c)
                .collect(),
            enabled: self.enabled,
            last_render: self.last_render,
        }
    }

    /// Replace all chunk state.
    ///
    /// Rendered chunks whose file is missing, or newer than `document_date`,
    /// are loaded as dirty. Without a document date every existing file is
    /// trusted.
    pub fn load_chunks(
        &mut self,
        rendered: &[i64],
        dirty: &[i64],
        document_date: Option<DateTime<Utc>>,
        probe: &dyn ChunkProbe,
    ) {
        self.abort_rendering();
        self.chunks.clear();
        let mut stale = 0;
        for chunk in rendered {
            let usable = match probe.modified(*chunk) {
                None => false,
                Some(modified) => document_date.map_or(true, |date| modified <= date),
            };
            let state = if usable {
                ChunkState::Rendered
            } else {
                stale += 1;
                ChunkState::Dirty
            };
            self.chunks.insert(*chunk, state);
        }
        for chunk in dirty {
            self.chunks.insert(*chunk, ChunkState::Dirty);
        }
        self.last_render = document_date;
        debug!(
            rendered = rendered.len(),
            dirty = dirty.len(),
            stale,
            "preview chunks loaded"
        );
    }

    /// Restore from stored properties using the given probe.
    pub fn load_properties(&mut self, props: &PreviewProperties, probe: &dyn ChunkProbe) {
        self.enabled = props.enabled;
        self.load_chunks(&props.rendered, &props.dirty, props.last_render, probe);
    }
}
