//! Timeline preview wiring.
//!
//! The controller creates the [`PreviewManager`] lazily, keeps the model's
//! count of injected tracks in step with it and maps preview state to and
//! from document properties.

use std::collections::BTreeMap;

use crossbeam_channel::Sender;
use framecut_preview::{PreviewManager, PreviewProperties, PreviewResult, RenderEvent, RenderRequest};
use tracing::{debug, info, warn};

use crate::controller::TimelineController;

impl TimelineController {
    fn sync_overlay_tracks(&mut self) {
        let added = self.preview.as_ref().map_or(0, PreviewManager::added_tracks);
        self.model.set_overlay_track_count(added);
    }

    /// Create the preview manager and its cache directory. Returns `false`
    /// when the cache cannot be prepared.
    pub fn initialize_preview(&mut self) -> bool {
        if self.preview.is_some() {
            return true;
        }
        let mut config = self.settings.preview.clone();
        config.frame_rate = self.model.frame_rate();
        let preview = PreviewManager::new(self.document_id, config);
        match preview.initialize() {
            Ok(()) => {
                info!(document = %self.document_id, "timeline preview initialized");
                self.preview = Some(preview);
                true
            }
            Err(err) => {
                warn!(%err, "cannot initialize timeline preview");
                self.message(format!("Cannot initialize timeline preview: {err}"));
                false
            }
        }
    }

    pub fn preview(&self) -> Option<&PreviewManager> {
        self.preview.as_ref()
    }

    pub fn is_preview_disabled(&self) -> bool {
        self.preview.as_ref().is_some_and(|p| !p.is_enabled())
    }

    /// Plug in the preview track and hand every dirty chunk to the render
    /// engine.
    pub fn start_preview_render(&mut self) -> Vec<RenderRequest> {
        if self.preview.is_none() {
            if !self.initialize_preview() {
                return Vec::new();
            }
        } else if self.is_preview_disabled() {
            self.disable_preview(false);
        }
        let Some(preview) = self.preview.as_mut() else {
            return Vec::new();
        };
        if !self.use_preview {
            preview.build_preview_track();
            self.use_preview = true;
            debug!("preview track connected");
        }
        let requests = preview.start_render();
        self.sync_overlay_tracks();
        requests
    }

    /// Channel the render engine reports on.
    pub fn preview_render_sender(&self) -> Option<Sender<RenderEvent>> {
        self.preview.as_ref().map(PreviewManager::render_sender)
    }

    /// Apply render reports received so far.
    pub fn process_preview_events(&mut self) -> usize {
        self.preview
            .as_mut()
            .map_or(0, PreviewManager::process_render_events)
    }

    pub fn stop_preview_render(&mut self) {
        if let Some(preview) = self.preview.as_mut() {
            preview.abort_rendering();
        }
    }

    /// Unplug (or plug back) the preview track. Chunk state is kept.
    pub fn disable_preview(&mut self, disable: bool) {
        let Some(preview) = self.preview.as_mut() else {
            return;
        };
        if disable {
            preview.delete_preview_track();
            self.use_preview = false;
        } else if !self.use_preview {
            if !preview.build_preview_track() {
                preview.reconnect_track();
            }
            self.use_preview = true;
        }
        preview.set_enabled(!disable);
        self.sync_overlay_tracks();
    }

    /// Add the current zone to the preview, or take it out.
    pub fn add_preview_range(&mut self, add: bool) {
        let zone = self.zone;
        if zone.is_empty() {
            return;
        }
        if let Some(preview) = self.preview.as_mut() {
            preview.add_preview_range(zone, add);
        }
    }

    pub fn clear_preview_range(&mut self) {
        if let Some(preview) = self.preview.as_mut() {
            preview.clear_preview_range();
        }
    }

    pub fn dirty_chunks(&self) -> Vec<i64> {
        self.preview
            .as_ref()
            .map_or_else(Vec::new, PreviewManager::dirty_chunks)
    }

    pub fn rendered_chunks(&self) -> Vec<i64> {
        self.preview
            .as_ref()
            .map_or_else(Vec::new, PreviewManager::rendered_chunks)
    }

    pub fn working_preview(&self) -> Option<i64> {
        self.preview.as_ref().and_then(PreviewManager::working_preview)
    }

    /// Restore stored preview state, checking chunk files in the cache.
    pub fn load_preview(&mut self, props: &PreviewProperties) {
        if !self.initialize_preview() {
            return;
        }
        let Some(preview) = self.preview.as_mut() else {
            return;
        };
        if props.enabled && !self.use_preview {
            preview.build_preview_track();
            self.use_preview = true;
        }
        let probe = preview.cache_probe();
        preview.load_properties(props, &probe);
        self.sync_overlay_tracks();
    }

    pub fn load_document_properties(&mut self, props: &BTreeMap<String, String>) -> PreviewResult<()> {
        let props = PreviewProperties::from_document_properties(props)?;
        self.load_preview(&props);
        Ok(())
    }

    /// Preview state as document properties.
    pub fn document_properties(&self) -> BTreeMap<String, String> {
        match &self.preview {
            Some(preview) => preview.properties().to_document_properties(),
            None => PreviewProperties {
                enabled: true,
                ..PreviewProperties::default()
            }
            .to_document_properties(),
        }
    }

    /// Show the current clip with and without its effects side by side.
    pub fn create_split_overlay(&mut self) -> bool {
        if self.preview.as_ref().is_some_and(PreviewManager::has_overlay_track) {
            return true;
        }
        let Some(id) = self.current_item().filter(|id| self.model.is_clip(*id)) else {
            self.message("Select a clip to compare effect");
            return false;
        };
        if !self.initialize_preview() {
            return false;
        }
        if let Some(preview) = self.preview.as_mut() {
            preview.set_overlay_track();
        }
        self.sync_overlay_tracks();
        debug!(%id, "split overlay created");
        true
    }

    pub fn remove_split_overlay(&mut self) {
        let Some(preview) = self.preview.as_mut() else {
            return;
        };
        if !preview.has_overlay_track() {
            return;
        }
        preview.remove_overlay_track();
        self.sync_overlay_tracks();
    }
}
