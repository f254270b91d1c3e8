//! Gateway shared state.

use std::sync::Arc;

use tokio::sync::Mutex;

use pixelhub_core::canvas::Canvas;
use pixelhub_core::config::Config;

use crate::hub::{HubHandle, spawn_hub};
use crate::selections::SelectionStore;

/// Shared state accessible from all handlers. The canvas mutex is held only
/// around a single `set` or `snapshot` call, never across I/O; the hub is
/// the sole component that mutates the grid.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub canvas: Arc<Mutex<Canvas>>,
    pub hub: HubHandle,
    pub selections: SelectionStore,
}

impl GatewayState {
    /// Build state from config and spawn the hub task. Must run inside a
    /// tokio runtime.
    pub fn new(config: Arc<Config>) -> Self {
        let (width, height) = config.canvas_size();
        let canvas = Arc::new(Mutex::new(Canvas::new(width, height)));
        let hub = spawn_hub(canvas.clone(), config.pool_slots(), config.queue_depth());
        let selections = SelectionStore::new(config.selections_path());
        Self {
            config,
            canvas,
            hub,
            selections,
        }
    }
}
