use std::sync::Arc;

use parking_lot::Mutex;
use tauri::ipc::Response;
use tauri::State;

use super::compress;
use super::session::OverlaySession;
use super::surface::DisplaySurface;
use super::tick::TickSummary;
use crate::capture::types::PixelBuffer;
use crate::diagnostics::stats::DiagnosticSnapshot;

/// Size of the preview image served to the settings form.
const SNAPSHOT_MAX_WIDTH: u32 = 320;
const SNAPSHOT_MAX_HEIGHT: u32 = 180;

/// Managed state holding the display surface and the running session.
///
/// The surface exists from startup; the session is attached once the
/// settings store has been loaded.
pub struct OverlayState {
    pub surface: Arc<DisplaySurface>,
    pub session: Mutex<Option<Arc<OverlaySession>>>,
}

impl OverlayState {
    pub fn new(surface: Arc<DisplaySurface>) -> Self {
        Self {
            surface,
            session: Mutex::new(None),
        }
    }

    /// The running session, if any. The state lock is released on return,
    /// so callers may tick or stop the session without blocking others.
    pub fn session(&self) -> Option<Arc<OverlaySession>> {
        self.session.lock().clone()
    }
}

/// Frame wire format: little-endian `u32` width and height, then RGBA rows.
pub fn encode_frame_message(frame: &PixelBuffer) -> Vec<u8> {
    let mut message = Vec::with_capacity(8 + frame.data.len());
    message.extend_from_slice(&frame.width.to_le_bytes());
    message.extend_from_slice(&frame.height.to_le_bytes());
    message.extend_from_slice(&frame.data);
    message
}

/// Get the latest overlay frame as raw bytes (see [`encode_frame_message`]).
#[tauri::command]
pub async fn get_frame(state: State<'_, OverlayState>) -> Result<Response, String> {
    let frame = state
        .surface
        .latest()
        .ok_or_else(|| "no frame available".to_string())?;
    Ok(Response::new(encode_frame_message(&frame)))
}

/// Get a small PNG of the latest frame as base64, for the settings preview.
#[tauri::command]
pub async fn get_snapshot(state: State<'_, OverlayState>) -> Result<String, String> {
    let frame = state
        .surface
        .latest()
        .ok_or_else(|| "no frame available".to_string())?;

    let png = compress::compress_thumbnail(&frame, SNAPSHOT_MAX_WIDTH, SNAPSHOT_MAX_HEIGHT)
        .map_err(|e| e.to_string())?;
    Ok(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        &png,
    ))
}

/// Get diagnostic stats for the running session.
#[tauri::command]
pub async fn get_diagnostics(
    state: State<'_, OverlayState>,
) -> Result<DiagnosticSnapshot, String> {
    let session = state
        .session()
        .ok_or_else(|| "overlay session is not running".to_string())?;
    Ok(session.diagnostics())
}

/// Run one tick immediately instead of waiting for the timer.
///
/// The tick may block on a stuck grab for up to the capture timeout, so it
/// runs on the blocking pool.
#[tauri::command]
pub async fn refresh_now(state: State<'_, OverlayState>) -> Result<TickSummary, String> {
    let session = state
        .session()
        .ok_or_else(|| "overlay session is not running".to_string())?;
    tauri::async_runtime::spawn_blocking(move || session.tick_now().summary())
        .await
        .map_err(|e| e.to_string())
}
