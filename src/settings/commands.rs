use std::sync::Arc;

use tauri::{AppHandle, LogicalPosition, LogicalSize, Manager, State};

use crate::pipeline::commands::OverlayState;
use crate::settings::error::Result;
use crate::settings::store::SettingsStore;
use crate::settings::types::OverlayConfig;

/// Tauri-managed state wrapping the settings store.
pub struct SettingsState {
    pub store: Arc<SettingsStore>,
}

/// Store a config and push it into the running overlay.
///
/// Nothing is applied if validation fails. The surface is left alone: it
/// follows the window's physical size once the new geometry lands.
pub fn apply_config(
    store: &SettingsStore,
    overlay: &OverlayState,
    config: &OverlayConfig,
) -> Result<()> {
    store.set(config.clone())?;

    if let Some(session) = overlay.session() {
        session.update_config(config.to_pipeline());
    }
    Ok(())
}

/// Move and resize the overlay window to match `config`.
pub fn apply_window_geometry(app: &AppHandle, config: &OverlayConfig) {
    let Some(window) = app.get_webview_window("main") else {
        tracing::warn!("overlay window not found; geometry not applied");
        return;
    };
    let settings = &config.window_settings;
    if let Err(e) = window.set_size(LogicalSize::new(
        settings.size.width,
        settings.size.height,
    )) {
        tracing::warn!("Failed to resize overlay window: {e}");
    }
    if let Err(e) = window.set_position(LogicalPosition::new(
        settings.position.x,
        settings.position.y,
    )) {
        tracing::warn!("Failed to move overlay window: {e}");
    }
}

/// Get the current overlay configuration.
#[tauri::command]
pub async fn get_config(settings_state: State<'_, SettingsState>) -> std::result::Result<OverlayConfig, String> {
    Ok(settings_state.store.get())
}

/// Validate, persist, and apply a new configuration.
#[tauri::command]
pub async fn update_config(
    app: AppHandle,
    settings_state: State<'_, SettingsState>,
    overlay_state: State<'_, OverlayState>,
    config: OverlayConfig,
) -> std::result::Result<OverlayConfig, String> {
    apply_config(&settings_state.store, &overlay_state, &config).map_err(|e| e.to_string())?;
    apply_window_geometry(&app, &config);
    Ok(config)
}

/// Restore and apply the default configuration.
#[tauri::command]
pub async fn reset_config(
    app: AppHandle,
    settings_state: State<'_, SettingsState>,
    overlay_state: State<'_, OverlayState>,
) -> std::result::Result<OverlayConfig, String> {
    let defaults = settings_state.store.reset();
    apply_config(&settings_state.store, &overlay_state, &defaults).map_err(|e| e.to_string())?;
    apply_window_geometry(&app, &defaults);
    Ok(defaults)
}
