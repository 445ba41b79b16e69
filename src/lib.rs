mod capture;
mod diagnostics;
mod pipeline;
mod settings;
mod tray;

use std::sync::Arc;

use tauri::{Emitter, Manager, RunEvent, WindowEvent};

use capture::backend::CaptureBackend;
use capture::commands::{list_windows, CaptureState};
use pipeline::commands::{
    get_diagnostics, get_frame, get_snapshot, refresh_now, OverlayState,
};
use pipeline::session::{
    crossed_missing_threshold, FramePayload, OverlaySession, TickCallback, WindowMissingPayload,
};
use pipeline::surface::DisplaySurface;
use pipeline::tick::TickOutcome;
use settings::commands::{get_config, reset_config, update_config, SettingsState};
use settings::store::{SettingsStore, SETTINGS_FILE_NAME};

/// Event carrying the sequence of a newly published overlay frame.
const EVENT_FRAME: &str = "overlay-frame";
/// Event raised once the target window has been missing for a while.
const EVENT_WINDOW_MISSING: &str = "overlay-window-missing";

/// Create the capture backend for the current platform.
///
/// When `DUMMY_WINDOW=1` is set, a simulated target window is used instead.
fn create_capture_backend() -> Arc<dyn CaptureBackend> {
    if capture::dummy::DummyBackend::is_enabled() {
        tracing::info!("DUMMY_WINDOW set, capturing the simulated window");
        return Arc::new(capture::dummy::DummyBackend::new());
    }

    #[cfg(target_os = "windows")]
    {
        Arc::new(capture::platform::Win32Backend::new())
    }

    #[cfg(not(target_os = "windows"))]
    {
        Arc::new(NullBackend)
    }
}

/// Backend used on platforms without native window capture.
#[cfg(not(target_os = "windows"))]
struct NullBackend;

#[cfg(not(target_os = "windows"))]
impl capture::backend::WindowLocator for NullBackend {
    fn enumerate_windows(&self) -> capture::error::Result<Vec<capture::types::WindowInfo>> {
        Ok(vec![])
    }
}

#[cfg(not(target_os = "windows"))]
impl capture::backend::FrameGrabber for NullBackend {
    fn grab(
        &self,
        _handle: capture::types::WindowHandle,
    ) -> capture::error::Result<capture::types::PixelBuffer> {
        Err(capture::error::CaptureError::CaptureFailed(
            "window capture is not supported on this platform".to_string(),
        ))
    }
}

/// Forward tick results to the overlay webview.
fn frame_events(app: tauri::AppHandle, store: Arc<SettingsStore>) -> TickCallback {
    Arc::new(move |outcome, streak| {
        if let TickOutcome::Published { sequence, frame } = outcome {
            let payload = FramePayload {
                sequence: *sequence,
                width: frame.width,
                height: frame.height,
            };
            if let Err(e) = app.emit(EVENT_FRAME, payload) {
                tracing::debug!("Failed to emit {EVENT_FRAME}: {e}");
            }
        } else if crossed_missing_threshold(streak) {
            let window_title = store.get().window_settings.title;
            tracing::warn!("target window {window_title:?} missing for {streak} ticks");
            let payload = WindowMissingPayload {
                window_title,
                consecutive_misses: streak,
            };
            if let Err(e) = app.emit(EVENT_WINDOW_MISSING, payload) {
                tracing::debug!("Failed to emit {EVENT_WINDOW_MISSING}: {e}");
            }
        }
    })
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let backend = create_capture_backend();

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.show();
                let _ = window.set_focus();
            }
        }))
        .manage(CaptureState {
            backend: Arc::clone(&backend),
        })
        .manage(OverlayState::new(Arc::new(DisplaySurface::new(0, 0))))
        .invoke_handler(tauri::generate_handler![
            list_windows,
            get_frame,
            get_snapshot,
            get_diagnostics,
            refresh_now,
            get_config,
            update_config,
            reset_config,
        ])
        .setup(move |app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::new()
                        .targets([
                            tauri_plugin_log::Target::new(tauri_plugin_log::TargetKind::Stdout),
                            tauri_plugin_log::Target::new(tauri_plugin_log::TargetKind::Webview),
                            tauri_plugin_log::Target::new(tauri_plugin_log::TargetKind::LogDir {
                                file_name: None,
                            }),
                        ])
                        .level(log::LevelFilter::Debug)
                        .build(),
                )?;
            }

            // Initialise settings persistence
            let settings_path = app.path().app_data_dir()?.join(SETTINGS_FILE_NAME);
            let store = Arc::new(SettingsStore::new(settings_path));
            tracing::info!("settings loaded from {}", store.path().display());
            store.start_debounce_task();
            app.manage(SettingsState {
                store: Arc::clone(&store),
            });

            // Start the capture loop against the saved config
            let config = store.get();
            settings::commands::apply_window_geometry(app.handle(), &config);
            let overlay = app.state::<OverlayState>();
            if let Some(window) = app.get_webview_window("main") {
                let size = window.inner_size()?;
                overlay.surface.resize(size.width, size.height);
            }
            let session = OverlaySession::start(
                Arc::clone(&backend),
                Arc::clone(&overlay.surface),
                config.to_pipeline(),
                Some(frame_events(app.handle().clone(), Arc::clone(&store))),
            )?;
            *overlay.session.lock() = Some(Arc::new(session));

            tray::setup_tray(app.handle())?;

            Ok(())
        })
        .on_window_event(|window, event| {
            // Only the overlay drives the surface; the settings window closes normally.
            if window.label() != "main" {
                return;
            }
            match event {
                WindowEvent::Resized(size) => {
                    if let Some(overlay) = window.try_state::<OverlayState>() {
                        overlay.surface.resize(size.width, size.height);
                    }
                }
                WindowEvent::CloseRequested { api, .. } => {
                    // Hide to tray instead of quitting.
                    api.prevent_close();
                    let _ = window.hide();
                }
                _ => {}
            }
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app, event| {
        if let RunEvent::Exit = event {
            if let Some(overlay) = app.try_state::<OverlayState>() {
                let session = overlay.session.lock().take();
                if let Some(session) = session {
                    session.stop();
                }
            }
            if let Some(settings) = app.try_state::<SettingsState>() {
                if let Err(e) = settings.store.flush() {
                    tracing::warn!("Failed to save settings on exit: {e}");
                }
            }
        }
    });
}
