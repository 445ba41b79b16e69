use tauri::menu::{MenuBuilder, MenuItemBuilder};
use tauri::tray::TrayIconBuilder;
use tauri::webview::WebviewWindowBuilder;
use tauri::{AppHandle, Manager};

/// Identifiers for tray menu items.
const MENU_ID_SHOW_HIDE: &str = "show-hide";
const MENU_ID_SETTINGS: &str = "settings";
const MENU_ID_QUIT: &str = "quit";

/// Menu items in display order: (id, label).
const MENU_ITEMS: [(&str, &str); 3] = [
    (MENU_ID_SHOW_HIDE, "Show/Hide Overlay"),
    (MENU_ID_SETTINGS, "Settings"),
    (MENU_ID_QUIT, "Exit"),
];

/// What a tray menu click should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrayAction {
    ToggleOverlay,
    OpenSettings,
    Quit,
}

fn action_for(id: &str) -> Option<TrayAction> {
    match id {
        MENU_ID_SHOW_HIDE => Some(TrayAction::ToggleOverlay),
        MENU_ID_SETTINGS => Some(TrayAction::OpenSettings),
        MENU_ID_QUIT => Some(TrayAction::Quit),
        _ => None,
    }
}

/// Toggle overlay visibility: show if hidden, hide if visible.
fn toggle_overlay(app: &AppHandle) {
    let Some(window) = app.get_webview_window("main") else {
        return;
    };
    if window.is_visible().unwrap_or(false) {
        let _ = window.hide();
    } else {
        let _ = window.show();
        let _ = window.unminimize();
    }
}

/// Open the settings window, or focus it if already open.
pub fn open_settings_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window("settings") {
        let _ = window.set_focus();
        return;
    }

    let builder = WebviewWindowBuilder::new(
        app,
        "settings",
        tauri::WebviewUrl::App("index.html#settings".into()),
    )
    .title("Chroma Overlay Settings")
    .inner_size(420.0, 560.0)
    .resizable(true)
    .center();

    if let Err(e) = builder.build() {
        tracing::error!("Failed to open settings window: {e}");
    }
}

/// Build and register the system tray for the application.
pub fn setup_tray(app: &AppHandle) -> tauri::Result<()> {
    let items = MENU_ITEMS
        .iter()
        .map(|(id, label)| MenuItemBuilder::with_id(*id, *label).build(app))
        .collect::<tauri::Result<Vec<_>>>()?;
    let mut menu = MenuBuilder::new(app);
    for item in &items {
        menu = menu.item(item);
    }
    let menu = menu.build()?;

    let mut tray = TrayIconBuilder::new()
        .tooltip("Chroma Overlay")
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_menu_event(move |app, event| match action_for(event.id().as_ref()) {
            Some(TrayAction::ToggleOverlay) => toggle_overlay(app),
            Some(TrayAction::OpenSettings) => open_settings_window(app),
            Some(TrayAction::Quit) => app.exit(0),
            None => {}
        })
        .on_tray_icon_event(|tray, event| {
            if let tauri::tray::TrayIconEvent::Click {
                button: tauri::tray::MouseButton::Left,
                button_state: tauri::tray::MouseButtonState::Up,
                ..
            } = event
            {
                toggle_overlay(tray.app_handle());
            }
        });
    if let Some(icon) = app.default_window_icon().cloned() {
        tray = tray.icon(icon);
    }
    tray.build(app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_items_have_expected_ids_and_labels() {
        assert_eq!(MENU_ITEMS.len(), 3);
        assert_eq!(MENU_ITEMS[0], (MENU_ID_SHOW_HIDE, "Show/Hide Overlay"));
        assert_eq!(MENU_ITEMS[1], (MENU_ID_SETTINGS, "Settings"));
        assert_eq!(MENU_ITEMS[2], (MENU_ID_QUIT, "Exit"));
    }

    #[test]
    fn every_menu_item_maps_to_an_action() {
        for (id, _) in MENU_ITEMS {
            assert!(action_for(id).is_some(), "no action for {id}");
        }
    }

    #[test]
    fn menu_ids_map_to_matching_actions() {
        assert_eq!(action_for("show-hide"), Some(TrayAction::ToggleOverlay));
        assert_eq!(action_for("settings"), Some(TrayAction::OpenSettings));
        assert_eq!(action_for("quit"), Some(TrayAction::Quit));
    }

    #[test]
    fn unknown_menu_id_is_ignored() {
        assert_eq!(action_for("app-settings"), None);
        assert_eq!(action_for(""), None);
    }
}
