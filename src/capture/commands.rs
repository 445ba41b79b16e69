use std::sync::Arc;

use tauri::State;

use crate::capture::backend::CaptureBackend;
use crate::capture::types::WindowInfo;

/// Shared capture source managed by Tauri.
pub struct CaptureState {
    pub backend: Arc<dyn CaptureBackend>,
}

/// Keep windows a user could pick: visible and titled. Sorted by title so
/// the settings dropdown is stable between refreshes.
fn pickable_windows(mut windows: Vec<WindowInfo>) -> Vec<WindowInfo> {
    windows.retain(|w| w.is_visible && !w.title.trim().is_empty());
    windows.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
    windows
}

/// List visible top-level windows the overlay can mirror.
#[tauri::command]
pub async fn list_windows(state: State<'_, CaptureState>) -> Result<Vec<WindowInfo>, String> {
    state
        .backend
        .enumerate_windows()
        .map(pickable_windows)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::WindowHandle;

    fn window(raw: isize, title: &str, is_visible: bool) -> WindowInfo {
        WindowInfo {
            handle: WindowHandle::from_raw(raw),
            title: title.to_string(),
            is_visible,
        }
    }

    #[test]
    fn pickable_windows_drops_hidden_and_untitled() {
        let windows = pickable_windows(vec![
            window(1, "Editor", true),
            window(2, "", true),
            window(3, "   ", true),
            window(4, "Hidden Tool", false),
        ]);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].title, "Editor");
    }

    #[test]
    fn pickable_windows_sorts_case_insensitively() {
        let windows = pickable_windows(vec![
            window(1, "zoom", true),
            window(2, "Browser", true),
            window(3, "apps", true),
        ]);
        let titles: Vec<&str> = windows.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(titles, vec!["apps", "Browser", "zoom"]);
    }

    #[test]
    fn pickable_windows_of_empty_list_is_empty() {
        assert!(pickable_windows(vec![]).is_empty());
    }
}
