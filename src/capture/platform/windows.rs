use tracing::{debug, trace};
use windows::core::BOOL;
use windows::Win32::Foundation::{HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits, GetWindowDC,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC,
    HGDIOBJ,
};
use windows::Win32::Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, IsWindow, IsWindowVisible,
};

use crate::capture::backend::{FrameGrabber, WindowLocator};
use crate::capture::error::{CaptureError, Result};
use crate::capture::platform::capture_size;
use crate::capture::types::{PixelBuffer, PixelFormat, WindowHandle, WindowInfo};

/// `PW_CLIENTONLY | PW_RENDERFULLCONTENT`.
///
/// PW_RENDERFULLCONTENT makes DWM render hardware-accelerated and occluded
/// windows. The client-only bit keeps the framing the overlay has always
/// shown: client content drawn at the origin of a window-sized bitmap.
const PRINT_FLAGS: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(3);

/// Windows capture backend using `EnumWindows` + GDI `PrintWindow`.
pub struct Win32Backend;

impl Win32Backend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Win32Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowLocator for Win32Backend {
    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut windows: Vec<WindowInfo> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut windows as *mut Vec<WindowInfo> as isize),
            )
        }
        .map_err(|e| CaptureError::Enumeration(format!("EnumWindows failed: {e}")))?;
        trace!("enumerated {} top-level windows", windows.len());
        Ok(windows)
    }
}

impl FrameGrabber for Win32Backend {
    fn grab(&self, handle: WindowHandle) -> Result<PixelBuffer> {
        let hwnd = HWND(handle.as_raw() as *mut core::ffi::c_void);
        unsafe { grab_window(hwnd) }
    }
}

/// `EnumWindows` callback. Appends each window to the `Vec` behind `lparam`.
unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<WindowInfo>);
    windows.push(WindowInfo {
        handle: WindowHandle::from_raw(hwnd.0 as isize),
        title: read_window_title(hwnd),
        is_visible: IsWindowVisible(hwnd).as_bool(),
    });
    BOOL(1)
}

unsafe fn read_window_title(hwnd: HWND) -> String {
    let len = GetWindowTextLengthW(hwnd);
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u16; len as usize + 1];
    let copied = GetWindowTextW(hwnd, &mut buf);
    String::from_utf16_lossy(&buf[..copied.max(0) as usize])
}

/// Capture one frame of `hwnd` as top-down BGRA.
///
/// # Safety
/// Calls GDI. Every handle acquired here is owned by a guard, so all of them
/// are released on every return path.
unsafe fn grab_window(hwnd: HWND) -> Result<PixelBuffer> {
    if !IsWindow(Some(hwnd)).as_bool() {
        return Err(CaptureError::CaptureFailed(
            "window handle is no longer valid".to_string(),
        ));
    }

    let mut rect = RECT::default();
    GetWindowRect(hwnd, &mut rect)
        .map_err(|e| CaptureError::CaptureFailed(format!("GetWindowRect failed: {e}")))?;
    let (width, height) = capture_size(rect.left, rect.top, rect.right, rect.bottom)?;

    let window_dc = WindowDc::acquire(hwnd)?;
    let memory_dc = MemoryDc::compatible_with(window_dc.hdc)?;
    let bitmap = Bitmap::compatible_with(window_dc.hdc, width as i32, height as i32)?;

    let selection = Selection::select(memory_dc.0, bitmap.0.into())?;
    let rendered = PrintWindow(hwnd, memory_dc.0, PRINT_FLAGS).as_bool();
    // GetDIBits requires the bitmap to be deselected first.
    drop(selection);

    if !rendered {
        return Err(CaptureError::CaptureFailed(
            "PrintWindow reported failure".to_string(),
        ));
    }

    let data = read_bitmap_bgra(memory_dc.0, bitmap.0, width, height)?;
    debug!("captured {width}x{height} from window {:?}", hwnd.0);
    PixelBuffer::new(width, height, PixelFormat::Bgra, data)
}

/// Copy a bitmap's pixels out as 32-bit top-down BGRA.
unsafe fn read_bitmap_bgra(hdc: HDC, bitmap: HBITMAP, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            biHeight: -(height as i32), // Negative for top-down rows
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut data = vec![0u8; width as usize * height as usize * 4];
    let lines = GetDIBits(
        hdc,
        bitmap,
        0,
        height,
        Some(data.as_mut_ptr().cast()),
        &mut info,
        DIB_RGB_COLORS,
    );
    if lines != height as i32 {
        return Err(CaptureError::CaptureFailed(format!(
            "GetDIBits copied {lines} of {height} scanlines"
        )));
    }
    Ok(data)
}

// --- GDI resource guards ---

/// Window device context from `GetWindowDC`, released with `ReleaseDC`.
struct WindowDc {
    hwnd: HWND,
    hdc: HDC,
}

impl WindowDc {
    unsafe fn acquire(hwnd: HWND) -> Result<Self> {
        let hdc = GetWindowDC(Some(hwnd));
        if hdc.is_invalid() {
            return Err(CaptureError::CaptureFailed(
                "GetWindowDC returned null".to_string(),
            ));
        }
        Ok(Self { hwnd, hdc })
    }
}

impl Drop for WindowDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(Some(self.hwnd), self.hdc);
        }
    }
}

/// Off-screen memory DC, deleted with `DeleteDC`.
struct MemoryDc(HDC);

impl MemoryDc {
    unsafe fn compatible_with(hdc: HDC) -> Result<Self> {
        let memory = CreateCompatibleDC(Some(hdc));
        if memory.is_invalid() {
            return Err(CaptureError::CaptureFailed(
                "CreateCompatibleDC failed".to_string(),
            ));
        }
        Ok(Self(memory))
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

/// Device-dependent bitmap, deleted with `DeleteObject`.
struct Bitmap(HBITMAP);

impl Bitmap {
    unsafe fn compatible_with(hdc: HDC, width: i32, height: i32) -> Result<Self> {
        let bitmap = CreateCompatibleBitmap(hdc, width, height);
        if bitmap.is_invalid() {
            return Err(CaptureError::CaptureFailed(format!(
                "CreateCompatibleBitmap({width}x{height}) failed"
            )));
        }
        Ok(Self(bitmap))
    }
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.0.into());
        }
    }
}

/// An object selected into a DC; restores the previous object on drop.
struct Selection {
    hdc: HDC,
    previous: HGDIOBJ,
}

impl Selection {
    unsafe fn select(hdc: HDC, object: HGDIOBJ) -> Result<Self> {
        let previous = SelectObject(hdc, object);
        if previous.is_invalid() {
            return Err(CaptureError::CaptureFailed(
                "SelectObject failed".to_string(),
            ));
        }
        Ok(Self { hdc, previous })
    }
}

impl Drop for Selection {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.hdc, self.previous);
        }
    }
}
