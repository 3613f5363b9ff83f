//! Top-level window enumeration and activation.

use tracing::debug;

use super::ActionError;

/// Opaque native window handle.
pub type WindowId = isize;

/// A visible top-level window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub minimized: bool,
}

pub trait WindowSystem: Send + Sync {
    /// Visible top-level windows with a non-empty title, in z-order.
    fn windows(&self) -> Result<Vec<WindowInfo>, ActionError>;

    fn restore(&self, id: WindowId) -> Result<(), ActionError>;

    fn activate(&self, id: WindowId) -> Result<(), ActionError>;
}

/// First window whose title contains `query`, compared case-insensitively.
pub fn find_window<'a>(windows: &'a [WindowInfo], query: &str) -> Option<&'a WindowInfo> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    windows
        .iter()
        .find(|w| w.title.to_lowercase().contains(&needle))
}

/// Window system for platforms without window control; sees no windows.
#[derive(Debug, Default)]
pub struct NoopWindows;

impl WindowSystem for NoopWindows {
    fn windows(&self) -> Result<Vec<WindowInfo>, ActionError> {
        debug!("Window enumeration not supported on this platform");
        Ok(Vec::new())
    }

    fn restore(&self, _id: WindowId) -> Result<(), ActionError> {
        Ok(())
    }

    fn activate(&self, _id: WindowId) -> Result<(), ActionError> {
        Ok(())
    }
}

#[cfg(target_os = "windows")]
pub fn native_windows() -> Box<dyn WindowSystem> {
    Box::new(NativeWindows)
}

#[cfg(not(target_os = "windows"))]
pub fn native_windows() -> Box<dyn WindowSystem> {
    Box::new(NoopWindows)
}

#[cfg(target_os = "windows")]
pub use native::NativeWindows;

#[cfg(target_os = "windows")]
mod native {
    use windows::core::BOOL;
    use windows::Win32::Foundation::{HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextW, IsIconic, IsWindowVisible, SetForegroundWindow, ShowWindow,
        SW_RESTORE,
    };

    use super::{ActionError, WindowId, WindowInfo, WindowSystem};

    /// Win32 window control through `EnumWindows`.
    #[derive(Debug, Default)]
    pub struct NativeWindows;

    unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let handles = &mut *(lparam.0 as *mut Vec<isize>);
        handles.push(hwnd.0 as isize);
        BOOL(1)
    }

    impl WindowSystem for NativeWindows {
        fn windows(&self) -> Result<Vec<WindowInfo>, ActionError> {
            let mut handles: Vec<isize> = Vec::new();
            // SAFETY: the callback only runs during this call, while `handles` is alive.
            unsafe {
                EnumWindows(
                    Some(collect_window),
                    LPARAM(&mut handles as *mut Vec<isize> as isize),
                )
            }
            .map_err(|e| ActionError::Window(e.to_string()))?;

            let mut windows = Vec::new();
            for raw in handles {
                let hwnd = HWND(raw as *mut _);
                // SAFETY: read-only queries on handles EnumWindows just gave us.
                unsafe {
                    if !IsWindowVisible(hwnd).as_bool() {
                        continue;
                    }
                    let mut buf = [0u16; 512];
                    let len = GetWindowTextW(hwnd, &mut buf);
                    if len <= 0 {
                        continue;
                    }
                    windows.push(WindowInfo {
                        id: raw,
                        title: String::from_utf16_lossy(&buf[..len as usize]),
                        minimized: IsIconic(hwnd).as_bool(),
                    });
                }
            }
            Ok(windows)
        }

        fn restore(&self, id: WindowId) -> Result<(), ActionError> {
            // SAFETY: ShowWindow tolerates stale handles.
            let _ = unsafe { ShowWindow(HWND(id as *mut _), SW_RESTORE) };
            Ok(())
        }

        fn activate(&self, id: WindowId) -> Result<(), ActionError> {
            // SAFETY: SetForegroundWindow tolerates stale handles.
            let ok = unsafe { SetForegroundWindow(HWND(id as *mut _)) }.as_bool();
            if ok {
                Ok(())
            } else {
                Err(ActionError::Window(format!(
                    "SetForegroundWindow refused window {id:#x}"
                )))
            }
        }
    }
}
