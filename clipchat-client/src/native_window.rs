//! Direct control of this process's top-level window.
//!
//! A hidden window gets no frames, so viewport commands queued for it are not processed until
//! something else wakes the event loop. Showing through the window handle does not depend on that.

/// True when the first `len` units of `buf` spell exactly `title`.
pub fn title_matches(buf: &[u16], len: usize, title: &str) -> bool {
    let Some(text) = buf.get(..len) else {
        return false;
    };
    text.iter().copied().eq(title.encode_utf16())
}

pub use platform::{WindowHandle, find_own_window, hide, show};

#[cfg(target_os = "windows")]
mod platform {
    use windows_sys::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows_sys::Win32::System::Threading::GetCurrentProcessId;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextW, GetWindowThreadProcessId, IsIconic, SW_HIDE, SW_RESTORE,
        SW_SHOW, SetForegroundWindow, ShowWindowAsync,
    };

    use super::title_matches;

    pub type WindowHandle = HWND;

    const TITLE_BUF_LEN: usize = 256;

    struct Search<'a> {
        pid: u32,
        title: &'a str,
        found: Option<HWND>,
    }

    unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = unsafe { &mut *(lparam as *mut Search<'_>) };

        let mut pid = 0_u32;
        unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
        if pid != search.pid {
            return 1;
        }

        let mut buf = [0_u16; TITLE_BUF_LEN];
        let len = unsafe { GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32) };
        if len > 0 && title_matches(&buf, len as usize, search.title) {
            search.found = Some(hwnd);
            return 0;
        }
        1
    }

    /// The top-level window of this process whose caption is `title`.
    pub fn find_own_window(title: &str) -> Option<WindowHandle> {
        let mut search = Search {
            pid: unsafe { GetCurrentProcessId() },
            title,
            found: None,
        };
        // EnumWindows reports failure when the callback stops early.
        unsafe { EnumWindows(Some(visit), &mut search as *mut Search<'_> as LPARAM) };
        search.found
    }

    pub fn show(title: &str) -> bool {
        let Some(hwnd) = find_own_window(title) else {
            tracing::debug!(title, "window not found; relying on viewport commands");
            return false;
        };
        let command = if unsafe { IsIconic(hwnd) } != 0 {
            SW_RESTORE
        } else {
            SW_SHOW
        };
        unsafe {
            ShowWindowAsync(hwnd, command);
            SetForegroundWindow(hwnd);
        }
        true
    }

    pub fn hide(title: &str) -> bool {
        match find_own_window(title) {
            Some(hwnd) => {
                unsafe { ShowWindowAsync(hwnd, SW_HIDE) };
                true
            }
            None => false,
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    pub type WindowHandle = isize;

    pub fn find_own_window(_title: &str) -> Option<WindowHandle> {
        None
    }

    pub fn show(_title: &str) -> bool {
        false
    }

    pub fn hide(_title: &str) -> bool {
        false
    }
}
