use anyhow::Result;

/// Extended-style bit that lets input fall through the window (`WS_EX_TRANSPARENT`).
pub const EX_STYLE_TRANSPARENT: u32 = 0x0000_0020;
/// Extended-style bit required for per-window alpha (`WS_EX_LAYERED`).
pub const EX_STYLE_LAYERED: u32 = 0x0008_0000;

/// What the overlay currently looks like, as far as the OS has accepted it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayVisualState {
    pub opacity: f32,
    pub click_through: bool,
    pub flash_color_index: Option<usize>,
}

impl Default for OverlayVisualState {
    /// A freshly created window: opaque and interactive.
    fn default() -> Self {
        Self {
            opacity: 1.0,
            click_through: false,
            flash_color_index: None,
        }
    }
}

/// OS window attribute calls needed by the overlay.
///
/// Implementations must not move or resize the window.
pub trait WindowStyleApi {
    fn get_ex_style(&self) -> Result<u32>;
    fn set_ex_style(&mut self, style: u32) -> Result<()>;
    /// Re-apply topmost placement without moving, resizing or activating.
    fn reassert_topmost(&mut self) -> Result<()>;
    fn set_alpha(&mut self, alpha: u8) -> Result<()>;
}

pub fn opacity_to_alpha(value: f32) -> u8 {
    (clamp_opacity(value) * 255.0).round() as u8
}

pub fn clamp_opacity(value: f32) -> f32 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(0.0, 1.0)
}

/// Translates the timer's visual intent into window attributes.
///
/// Failed OS calls are logged and the previous [`OverlayVisualState`] stays
/// in effect; nothing here panics.
pub struct OverlayWindowController<A: WindowStyleApi> {
    api: A,
    visual: OverlayVisualState,
}

impl<A: WindowStyleApi> OverlayWindowController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            visual: OverlayVisualState::default(),
        }
    }

    pub fn visual(&self) -> OverlayVisualState {
        self.visual
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Swap in a new OS surface. The recorded state resets to that of a
    /// freshly created window so the next calls are applied for real.
    pub fn replace_api(&mut self, api: A) {
        self.api = api;
        let flash = self.visual.flash_color_index;
        self.visual = OverlayVisualState {
            flash_color_index: flash,
            ..OverlayVisualState::default()
        };
    }

    /// Returns `true` when the window ends up in the requested state.
    pub fn set_click_through(&mut self, enabled: bool) -> bool {
        if self.visual.click_through == enabled {
            return true;
        }
        let style = match self.api.get_ex_style() {
            Ok(style) => style,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read overlay window style");
                return false;
            }
        };
        let next = if enabled {
            style | EX_STYLE_TRANSPARENT
        } else {
            style & !EX_STYLE_TRANSPARENT
        };
        if let Err(e) = self.api.set_ex_style(next) {
            tracing::warn!(error = %e, enabled, "failed to apply click-through");
            return false;
        }
        self.visual.click_through = enabled;
        if let Err(e) = self.api.reassert_topmost() {
            tracing::warn!(error = %e, "failed to keep overlay topmost");
        }
        tracing::debug!(enabled, "click-through updated");
        true
    }

    /// Out-of-range values are clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, value: f32) -> bool {
        let value = clamp_opacity(value);
        if (self.visual.opacity - value).abs() < f32::EPSILON {
            return true;
        }
        match self.api.set_alpha(opacity_to_alpha(value)) {
            Ok(()) => {
                self.visual.opacity = value;
                tracing::debug!(opacity = value, "opacity updated");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, opacity = value, "failed to apply opacity");
                false
            }
        }
    }

    /// Colour painted behind the countdown; `None` outside the alarm.
    pub fn set_flash_color(&mut self, index: Option<usize>) {
        self.visual.flash_color_index = index.map(|i| i % 2);
    }
}

#[cfg(windows)]
mod platform {
    use super::{WindowStyleApi, EX_STYLE_LAYERED};
    use anyhow::{anyhow, bail, Result};
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};
    use windows::Win32::Foundation::{SetLastError, COLORREF, HWND, WIN32_ERROR};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetWindowLongPtrW, IsWindow, SetLayeredWindowAttributes, SetWindowLongPtrW,
        SetWindowPos, GWL_EXSTYLE, HWND_TOPMOST, LWA_ALPHA, SWP_NOACTIVATE, SWP_NOMOVE,
        SWP_NOSIZE, SWP_SHOWWINDOW,
    };

    /// Window attributes of a real Win32 window.
    #[derive(Debug, Default)]
    pub struct Win32WindowStyle {
        hwnd: Option<isize>,
    }

    impl Win32WindowStyle {
        pub fn from_raw(hwnd: isize) -> Self {
            Self { hwnd: Some(hwnd) }
        }

        pub fn from_frame(frame: &eframe::Frame) -> Option<Self> {
            let handle = frame.window_handle().ok()?;
            match handle.as_raw() {
                RawWindowHandle::Win32(h) => Some(Self::from_raw(h.hwnd.get())),
                _ => None,
            }
        }

        fn hwnd(&self) -> Result<HWND> {
            let raw = self
                .hwnd
                .ok_or_else(|| anyhow!("overlay window handle not attached"))?;
            let hwnd = HWND(raw as *mut core::ffi::c_void);
            if !unsafe { IsWindow(hwnd) }.as_bool() {
                bail!("invalid overlay window handle {raw:#x}");
            }
            Ok(hwnd)
        }

        /// `Get/SetWindowLongPtrW` return 0 both on failure and for a zero
        /// style, so the last error decides.
        fn check_last_error(value: isize) -> Result<isize> {
            if value == 0 {
                let err = windows::core::Error::from_win32();
                if err.code().is_err() {
                    return Err(anyhow!(err));
                }
            }
            Ok(value)
        }
    }

    impl WindowStyleApi for Win32WindowStyle {
        fn get_ex_style(&self) -> Result<u32> {
            let hwnd = self.hwnd()?;
            let style = unsafe {
                SetLastError(WIN32_ERROR(0));
                GetWindowLongPtrW(hwnd, GWL_EXSTYLE)
            };
            Ok(Self::check_last_error(style)? as u32)
        }

        fn set_ex_style(&mut self, style: u32) -> Result<()> {
            let hwnd = self.hwnd()?;
            let previous = unsafe {
                SetLastError(WIN32_ERROR(0));
                SetWindowLongPtrW(hwnd, GWL_EXSTYLE, style as isize)
            };
            Self::check_last_error(previous)?;
            Ok(())
        }

        fn reassert_topmost(&mut self) -> Result<()> {
            let hwnd = self.hwnd()?;
            unsafe {
                SetWindowPos(
                    hwnd,
                    HWND_TOPMOST,
                    0,
                    0,
                    0,
                    0,
                    SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | SWP_SHOWWINDOW,
                )?;
            }
            Ok(())
        }

        fn set_alpha(&mut self, alpha: u8) -> Result<()> {
            let style = self.get_ex_style()?;
            if style & EX_STYLE_LAYERED == 0 {
                self.set_ex_style(style | EX_STYLE_LAYERED)?;
            }
            let hwnd = self.hwnd()?;
            unsafe { SetLayeredWindowAttributes(hwnd, COLORREF(0), alpha, LWA_ALPHA)? };
            Ok(())
        }
    }

}

#[cfg(windows)]
pub use platform::Win32WindowStyle as PlatformWindowStyle;

/// In-memory window attributes for platforms without a Win32 window.
#[derive(Debug, Default, Clone)]
pub struct HeadlessWindowStyle {
    ex_style: u32,
    alpha: u8,
}

impl HeadlessWindowStyle {
    pub fn from_frame(_frame: &eframe::Frame) -> Option<Self> {
        Some(Self::default())
    }

    pub fn alpha(&self) -> u8 {
        self.alpha
    }
}

impl WindowStyleApi for HeadlessWindowStyle {
    fn get_ex_style(&self) -> Result<u32> {
        Ok(self.ex_style)
    }

    fn set_ex_style(&mut self, style: u32) -> Result<()> {
        self.ex_style = style;
        Ok(())
    }

    fn reassert_topmost(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_alpha(&mut self, alpha: u8) -> Result<()> {
        self.ex_style |= EX_STYLE_LAYERED;
        self.alpha = alpha;
        Ok(())
    }
}

#[cfg(not(windows))]
pub use self::HeadlessWindowStyle as PlatformWindowStyle;
