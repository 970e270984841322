use anyhow::Result;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Callback used to wake the UI loop after an event was queued.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Modifier key that temporarily suspends click-through while held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideKey {
    #[default]
    LeftAlt,
    RightAlt,
    LeftCtrl,
    RightCtrl,
    LeftShift,
    RightShift,
    CapsLock,
}

impl OverrideKey {
    /// Win32 virtual-key code as reported by low-level keyboard hooks, which
    /// distinguish left and right modifiers.
    pub fn virtual_key(self) -> u32 {
        match self {
            OverrideKey::LeftAlt => 0xA4,
            OverrideKey::RightAlt => 0xA5,
            OverrideKey::LeftCtrl => 0xA2,
            OverrideKey::RightCtrl => 0xA3,
            OverrideKey::LeftShift => 0xA0,
            OverrideKey::RightShift => 0xA1,
            OverrideKey::CapsLock => 0x14,
        }
    }
}

impl FromStr for OverrideKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match upper.as_str() {
            "ALT_L" | "LALT" | "LEFT_ALT" | "ALT" => Ok(OverrideKey::LeftAlt),
            "ALT_R" | "RALT" | "RIGHT_ALT" | "ALTGR" => Ok(OverrideKey::RightAlt),
            "CTRL_L" | "LCTRL" | "LEFT_CTRL" | "CTRL" | "CONTROL" => Ok(OverrideKey::LeftCtrl),
            "CTRL_R" | "RCTRL" | "RIGHT_CTRL" => Ok(OverrideKey::RightCtrl),
            "SHIFT_L" | "LSHIFT" | "LEFT_SHIFT" | "SHIFT" => Ok(OverrideKey::LeftShift),
            "SHIFT_R" | "RSHIFT" | "RIGHT_SHIFT" => Ok(OverrideKey::RightShift),
            "CAPS_LOCK" | "CAPSLOCK" => Ok(OverrideKey::CapsLock),
            _ => Err(format!("unsupported override key '{s}'")),
        }
    }
}

/// Raw key transition observed by the hook, carrying a virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down(u32),
    Up(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideEvent {
    Pressed,
    Released,
}

/// Turns raw transitions of the override key into press/release events.
///
/// Auto-repeat is swallowed: a press is emitted only on the first key-down
/// after a release. Once `expired` is set, releases are dropped so the alarm
/// UI is never demoted back to click-through.
#[derive(Debug)]
pub struct OverrideKeyFilter {
    vk: u32,
    already_pressed: bool,
    expired: Arc<AtomicBool>,
}

impl OverrideKeyFilter {
    pub fn new(key: OverrideKey, expired: Arc<AtomicBool>) -> Self {
        Self {
            vk: key.virtual_key(),
            already_pressed: false,
            expired,
        }
    }

    pub fn filter(&mut self, transition: KeyTransition) -> Option<OverrideEvent> {
        match transition {
            KeyTransition::Down(vk) if vk == self.vk => {
                if self.already_pressed {
                    return None;
                }
                self.already_pressed = true;
                Some(OverrideEvent::Pressed)
            }
            KeyTransition::Up(vk) if vk == self.vk => {
                if !self.already_pressed || self.expired.load(Ordering::SeqCst) {
                    return None;
                }
                self.already_pressed = false;
                Some(OverrideEvent::Released)
            }
            _ => None,
        }
    }
}

/// Hand-off point between the hook thread and the UI loop.
pub struct HookSink {
    filter: Mutex<OverrideKeyFilter>,
    tx: Mutex<Sender<OverrideEvent>>,
    waker: Option<Waker>,
}

impl HookSink {
    fn new(filter: OverrideKeyFilter, tx: Sender<OverrideEvent>, waker: Option<Waker>) -> Self {
        Self {
            filter: Mutex::new(filter),
            tx: Mutex::new(tx),
            waker,
        }
    }

    pub fn deliver(&self, transition: KeyTransition) {
        let event = match self.filter.lock() {
            Ok(mut filter) => filter.filter(transition),
            Err(_) => return,
        };
        let Some(event) = event else {
            return;
        };
        tracing::debug!(?event, "override key event");
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event);
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }
}

/// Lifecycle of the global override key listener as seen by the timer.
pub trait OverrideHook {
    fn start(&mut self) -> Result<()>;
    /// Remove the hook and join its thread. Safe to call more than once.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    /// Events queued since the last call, in arrival order.
    fn drain_events(&mut self) -> Vec<OverrideEvent>;
    /// From now on key releases are suppressed at the source.
    fn mark_expired(&self);
}

/// System-wide listener for the override key.
///
/// On Windows a low-level keyboard hook runs on a dedicated thread with its
/// own message loop. Elsewhere the listener starts and stops but never sees
/// keys.
pub struct OverrideListener {
    key: OverrideKey,
    expired: Arc<AtomicBool>,
    waker: Option<Waker>,
    sink: Option<Arc<HookSink>>,
    receiver: Option<Receiver<OverrideEvent>>,
    running: bool,
    #[cfg(windows)]
    backend: platform::KeyboardHookBackend,
}

impl OverrideListener {
    pub fn new(key: OverrideKey, waker: Option<Waker>) -> Self {
        Self {
            key,
            expired: Arc::new(AtomicBool::new(false)),
            waker,
            sink: None,
            receiver: None,
            running: false,
            #[cfg(windows)]
            backend: platform::KeyboardHookBackend::default(),
        }
    }

    pub fn key(&self) -> OverrideKey {
        self.key
    }

    /// Push transitions through the same path the OS hook uses.
    pub fn process_test_events(&self, transitions: &[KeyTransition]) {
        if let Some(sink) = &self.sink {
            for t in transitions {
                sink.deliver(*t);
            }
        }
    }
}

impl OverrideHook for OverrideListener {
    fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        let (tx, rx) = channel();
        let filter = OverrideKeyFilter::new(self.key, Arc::clone(&self.expired));
        let sink = Arc::new(HookSink::new(filter, tx, self.waker.clone()));

        #[cfg(windows)]
        self.backend.install(Arc::clone(&sink))?;

        self.sink = Some(sink);
        self.receiver = Some(rx);
        self.running = true;
        tracing::info!(key = ?self.key, "override listener started");
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }

        #[cfg(windows)]
        if let Err(err) = self.backend.uninstall() {
            tracing::warn!(?err, "failed to uninstall override keyboard hook");
        }

        self.sink = None;
        self.receiver = None;
        self.running = false;
        tracing::info!("override listener stopped");
    }

    fn is_running(&self) -> bool {
        #[cfg(windows)]
        {
            self.running && self.backend.is_installed()
        }
        #[cfg(not(windows))]
        {
            self.running
        }
    }

    fn drain_events(&mut self) -> Vec<OverrideEvent> {
        let mut events = Vec::new();
        if let Some(rx) = &self.receiver {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }

    fn mark_expired(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }
}

impl Drop for OverrideListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(windows)]
mod platform {
    use super::{HookSink, KeyTransition};
    use anyhow::{anyhow, Result};
    use once_cell::sync::Lazy;
    use std::sync::atomic::{AtomicIsize, Ordering};
    use std::sync::mpsc::{sync_channel, SyncSender};
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;
    use std::time::Duration;
    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW, SetWindowsHookExW,
        TranslateMessage, UnhookWindowsHookEx, HHOOK, MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_QUIT,
    };

    // Low-level hook procedures cannot capture state, so the active sink lives here.
    static HOOK_SINK: Lazy<Mutex<Option<Arc<HookSink>>>> = Lazy::new(|| Mutex::new(None));

    struct HookThread {
        thread_id: u32,
        /// Raw `HHOOK` of the installed hook; zero once removed.
        hook: Arc<AtomicIsize>,
        join: JoinHandle<()>,
    }

    #[derive(Default)]
    pub struct KeyboardHookBackend {
        hook_thread: Option<HookThread>,
    }

    fn set_keyboard_hook() -> Result<HHOOK> {
        let module = unsafe { GetModuleHandleW(None) }?;
        let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), module, 0) }?;
        if hook.0.is_null() {
            return Err(anyhow!(windows::core::Error::from_win32()));
        }
        Ok(hook)
    }

    /// Removes the hook at most once, whichever side gets here first.
    fn remove_keyboard_hook(slot: &AtomicIsize) -> bool {
        let raw = slot.swap(0, Ordering::SeqCst);
        if raw == 0 {
            return false;
        }
        unsafe { UnhookWindowsHookEx(HHOOK(raw as *mut core::ffi::c_void)) }.is_ok()
    }

    /// Runs on the hook thread until `WM_QUIT` arrives.
    fn run_hook_thread(ready: SyncSender<Result<u32>>, slot: Arc<AtomicIsize>) {
        let mut msg = MSG::default();
        // The thread needs a message queue before WM_QUIT can be posted to it.
        unsafe {
            let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        }

        match set_keyboard_hook() {
            Ok(hook) => slot.store(hook.0 as isize, Ordering::SeqCst),
            Err(err) => {
                let _ = ready.send(Err(err));
                return;
            }
        }
        let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

        while unsafe { GetMessageW(&mut msg, None, 0, 0) }.0 > 0 {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        remove_keyboard_hook(&slot);
    }

    impl KeyboardHookBackend {
        pub fn install(&mut self, sink: Arc<HookSink>) -> Result<()> {
            if self.hook_thread.is_some() {
                return Ok(());
            }

            if let Ok(mut guard) = HOOK_SINK.lock() {
                *guard = Some(sink);
            }

            let hook = Arc::new(AtomicIsize::new(0));
            let thread_hook = Arc::clone(&hook);
            let (ready_tx, ready_rx) = sync_channel::<Result<u32>>(1);
            let join = match std::thread::Builder::new()
                .name("override-hook".into())
                .spawn(move || run_hook_thread(ready_tx, thread_hook))
            {
                Ok(join) => join,
                Err(err) => {
                    clear_sink();
                    return Err(anyhow!(err));
                }
            };

            let thread_id = match ready_rx.recv_timeout(Duration::from_secs(2)) {
                Ok(Ok(id)) => id,
                Ok(Err(err)) => {
                    clear_sink();
                    let _ = join.join();
                    return Err(err);
                }
                Err(_) => {
                    clear_sink();
                    remove_keyboard_hook(&hook);
                    return Err(anyhow!("override hook thread did not signal readiness"));
                }
            };

            self.hook_thread = Some(HookThread {
                thread_id,
                hook,
                join,
            });
            Ok(())
        }

        /// Stop the hook thread. If the quit message cannot be delivered the
        /// hook is removed from here so no keys are observed any more; a thread
        /// still blocked in its message loop is then left detached.
        pub fn uninstall(&mut self) -> Result<()> {
            clear_sink();

            let Some(th) = self.hook_thread.take() else {
                return Ok(());
            };
            let posted = unsafe { PostThreadMessageW(th.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
            if let Err(err) = posted {
                tracing::warn!(?err, "failed to post quit to override hook thread");
                let removed = remove_keyboard_hook(&th.hook);
                if !th.join.is_finished() {
                    return Err(anyhow!(
                        "override hook thread did not receive quit (hook removed: {removed})"
                    ));
                }
            }
            th.join
                .join()
                .map_err(|_| anyhow!("override hook thread panicked"))?;
            Ok(())
        }

        pub fn is_installed(&self) -> bool {
            self.hook_thread.is_some()
        }
    }

    fn clear_sink() {
        if let Ok(mut guard) = HOOK_SINK.lock() {
            *guard = None;
        }
    }

    unsafe extern "system" fn keyboard_hook_proc(
        n_code: i32,
        w_param: WPARAM,
        l_param: LPARAM,
    ) -> windows::Win32::Foundation::LRESULT {
        use windows::Win32::UI::WindowsAndMessaging::{
            CallNextHookEx, HC_ACTION, KBDLLHOOKSTRUCT, WM_KEYDOWN, WM_KEYUP, WM_SYSKEYDOWN,
            WM_SYSKEYUP,
        };

        if n_code == HC_ACTION as i32 {
            let info = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };
            let transition = match w_param.0 as u32 {
                WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyTransition::Down(info.vkCode)),
                WM_KEYUP | WM_SYSKEYUP => Some(KeyTransition::Up(info.vkCode)),
                _ => None,
            };
            if let Some(transition) = transition {
                if let Ok(guard) = HOOK_SINK.lock() {
                    if let Some(sink) = guard.as_ref() {
                        sink.deliver(transition);
                    }
                }
            }
        }

        // The override key is observed, never swallowed.
        CallNextHookEx(HHOOK(std::ptr::null_mut()), n_code, w_param, l_param)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    const ALT_L: u32 = 0xA4;

    fn filter() -> (OverrideKeyFilter, Arc<AtomicBool>) {
        let expired = Arc::new(AtomicBool::new(false));
        (
            OverrideKeyFilter::new(OverrideKey::LeftAlt, Arc::clone(&expired)),
            expired,
        )
    }

    #[test]
    fn held_key_emits_a_single_press() {
        let (mut f, _) = filter();
        assert_eq!(f.filter(KeyTransition::Down(ALT_L)), Some(OverrideEvent::Pressed));
        assert_eq!(f.filter(KeyTransition::Down(ALT_L)), None);
        assert_eq!(f.filter(KeyTransition::Down(ALT_L)), None);
        assert_eq!(f.filter(KeyTransition::Up(ALT_L)), Some(OverrideEvent::Released));
        assert_eq!(f.filter(KeyTransition::Down(ALT_L)), Some(OverrideEvent::Pressed));
    }

    #[test]
    fn other_keys_are_ignored() {
        let (mut f, _) = filter();
        assert_eq!(f.filter(KeyTransition::Down(0x41)), None);
        assert_eq!(f.filter(KeyTransition::Down(0xA5)), None);
        assert_eq!(f.filter(KeyTransition::Up(0x41)), None);
    }

    #[test]
    fn release_is_suppressed_after_expiry() {
        let (mut f, expired) = filter();
        assert_eq!(f.filter(KeyTransition::Down(ALT_L)), Some(OverrideEvent::Pressed));
        expired.store(true, Ordering::SeqCst);
        assert_eq!(f.filter(KeyTransition::Up(ALT_L)), None);
    }

    #[test]
    fn parses_key_names() {
        assert_eq!("alt_l".parse::<OverrideKey>(), Ok(OverrideKey::LeftAlt));
        assert_eq!("Right Ctrl".parse::<OverrideKey>(), Ok(OverrideKey::RightCtrl));
        assert_eq!("caps-lock".parse::<OverrideKey>(), Ok(OverrideKey::CapsLock));
        assert!("F13".parse::<OverrideKey>().is_err());
    }
}
