use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long the injury-code notice stays up unless dismissed.
pub const NOTICE_DISPLAY: Duration = Duration::from_secs(8);

#[derive(Debug, Default)]
struct NoticeState {
    visible: bool,
    generation: u64,
}

/// Transient "injury codes cannot be the underlying cause" notice.
///
/// Each `show` starts a timer tagged with a new generation; the timer only
/// hides the notice if no newer show or dismiss happened in between, and a
/// manual dismiss aborts it outright.
#[derive(Debug)]
pub struct BlacklistNotice {
    state: Arc<Mutex<NoticeState>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    display_for: Duration,
}

impl Default for BlacklistNotice {
    fn default() -> Self {
        Self::new(NOTICE_DISPLAY)
    }
}

impl BlacklistNotice {
    pub fn new(display_for: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(NoticeState::default())),
            timer: Mutex::new(None),
            display_for,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().expect("notice mutex poisoned").visible
    }

    /// Shows the notice and arms the auto-dismiss timer. Outside a tokio
    /// runtime the notice stays up until dismissed.
    pub fn show(&self) {
        let generation = {
            let mut state = self.state.lock().expect("notice mutex poisoned");
            if state.visible {
                return;
            }
            state.visible = true;
            state.generation += 1;
            state.generation
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no runtime for the blacklist notice timer");
            return;
        };
        let state = Arc::clone(&self.state);
        let delay = self.display_for;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = state.lock().expect("notice mutex poisoned");
            if state.generation == generation {
                state.visible = false;
                debug!(generation, "blacklist notice expired");
            }
        });

        self.replace_timer(Some(handle));
    }

    pub fn dismiss(&self) {
        {
            let mut state = self.state.lock().expect("notice mutex poisoned");
            state.visible = false;
            state.generation += 1;
        }
        self.replace_timer(None);
    }

    fn replace_timer(&self, next: Option<JoinHandle<()>>) {
        let previous = std::mem::replace(
            &mut *self.timer.lock().expect("notice mutex poisoned"),
            next,
        );
        if let Some(handle) = previous {
            handle.abort();
        }
    }
}

impl Drop for BlacklistNotice {
    fn drop(&mut self) {
        if let Ok(timer) = self.timer.get_mut() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}
