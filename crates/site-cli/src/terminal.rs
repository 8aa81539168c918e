//! Notices and navigation for a terminal session.

use parking_lot::Mutex;
use session_auth::{Navigator, Notice, NoticeKind, Notifier};
use tracing::debug;

/// Prints notices to stderr.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => eprintln!("{}", notice.message),
            NoticeKind::Error => eprintln!("error: {}", notice.message),
        }
    }
}

/// There are no pages to move between, so the target route is printed and
/// remembered.
#[derive(Debug, Default)]
pub struct TerminalNavigator {
    last: Mutex<Option<String>>,
}

impl TerminalNavigator {
    pub fn last_route(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: &str) {
        debug!(route = %route, "Navigating");
        eprintln!("-> {}", route);
        *self.last.lock() = Some(route.to_string());
    }
}
