/// Lifecycle state of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatcherState {
    /// Not watching. Initial state, and where Stop leaves you.
    #[default]
    Stopped,
    /// Watching: the scan loop and trigger are running.
    Started,
}

impl WatcherState {
    pub fn is_started(self) -> bool {
        self == WatcherState::Started
    }
}

impl std::fmt::Display for WatcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatcherState::Stopped => write!(f, "stopped"),
            WatcherState::Started => write!(f, "started"),
        }
    }
}
