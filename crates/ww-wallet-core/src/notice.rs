use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{error, info};
use ww_api_types::{Notice, NoticeLevel};

/// Receives user-facing advisory messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

fn log_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Error => error!("notice: {}", notice.message),
        NoticeLevel::Info | NoticeLevel::Success => info!("notice: {}", notice.message),
    }
}

#[derive(Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        log_notice(&notice);
    }
}

/// Keeps the most recent notices until a client drains them.
pub struct NoticeBuffer {
    capacity: usize,
    notices: Mutex<VecDeque<Notice>>,
}

impl Default for NoticeBuffer {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

impl NoticeBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            notices: Mutex::new(VecDeque::new()),
        }
    }

    pub fn drain(&self) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        notices.drain(..).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        let notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        notices.iter().map(|notice| notice.message.clone()).collect()
    }
}

impl Notifier for NoticeBuffer {
    fn notify(&self, notice: Notice) {
        log_notice(&notice);
        let mut notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        if notices.len() == self.capacity {
            notices.pop_front();
        }
        notices.push_back(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_newest_notices() {
        let buffer = NoticeBuffer::with_capacity(2);
        buffer.notify(Notice::info("one"));
        buffer.notify(Notice::success("two"));
        buffer.notify(Notice::error("three"));

        assert_eq!(buffer.messages(), vec!["two", "three"]);
        let drained = buffer.drain();
        assert_eq!(drained[1].level, NoticeLevel::Error);
        assert!(buffer.drain().is_empty());
    }
}
