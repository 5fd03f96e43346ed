use hopper_core::{FileConsumer, WatchError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::debug;

/// Hands `path` to the consumer, routing any failure to its error channel.
///
/// A panicking consumer is treated like one that returned an error: the
/// watcher keeps running. Returns true if the consumer accepted the file.
pub(crate) fn deliver(consumer: &dyn FileConsumer, path: &Path) -> bool {
    let error = match panic::catch_unwind(AssertUnwindSafe(|| consumer.on_available(path))) {
        Ok(Ok(())) => {
            debug!(path = %path.display(), "Delivered");
            return true;
        }
        Ok(Err(source)) => WatchError::delivery(path, source),
        Err(payload) => WatchError::delivery(path, panic_message(payload)),
    };

    consumer.on_error(&error, Some(path));
    false
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("consumer panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("consumer panicked: {}", msg)
    } else {
        "consumer panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingConsumer;

    #[test]
    fn test_successful_delivery() {
        let consumer = RecordingConsumer::new();
        assert!(deliver(&consumer, Path::new("/in/a.txt")));
        assert_eq!(consumer.delivered(), vec![Path::new("/in/a.txt")]);
        assert!(consumer.errors().is_empty());
    }

    #[test]
    fn test_rejection_goes_to_error_channel() {
        let consumer = RecordingConsumer::failing_on("bad.txt");
        assert!(!deliver(&consumer, Path::new("/in/bad.txt")));

        let errors = consumer.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.as_deref(), Some(Path::new("/in/bad.txt")));
        assert!(errors[0].0.contains("failed to deliver"));
    }

    #[test]
    fn test_panic_is_contained() {
        let consumer = RecordingConsumer::panicking_on("boom.txt");
        assert!(!deliver(&consumer, Path::new("/in/boom.txt")));
        assert!(consumer.errors()[0].0.contains("consumer panicked"));
    }
}
