use tokio::sync::mpsc;

use super::types::ETLError;
use crate::driver::BatchWindow;

/// Offset/limit state of a batched extract.
///
/// Only the control loop touches the cursor. Resizes requested through a
/// [`BatchController`] are picked up on the next [`BatchCursor::advance`] or
/// [`BatchCursor::reset`], so the window being extracted never changes under
/// the extract call.
#[derive(Debug)]
pub(crate) struct BatchCursor {
    size: u64,
    offset: u64,
    limit: u64,
    resize: mpsc::UnboundedReceiver<u64>,
}

/// Handle for changing the batch size of a running transaction.
#[derive(Debug, Clone)]
pub struct BatchController {
    sender: mpsc::UnboundedSender<u64>,
}

impl BatchController {
    /// Requests a new batch size, applied from the next batch on.
    pub fn set_batch_size(&self, size: u64) -> Result<(), ETLError> {
        if size == 0 {
            return Err(ETLError::Configuration(
                "batch size must be positive".to_string(),
            ));
        }
        self.sender
            .send(size)
            .map_err(|_| ETLError::Configuration("transaction is closed".to_string()))
    }
}

impl BatchCursor {
    pub(crate) fn new(size: u64) -> (Self, BatchController) {
        let (sender, resize) = mpsc::unbounded_channel();
        let cursor = BatchCursor {
            size,
            offset: 0,
            limit: size,
            resize,
        };
        (cursor, BatchController { sender })
    }

    /// Back to the first window.
    pub(crate) fn reset(&mut self) -> BatchWindow {
        self.apply_resizes();
        self.offset = 0;
        self.limit = self.size;
        self.window()
    }

    /// Moves past the current window; `offset += limit`, then the newest size
    /// becomes the limit.
    pub(crate) fn advance(&mut self) -> BatchWindow {
        self.apply_resizes();
        self.offset = self.offset.saturating_add(self.limit);
        self.limit = self.size;
        self.window()
    }

    pub(crate) fn window(&self) -> BatchWindow {
        BatchWindow {
            enabled: true,
            limit: self.limit,
            offset: self.offset,
        }
    }

    fn apply_resizes(&mut self) {
        while let Ok(size) = self.resize.try_recv() {
            tracing::debug!(from = self.size, to = size, "batch size changed");
            self.size = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(cursor: &mut BatchCursor, steps: usize) -> Vec<(u64, u64)> {
        let mut windows = vec![(cursor.window().offset, cursor.window().limit)];
        for _ in 0..steps {
            let w = cursor.advance();
            windows.push((w.offset, w.limit));
        }
        windows
    }

    #[test]
    fn test_advance_moves_by_limit() {
        let (mut cursor, _controller) = BatchCursor::new(100);
        assert_eq!(
            offsets(&mut cursor, 3),
            vec![(0, 100), (100, 100), (200, 100), (300, 100)]
        );
    }

    #[test]
    fn test_resize_applies_on_next_advance() {
        let (mut cursor, controller) = BatchCursor::new(10);
        controller.set_batch_size(25).unwrap();

        // the current window is untouched
        assert_eq!(cursor.window().limit, 10);

        let w = cursor.advance();
        assert_eq!((w.offset, w.limit), (10, 25));
        let w = cursor.advance();
        assert_eq!((w.offset, w.limit), (35, 25));
    }

    #[test]
    fn test_reset_starts_over_with_latest_size() {
        let (mut cursor, controller) = BatchCursor::new(10);
        cursor.advance();
        cursor.advance();
        controller.set_batch_size(4).unwrap();
        controller.set_batch_size(5).unwrap();

        let w = cursor.reset();
        assert_eq!((w.offset, w.limit), (0, 5));
        assert!(w.enabled);
    }

    #[test]
    fn test_controller_rejects_zero() {
        let (_cursor, controller) = BatchCursor::new(10);
        assert!(matches!(
            controller.set_batch_size(0),
            Err(ETLError::Configuration(_))
        ));
    }

    #[test]
    fn test_controller_after_cursor_dropped() {
        let (cursor, controller) = BatchCursor::new(10);
        drop(cursor);
        assert!(controller.set_batch_size(5).is_err());
    }
}
