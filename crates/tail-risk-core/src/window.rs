use chrono::NaiveDate;

/// Trailing fixed-length windows over a date-indexed sequence.
///
/// For every anchor `t` in `window..len` the item is `(dates[t], &items[t - window..t])`:
/// the window holds the `window` observations strictly before the anchor date,
/// so a statistic computed on it is a forecast for the anchor.
///
/// The iterator is lazy and `Clone`; cloning before consumption restarts it.
#[derive(Debug, Clone)]
pub struct RollingWindows<'a, T> {
    dates: &'a [NaiveDate],
    items: &'a [T],
    window: usize,
    next: usize,
}

impl<'a, T> RollingWindows<'a, T> {
    pub fn new(dates: &'a [NaiveDate], items: &'a [T], window: usize) -> Self {
        debug_assert_eq!(dates.len(), items.len());
        Self {
            dates,
            items,
            window,
            next: window.max(1),
        }
    }

    pub fn window_length(&self) -> usize {
        self.window
    }

    /// Rewind to the first window.
    pub fn restart(&mut self) {
        self.next = self.window.max(1);
    }
}

impl<'a, T> Iterator for RollingWindows<'a, T> {
    type Item = (NaiveDate, &'a [T]);

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.items.len().min(self.dates.len());
        if self.next >= len {
            return None;
        }
        let t = self.next;
        self.next += 1;
        Some((self.dates[t], &self.items[t - self.window..t]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.items.len().min(self.dates.len());
        let remaining = len.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for RollingWindows<'_, T> {}
