//! Navigation cursor over the storybook.

use crate::error::{StoryError, Transition};
use crate::storybook::Page;

/// Where the cursor sits relative to the generated pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing generated yet.
    Empty,
    /// Showing the most recent page.
    AtLatest,
    /// Showing an older page.
    Browsing,
}

/// Currently displayed page and highest generated page.
///
/// Invariant: `current <= max`. `current == 0` only while the book is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageCursor {
    current: u32,
    max: u32,
}

impl PageCursor {
    /// Cursor at an explicit position, if the position is valid.
    pub const fn at(current: u32, max: u32) -> Option<Self> {
        if current > max || (current == 0 && max != 0) {
            None
        } else {
            Some(Self { current, max })
        }
    }

    /// Start on the newest page of a loaded storybook.
    pub fn from_pages(pages: &[Page]) -> Self {
        let max = pages.iter().map(|page| page.page_number).max().unwrap_or(0);
        Self { current: max, max }
    }

    pub const fn current(&self) -> u32 {
        self.current
    }

    pub const fn max(&self) -> u32 {
        self.max
    }

    pub const fn state(&self) -> CursorState {
        if self.max == 0 {
            CursorState::Empty
        } else if self.current == self.max {
            CursorState::AtLatest
        } else {
            CursorState::Browsing
        }
    }

    /// Step towards the newest page.
    pub fn advance(&mut self) -> Result<u32, StoryError> {
        if self.current >= self.max {
            return Err(self.rejected(Transition::Advance));
        }
        self.current += 1;
        Ok(self.current)
    }

    /// Step towards the first page.
    pub fn retreat(&mut self) -> Result<u32, StoryError> {
        if self.current <= 1 {
            return Err(self.rejected(Transition::Retreat));
        }
        self.current -= 1;
        Ok(self.current)
    }

    /// Move to a freshly appended page, which must be `max + 1`.
    pub fn record_new_page(&mut self, page_number: u32) -> Result<(), StoryError> {
        if self.max.checked_add(1) != Some(page_number) {
            return Err(self.rejected(Transition::RecordNewPage(page_number)));
        }
        self.current = page_number;
        self.max = page_number;
        Ok(())
    }

    fn rejected(&self, transition: Transition) -> StoryError {
        StoryError::InvalidTransition {
            transition,
            current: self.current,
            max: self.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(current: u32, max: u32) -> PageCursor {
        PageCursor::at(current, max).unwrap()
    }

    #[test]
    fn test_starts_on_latest_page() {
        let pages: Vec<Page> = (1..=4)
            .map(|n| Page {
                page_number: n,
                text: String::new(),
            })
            .collect();
        assert_eq!(PageCursor::from_pages(&pages), cursor(4, 4));
        assert_eq!(PageCursor::from_pages(&[]), cursor(0, 0));
    }

    #[test]
    fn test_advance_at_latest_is_rejected() {
        let mut c = cursor(3, 3);
        assert!(matches!(
            c.advance(),
            Err(StoryError::InvalidTransition {
                transition: Transition::Advance,
                ..
            })
        ));
        assert_eq!(c, cursor(3, 3));
    }

    #[test]
    fn test_retreat_on_first_page_is_rejected() {
        let mut c = cursor(1, 5);
        assert!(c.retreat().is_err());
        assert_eq!(c, cursor(1, 5));
    }

    #[test]
    fn test_advance_while_browsing() {
        let mut c = cursor(2, 5);
        assert_eq!(c.advance().unwrap(), 3);
        assert_eq!(c, cursor(3, 5));
    }

    #[test]
    fn test_retreat_while_browsing() {
        let mut c = cursor(4, 5);
        assert_eq!(c.retreat().unwrap(), 3);
        assert_eq!(c.state(), CursorState::Browsing);
    }

    #[test]
    fn test_record_new_page_must_follow_max() {
        let mut c = PageCursor::default();
        c.record_new_page(1).unwrap();
        assert_eq!(c, cursor(1, 1));

        assert!(c.record_new_page(3).is_err());
        assert!(c.record_new_page(1).is_err());
        assert_eq!(c, cursor(1, 1));
    }

    #[test]
    fn test_record_new_page_past_last_number_is_rejected() {
        let mut c = cursor(u32::MAX, u32::MAX);
        assert!(c.record_new_page(0).is_err());
        assert!(c.record_new_page(u32::MAX).is_err());
        assert_eq!(c, cursor(u32::MAX, u32::MAX));
    }

    #[test]
    fn test_states() {
        assert_eq!(cursor(0, 0).state(), CursorState::Empty);
        assert_eq!(cursor(2, 2).state(), CursorState::AtLatest);
        assert_eq!(cursor(1, 2).state(), CursorState::Browsing);
    }

    #[test]
    fn test_invalid_positions_are_refused() {
        assert!(PageCursor::at(3, 2).is_none());
        assert!(PageCursor::at(0, 2).is_none());
    }
}
