/// Scroll position of one program's output pane
///
/// The line count is refreshed from the program's buffer whenever a
/// `MoreOutput` or `Finished` event arrives.
#[derive(Debug, Clone)]
pub struct OutputView {
    scroll_offset: usize,
    follow: bool,
    visible_lines: usize,
    line_count: usize,
}

impl Default for OutputView {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputView {
    pub fn new() -> Self {
        Self {
            scroll_offset: 0,
            follow: true,
            visible_lines: 0,
            line_count: 0,
        }
    }

    /// Record how many lines the buffer holds now
    pub fn set_line_count(&mut self, line_count: usize) {
        self.line_count = line_count;
        if self.follow {
            self.scroll_to_bottom();
        } else {
            self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Set the number of visible lines
    pub fn set_visible_lines(&mut self, lines: usize) {
        self.visible_lines = lines;
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    /// Get current scroll offset
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Scroll down by one line
    pub fn scroll_down(&mut self) {
        if self.scroll_offset < self.max_scroll_offset() {
            self.scroll_offset += 1;
        }
    }

    /// Scroll up by one line; leaves follow mode
    pub fn scroll_up(&mut self) {
        self.follow = false;
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.visible_lines / 2;
        self.scroll_offset = (self.scroll_offset + half_page).min(self.max_scroll_offset());
    }

    pub fn scroll_half_page_up(&mut self) {
        self.follow = false;
        let half_page = self.visible_lines / 2;
        self.scroll_offset = self.scroll_offset.saturating_sub(half_page);
    }

    pub fn scroll_to_top(&mut self) {
        self.follow = false;
        self.scroll_offset = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll_offset();
    }

    /// Check if the view sticks to the newest output
    pub fn follow(&self) -> bool {
        self.follow
    }

    pub fn toggle_follow(&mut self) {
        self.follow = !self.follow;
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    /// Back to the initial state for a new run
    pub fn reset(&mut self) {
        self.scroll_offset = 0;
        self.follow = true;
        self.line_count = 0;
    }

    fn max_scroll_offset(&self) -> usize {
        self.line_count.saturating_sub(self.visible_lines)
    }
}
