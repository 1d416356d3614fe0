use gpui::{Pixels, ScrollHandle, point, px};

/// Near-bottom distance used to resume follow mode.
const AUTO_FOLLOW_RESUME_THRESHOLD: Pixels = px(24.);
/// Small delta used to ignore floating-point scroll jitter.
const SCROLL_DELTA_EPSILON: f32 = 1.0;

/// Keeps the message list pinned to its tail while replies grow, unless the student
/// has scrolled up to read.
pub struct ScrollManager {
    scroll_handle: ScrollHandle,
    pending_scroll_to_bottom: bool,
    follow_bottom: bool,
    last_scroll_offset: Pixels,
    last_max_offset: Pixels,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: ScrollHandle::new(),
            pending_scroll_to_bottom: false,
            follow_bottom: true,
            last_scroll_offset: Pixels::ZERO,
            last_max_offset: Pixels::ZERO,
        }
    }

    pub fn handle(&self) -> &ScrollHandle {
        &self.scroll_handle
    }

    pub fn request_scroll_to_bottom_if_following(&mut self) {
        if self.follow_bottom || near_bottom(self.last_scroll_offset, self.last_max_offset) {
            self.pending_scroll_to_bottom = true;
        }
    }

    pub fn reset(&mut self) {
        self.last_scroll_offset = Pixels::ZERO;
        self.last_max_offset = Pixels::ZERO;
        self.follow_bottom = true;
        self.pending_scroll_to_bottom = true;
    }

    pub fn update_follow_state(&mut self) {
        let offset = self.scroll_handle.offset().y;
        let max_offset = self.scroll_handle.max_offset().height;
        self.follow_bottom = next_follow_state(
            self.follow_bottom,
            self.pending_scroll_to_bottom,
            (self.last_scroll_offset, self.last_max_offset),
            (offset, max_offset),
        );
        self.last_scroll_offset = offset;
        self.last_max_offset = max_offset;
    }

    pub fn apply_pending_scroll(&mut self) -> bool {
        let should_scroll = self.follow_bottom || self.pending_scroll_to_bottom;

        if should_scroll {
            let max_offset = self.scroll_handle.max_offset().height;
            let current_x = self.scroll_handle.offset().x;
            let target_y = if max_offset > Pixels::ZERO {
                -max_offset
            } else {
                Pixels::ZERO
            };
            self.scroll_handle.set_offset(point(current_x, target_y));
        }

        self.pending_scroll_to_bottom = false;
        should_scroll
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

/// GPUI scrolls down with negative Y offsets, so `offset + max` approaches zero at the tail.
fn near_bottom(offset: Pixels, max_offset: Pixels) -> bool {
    if max_offset <= Pixels::ZERO {
        return true;
    }

    (offset + max_offset).abs() <= AUTO_FOLLOW_RESUME_THRESHOLD
}

fn next_follow_state(
    following: bool,
    pending_scroll: bool,
    (last_offset, last_max): (Pixels, Pixels),
    (offset, max_offset): (Pixels, Pixels),
) -> bool {
    let offset_delta = f32::from(offset) - f32::from(last_offset);
    let max_delta = (f32::from(max_offset) - f32::from(last_max)).abs();
    let content_size_changed = max_delta > SCROLL_DELTA_EPSILON;
    let user_scrolled_up = offset_delta > SCROLL_DELTA_EPSILON && !content_size_changed;
    let user_scrolled_down = offset_delta < -SCROLL_DELTA_EPSILON && !content_size_changed;

    if pending_scroll || (content_size_changed && near_bottom(last_offset, last_max)) {
        true
    } else if following {
        !user_scrolled_up
    } else {
        user_scrolled_down && near_bottom(offset, max_offset)
    }
}
