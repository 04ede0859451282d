//! The viewer stack: one root plus a viewer per applied filter.
//!
//! Viewers are never mutated by stack operations other than cursor
//! placement in the destination; a popped filter can always be re-applied
//! to reproduce the same viewer. Cross-level identity runs through each
//! viewer's origin indices.

use crate::buffer::SharedBuffer;
use crate::viewer::Viewer;

pub struct ViewerStack {
    viewers: Vec<Viewer>,
}

impl ViewerStack {
    pub fn new(root: Viewer) -> Self {
        Self {
            viewers: vec![root],
        }
    }

    pub fn depth(&self) -> usize {
        self.viewers.len()
    }

    pub fn current(&self) -> &Viewer {
        self.viewers.last().expect("stack is never empty")
    }

    pub fn current_mut(&mut self) -> &mut Viewer {
        self.viewers.last_mut().expect("stack is never empty")
    }

    pub fn root(&self) -> &Viewer {
        &self.viewers[0]
    }

    pub fn root_mut(&mut self) -> &mut Viewer {
        &mut self.viewers[0]
    }

    pub fn push(&mut self, viewer: Viewer) {
        self.viewers.push(viewer);
    }

    /// Map a position in one viewer to its position in the parent.
    fn level_target(buf: &SharedBuffer, top: usize) -> usize {
        if buf.has_origin() {
            buf.origin_at(top)
                .or_else(|| buf.origin_last())
                .unwrap_or(top)
        } else {
            top
        }
    }

    /// Place the cursor in a destination viewer after pop/reset.
    fn land(dest: &mut Viewer, target: usize) {
        dest.top_line_offset = 0;
        if let Some(idx) = dest.buffer().origin_lower_bound(target) {
            dest.top_line = idx;
        } else {
            dest.top_line = target.min(dest.line_count().saturating_sub(1));
        }
    }

    /// Remove the top viewer, preserving the cursor line in the parent.
    /// No-op returning false when only the root remains.
    pub fn pop(&mut self) -> bool {
        if self.viewers.len() <= 1 {
            return false;
        }
        let top_viewer = self.current();
        let target = Self::level_target(top_viewer.buffer(), top_viewer.top_line);
        self.viewers.pop();
        Self::land(self.current_mut(), target);
        true
    }

    /// Drop every filter, tracing the cursor back to its root line.
    /// No-op returning false when only the root remains.
    pub fn reset(&mut self) -> bool {
        if self.viewers.len() <= 1 {
            return false;
        }
        let target = self.trace_to_root(self.current().top_line);
        self.viewers.truncate(1);
        Self::land(self.current_mut(), target);
        true
    }

    /// Fold a current-viewer position through every origin vector down to
    /// the root, yielding the original line index (used by the status bar
    /// and by reset).
    pub fn trace_to_root(&self, top: usize) -> usize {
        let mut line = top;
        for viewer in self.viewers[1..].iter().rev() {
            line = Self::level_target(viewer.buffer(), line);
        }
        line
    }
}
