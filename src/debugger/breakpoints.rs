use std::collections::HashSet;

use tracing::debug;

pub struct Breakpoints {
    lines: HashSet<i64>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self {
            lines: HashSet::new(),
        }
    }

    pub fn add(&mut self, line: i64) {
        self.lines.insert(line);
        debug!(line, "breakpoint set");
    }

    pub fn contains(&self, line: i64) -> bool {
        self.lines.contains(&line)
    }

    pub fn clear(&mut self) {
        if !self.lines.is_empty() {
            debug!(count = self.lines.len(), "breakpoints cleared");
        }
        self.lines.clear();
    }
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self::new()
    }
}
