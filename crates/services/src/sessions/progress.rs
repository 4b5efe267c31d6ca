use serde::Serialize;

/// Aggregated view of a session cursor, useful for callers rendering progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub position: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    /// Cursor view of a list of `total` questions positioned at `pos`.
    ///
    /// Positions past the end are clamped to `total`.
    #[must_use]
    pub fn new(total: usize, pos: usize) -> Self {
        let position = pos.min(total);
        Self {
            total,
            position,
            remaining: total - position,
            is_complete: position == total,
        }
    }
}
