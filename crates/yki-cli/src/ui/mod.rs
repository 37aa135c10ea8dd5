//! Ratatui exam UI.
//!
//! Keys:
//! - Up/Down: move selection
//! - Enter: start the highlighted level / edit the selected writing answer
//! - 1-4, Tab/Shift-Tab, Left/Right: switch section
//! - a-d: answer the selected question
//! - p or Space: play/stop the listening script (Listening section)
//! - s: submit answers; again for a new test
//! - l: logs
//! - q: quit

mod app;
mod render;

pub(crate) use app::run_tui;
