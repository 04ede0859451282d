//! Frame composition: body rows plus the status row, with the prompt
//! editor or help overlay swapped in when active.

mod help;
mod log_view;
mod status_bar;

pub use help::render_help;

use crate::app::App;
use crate::prompt::PromptState;
use ratatui::Frame;

/// Render one regular frame.
pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();
    app.current_mut().resize(area.width as usize, area.height as usize);
    log_view::render_body(f, app);
    status_bar::render_status(f, app);
}

/// Render a frame with the prompt editor on the status row.
pub fn render_with_prompt(f: &mut Frame, app: &mut App, prompt: &PromptState) {
    let area = f.area();
    app.current_mut().resize(area.width as usize, area.height as usize);
    log_view::render_body(f, app);
    status_bar::render_prompt(f, prompt);
}
