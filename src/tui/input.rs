use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Focus};

/// Handle key event and update app state
pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl-C quits from any pane
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match key.code {
        KeyCode::Char('q') => {
            app.quit();
            return;
        }
        KeyCode::Tab => {
            app.toggle_focus();
            return;
        }
        // Start/stop program N directly
        KeyCode::Char(c @ '1'..='9') => {
            let index = (c as usize) - ('1' as usize);
            if index < app.programs().len() {
                app.select(index);
                app.toggle_selected();
            }
            return;
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.toggle_selected();
            return;
        }
        _ => {}
    }

    match app.focus() {
        Focus::List => handle_list_keys(app, key),
        Focus::Output => handle_output_keys(app, key),
    }
}

/// Handle key event while the program list has focus
fn handle_list_keys(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('l') | KeyCode::Right => app.set_focus(Focus::Output),
        _ => {}
    }
}

/// Handle key event while the output pane has focus
fn handle_output_keys(app: &mut App, key: KeyEvent) {
    if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left) {
        app.set_focus(Focus::List);
        return;
    }

    let view = app.current_view_mut();
    match key.code {
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            view.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            view.scroll_half_page_up();
        }
        KeyCode::Char('j') | KeyCode::Down => view.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => view.scroll_up(),
        KeyCode::Char('g') | KeyCode::Home => view.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => view.scroll_to_bottom(),
        KeyCode::Char('f') => view.toggle_follow(),
        _ => {}
    }
}
