use std::collections::HashSet;

use super::types::{InputEvent, MouseButton, MouseButtonState, PointerButtonEvent, PointerMoveEvent};

/// Pointer state for one window.
///
/// Button events from the platform carry no position, so the last move is
/// remembered here and stamped onto them.
#[derive(Debug, Default)]
pub struct InputState {
    /// Pointer position in canvas pixels, `None` while outside the window.
    pub pointer_pos: Option<(f32, f32)>,

    /// Currently held mouse buttons.
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    pub fn apply_event(&mut self, ev: &InputEvent) {
        match ev {
            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                self.pointer_pos = Some((*x, *y));
            }
            InputEvent::PointerLeft => {
                self.pointer_pos = None;
            }
            InputEvent::PointerButton(PointerButtonEvent { button, state, .. }) => match state {
                MouseButtonState::Pressed => {
                    self.buttons_down.insert(*button);
                }
                MouseButtonState::Released => {
                    self.buttons_down.remove(button);
                }
            },
        }
    }

    pub fn any_button_down(&self) -> bool {
        !self.buttons_down.is_empty()
    }

    /// Last position seen inside the window, or the origin.
    pub fn last_pointer(&self) -> (f32, f32) {
        self.pointer_pos.unwrap_or((0.0, 0.0))
    }
}
