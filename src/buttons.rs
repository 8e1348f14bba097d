use crate::types::{Button, ButtonEvent, PacketFlags, Transition};
use std::time::Instant;

/// Last observed state of the pen buttons on one stream.
///
/// Both buttons start released. Only feed it flags from frames whose VALID
/// bit is set; no validity check happens here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    primary: bool,
    secondary: bool,
}

impl ButtonState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Primary => self.primary,
            Button::Secondary => self.secondary,
        }
    }

    fn slot(&mut self, button: Button) -> &mut bool {
        match button {
            Button::Primary => &mut self.primary,
            Button::Secondary => &mut self.secondary,
        }
    }

    /// Compare `flags` against the stored state and emit one event per
    /// button that changed, primary first.
    pub fn update(&mut self, flags: PacketFlags, at: Instant) -> Vec<ButtonEvent> {
        let mut events = Vec::new();
        for button in Button::ALL {
            let pressed = flags.contains(button.flag());
            let stored = self.slot(button);
            if pressed == *stored {
                continue;
            }
            *stored = pressed;
            events.push(ButtonEvent {
                button,
                transition: if pressed {
                    Transition::Pressed
                } else {
                    Transition::Released
                },
                at,
            });
        }
        events
    }
}
