//! Local button gestures
//!
//! Debouncing and click counting happen upstream; this maps finished gestures
//! onto the store. Holding the button walks brightness one step at a time.

use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::config::ConfigStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonGesture {
    Single,
    Double,
    Triple,
    Hold,
    Step,
    Release,
}

impl fmt::Display for ButtonGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonGesture::Single => "single",
            ButtonGesture::Double => "double",
            ButtonGesture::Triple => "triple",
            ButtonGesture::Hold => "hold",
            ButtonGesture::Step => "step",
            ButtonGesture::Release => "release",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown button gesture '{0}'")]
pub struct UnknownGesture(String);

impl FromStr for ButtonGesture {
    type Err = UnknownGesture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ButtonGesture::Single),
            "double" => Ok(ButtonGesture::Double),
            "triple" => Ok(ButtonGesture::Triple),
            "hold" => Ok(ButtonGesture::Hold),
            "step" => Ok(ButtonGesture::Step),
            "release" => Ok(ButtonGesture::Release),
            other => Err(UnknownGesture(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct ButtonController {
    holding: bool,
    step: i8,
}

impl Default for ButtonController {
    fn default() -> Self {
        Self { holding: false, step: 1 }
    }
}

impl ButtonController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Apply one gesture; returns true when the store changed
    pub fn handle(&mut self, store: &mut ConfigStore, gesture: ButtonGesture) -> bool {
        debug!(gesture = %gesture, "Button");

        if gesture == ButtonGesture::Single {
            store.set_working(!store.general.working_on);
            return true;
        }
        if !store.general.working_on {
            return false;
        }

        match gesture {
            ButtonGesture::Single => true,
            ButtonGesture::Double => {
                store.next_effect();
                true
            }
            ButtonGesture::Triple => {
                store.previous_effect();
                true
            }
            ButtonGesture::Hold => {
                self.holding = true;
                match store.active_effect().record.brightness {
                    0 | 1 => self.step = 1,
                    u8::MAX => self.step = -1,
                    _ => {}
                }
                true
            }
            ButtonGesture::Step => self.holding && self.step_brightness(store),
            ButtonGesture::Release => {
                self.holding = false;
                false
            }
        }
    }

    fn step_brightness(&self, store: &mut ConfigStore) -> bool {
        let record = &mut store.active_effect_mut().record;
        let next = if self.step < 0 {
            record.brightness.checked_sub(1).filter(|b| *b >= 1)
        } else {
            record.brightness.checked_add(1)
        };
        match next {
            Some(brightness) => {
                record.brightness = brightness;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectRegistry, builtin_effects};

    fn store() -> ConfigStore {
        ConfigStore::new("a1b2c3".to_string(), EffectRegistry::new(builtin_effects()).unwrap())
    }

    #[test]
    fn test_parse_gesture() {
        assert_eq!("Hold".parse::<ButtonGesture>().unwrap(), ButtonGesture::Hold);
        assert_eq!(" release ".parse::<ButtonGesture>().unwrap(), ButtonGesture::Release);
        assert!("quadruple".parse::<ButtonGesture>().is_err());
    }

    #[test]
    fn test_single_toggles_working() {
        let mut s = store();
        let mut button = ButtonController::new();
        assert!(button.handle(&mut s, ButtonGesture::Single));
        assert!(s.general.working_on);
        assert!(button.handle(&mut s, ButtonGesture::Single));
        assert!(!s.general.working_on);
    }

    #[test]
    fn test_gestures_ignored_while_off() {
        let mut s = store();
        let mut button = ButtonController::new();
        assert!(!button.handle(&mut s, ButtonGesture::Double));
        assert!(!button.handle(&mut s, ButtonGesture::Hold));
        assert_eq!(s.active_effect().id(), "Fire");
        assert!(!button.is_holding());
    }

    #[test]
    fn test_double_and_triple_cycle_effects() {
        let mut s = store();
        s.set_working(true);
        let mut button = ButtonController::new();

        button.handle(&mut s, ButtonGesture::Double);
        assert_eq!(s.active_effect().id(), "Rainbow");
        button.handle(&mut s, ButtonGesture::Triple);
        button.handle(&mut s, ButtonGesture::Triple);
        assert_eq!(s.active_effect().id(), "Color");
    }

    #[test]
    fn test_step_requires_hold() {
        let mut s = store();
        s.set_working(true);
        let mut button = ButtonController::new();

        assert!(!button.handle(&mut s, ButtonGesture::Step));
        assert_eq!(s.active_effect().record.brightness, 80);

        button.handle(&mut s, ButtonGesture::Hold);
        assert!(button.handle(&mut s, ButtonGesture::Step));
        assert_eq!(s.active_effect().record.brightness, 81);

        assert!(!button.handle(&mut s, ButtonGesture::Release));
        assert!(!button.handle(&mut s, ButtonGesture::Step));
        assert_eq!(s.active_effect().record.brightness, 81);
    }

    #[test]
    fn test_hold_at_max_steps_down_to_one() {
        let mut s = store();
        s.set_working(true);
        s.active_effect_mut().record.brightness = 255;
        let mut button = ButtonController::new();

        button.handle(&mut s, ButtonGesture::Hold);
        for _ in 0..300 {
            button.handle(&mut s, ButtonGesture::Step);
        }
        assert_eq!(s.active_effect().record.brightness, 1);
        assert!(!button.handle(&mut s, ButtonGesture::Step));
    }

    #[test]
    fn test_hold_at_min_steps_up_to_max() {
        let mut s = store();
        s.set_working(true);
        s.active_effect_mut().record.brightness = 1;
        let mut button = ButtonController::new();
        button.step = -1;

        button.handle(&mut s, ButtonGesture::Hold);
        for _ in 0..300 {
            button.handle(&mut s, ButtonGesture::Step);
        }
        assert_eq!(s.active_effect().record.brightness, 255);
    }
}
