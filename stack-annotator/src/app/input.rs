//! Conversion of egui input into annotator events.

use stack_masks::{Key, Modifiers};

pub(super) fn modifiers(m: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: m.shift,
        ctrl: m.ctrl || m.command,
        alt: m.alt,
    }
}

pub(super) fn key(key: egui::Key) -> Option<Key> {
    Some(match key {
        egui::Key::Num1 => Key::Num1,
        egui::Key::Num2 => Key::Num2,
        egui::Key::Num8 => Key::Num8,
        egui::Key::A => Key::A,
        egui::Key::C => Key::C,
        egui::Key::D => Key::D,
        egui::Key::M => Key::M,
        egui::Key::O => Key::O,
        egui::Key::P => Key::P,
        egui::Key::Q => Key::Q,
        egui::Key::R => Key::R,
        egui::Key::S => Key::S,
        egui::Key::W => Key::W,
        egui::Key::X => Key::X,
        egui::Key::Z => Key::Z,
        egui::Key::Space => Key::Space,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_counts_as_ctrl() {
        let m = modifiers(egui::Modifiers::COMMAND);
        assert!(m.ctrl);
        assert!(!m.shift);
        assert_eq!(modifiers(egui::Modifiers::SHIFT), Modifiers::SHIFT);
    }

    #[test]
    fn unknown_keys_are_dropped() {
        assert_eq!(key(egui::Key::Num8), Some(Key::Num8));
        assert_eq!(key(egui::Key::F1), None);
    }
}
