use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Keys that drive continuous motion of the selected object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionalKey {
    #[serde(alias = "ArrowUp")]
    Forward,
    #[serde(alias = "ArrowDown")]
    Backward,
    #[serde(alias = "ArrowLeft")]
    RotateLeft,
    #[serde(alias = "ArrowRight")]
    RotateRight,
}

impl DirectionalKey {
    /// Map a DOM-style key name (`ArrowUp`, ...) to a directional key
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "ArrowUp" | "Up" | "w" | "W" => Some(DirectionalKey::Forward),
            "ArrowDown" | "Down" | "s" | "S" => Some(DirectionalKey::Backward),
            "ArrowLeft" | "Left" | "a" | "A" => Some(DirectionalKey::RotateLeft),
            "ArrowRight" | "Right" | "d" | "D" => Some(DirectionalKey::RotateRight),
            _ => None,
        }
    }
}

/// Currently held directional keys
#[derive(Debug, Default, Clone)]
pub struct HeldKeys {
    keys: HashSet<DirectionalKey>,
}

impl HeldKeys {
    /// Returns true if the key was not already held
    pub fn press(&mut self, key: DirectionalKey) -> bool {
        self.keys.insert(key)
    }

    pub fn release(&mut self, key: DirectionalKey) -> bool {
        self.keys.remove(&key)
    }

    pub fn is_held(&self, key: DirectionalKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Net rotation direction: -1 left, +1 right, 0 none or both
    pub fn rotation_sign(&self) -> f64 {
        let left = self.is_held(DirectionalKey::RotateLeft) as i8;
        let right = self.is_held(DirectionalKey::RotateRight) as i8;
        f64::from(right - left)
    }

    /// Net travel direction: +1 forward, -1 backward, 0 none or both
    pub fn travel_sign(&self) -> f64 {
        let fwd = self.is_held(DirectionalKey::Forward) as i8;
        let back = self.is_held(DirectionalKey::Backward) as i8;
        f64::from(fwd - back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(DirectionalKey::from_key_name("ArrowUp"), Some(DirectionalKey::Forward));
        assert_eq!(DirectionalKey::from_key_name("ArrowRight"), Some(DirectionalKey::RotateRight));
        assert_eq!(DirectionalKey::from_key_name("Enter"), None);
    }

    #[test]
    fn test_serde_accepts_dom_names() {
        let k: DirectionalKey = serde_json::from_str(r#""ArrowLeft""#).unwrap();
        assert_eq!(k, DirectionalKey::RotateLeft);
        let k: DirectionalKey = serde_json::from_str(r#""rotate_right""#).unwrap();
        assert_eq!(k, DirectionalKey::RotateRight);
    }

    #[test]
    fn test_held_signs() {
        let mut held = HeldKeys::default();
        assert!(held.press(DirectionalKey::RotateRight));
        assert!(!held.press(DirectionalKey::RotateRight));
        assert_eq!(held.rotation_sign(), 1.0);
        held.press(DirectionalKey::RotateLeft);
        assert_eq!(held.rotation_sign(), 0.0);

        held.press(DirectionalKey::Backward);
        assert_eq!(held.travel_sign(), -1.0);
        held.clear();
        assert!(held.is_empty());
    }
}
