//! Input (mouse and keyboard) operations for CDP page session.

use serde_json::{Value, json};
use tracing::trace;

use crate::error::CdpError;
use crate::protocol::{KeyEventType, MouseButton, MouseEventType};

use super::core::PageSession;

impl PageSession {
    /// Click at coordinates.
    pub async fn click(&self, x: f64, y: f64) -> Result<(), CdpError> {
        for kind in [MouseEventType::MousePressed, MouseEventType::MouseReleased] {
            self.call(
                "Input.dispatchMouseEvent",
                Some(json!({
                    "type": kind,
                    "x": x,
                    "y": y,
                    "button": MouseButton::Left,
                    "clickCount": 1,
                })),
            )
            .await?;
        }

        trace!("Clicked at ({}, {})", x, y);
        Ok(())
    }

    /// Move mouse to coordinates.
    pub async fn mouse_move(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseMoved,
                "x": x,
                "y": y,
                "button": MouseButton::None,
            })),
        )
        .await?;
        Ok(())
    }

    /// Scroll by delta.
    pub async fn scroll(&self, x: f64, y: f64, delta_x: f64, delta_y: f64) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": MouseEventType::MouseWheel,
                "x": x,
                "y": y,
                "deltaX": delta_x,
                "deltaY": delta_y,
            })),
        )
        .await?;
        Ok(())
    }

    /// Insert text at the focused element.
    pub async fn type_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        trace!("Typed {} characters", text.chars().count());
        Ok(())
    }

    /// Press and release a key. Accepts combinations such as `Control+a`.
    pub async fn press_key(&self, combo: &str) -> Result<(), CdpError> {
        let parts: Vec<&str> = if combo.len() > 1 && combo.contains('+') {
            combo.split('+').collect()
        } else {
            vec![combo]
        };
        let (key, modifier_names) = match parts.split_last() {
            Some((key, rest)) => (*key, rest),
            None => (combo, &[][..]),
        };
        let modifiers = Self::get_modifiers(modifier_names);

        let mut down = Self::key_params(key, modifiers);
        down["type"] = json!(KeyEventType::KeyDown);
        self.call("Input.dispatchKeyEvent", Some(down)).await?;

        let mut up = Self::key_params(key, modifiers);
        up["type"] = json!(KeyEventType::KeyUp);
        if let Some(params) = up.as_object_mut() {
            params.remove("text");
        }
        self.call("Input.dispatchKeyEvent", Some(up)).await?;

        Ok(())
    }

    /// Build `Input.dispatchKeyEvent` params for a DOM key name.
    pub(super) fn key_params(key: &str, modifiers: i32) -> Value {
        let mut params = json!({
            "key": key,
            "modifiers": modifiers,
        });

        let (code, text) = match key {
            "Enter" => (Some(13), Some("\r".to_string())),
            "Tab" => (Some(9), None),
            "Backspace" => (Some(8), None),
            "Escape" => (Some(27), None),
            "Delete" => (Some(46), None),
            "ArrowLeft" => (Some(37), None),
            "ArrowUp" => (Some(38), None),
            "ArrowRight" => (Some(39), None),
            "ArrowDown" => (Some(40), None),
            "Home" => (Some(36), None),
            "End" => (Some(35), None),
            "PageUp" => (Some(33), None),
            "PageDown" => (Some(34), None),
            " " => (Some(32), Some(" ".to_string())),
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        let code = c.to_ascii_uppercase() as i64;
                        // Modified printable keys are shortcuts, not text.
                        let text = ((modifiers & !8) == 0).then(|| c.to_string());
                        (c.is_ascii_alphanumeric().then_some(code), text)
                    }
                    _ => (None, None),
                }
            }
        };

        if let Some(code) = code {
            params["windowsVirtualKeyCode"] = json!(code);
        }
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        params
    }

    /// Get modifier flags from modifier names.
    pub(super) fn get_modifiers(modifiers: &[&str]) -> i32 {
        let mut flags = 0;
        for m in modifiers {
            match m.to_lowercase().as_str() {
                "alt" => flags |= 1,
                "control" | "ctrl" => flags |= 2,
                "meta" | "command" | "cmd" => flags |= 4,
                "shift" => flags |= 8,
                _ => {}
            }
        }
        flags
    }
}
