//! Wire protocol for the pixel socket.
//!
//! Mutation frames are JSON; liveness probes are fixed literal tokens that
//! bypass JSON entirely.

use serde::{Deserialize, Serialize};

/// Liveness probe literal sent by clients.
pub const PING: &[u8] = b"ping";

/// Liveness acknowledgement literal, sent back without JSON framing.
pub const PONG: &str = "pong";

/// One RGBA color. Channel names are uppercase on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    #[serde(rename = "R")]
    pub r: u8,
    #[serde(rename = "G")]
    pub g: u8,
    #[serde(rename = "B")]
    pub b: u8,
    #[serde(rename = "A")]
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0 };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `#rrggbbaa` form, used in log lines.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// A single-pixel change. Inbound it is a mutation intent; outbound it is an
/// accepted change. The JSON shape is identical in both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelUpdate {
    pub x: i32,
    pub y: i32,
    pub color: Rgba,
}

impl PixelUpdate {
    pub fn new(x: i32, y: i32, color: Rgba) -> Self {
        Self { x, y, color }
    }

    /// The all-zero frame is a blank sentinel and is skipped on ingress.
    pub fn is_blank(&self) -> bool {
        *self == PixelUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_uppercase_channels() {
        let update = PixelUpdate::new(3, 7, Rgba::new(255, 0, 0, 255));
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"x":3,"y":7,"color":{"R":255,"G":0,"B":0,"A":255}}"#);
    }

    #[test]
    fn test_decode_client_frame() {
        let raw = r#"{"x":1,"y":1,"color":{"R":255,"G":0,"B":0,"A":255}}"#;
        let update: PixelUpdate = serde_json::from_str(raw).unwrap();
        assert_eq!(update.x, 1);
        assert_eq!(update.y, 1);
        assert_eq!(update.color, Rgba::new(255, 0, 0, 255));
    }

    #[test]
    fn test_negative_coordinates_decode() {
        let raw = r#"{"x":-1,"y":2,"color":{"R":0,"G":0,"B":0,"A":255}}"#;
        let update: PixelUpdate = serde_json::from_str(raw).unwrap();
        assert_eq!(update.x, -1);
    }

    #[test]
    fn test_blank_sentinel() {
        assert!(PixelUpdate::default().is_blank());
        assert!(!PixelUpdate::new(0, 0, Rgba::new(0, 0, 0, 1)).is_blank());
        assert!(!PixelUpdate::new(1, 0, Rgba::TRANSPARENT).is_blank());
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(Rgba::new(255, 0, 128, 255).to_hex(), "#ff0080ff");
    }
}
