use tessera_core::Color;
use tessera_render::TextureHandle;

use crate::port::PortKind;

/// A value flowing along a connection.
#[derive(Debug, Clone)]
pub enum Value {
    Texture(TextureHandle),
    Color(Color),
    Float(f64),
}

impl Value {
    pub fn kind(&self) -> PortKind {
        match self {
            Value::Texture(_) => PortKind::Texture,
            Value::Color(_) => PortKind::Color,
            Value::Float(_) => PortKind::Float,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureHandle> {
        match self {
            Value::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn into_texture(self) -> Option<TextureHandle> {
        match self {
            Value::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(color) => Some(*color),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<TextureHandle> for Value {
    fn from(texture: TextureHandle) -> Self {
        Value::Texture(texture)
    }
}

impl From<Color> for Value {
    fn from(color: Color) -> Self {
        Value::Color(color)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_accessors() {
        let color = Value::from(Color::RED);
        assert_eq!(color.kind(), PortKind::Color);
        assert_eq!(color.as_color(), Some(Color::RED));
        assert!(color.as_texture().is_none());
        assert!(color.clone().into_texture().is_none());

        let float = Value::from(0.5);
        assert_eq!(float.kind(), PortKind::Float);
        assert_eq!(float.as_float(), Some(0.5));
        assert!(float.as_color().is_none());
    }
}
