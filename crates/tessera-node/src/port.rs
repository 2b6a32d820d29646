use std::fmt;
use std::sync::Arc;

use tessera_core::{TesseraError, TesseraResult, TimeRange};
use tessera_render::TextureHandle;

use crate::context::EvalContext;
use crate::node::Node;
use crate::value::Value;

/// Type of the values a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Texture,
    Color,
    Float,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Texture => write!(f, "texture"),
            PortKind::Color => write!(f, "color"),
            PortKind::Float => write!(f, "float"),
        }
    }
}

/// A port a node produces values on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub id: String,
    pub name: String,
    pub kind: PortKind,
}

impl Output {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Upstream end of a connected input.
#[derive(Clone)]
pub struct Connection {
    pub node: Arc<dyn Node>,
    pub output: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("node", &self.node.id())
            .field("output", &self.output)
            .finish()
    }
}

/// A port a node consumes values on.
///
/// Holds a direct value, or a connection to exactly one upstream output.
/// While connected, the direct value is kept but ignored.
#[derive(Debug, Clone)]
pub struct Input {
    pub id: String,
    pub name: String,
    pub kind: PortKind,
    value: Option<Value>,
    connection: Option<Connection>,
}

impl Input {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            value: None,
            connection: None,
        }
    }

    /// Builder form of [`Input::set_value`] for defaults known to match.
    pub fn with_default(mut self, value: Value) -> Self {
        debug_assert_eq!(value.kind(), self.kind);
        self.value = Some(value);
        self
    }

    pub fn set_value(&mut self, value: Option<Value>) -> TesseraResult<()> {
        if let Some(v) = &value {
            if v.kind() != self.kind {
                return Err(TesseraError::InvalidArgument(format!(
                    "input '{}' takes a {}, not a {}",
                    self.id,
                    self.kind,
                    v.kind()
                )));
            }
        }
        self.value = value;
        Ok(())
    }

    /// Connect to `output` on `node`, replacing any previous connection.
    pub fn connect(&mut self, node: Arc<dyn Node>, output: &str) -> TesseraResult<()> {
        let port = node.output(output).ok_or_else(|| {
            TesseraError::InvalidArgument(format!(
                "node {} has no output '{}'",
                node.id(),
                output
            ))
        })?;
        if port.kind != self.kind {
            return Err(TesseraError::InvalidArgument(format!(
                "cannot connect {} output '{}' to {} input '{}'",
                port.kind, output, self.kind, self.id
            )));
        }
        tracing::debug!(input = %self.id, upstream = node.id(), output, "connected input");
        self.connection = Some(Connection {
            node,
            output: output.to_string(),
        });
        Ok(())
    }

    /// Drop the connection. The direct value applies again.
    pub fn disconnect(&mut self) -> Option<Connection> {
        self.connection.take()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn direct_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Resolve the input over `range`: the upstream output's value when
    /// connected, else the direct value.
    pub fn get_value(&self, cx: &mut EvalContext<'_>, range: &TimeRange) -> Option<Value> {
        match &self.connection {
            Some(connection) => connection.node.value(cx, &connection.output, range),
            None => self.value.clone(),
        }
    }

    /// [`Input::get_value`] narrowed to textures. Any other kind is `None`.
    pub fn get_texture(&self, cx: &mut EvalContext<'_>, range: &TimeRange) -> Option<TextureHandle> {
        match self.get_value(cx, range)? {
            Value::Texture(texture) => Some(texture),
            other => {
                tracing::debug!(input = %self.id, kind = %other.kind(), "expected a texture");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SolidGenerator;
    use tessera_core::{Color, Rational};

    #[test]
    fn test_set_value_checks_kind() {
        let mut input = Input::new("color", "Color", PortKind::Color);
        assert!(input.set_value(Some(Value::Float(1.0))).is_err());
        assert!(input.set_value(Some(Value::Color(Color::RED))).is_ok());
        assert_eq!(input.direct_value().and_then(Value::as_color), Some(Color::RED));
        assert!(input.set_value(None).is_ok());
        assert!(input.direct_value().is_none());
    }

    #[test]
    fn test_connect_validates_output() {
        let solid: Arc<dyn Node> = Arc::new(SolidGenerator::new());
        let mut input = Input::new("base", "Base", PortKind::Texture);
        assert!(input.connect(Arc::clone(&solid), "missing").is_err());
        assert!(!input.is_connected());
        input.connect(solid, "tex_out").unwrap();
        assert!(input.is_connected());
        assert_eq!(input.connection().unwrap().output, "tex_out");
    }

    #[test]
    fn test_connect_validates_kind() {
        let solid: Arc<dyn Node> = Arc::new(SolidGenerator::new());
        let mut input = Input::new("amount", "Amount", PortKind::Float);
        assert!(input.connect(solid, "tex_out").is_err());
    }

    #[test]
    fn test_disconnect_restores_direct_value() {
        let solid: Arc<dyn Node> = Arc::new(SolidGenerator::new());
        let mut input = Input::new("base", "Base", PortKind::Texture);
        input.connect(solid, "tex_out").unwrap();
        assert!(input.disconnect().is_some());
        assert!(!input.is_connected());
        let mut cx = EvalContext::detached();
        let range = TimeRange::frame(0, Rational::from_integer(30)).unwrap();
        assert!(input.get_value(&mut cx, &range).is_none());
    }
}
