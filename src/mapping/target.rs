//! Target descriptors
//!
//! Typed description of *where* a mapped value goes. The router never
//! resolves these; an [`ApplyTarget`](crate::apply::ApplyTarget)
//! implementation does, by explicit lookup.
//!
//! Generic rules are configured with data-path text such as
//! `objects['Cube'].location[0]`. That text is parsed into a
//! [`PropertyTarget`] here and never evaluated. Accepted forms (an optional
//! leading `bpy.` / `bpy.data.` is ignored):
//!
//! ```text
//! scene.frame_current                                   timeline frame
//! screen.is_animation_playing                           timeline play/pause
//! <coll>['Owner'].prop.sub                              scalar property
//! <coll>['Owner'].prop[2]                               array element
//! <coll>['Owner'].modifiers['Mod']['Socket_2']          modifier input
//! <coll>['Owner'](.node_tree).nodes['N'].inputs[1]      node socket input
//! ```

use std::fmt;
use std::str::FromStr;

use crate::mapping::rule::{Axis, RotationMode};

/// Concrete destination of one update command
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Shape key value on a mesh object
    ShapeKey { object: String, shape_key: String },
    /// Single rotation component of a pose bone
    BoneRotation {
        armature: String,
        bone: String,
        axis: Axis,
        mode: RotationMode,
    },
    /// Any other numeric property
    Property(PropertyTarget),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::ShapeKey { object, shape_key } => write!(f, "shape_key {object}/{shape_key}"),
            Target::BoneRotation {
                armature,
                bone,
                axis,
                mode,
            } => write!(f, "bone {armature}/{bone} {axis:?} ({mode:?})"),
            Target::Property(path) => write!(f, "property {path}"),
        }
    }
}

/// Generic property destination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyTarget {
    /// Current frame of the timeline
    TimelineFrame,
    /// Timeline playback; values above 0.5 mean "playing"
    TimelinePlayback,
    /// Named (possibly dotted) scalar property of a datablock
    Scalar {
        collection: String,
        owner: String,
        property: String,
    },
    /// One element of an array property
    ArrayElement {
        collection: String,
        owner: String,
        property: String,
        index: usize,
    },
    /// Input socket exposed by a modifier on an object
    ModifierInput {
        collection: String,
        owner: String,
        modifier: String,
        socket: String,
    },
    /// Default value of a node's input socket inside a node tree
    NodeInput {
        collection: String,
        owner: String,
        node: String,
        input: usize,
        /// Path reaches the nodes through the owner's `.node_tree`
        node_tree: bool,
        /// Path ends in `.default_value`
        default_value: bool,
    },
    /// Text that did not parse; resolution fails at apply time
    Unresolved(String),
}

impl PropertyTarget {
    /// Parse data-path text, keeping unparsable text as [`Unresolved`].
    ///
    /// [`Unresolved`]: PropertyTarget::Unresolved
    pub fn parse_lenient(text: &str) -> Self {
        let text = text.trim();
        text.parse()
            .unwrap_or_else(|_| PropertyTarget::Unresolved(text.to_string()))
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, PropertyTarget::Unresolved(_))
    }

    /// Datablock name the path is anchored on, if any
    pub fn owner(&self) -> Option<&str> {
        match self {
            PropertyTarget::Scalar { owner, .. }
            | PropertyTarget::ArrayElement { owner, .. }
            | PropertyTarget::ModifierInput { owner, .. }
            | PropertyTarget::NodeInput { owner, .. } => Some(owner),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyTarget::TimelineFrame => f.write_str("scene.frame_current"),
            PropertyTarget::TimelinePlayback => f.write_str("screen.is_animation_playing"),
            PropertyTarget::Scalar {
                collection,
                owner,
                property,
            } => write!(f, "{collection}['{owner}'].{property}"),
            PropertyTarget::ArrayElement {
                collection,
                owner,
                property,
                index,
            } => write!(f, "{collection}['{owner}'].{property}[{index}]"),
            PropertyTarget::ModifierInput {
                collection,
                owner,
                modifier,
                socket,
            } => write!(f, "{collection}['{owner}'].modifiers['{modifier}']['{socket}']"),
            PropertyTarget::NodeInput {
                collection,
                owner,
                node,
                input,
                node_tree,
                default_value,
            } => {
                write!(f, "{collection}['{owner}']")?;
                if *node_tree {
                    f.write_str(".node_tree")?;
                }
                write!(f, ".nodes['{node}'].inputs[{input}]")?;
                if *default_value {
                    f.write_str(".default_value")?;
                }
                Ok(())
            }
            PropertyTarget::Unresolved(text) => f.write_str(text),
        }
    }
}

/// Data-path text that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePathError {
    pub path: String,
    pub offset: usize,
    pub expected: &'static str,
}

impl fmt::Display for ParsePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid data path {:?}: expected {} at offset {}",
            self.path, self.expected, self.offset
        )
    }
}

impl std::error::Error for ParsePathError {}

impl FromStr for PropertyTarget {
    type Err = ParsePathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        PathParser::new(text).parse()
    }
}

struct PathParser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn error(&self, expected: &'static str) -> ParsePathError {
        ParsePathError {
            path: self.text.to_string(),
            offset: self.pos,
            expected,
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<&'a str, ParsePathError> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 || rest.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error("identifier"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// Consume `name` only when a `[` follows it
    fn eat_keyed(&mut self, name: &str) -> bool {
        let keyed = self
            .rest()
            .strip_prefix(name)
            .is_some_and(|after| after.starts_with('['));
        if keyed {
            self.pos += name.len();
        }
        keyed
    }

    /// `['name']` or `["name"]`
    fn quoted_key(&mut self) -> Result<&'a str, ParsePathError> {
        if !self.eat("[") {
            return Err(self.error("'['"));
        }
        let quote = match self.rest().chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("quote")),
        };
        self.pos += 1;
        let rest = self.rest();
        let end = rest.find(quote).ok_or_else(|| self.error("closing quote"))?;
        let key = &rest[..end];
        self.pos += end + 1;
        if !self.eat("]") {
            return Err(self.error("']'"));
        }
        Ok(key)
    }

    /// `[123]`
    fn numeric_index(&mut self) -> Result<usize, ParsePathError> {
        if !self.eat("[") {
            return Err(self.error("'['"));
        }
        let rest = self.rest();
        let len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let index = rest[..len].parse().map_err(|_| self.error("index"))?;
        self.pos += len;
        if !self.eat("]") {
            return Err(self.error("']'"));
        }
        Ok(index)
    }

    fn finish<T>(&self, value: T) -> Result<T, ParsePathError> {
        if self.pos == self.text.len() {
            Ok(value)
        } else {
            Err(self.error("end of path"))
        }
    }

    fn parse(mut self) -> Result<PropertyTarget, ParsePathError> {
        self.eat("bpy.");
        self.eat("context.");

        match self.rest() {
            "scene.frame_current" => return Ok(PropertyTarget::TimelineFrame),
            "screen.is_animation_playing" => return Ok(PropertyTarget::TimelinePlayback),
            _ => {}
        }

        self.eat("data.");
        let collection = self.ident()?.to_string();
        let owner = self.quoted_key()?.to_string();
        if !self.eat(".") {
            return Err(self.error("'.'"));
        }

        if self.eat_keyed("modifiers") {
            let modifier = self.quoted_key()?.to_string();
            let socket = self.quoted_key()?.to_string();
            return self.finish(PropertyTarget::ModifierInput {
                collection,
                owner,
                modifier,
                socket,
            });
        }

        let checkpoint = self.pos;
        let node_tree = self.eat("node_tree.");
        if self.eat_keyed("nodes") {
            let node = self.quoted_key()?.to_string();
            if !self.eat(".inputs") {
                return Err(self.error("'.inputs'"));
            }
            let input = self.numeric_index()?;
            let default_value = self.eat(".default_value");
            return self.finish(PropertyTarget::NodeInput {
                collection,
                owner,
                node,
                input,
                node_tree,
                default_value,
            });
        }
        self.pos = checkpoint;

        let start = self.pos;
        self.ident()?;
        while self.eat(".") {
            self.ident()?;
        }
        let property = self.text[start..self.pos].to_string();

        if self.rest().starts_with('[') {
            let index = self.numeric_index()?;
            return self.finish(PropertyTarget::ArrayElement {
                collection,
                owner,
                property,
                index,
            });
        }

        self.finish(PropertyTarget::Scalar {
            collection,
            owner,
            property,
        })
    }
}
