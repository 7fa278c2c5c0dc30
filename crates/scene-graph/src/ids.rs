use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type LayerId = u64;
pub type NodeId = u64;

const CATEGORY_SHIFT: u32 = 56;
const INDEX_MASK: u64 = (1 << CATEGORY_SHIFT) - 1;

/// Well-known layer ids.
pub struct DsgLayers;

impl DsgLayers {
    pub const MESH: LayerId = 1;
    pub const OBJECTS: LayerId = 2;
    pub const AGENTS: LayerId = 2;
    pub const PLACES: LayerId = 3;
    pub const ROOMS: LayerId = 4;
    pub const BUILDINGS: LayerId = 5;

    /// Layer ids used when nothing else is configured, outermost last.
    pub fn defaults() -> Vec<LayerId> {
        vec![Self::OBJECTS, Self::PLACES, Self::ROOMS, Self::BUILDINGS]
    }
}

/// Node id split into a category character and a 56-bit index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeSymbol(NodeId);

impl NodeSymbol {
    /// # Panics
    ///
    /// Panics if `category` is not ASCII; only one byte of the id is reserved
    /// for it.
    pub fn new(category: char, index: u64) -> Self {
        assert!(
            category.is_ascii(),
            "node symbol category {category:?} is not ASCII"
        );
        Self(((category as u64) << CATEGORY_SHIFT) | (index & INDEX_MASK))
    }

    pub fn category(&self) -> char {
        char::from((self.0 >> CATEGORY_SHIFT) as u8)
    }

    pub fn category_id(&self) -> u64 {
        self.0 & INDEX_MASK
    }

    pub fn value(&self) -> NodeId {
        self.0
    }
}

impl From<NodeId> for NodeSymbol {
    fn from(id: NodeId) -> Self {
        Self(id)
    }
}

impl From<NodeSymbol> for NodeId {
    fn from(symbol: NodeSymbol) -> Self {
        symbol.0
    }
}

impl fmt::Display for NodeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.category(), self.category_id())
    }
}

impl fmt::Debug for NodeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeSymbol({self})")
    }
}

/// Tag distinguishing the time-indexed streams that share a layer id.
///
/// Always an ASCII character, so distinct prefixes mint disjoint ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct LayerPrefix(char);

impl LayerPrefix {
    /// # Panics
    ///
    /// Panics if `prefix` is not ASCII. Use `LayerPrefix::try_from` to handle
    /// that as an error.
    pub fn new(prefix: char) -> Self {
        match Self::try_from(prefix) {
            Ok(prefix) => prefix,
            Err(e) => panic!("{e}"),
        }
    }

    /// Id of the `index`-th node of this stream.
    pub fn make_id(&self, index: u64) -> NodeId {
        NodeSymbol::new(self.0, index).value()
    }

    /// Whether `node` was minted by this prefix.
    pub fn matches(&self, node: NodeId) -> bool {
        NodeSymbol::from(node).category() == self.0
    }
}

impl TryFrom<char> for LayerPrefix {
    type Error = ConfigError;

    fn try_from(prefix: char) -> Result<Self, Self::Error> {
        if !prefix.is_ascii() {
            return Err(ConfigError::InvalidPrefix(prefix));
        }
        Ok(Self(prefix))
    }
}

impl From<LayerPrefix> for char {
    fn from(prefix: LayerPrefix) -> Self {
        prefix.0
    }
}

impl fmt::Display for LayerPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for LayerPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerPrefix({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_packing() {
        let symbol = NodeSymbol::new('p', 42);
        assert_eq!(symbol.category(), 'p');
        assert_eq!(symbol.category_id(), 42);
        assert_eq!(symbol.to_string(), "p(42)");
        assert_eq!(NodeSymbol::from(symbol.value()), symbol);
    }

    #[test]
    fn test_prefix_ids_are_disjoint() {
        let a = LayerPrefix::new('a');
        let b = LayerPrefix::new('b');
        assert_ne!(a.make_id(0), b.make_id(0));
        assert!(a.matches(a.make_id(7)));
        assert!(!b.matches(a.make_id(7)));
        assert_eq!(NodeSymbol::from(a.make_id(7)).category_id(), 7);
    }

    #[test]
    fn test_prefix_must_be_ascii() {
        assert_eq!(
            LayerPrefix::try_from('\u{100}'),
            Err(ConfigError::InvalidPrefix('\u{100}'))
        );
        assert!(LayerPrefix::try_from('\u{200}').is_err());
        assert!(LayerPrefix::try_from('\u{e9}').is_err());

        let prefix = LayerPrefix::try_from('z').unwrap();
        assert!(prefix.matches(prefix.make_id(0)));
        assert_ne!(prefix.make_id(0), 0);
        assert_eq!(NodeSymbol::from(prefix.make_id(3)).to_string(), "z(3)");
    }

    #[test]
    #[should_panic(expected = "not a valid layer prefix")]
    fn test_new_panics_on_wide_prefix() {
        LayerPrefix::new('\u{100}');
    }

    #[test]
    fn test_prefix_deserialize_is_checked() {
        let prefix: LayerPrefix = serde_json::from_str("\"a\"").unwrap();
        assert_eq!(prefix, LayerPrefix::new('a'));
        assert!(serde_json::from_str::<LayerPrefix>(r#""\u0100""#).is_err());
    }
}
