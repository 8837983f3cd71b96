use std::fmt;

/// Position of a component type in registration order.
///
/// Collections index their per-type worlds with it, and prototypes use it
/// to say which type each of their components belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeIndex(u8);

impl ComponentTypeIndex {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Return the raw index backing this handle.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentTypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
