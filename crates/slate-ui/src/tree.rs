#![forbid(unsafe_code)]

//! Opaque UI subtree roots.
//!
//! The widget toolkit lives outside the core. What the core tracks is
//! ownership: every screen and every app exclusively owns one root, and
//! attachment/detachment of child subtrees is the only structural
//! operation the managers perform.

/// An owned UI subtree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiRoot {
    name: String,
    children: Vec<String>,
}

impl UiRoot {
    /// Create an empty root.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// The root's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a child subtree by label.
    pub fn attach(&mut self, label: impl Into<String>) {
        self.children.push(label.into());
    }

    /// Detach a child subtree. Returns whether it was present.
    pub fn detach(&mut self, label: &str) -> bool {
        match self.children.iter().position(|c| c == label) {
            Some(idx) => {
                self.children.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Number of attached children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}
