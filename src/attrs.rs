//! An ordered HTML attribute list.
//!
//! Attribute order is significant: tags are re-serialized in source order,
//! and `tal:attributes` updates values in place while new names append.

/// An ordered sequence of `(name, value)` attribute pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AttrList {
    attrs: Vec<(String, String)>,
}

impl AttrList {
    pub fn new(attrs: Vec<(String, String)>) -> Self {
        Self { attrs }
    }

    /// Returns the value of the attribute with the given name, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Updates the attribute in place, or appends it if absent. Returns
    /// whether an existing attribute was updated.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        for (k, v) in &mut self.attrs {
            if k == name {
                *v = value.into();
                return true;
            }
        }
        self.attrs.push((name.to_string(), value.into()));
        false
    }

    /// Removes the attribute with the given name. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.attrs.iter().position(|(k, _)| k == name) {
            Some(i) => {
                self.attrs.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
