//! Per-frame instance records and material bindings, keyed by mesh entry

use crate::textures::TextureBinder;
use crate::types::{InstanceOrientation, MaterialBinding};

/// Orientation records and material bindings accumulated during one frame
/// build. Everything here is cleared by [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    /// Records per mesh entry, indexed like the batch's entry table
    instances: Vec<Vec<InstanceOrientation>>,
    /// Binding index per mesh entry, if it has a base-color texture
    entry_material: Vec<Option<u32>>,
    /// Bindings in allocation order; position == binding index
    bindings: Vec<MaterialBinding>,
    max_units: u32,
}

impl InstanceRegistry {
    pub fn new(max_units: u32) -> Self {
        Self {
            max_units,
            ..Default::default()
        }
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.entry_material.clear();
        self.bindings.clear();
    }

    /// Make room for a newly registered entry
    pub fn add_entry(&mut self) -> usize {
        self.instances.push(Vec::new());
        self.entry_material.push(None);
        self.instances.len() - 1
    }

    pub fn push(&mut self, entry: usize, record: InstanceOrientation) {
        if let Some(list) = self.instances.get_mut(entry) {
            list.push(record);
        }
    }

    pub fn instances(&self, entry: usize) -> &[InstanceOrientation] {
        self.instances.get(entry).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn material(&self, entry: usize) -> Option<u32> {
        self.entry_material.get(entry).copied().flatten()
    }

    /// Bind `texture` to the next free texture unit for `entry`.
    ///
    /// Entries that already have a binding keep it. Returns the binding
    /// index, or `None` past the unit cap or if the binder refuses.
    pub fn bind_material(
        &mut self,
        entry: usize,
        texture: &str,
        binder: &mut dyn TextureBinder,
    ) -> Option<u32> {
        if let Some(existing) = self.material(entry) {
            return Some(existing);
        }
        let unit = self.bindings.len() as u32;
        if unit >= self.max_units {
            log::warn!(
                "texture unit cap ({}) reached, '{}' draws untextured",
                self.max_units,
                texture
            );
            return None;
        }
        if !binder.bind(texture, unit) {
            return None;
        }
        self.bindings.push(MaterialBinding::new(unit));
        if let Some(slot) = self.entry_material.get_mut(entry) {
            *slot = Some(unit);
        }
        Some(unit)
    }

    /// Material bindings ordered by binding index
    pub fn bindings(&self) -> &[MaterialBinding] {
        &self.bindings
    }

    pub fn total_instances(&self) -> usize {
        self.instances.iter().map(Vec::len).sum()
    }
}
