use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::GenomeId;

/// Bidirectional mapping between genome names and small integer ids.
///
/// One registry exists per loaded dataset. Ids are handed out in registration
/// order starting at 0 and are never reused.
#[derive(Debug, Clone, Default)]
pub struct GenomeRegistry {
    names: Vec<String>,
    ids: FxHashMap<String, GenomeId>,
}

impl GenomeRegistry {
    pub fn new() -> Self {
        GenomeRegistry::default()
    }

    /// Register a genome name, returning the existing id when it is known.
    pub fn register(&mut self, name: &str) -> GenomeId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as GenomeId;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn id(&self, name: &str) -> Option<GenomeId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: GenomeId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All registered ids.
    pub fn all(&self) -> BTreeSet<GenomeId> {
        (0..self.names.len() as GenomeId).collect()
    }

    /// Resolve a list of names, reporting the first unknown one.
    pub fn resolve<'a, I>(&self, names: I) -> Result<BTreeSet<GenomeId>, &'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| self.id(name).ok_or(name))
            .collect()
    }

    /// Stable display color of a genome, derived from its name.
    pub fn color(&self, id: GenomeId) -> Option<(u8, u8, u8)> {
        self.name(id).map(genome_color)
    }
}

/// Compute a SHA256-based color for a genome name (odgi path color scheme)
pub fn genome_color(name: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let result = hasher.finalize();

    let mut r = result[24] as f32 / 255.0;
    let mut g = result[8] as f32 / 255.0;
    let mut b = result[16] as f32 / 255.0;

    // Normalize by sum
    let sum = r + g + b;
    if sum > 0.0 {
        r /= sum;
        g /= sum;
        b /= sum;
    }

    // Brighten
    let max_component = r.max(g).max(b);
    let f = if max_component > 0.0 {
        1.5f32.min(1.0 / max_component)
    } else {
        1.0
    };

    (
        (255.0 * (r * f).min(1.0)).round() as u8,
        (255.0 * (g * f).min(1.0)).round() as u8,
        (255.0 * (b * f).min(1.0)).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut registry = GenomeRegistry::new();
        let a = registry.register("seq1.fasta");
        let b = registry.register("seq2.fasta");
        assert_eq!(registry.register("seq1.fasta"), a);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name(b), Some("seq2.fasta"));
        assert_eq!(registry.id("seq2.fasta"), Some(b));
    }

    #[test]
    fn resolve_reports_unknown_name() {
        let mut registry = GenomeRegistry::new();
        registry.register("a");
        registry.register("b");
        assert_eq!(registry.resolve(["b", "a"]).unwrap().len(), 2);
        assert_eq!(registry.resolve(["a", "zzz"]), Err("zzz"));
    }

    #[test]
    fn colors_are_stable() {
        assert_eq!(genome_color("TKK_04_0031"), genome_color("TKK_04_0031"));
        let mut registry = GenomeRegistry::new();
        let id = registry.register("TKK_04_0031");
        assert_eq!(registry.color(id), Some(genome_color("TKK_04_0031")));
        assert_eq!(registry.color(id + 1), None);
    }
}
