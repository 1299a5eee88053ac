use std::{
    borrow::Borrow,
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
};

/// Variable bindings consumed by the forward pass.
pub trait Environment {
    fn lookup(&self, name: &str) -> Option<f64>;
}

impl<K, S> Environment for HashMap<K, f64, S>
where
    K: Borrow<str> + Hash + Eq,
    S: BuildHasher,
{
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<K> Environment for BTreeMap<K, f64>
where
    K: Borrow<str> + Ord,
{
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// The first pair with a matching name wins.
impl Environment for [(&str, f64)] {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

impl<const N: usize> Environment for [(&str, f64); N] {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.as_slice().lookup(name)
    }
}

impl Environment for Vec<(&str, f64)> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.as_slice().lookup(name)
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn lookup(&self, name: &str) -> Option<f64> {
        (**self).lookup(name)
    }
}
