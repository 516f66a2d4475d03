//! Immutable dispatch tables.
//!
//! A [`Dispatcher`] routes a key to a target without a chain of `match` arms
//! or `if`/`else` branches. Tables are values: [`Dispatcher::with`] returns a
//! new table and leaves the receiver untouched, so a shared base table can be
//! branched freely (for instance to inject a partial table in a test).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Copy-on-write mapping from `K` to `T`
pub struct Dispatcher<K, T> {
    table: Arc<HashMap<K, T>>,
}

impl<K, T> Dispatcher<K, T>
where
    K: Eq + Hash,
{
    /// A dispatcher with no entries
    pub fn empty() -> Self {
        Self {
            table: Arc::new(HashMap::new()),
        }
    }

    /// A dispatcher with a single entry
    pub fn of(key: K, value: T) -> Self {
        let mut table = HashMap::with_capacity(1);
        table.insert(key, value);
        Self {
            table: Arc::new(table),
        }
    }

    /// Look up the target for `key`; `None` when the key is not registered
    pub fn dispatch<Q>(&self, key: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.table.keys()
    }
}

impl<K, T> Dispatcher<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// A new dispatcher equal to this one except that `key` maps to `value`
    pub fn with(&self, key: K, value: T) -> Self {
        let mut table = Arc::clone(&self.table);
        Arc::make_mut(&mut table).insert(key, value);
        Self { table }
    }

    /// [`with`](Self::with) for a dispatcher that is no longer needed.
    ///
    /// The table is only copied when another clone still shares it.
    pub fn into_with(self, key: K, value: T) -> Self {
        let mut table = self.table;
        Arc::make_mut(&mut table).insert(key, value);
        Self { table }
    }
}

impl<K, T> Clone for Dispatcher<K, T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<K: Eq + Hash, T> Default for Dispatcher<K, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: Eq + Hash, T> FromIterator<(K, T)> for Dispatcher<K, T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self {
            table: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl<K: fmt::Debug, T> fmt::Debug for Dispatcher<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("keys", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}
