//! Distance functions over arbitrary value types.
//!
//! The tree never inspects values; everything it knows comes from a
//! [`Distance`] implementation supplied at construction. Implementations must
//! be metrics:
//! - Non-negative: d(x, y) ≥ 0
//! - Symmetric:    d(x, y) = d(y, x)
//! - Identity:     d(x, x) = 0
//! - Triangle:     d(x, z) ≤ d(x, y) + d(y, z)
//!
//! None of this is checked at runtime. A non-metric distance makes queries
//! silently miss results but never breaks the tree structure.
//!
//! Any closure `Fn(&V, &V) -> f64` is a distance, so most callers never name
//! this trait. The unit structs below are reference metrics for common value
//! shapes (numbers, points, strings). [`CountingDistance`] and
//! [`CachedDistance`] wrap any of them to count or memoize evaluations.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::{DashMap, DashSet};

/// Generic distance function, the only operation the tree performs on values.
pub trait Distance<V: ?Sized> {
    fn distance(&self, a: &V, b: &V) -> f64;
}

impl<V: ?Sized, F> Distance<V> for F
where
    F: Fn(&V, &V) -> f64,
{
    #[inline]
    fn distance(&self, a: &V, b: &V) -> f64 {
        self(a, b)
    }
}

/// `|a - b|` on scalars.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbsoluteDifference;

macro_rules! impl_absolute_difference {
    ($($t:ty),*) => {
        $(
            impl Distance<$t> for AbsoluteDifference {
                #[inline]
                fn distance(&self, a: &$t, b: &$t) -> f64 {
                    (*a as f64 - *b as f64).abs()
                }
            }
        )*
    };
}

impl_absolute_difference!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// L1 distance on points. Points of unequal length are compared as if the
/// shorter one were padded with zeros.
#[derive(Clone, Copy, Debug, Default)]
pub struct Manhattan;

fn manhattan(a: impl IntoIterator<Item = f64>, b: impl IntoIterator<Item = f64>) -> f64 {
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    let mut total = 0.0;
    loop {
        match (a.next(), b.next()) {
            (None, None) => return total,
            (x, y) => total += (x.unwrap_or(0.0) - y.unwrap_or(0.0)).abs(),
        }
    }
}

macro_rules! impl_manhattan {
    ($($t:ty),*) => {
        $(
            impl Distance<[$t]> for Manhattan {
                fn distance(&self, a: &[$t], b: &[$t]) -> f64 {
                    manhattan(a.iter().map(|&x| x as f64), b.iter().map(|&x| x as f64))
                }
            }

            impl Distance<Vec<$t>> for Manhattan {
                fn distance(&self, a: &Vec<$t>, b: &Vec<$t>) -> f64 {
                    manhattan(a.iter().map(|&x| x as f64), b.iter().map(|&x| x as f64))
                }
            }

            impl<const N: usize> Distance<[$t; N]> for Manhattan {
                fn distance(&self, a: &[$t; N], b: &[$t; N]) -> f64 {
                    manhattan(a.iter().map(|&x| x as f64), b.iter().map(|&x| x as f64))
                }
            }

            impl Distance<($t, $t)> for Manhattan {
                fn distance(&self, a: &($t, $t), b: &($t, $t)) -> f64 {
                    manhattan([a.0 as f64, a.1 as f64], [b.0 as f64, b.1 as f64])
                }
            }

            impl Distance<($t, $t, $t)> for Manhattan {
                fn distance(&self, a: &($t, $t, $t), b: &($t, $t, $t)) -> f64 {
                    manhattan(
                        [a.0 as f64, a.1 as f64, a.2 as f64],
                        [b.0 as f64, b.1 as f64, b.2 as f64],
                    )
                }
            }
        )*
    };
}

impl_manhattan!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Levenshtein edit distance on strings, counted in `char`s.
#[derive(Clone, Copy, Debug, Default)]
pub struct Levenshtein;

impl Distance<str> for Levenshtein {
    fn distance(&self, a: &str, b: &str) -> f64 {
        strsim::levenshtein(a, b) as f64
    }
}

impl Distance<String> for Levenshtein {
    fn distance(&self, a: &String, b: &String) -> f64 {
        strsim::levenshtein(a, b) as f64
    }
}

impl<'s> Distance<&'s str> for Levenshtein {
    fn distance(&self, a: &&'s str, b: &&'s str) -> f64 {
        strsim::levenshtein(a, b) as f64
    }
}

/// 0 for equal values, 1 otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discrete;

impl<T: PartialEq + ?Sized> Distance<T> for Discrete {
    #[inline]
    fn distance(&self, a: &T, b: &T) -> f64 {
        if a == b {
            0.0
        } else {
            1.0
        }
    }
}

/// Wraps a distance and counts how many times it is evaluated.
///
/// The counter is what the tree exists to keep small, so tests and the
/// benchmark binary use it to compare against a linear scan.
#[derive(Debug, Default)]
pub struct CountingDistance<D> {
    inner: D,
    calls: AtomicUsize,
}

impl<D> CountingDistance<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of evaluations since construction or the last reset.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn reset_counter(&self) {
        self.calls.store(0, Ordering::Relaxed);
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<V: ?Sized, D: Distance<V>> Distance<V> for CountingDistance<D> {
    #[inline]
    fn distance(&self, a: &V, b: &V) -> f64 {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.distance(a, b)
    }
}

/// Memoizing wrapper: each unordered pair is evaluated by the inner
/// distance at most once.
///
/// Pairs are stored smaller value first, so `d(a, b)` and `d(b, a)` share
/// one cache slot. `unique_calls` counts the distinct pairs asked for since
/// construction or the last [`reset_counter`](Self::reset_counter); the
/// cache itself survives a reset. Both maps are concurrent, so a cached tree
/// can still serve [`MTree::knn_batch`](crate::MTree::knn_batch).
pub struct CachedDistance<V, D> {
    inner: D,
    cache: DashMap<(V, V), f64>,
    calls: DashSet<(V, V)>,
}

impl<V, D> CachedDistance<V, D>
where
    V: Hash + Eq,
{
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            calls: DashSet::new(),
        }
    }

    /// Distinct pairs requested since construction or the last reset.
    pub fn unique_calls(&self) -> usize {
        self.calls.len()
    }

    pub fn reset_counter(&self) {
        self.calls.clear();
    }

    /// Number of memoized pairs.
    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<V, D> Distance<V> for CachedDistance<V, D>
where
    V: Hash + Eq + Ord + Clone,
    D: Distance<V>,
{
    fn distance(&self, a: &V, b: &V) -> f64 {
        let key = if a > b {
            (b.clone(), a.clone())
        } else {
            (a.clone(), b.clone())
        };
        self.calls.insert(key.clone());

        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }
        let d = self.inner.distance(&key.0, &key.1);
        self.cache.insert(key, d);
        d
    }
}

impl<V: Hash + Eq, D: fmt::Debug> fmt::Debug for CachedDistance<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedDistance")
            .field("inner", &self.inner)
            .field("cached_pairs", &self.cache.len())
            .field("unique_calls", &self.calls.len())
            .finish()
    }
}
