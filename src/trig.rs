//! Optional memoization of `sin`/`cos`/`tan` behind the rotation and skew builders.
//!
//! Disabled by default. When enabled, results are cached per thread in bounded LRU caches keyed
//! by the bit pattern of the angle, so scenes that reuse a handful of angles skip the libm calls.

use lru::LruCache;
use std::cell::RefCell;
use std::num::NonZeroUsize;

struct TrigCache {
    sin: LruCache<u32, f32>,
    cos: LruCache<u32, f32>,
    tan: LruCache<u32, f32>,
}

impl TrigCache {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            sin: LruCache::new(capacity),
            cos: LruCache::new(capacity),
            tan: LruCache::new(capacity),
        }
    }

    fn len(&self) -> usize {
        self.sin.len() + self.cos.len() + self.tan.len()
    }
}

thread_local! {
    static TRIG_CACHE: RefCell<Option<TrigCache>> = const { RefCell::new(None) };
}

/// Enables the cache for the current thread, replacing any previous one.
pub fn enable_cache(capacity: NonZeroUsize) {
    TRIG_CACHE.with(|cache| *cache.borrow_mut() = Some(TrigCache::new(capacity)));
}

/// Disables the cache for the current thread and drops its contents.
pub fn disable_cache() {
    TRIG_CACHE.with(|cache| *cache.borrow_mut() = None);
}

pub fn is_cache_enabled() -> bool {
    TRIG_CACHE.with(|cache| cache.borrow().is_some())
}

/// Number of memoized values across all three functions.
pub fn cached_len() -> usize {
    TRIG_CACHE.with(|cache| cache.borrow().as_ref().map_or(0, TrigCache::len))
}

fn memoized(
    angle: f32,
    select: fn(&mut TrigCache) -> &mut LruCache<u32, f32>,
    compute: fn(f32) -> f32,
) -> f32 {
    TRIG_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let Some(cache) = cache.as_mut() else {
            return compute(angle);
        };

        *select(cache).get_or_insert(angle.to_bits(), || compute(angle))
    })
}

pub fn sin(angle: f32) -> f32 {
    memoized(angle, |cache| &mut cache.sin, f32::sin)
}

pub fn cos(angle: f32) -> f32 {
    memoized(angle, |cache| &mut cache.cos, f32::cos)
}

pub fn tan(angle: f32) -> f32 {
    memoized(angle, |cache| &mut cache.tan, f32::tan)
}
