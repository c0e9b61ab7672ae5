//! A composed tree installed as the process allocator.
//!
//! Runs without the libtest harness: the harness itself allocates with
//! cache-line alignment, which this tree refuses.

use std::collections::BTreeMap;

use brickalloc_core::{FallbackAllocator, HeapAllocator, LockedAllocator, NullAllocator};

// Only const-constructible leaves can sit in the static.
#[global_allocator]
static GLOBAL: LockedAllocator<FallbackAllocator<NullAllocator, HeapAllocator>> =
    LockedAllocator::new(FallbackAllocator::new(NullAllocator, HeapAllocator));

fn collections_allocate_through_the_tree() {
    let mut words: Vec<String> = (0..1_000).map(|i| format!("word-{i}")).collect();
    words.retain(|w| w.ends_with('7'));
    assert_eq!(words.len(), 100);

    let mut index = BTreeMap::new();
    for (i, w) in words.iter().enumerate() {
        index.insert(w.clone(), i);
    }
    assert_eq!(index.get("word-997"), Some(&99));

    let big = vec![0xA5_u8; 64 * 1024];
    assert!(big.iter().all(|&b| b == 0xA5));
}

fn threads_share_the_lock() {
    let handles: Vec<_> = (0..4)
        .map(|t| {
            std::thread::spawn(move || {
                let v: Vec<u64> = (0..10_000).map(|i| i * t).collect();
                v.iter().sum::<u64>()
            })
        })
        .collect();
    let total: u64 = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .sum();
    assert_eq!(total, (0..4).map(|t| t * 49_995_000).sum::<u64>());
}

fn check_level_resolves_while_installed() {
    // First resolution reads the environment, which allocates through GLOBAL.
    let level = brickalloc_core::check_level();
    assert_eq!(level, brickalloc_core::check_level());
}

fn main() {
    check_level_resolves_while_installed();
    collections_allocate_through_the_tree();
    threads_share_the_lock();
    println!("global_adapter_test: ok");
}
