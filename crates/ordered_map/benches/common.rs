use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::hint::black_box;
use std::ops::Bound;
use std::time::{Duration, Instant};

use bench::{apply_small_runtime_config, iter_rng, mix_seed, seed_base};
use criterion::measurement::Measurement;
use criterion::{BenchmarkGroup, BenchmarkId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ordered_map::OrdTreeMap;

const SIZES: [usize; 5] = [1_000, 4_000, 16_000, 64_000, 256_000];
const OPS_PER_ITER: usize = 200;
const GET_HIT_RATE_PERCENT: u64 = 80;
const MIXED_INSERTS_PER_ITER: usize = OPS_PER_ITER / 10; // 10% inserts, 10% removes, 80% reads.

/// First-write-wins map surface shared by the benchmarked implementations.
trait BenchMap {
    fn new() -> Self;
    fn len(&self) -> usize;
    fn get(&self, key: u64) -> Option<u64>;
    /// Key following `key`, if `key` is present and not the maximum.
    fn successor(&self, key: u64) -> Option<u64>;
    fn insert(&mut self, key: u64, value: u64) -> bool;
    fn remove(&mut self, key: u64) -> bool;
}

impl BenchMap for OrdTreeMap<u64, u64> {
    fn new() -> Self {
        OrdTreeMap::new()
    }

    fn len(&self) -> usize {
        OrdTreeMap::len(self)
    }

    fn get(&self, key: u64) -> Option<u64> {
        self.get_by_key(&key).copied()
    }

    fn successor(&self, key: u64) -> Option<u64> {
        let handle = self.search(&key)?;
        let next = OrdTreeMap::successor(self, handle)?;
        self.key(next).copied()
    }

    fn insert(&mut self, key: u64, value: u64) -> bool {
        OrdTreeMap::insert(self, key, value).is_some()
    }

    fn remove(&mut self, key: u64) -> bool {
        OrdTreeMap::remove(self, &key)
    }
}

impl BenchMap for BTreeMap<u64, u64> {
    fn new() -> Self {
        BTreeMap::new()
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn get(&self, key: u64) -> Option<u64> {
        BTreeMap::get(self, &key).copied()
    }

    fn successor(&self, key: u64) -> Option<u64> {
        if !self.contains_key(&key) {
            return None;
        }
        self.range((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(&k, _)| k)
    }

    fn insert(&mut self, key: u64, value: u64) -> bool {
        match self.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    fn remove(&mut self, key: u64) -> bool {
        BTreeMap::remove(self, &key).is_some()
    }
}

#[derive(Clone)]
enum ReadOp {
    Get { key: u64 },
    Successor { key: u64 },
}

#[derive(Clone)]
enum UpdateOp {
    Insert { key: u64, value: u64 },
    Remove { key: u64 },
}

#[derive(Clone)]
enum MixedOp {
    Read(ReadOp),
    Update(UpdateOp),
}

fn build<M: BenchMap>(keys: &[u64], seed: u64) -> M {
    let mut init_rng = StdRng::seed_from_u64(seed);
    let mut map = M::new();
    for &k in keys {
        let v: u64 = init_rng.random();
        black_box(map.insert(k, v));
    }
    map
}

fn bench_read<M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    T: Measurement<Value = Duration>,
    M: BenchMap,
{
    for &size in &SIZES {
        apply_small_runtime_config(group);
        let base_seed = seed_base(1, size as u64);
        let keys = generate_initial_keys(size, base_seed);
        let map: M = build(&keys, base_seed ^ 0x11_22_33_44);

        group.bench_function(BenchmarkId::new(label, size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for iter in 0..iters {
                    let mut rng = iter_rng(base_seed, iter);
                    let ops: Vec<_> = (0..OPS_PER_ITER)
                        .map(|_| generate_read_op(&keys, &mut rng))
                        .collect();
                    let start = Instant::now();
                    for op in &ops {
                        run_read_op(&map, op);
                    }
                    black_box(map.len());
                    total += start.elapsed();
                }
                total
            })
        });
    }
}

fn bench_update<M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    T: Measurement<Value = Duration>,
    M: BenchMap,
{
    for &size in &SIZES {
        apply_small_runtime_config(group);
        let base_seed = seed_base(2, size as u64);
        let keys = generate_initial_keys(size, base_seed);
        let mut map: M = build(&keys, base_seed ^ 0x55_66_77_88);

        group.bench_function(BenchmarkId::new(label, size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for iter in 0..iters {
                    let mut rng = iter_rng(base_seed, iter);
                    let ops = generate_update_ops(size, base_seed, iter, &mut rng);
                    let start = Instant::now();
                    for op in &ops {
                        run_update_op(&mut map, op);
                    }
                    black_box(map.len());
                    total += start.elapsed();
                }
                total
            })
        });
    }
}

fn bench_mixed<M, T>(group: &mut BenchmarkGroup<'_, T>, label: &str)
where
    T: Measurement<Value = Duration>,
    M: BenchMap,
{
    for &size in &SIZES {
        apply_small_runtime_config(group);
        let base_seed = seed_base(3, size as u64);
        let keys = generate_initial_keys(size, base_seed);
        let mut map: M = build(&keys, base_seed ^ 0x99_AA_BB_CC);

        group.bench_function(BenchmarkId::new(label, size), |bencher| {
            bencher.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for iter in 0..iters {
                    let mut rng = iter_rng(base_seed, iter);
                    let ops = generate_mixed_ops(&keys, size, base_seed, iter, &mut rng);
                    let start = Instant::now();
                    for op in &ops {
                        match op {
                            MixedOp::Read(op) => run_read_op(&map, op),
                            MixedOp::Update(op) => run_update_op(&mut map, op),
                        }
                    }
                    black_box(map.len());
                    total += start.elapsed();
                }
                total
            })
        });
    }
}

fn generate_initial_keys(size: usize, base_seed: u64) -> Vec<u64> {
    (0..size)
        .map(|i| mix_seed(base_seed ^ (i as u64)))
        .collect()
}

fn generate_read_op(keys: &[u64], rng: &mut StdRng) -> ReadOp {
    let hit = rng.random_range(0..100) < GET_HIT_RATE_PERCENT;
    let key = if hit {
        keys[rng.random_range(0..keys.len())]
    } else {
        rng.random()
    };
    if rng.random::<u64>() & 1 == 0 {
        ReadOp::Get { key }
    } else {
        ReadOp::Successor { key }
    }
}

fn fresh_key(size: usize, base_seed: u64, iter: u64, per_iter: usize, index: usize) -> u64 {
    let id = (size as u64)
        .wrapping_add(iter.wrapping_mul(per_iter as u64))
        .wrapping_add(index as u64);
    mix_seed(base_seed ^ id)
}

fn generate_update_ops(size: usize, base_seed: u64, iter: u64, rng: &mut StdRng) -> Vec<UpdateOp> {
    let inserts = OPS_PER_ITER / 2;
    let mut inserted = Vec::with_capacity(inserts);
    let mut ops = Vec::with_capacity(OPS_PER_ITER);
    for i in 0..OPS_PER_ITER {
        if i % 2 == 0 {
            let key = fresh_key(size, base_seed, iter, inserts, i / 2);
            inserted.push(key);
            ops.push(UpdateOp::Insert {
                key,
                value: rng.random(),
            });
        } else {
            let idx = rng.random_range(0..inserted.len());
            let key = inserted.swap_remove(idx);
            ops.push(UpdateOp::Remove { key });
        }
    }
    debug_assert!(inserted.is_empty());
    ops
}

fn generate_mixed_ops(
    keys: &[u64],
    size: usize,
    base_seed: u64,
    iter: u64,
    rng: &mut StdRng,
) -> Vec<MixedOp> {
    let mut remaining_inserts = MIXED_INSERTS_PER_ITER;
    let mut remaining_removes = MIXED_INSERTS_PER_ITER;
    let mut remaining_reads = OPS_PER_ITER - 2 * MIXED_INSERTS_PER_ITER;

    let mut live_inserted: Vec<u64> = Vec::with_capacity(MIXED_INSERTS_PER_ITER);
    let mut ops = Vec::with_capacity(OPS_PER_ITER);

    while ops.len() < OPS_PER_ITER {
        let remaining_slots = OPS_PER_ITER - ops.len();
        let updates_remaining = remaining_inserts + remaining_removes;
        let do_read = if remaining_reads == 0 {
            false
        } else if updates_remaining == 0 {
            true
        } else {
            rng.random_range(0..remaining_slots) < remaining_reads
        };

        if do_read {
            ops.push(MixedOp::Read(generate_read_op(keys, rng)));
            remaining_reads -= 1;
            continue;
        }

        let can_insert = remaining_inserts > 0;
        let can_remove = remaining_removes > 0 && !live_inserted.is_empty();
        let do_remove = if !can_remove {
            false
        } else if !can_insert {
            true
        } else {
            rng.random_range(0..updates_remaining) < remaining_removes
        };

        if do_remove {
            let idx = rng.random_range(0..live_inserted.len());
            let key = live_inserted.swap_remove(idx);
            ops.push(MixedOp::Update(UpdateOp::Remove { key }));
            remaining_removes -= 1;
        } else {
            let index = MIXED_INSERTS_PER_ITER - remaining_inserts;
            let key = fresh_key(size, base_seed, iter, MIXED_INSERTS_PER_ITER, index);
            live_inserted.push(key);
            ops.push(MixedOp::Update(UpdateOp::Insert {
                key,
                value: rng.random(),
            }));
            remaining_inserts -= 1;
        }
    }

    debug_assert_eq!(remaining_reads, 0);
    debug_assert!(live_inserted.is_empty());
    ops
}

fn run_read_op<M: BenchMap>(map: &M, op: &ReadOp) {
    match *op {
        ReadOp::Get { key } => {
            black_box(map.get(key));
        }
        ReadOp::Successor { key } => {
            black_box(map.successor(key));
        }
    }
}

fn run_update_op<M: BenchMap>(map: &mut M, op: &UpdateOp) {
    match *op {
        UpdateOp::Insert { key, value } => {
            black_box(map.insert(key, value));
        }
        UpdateOp::Remove { key } => {
            black_box(map.remove(key));
        }
    }
}

pub fn bench_all_read<T>(group: &mut BenchmarkGroup<'_, T>)
where
    T: Measurement<Value = Duration>,
{
    bench_read::<BTreeMap<u64, u64>, _>(group, "std_btree");
    bench_read::<OrdTreeMap<u64, u64>, _>(group, "avl");
}

pub fn bench_all_mixed<T>(group: &mut BenchmarkGroup<'_, T>)
where
    T: Measurement<Value = Duration>,
{
    bench_mixed::<BTreeMap<u64, u64>, _>(group, "std_btree");
    bench_mixed::<OrdTreeMap<u64, u64>, _>(group, "avl");
}

pub fn bench_all_update<T>(group: &mut BenchmarkGroup<'_, T>)
where
    T: Measurement<Value = Duration>,
{
    bench_update::<BTreeMap<u64, u64>, _>(group, "std_btree");
    bench_update::<OrdTreeMap<u64, u64>, _>(group, "avl");
}
