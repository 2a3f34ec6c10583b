use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cascade_trie::{Agent, BuildConfig, Keyset, TailMode, Trie};

// ── Hand-rolled LCG (no external deps) ──────────────────────────────────────

struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0
    }
    /// Returns a value in [0, bound).
    fn next_range(&mut self, bound: u64) -> u64 {
        (self.next() >> 33) % bound
    }
}

// ── Romaji-like keys (50K) ──────────────────────────────────────────────────

const SYLLABLES: &[&str] = &[
    "a", "i", "u", "e", "o", "ka", "ki", "ku", "ke", "ko", "sa", "shi", "su", "se", "so", "ta",
    "chi", "tsu", "te", "to", "na", "ni", "nu", "ne", "no", "ha", "hi", "fu", "he", "ho", "ma",
    "mi", "mu", "me", "mo", "ya", "yu", "yo", "ra", "ri", "ru", "re", "ro", "wa", "n", "kyo",
    "sho", "ryu",
];

fn generate_keys(n: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = Lcg::new(seed);
    let mut set = std::collections::BTreeSet::new();
    while set.len() < n {
        let len = (rng.next_range(5) + 1) as usize; // 1..=5 syllables
        let mut key = Vec::new();
        for _ in 0..len {
            key.extend_from_slice(SYLLABLES[rng.next_range(SYLLABLES.len() as u64) as usize].as_bytes());
        }
        set.insert(key);
    }
    set.into_iter().collect()
}

fn build(keys: &[Vec<u8>], num_tries: usize) -> Trie<'static> {
    let keyset: Keyset = keys.iter().collect();
    Trie::build(&keyset, &BuildConfig::new().num_tries(num_tries)).unwrap()
}

// ── Benchmarks ──────────────────────────────────────────────────────────────

fn bench_build(c: &mut Criterion) {
    let keys = generate_keys(50_000, 42);
    let keyset: Keyset = keys.iter().collect();
    for num_tries in [1, 3] {
        let config = BuildConfig::new().num_tries(num_tries);
        c.bench_function(&format!("build_50k_tries{num_tries}"), |b| {
            b.iter(|| Trie::build(black_box(&keyset), &config).unwrap());
        });
    }
    let config = BuildConfig::new().tail_mode(TailMode::Binary);
    c.bench_function("build_50k_binary_tail", |b| {
        b.iter(|| Trie::build(black_box(&keyset), &config).unwrap());
    });
}

fn bench_serial(c: &mut Criterion) {
    let keys = generate_keys(50_000, 42);
    let trie = build(&keys, 3);
    let bytes = trie.save();
    c.bench_function("serial_save", |b| {
        b.iter(|| black_box(&trie).save());
    });
    c.bench_function("serial_load", |b| {
        b.iter(|| Trie::load(black_box(&bytes)).unwrap());
    });
    // Vec<u8> from the global allocator is at least 4-byte aligned.
    c.bench_function("serial_map", |b| {
        b.iter(|| Trie::map(black_box(&bytes)).unwrap());
    });
}

fn bench_lookup(c: &mut Criterion) {
    let keys = generate_keys(50_000, 42);
    let mut rng = Lcg::new(123);
    let hit_keys: Vec<&Vec<u8>> = (0..1000)
        .map(|_| &keys[rng.next_range(keys.len() as u64) as usize])
        .collect();
    let miss_keys: Vec<Vec<u8>> = hit_keys
        .iter()
        .map(|k| {
            let mut k = k.to_vec();
            k.push(b'x'); // no syllable ends in 'x'
            k
        })
        .collect();

    for num_tries in [1, 3] {
        let trie = build(&keys, num_tries);
        c.bench_function(&format!("lookup_hit_1k_tries{num_tries}"), |b| {
            b.iter(|| {
                for key in &hit_keys {
                    black_box(trie.lookup_key(black_box(key)));
                }
            });
        });
        c.bench_function(&format!("lookup_miss_1k_tries{num_tries}"), |b| {
            b.iter(|| {
                for key in &miss_keys {
                    black_box(trie.lookup_key(black_box(key)));
                }
            });
        });
    }
}

fn bench_reverse_lookup(c: &mut Criterion) {
    let keys = generate_keys(50_000, 42);
    let trie = build(&keys, 3);
    let mut rng = Lcg::new(456);
    let ids: Vec<u32> = (0..1000)
        .map(|_| rng.next_range(trie.num_keys() as u64) as u32)
        .collect();

    c.bench_function("reverse_lookup_1k", |b| {
        let mut agent = Agent::new();
        b.iter(|| {
            for &id in &ids {
                agent.set_query_id(id);
                black_box(trie.reverse_lookup(&mut agent).unwrap());
            }
        });
    });
}

fn bench_common_prefix_search(c: &mut Criterion) {
    let keys = generate_keys(50_000, 42);
    let trie = build(&keys, 3);

    // A 200-syllable sentence, searched from every byte offset.
    let mut rng = Lcg::new(999);
    let mut sentence = Vec::new();
    for _ in 0..200 {
        sentence.extend_from_slice(SYLLABLES[rng.next_range(SYLLABLES.len() as u64) as usize].as_bytes());
    }

    c.bench_function("common_prefix_search_lattice", |b| {
        let mut agent = Agent::new();
        b.iter(|| {
            for offset in 0..sentence.len() {
                agent.set_query(black_box(&sentence[offset..]));
                while trie.common_prefix_search(&mut agent).unwrap() {
                    black_box(agent.key_id());
                }
            }
        });
    });
}

fn bench_predictive_search(c: &mut Criterion) {
    let keys = generate_keys(50_000, 42);
    let trie = build(&keys, 3);

    let mut rng = Lcg::new(777);
    let prefixes: Vec<Vec<u8>> = (0..100)
        .map(|_| {
            let mut p = Vec::new();
            for _ in 0..2 {
                p.extend_from_slice(SYLLABLES[rng.next_range(SYLLABLES.len() as u64) as usize].as_bytes());
            }
            p
        })
        .collect();

    c.bench_function("predictive_search_2syllable_prefix", |b| {
        let mut agent = Agent::new();
        b.iter(|| {
            for prefix in &prefixes {
                agent.set_query(black_box(prefix));
                while trie.predictive_search(&mut agent).unwrap() {
                    black_box(agent.key());
                }
            }
        });
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_serial,
    bench_lookup,
    bench_reverse_lookup,
    bench_common_prefix_search,
    bench_predictive_search,
);
criterion_main!(benches);
