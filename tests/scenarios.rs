use std::sync::Arc;
use std::thread;

use cascade_trie::{
    Agent, BuildConfig, BuildError, Error, Keyset, NodeOrder, QueryError, TailMode, Trie,
    INVALID_KEY_ID, MAX_NUM_TRIES,
};

const SWEETS: [&str; 4] = ["cake", "cookie", "ice", "ice-cream"];

/// Deterministic pseudo-words with plenty of shared prefixes and suffixes.
fn corpus(n: usize) -> Vec<String> {
    const SYLLABLES: [&str; 12] = [
        "ka", "ki", "shi", "to", "na", "mu", "ra", "ya", "tion", "ing", "er", "-",
    ];
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let mut x = state >> 16;
        let len = 1 + (x % 5) as usize;
        let mut word = String::new();
        for _ in 0..len {
            x /= 5;
            word.push_str(SYLLABLES[(x % SYLLABLES.len() as u64) as usize]);
            x /= SYLLABLES.len() as u64;
        }
        out.push(word);
    }
    out
}

/// Keys whose edge remainders share a long ending.
fn suffix_sharing_keys() -> Vec<Vec<u8>> {
    const ENDING: &[u8] = b"-a-long-ending-shared-by-every-key-in-this-set";
    let mut keys = Vec::new();
    for a in b'a'..=b'z' {
        for b in b'a'..=b'z' {
            let mut key = vec![a, b, b, a];
            key.extend_from_slice(ENDING);
            keys.push(key);
        }
    }
    keys
}

fn collect_common_prefixes(trie: &Trie<'_>, agent: &mut Agent, query: &str) -> Vec<String> {
    agent.set_query(query);
    let mut out = Vec::new();
    while trie.common_prefix_search(agent).unwrap() {
        out.push(String::from_utf8_lossy(agent.key()).into_owned());
    }
    out
}

#[test]
fn sweets_across_configs() {
    for num_tries in 1..=4 {
        for tail_mode in [TailMode::Text, TailMode::Binary] {
            for node_order in [NodeOrder::Weight, NodeOrder::Label] {
                let config = BuildConfig::new()
                    .num_tries(num_tries)
                    .tail_mode(tail_mode)
                    .node_order(node_order);
                let keyset: Keyset = SWEETS.into_iter().collect();
                let trie = Trie::build(&keyset, &config).unwrap();

                let mut agent = Agent::new();
                agent.set_query("cake");
                assert!(trie.lookup(&mut agent).unwrap());
                let cake = agent.key_id();
                agent.set_query("cookie");
                assert!(trie.lookup(&mut agent).unwrap());
                assert_ne!(agent.key_id(), cake);
                agent.set_query("cockoo");
                assert!(!trie.lookup(&mut agent).unwrap());

                agent.set_query_id(cake);
                assert!(trie.reverse_lookup(&mut agent).unwrap());
                assert_eq!(agent.key(), b"cake");

                assert_eq!(
                    collect_common_prefixes(&trie, &mut agent, "ice-cream soda"),
                    ["ice", "ice-cream"]
                );
                assert!(!trie.common_prefix_search(&mut agent).unwrap());

                agent.set_query("ic");
                let mut predicted = Vec::new();
                while trie.predictive_search(&mut agent).unwrap() {
                    predicted.push(agent.key().to_vec());
                }
                assert_eq!(predicted, [b"ice".to_vec(), b"ice-cream".to_vec()]);

                agent.set_query("xyz");
                assert!(!trie.predictive_search(&mut agent).unwrap());
            }
        }
    }
}

#[test]
fn corpus_round_trip() {
    let words = corpus(5_000);
    let keyset: Keyset = words.iter().collect();
    for num_tries in [1, 2, 3, MAX_NUM_TRIES] {
        let trie = Trie::build(&keyset, &BuildConfig::new().num_tries(num_tries)).unwrap();
        assert!(trie.num_tries() <= num_tries);
        let loaded = Trie::load(&trie.save()).unwrap();
        for word in &words {
            let id = trie.lookup_key(word.as_bytes());
            assert_ne!(id, INVALID_KEY_ID, "{word}");
            assert_eq!(loaded.lookup_key(word.as_bytes()), id);
            assert_eq!(loaded.reverse_lookup_id(id).unwrap(), word.as_bytes());
        }
    }
}

#[test]
fn extra_layers_never_grow_the_trie() {
    let words: Vec<Vec<u8>> = corpus(2_000).into_iter().map(String::into_bytes).collect();
    for keys in [words, suffix_sharing_keys()] {
        let keyset: Keyset = keys.iter().collect();
        let mut sizes = Vec::new();
        for num_tries in 1..=6 {
            let trie = Trie::build(&keyset, &BuildConfig::new().num_tries(num_tries)).unwrap();
            for key in &keys {
                assert_ne!(trie.lookup_key(key), INVALID_KEY_ID);
            }
            sizes.push(trie.io_size());
        }
        assert!(sizes.windows(2).all(|w| w[1] <= w[0]), "{sizes:?}");
    }
}

#[test]
fn shared_endings_move_into_a_smaller_layer() {
    let keys = suffix_sharing_keys();
    let keyset: Keyset = keys.iter().collect();
    let one = Trie::build(&keyset, &BuildConfig::new().num_tries(1)).unwrap();
    let three = Trie::build(&keyset, &BuildConfig::new().num_tries(3)).unwrap();
    assert_eq!(one.num_keys(), three.num_keys());
    assert_eq!(three.num_tries(), 2);
    assert!(three.io_size() < one.io_size());

    let loaded = Trie::load(&three.save()).unwrap();
    assert_eq!(loaded.num_tries(), 2);
    for key in &keys {
        let id = three.lookup_key(key);
        assert_eq!(one.reverse_lookup_id(one.lookup_key(key)).unwrap(), *key);
        assert_eq!(loaded.lookup_key(key), id);
        assert_eq!(loaded.reverse_lookup_id(id).unwrap(), *key);
    }
}

#[test]
fn build_is_deterministic() {
    let words = corpus(1_000);
    let keyset: Keyset = words.iter().collect();
    let config = BuildConfig::default();
    let a = Trie::build(&keyset, &config).unwrap().save();
    let b = Trie::build(&keyset, &config).unwrap().save();
    assert_eq!(a, b);

    // Input order does not matter either.
    let reversed: Keyset = words.iter().rev().collect();
    let c = Trie::build(&reversed, &config).unwrap().save();
    assert_eq!(a, c);
}

#[test]
fn duplicates_share_one_id() {
    let keyset: Keyset = ["dup", "dup", "other", "dup"].into_iter().collect();
    let trie = Trie::build(&keyset, &BuildConfig::default()).unwrap();
    assert_eq!(trie.num_keys(), 2);
    // "dup" carries three times the weight, so it comes first.
    assert_eq!(trie.lookup_key(b"dup"), 0);
    assert_eq!(trie.lookup_key(b"other"), 1);
}

#[test]
fn huge_duplicate_weights_saturate() {
    let mut keyset = Keyset::new();
    keyset.push_weighted("a", f32::MAX);
    keyset.push_weighted("a", f32::MAX);
    keyset.push_weighted("b", 1.0);
    let trie = Trie::build(&keyset, &BuildConfig::default()).unwrap();
    assert_eq!(trie.lookup_key(b"a"), 0);
    assert_eq!(trie.lookup_key(b"b"), 1);

    // Only a bad input weight is reported, never an overflowed sum.
    keyset.push_weighted("c", f32::INFINITY);
    assert_eq!(
        Trie::build(&keyset, &BuildConfig::default()).unwrap_err(),
        BuildError::InvalidWeight(f32::INFINITY)
    );
}

#[test]
fn heavier_keys_get_smaller_ids() {
    let mut keyset = Keyset::new();
    keyset.push_weighted("apple", 1.0);
    keyset.push_weighted("banana", 10.0);
    keyset.push_weighted("cherry", 5.0);
    let trie = Trie::build(&keyset, &BuildConfig::default()).unwrap();
    assert_eq!(trie.lookup_key(b"banana"), 0);
    assert_eq!(trie.lookup_key(b"cherry"), 1);
    assert_eq!(trie.lookup_key(b"apple"), 2);

    let trie = Trie::build(&keyset, &BuildConfig::new().node_order(NodeOrder::Label)).unwrap();
    assert_eq!(trie.lookup_key(b"apple"), 0);
    assert_eq!(trie.lookup_key(b"banana"), 1);
    assert_eq!(trie.lookup_key(b"cherry"), 2);
}

#[test]
fn build_errors() {
    let empty = Keyset::new();
    assert_eq!(
        Trie::build(&empty, &BuildConfig::default()).unwrap_err(),
        BuildError::EmptyKeyset
    );

    let keyset: Keyset = ["abc"].into_iter().collect();
    assert!(matches!(
        Trie::build(&keyset, &BuildConfig::new().num_tries(0)),
        Err(BuildError::InvalidNumTries { got: 0, .. })
    ));
    assert!(matches!(
        Trie::build(&keyset, &BuildConfig::new().num_tries(MAX_NUM_TRIES + 1)),
        Err(BuildError::InvalidNumTries { .. })
    ));
    assert!(matches!(
        Trie::build(&keyset, &BuildConfig::new().max_key_length(2)),
        Err(BuildError::KeyTooLong { len: 3, max: 2 })
    ));

    let mut weighted = Keyset::new();
    weighted.push_weighted("abc", -1.0);
    assert!(matches!(
        Trie::build(&weighted, &BuildConfig::default()),
        Err(BuildError::InvalidWeight(_))
    ));
}

#[test]
fn errors_convert_into_umbrella() {
    fn first_key(bytes: &[u8]) -> cascade_trie::Result<Vec<u8>> {
        let trie = Trie::load(bytes)?;
        Ok(trie.reverse_lookup_id(0)?)
    }

    let trie = Trie::from_keys(SWEETS).unwrap();
    assert!(first_key(&trie.save()).is_ok());
    assert!(matches!(first_key(b"nope"), Err(Error::Format(_))));

    let err: Error = QueryError::QueryNotSet.into();
    assert!(err.to_string().contains("query"));
}

#[test]
fn concurrent_queries_share_one_trie() {
    let words = corpus(2_000);
    let trie = Arc::new(Trie::from_keys(&words).unwrap());
    let words = Arc::new(words);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let trie = Arc::clone(&trie);
            let words = Arc::clone(&words);
            thread::spawn(move || {
                let mut agent = Agent::new();
                for word in words.iter().skip(t).step_by(4) {
                    agent.set_query(word);
                    assert!(trie.lookup(&mut agent).unwrap());
                    agent.set_query_id(agent.key_id());
                    assert!(trie.reverse_lookup(&mut agent).unwrap());
                    assert_eq!(agent.key(), word.as_bytes());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
