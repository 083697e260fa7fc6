//! File and in-memory stores must behave identically for any sequence of
//! writes and deletes.

use proptest::prelude::*;
use tether_storage::{FileStore, InMemoryStore, KeyValueStore};

#[derive(Debug, Clone)]
enum Op {
    Set(String, String),
    Delete(String),
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}",
        "[a-z@/:. ]{1,12}",
        Just("offline_queue".to_string()),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (key_strategy(), "[ -~]{0,32}").prop_map(|(k, v)| Op::Set(k, v)),
        key_strategy().prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn file_store_matches_memory_store(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();

        runtime.block_on(async {
            let file = FileStore::open(dir.path()).unwrap();
            let memory = InMemoryStore::new();

            for op in &ops {
                match op {
                    Op::Set(k, v) => {
                        file.set(k, v).await.unwrap();
                        memory.set(k, v).await.unwrap();
                    }
                    Op::Delete(k) => {
                        file.delete(k).await.unwrap();
                        memory.delete(k).await.unwrap();
                    }
                }
            }

            let keys = memory.keys().await.unwrap();
            assert_eq!(file.keys().await.unwrap(), keys);
            for key in keys {
                assert_eq!(file.get(&key).await.unwrap(), memory.get(&key).await.unwrap());
            }
        });
    }
}
