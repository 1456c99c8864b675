use flowkv_store::config::StoreConfig;
use flowkv_store::db::{Column, Database};
use flowkv_store::slice::Slice;
use flowkv_store::tx::Transaction;
use tempdir::TempDir;

use crate::RocksDB;

fn open(dir: &TempDir) -> RocksDB {
    let dir_path = dir
        .path()
        .to_owned()
        .try_into()
        .expect("path conversion should succeed");

    RocksDB::open(&StoreConfig::new(dir_path)).expect("db should open")
}

#[test]
fn test_rocksdb() {
    let dir = TempDir::new("_flowkv_store_rocksdb").expect("tempdir should be created");
    let db = open(&dir);

    for b1 in 0..10_u8 {
        for b2 in 0..10_u8 {
            let bytes = [b1, b2];

            let key = Slice::from(&bytes[..]);
            let value = Slice::from(&bytes[..]);

            db.put(Column::Flows, (&key).into(), (&value).into())
                .expect("put should succeed");

            assert!(db
                .has(Column::Flows, (&key).into())
                .expect("has should succeed"));
            assert_eq!(
                db.get(Column::Flows, key)
                    .expect("get should succeed")
                    .expect("key should exist"),
                value
            );
        }
    }

    assert_eq!(
        None,
        db.get(Column::Flows, b"".into())
            .expect("get should succeed")
    );

    let mut iter = db.iter(Column::Flows).expect("iter should succeed");

    let mut entries = iter.entries();

    for b1 in 0..10_u8 {
        for b2 in 0..10_u8 {
            let (key, value) = entries
                .next()
                .expect("entry should exist")
                .expect("entry should be readable");

            assert_eq!(&*key, &[b1, b2]);
            assert_eq!(&*value, &[b1, b2]);
        }
    }

    assert!(entries.next().is_none());
}

#[test]
fn test_rocksdb_seek_then_entries() {
    let dir = TempDir::new("_flowkv_store_rocksdb_seek").expect("tempdir should be created");
    let db = open(&dir);

    for key in ["6 10.0.0.1 10.0.0.2", "6 10.0.0.3 10.0.0.4", "17 10.0.0.1 10.0.0.9"] {
        db.put(Column::Flows, key.as_bytes().into(), b"frag".into())
            .expect("put should succeed");
    }

    let mut iter = db.iter(Column::Flows).expect("iter should succeed");

    let first = iter
        .seek(b"6 10.0.0.3".into())
        .expect("seek should succeed")
        .expect("seek should find a key")
        .into_boxed();
    assert_eq!(&*first, b"6 10.0.0.3 10.0.0.4");

    let keys: Vec<_> = iter
        .entries()
        .map(|entry| entry.expect("entry should be readable").0.into_vec())
        .collect();

    assert_eq!(keys, vec![b"6 10.0.0.3 10.0.0.4".to_vec()]);
}

#[test]
fn test_rocksdb_apply_is_visible_after_reopen() {
    let dir = TempDir::new("_flowkv_store_rocksdb_apply").expect("tempdir should be created");

    {
        let db = open(&dir);

        let mut tx = Transaction::default();
        tx.put(Column::Flows, b"a".into(), b"1@2".into());
        tx.put(Column::Records, b"1580274000".into(), b"raw".into());

        db.apply(&tx).expect("apply should succeed");
    }

    let db = open(&dir);

    assert_eq!(
        db.get(Column::Flows, b"a".into())
            .expect("get should succeed")
            .expect("key should exist"),
        *b"1@2"
    );
    assert!(db
        .has(Column::Records, b"1580274000".into())
        .expect("has should succeed"));
}
