//! Record kinds layered over the flat engine key space.
//!
//! Every record kind owns a one-byte key prefix so the four kinds can never
//! collide:
//!
//! ```text
//! 0x00 key                          plain key/value pair
//! 0x01 name                         catalog entry (bincode TableMeta)
//! 0x02 len(name) name field         hash field -> value
//! 0x03 len(name) name member        set member -> insertion sequence
//! 0x04 len(name) name seq           set insertion sequence -> member
//! 0x05 len(name) name index         list slot -> value
//! ```
//!
//! `len(name)` is a big-endian `u32` and sequence numbers and list slots are
//! big-endian `u64`, so engine key order matches insertion order.

use serde::{Deserialize, Serialize};
use vedis_core::{Error, Result};
use vedis_storage::StorageEngine;

mod tag {
    pub const KV: u8 = 0x00;
    pub const CATALOG: u8 = 0x01;
    pub const HASH: u8 = 0x02;
    pub const SET_MEMBER: u8 = 0x03;
    pub const SET_ORDER: u8 = 0x04;
    pub const LIST: u8 = 0x05;
}

/// Discipline of a collection table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Hash,
    Set,
    List,
}

impl TableKind {
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Hash => "hash",
            TableKind::Set => "set",
            TableKind::List => "list",
        }
    }
}

/// Catalog entry describing one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub kind: TableKind,
    /// Number of elements
    pub len: u64,
    /// List: slot of the first element
    pub head: u64,
    /// List: next free slot. Set: next insertion sequence.
    pub next: u64,
}

impl TableMeta {
    fn new(kind: TableKind) -> Self {
        Self {
            kind,
            len: 0,
            head: 0,
            next: 0,
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| Error::Serialization(e.to_string()))
    }
}

pub(crate) fn kv_key(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(tag::KV);
    out.extend_from_slice(key);
    out
}

/// Engine prefix covering every plain key that starts with `prefix`
pub(crate) fn kv_prefix(prefix: &[u8]) -> Vec<u8> {
    kv_key(prefix)
}

/// Length of the record-kind tag in front of a plain key
pub(crate) const KV_TAG_LEN: usize = 1;

fn catalog_key(name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1);
    out.push(tag::CATALOG);
    out.extend_from_slice(name);
    out
}

pub(crate) fn element_prefix(kind_tag: u8, name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 5);
    out.push(kind_tag);
    out.extend_from_slice(&(name.len() as u32).to_be_bytes());
    out.extend_from_slice(name);
    out
}

fn element_key(kind_tag: u8, name: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut out = element_prefix(kind_tag, name);
    out.extend_from_slice(suffix);
    out
}

pub(crate) fn hash_prefix(name: &[u8]) -> Vec<u8> {
    element_prefix(tag::HASH, name)
}

fn check_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("empty key".to_string()));
    }
    Ok(())
}

fn decode_u64(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| Error::Corrupted(format!("expected 8-byte sequence, got {}", data.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Typed view of one engine as KV pairs, hashes, sets and lists
pub struct Store<'a> {
    engine: &'a mut StorageEngine,
}

impl<'a> Store<'a> {
    pub fn new(engine: &'a mut StorageEngine) -> Self {
        Self { engine }
    }

    // ---- key/value ----

    pub fn kv_get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.engine.get(&kv_key(key))
    }

    pub fn kv_set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        check_name(key)?;
        self.engine.put(&kv_key(key), value)
    }

    /// Returns the new length
    pub fn kv_append(&mut self, key: &[u8], value: &[u8]) -> Result<usize> {
        check_name(key)?;
        self.engine.append(&kv_key(key), value)
    }

    pub fn kv_delete(&mut self, key: &[u8]) -> Result<bool> {
        self.engine.delete(&kv_key(key))
    }

    /// Only plain keys count; collection names live in their own namespace
    pub fn kv_exists(&self, key: &[u8]) -> Result<bool> {
        self.engine.contains(&kv_key(key))
    }

    // ---- catalog ----

    fn load_meta(&mut self, name: &[u8]) -> Result<Option<TableMeta>> {
        match self.engine.get(&catalog_key(name))? {
            Some(data) => TableMeta::decode(&data).map(Some),
            None => Ok(None),
        }
    }

    /// Catalog entry of `name` if it is a table of `kind`
    fn meta(&mut self, name: &[u8], kind: TableKind) -> Result<Option<TableMeta>> {
        match self.load_meta(name)? {
            Some(meta) if meta.kind != kind => Err(Error::TypeError(format!(
                "{:?} is a {}, not a {}",
                String::from_utf8_lossy(name),
                meta.kind.name(),
                kind.name()
            ))),
            other => Ok(other),
        }
    }

    fn save_meta(&mut self, name: &[u8], meta: &TableMeta) -> Result<()> {
        if meta.len == 0 {
            self.engine.delete(&catalog_key(name))?;
            return Ok(());
        }
        self.engine.put(&catalog_key(name), &meta.encode()?)
    }

    /// Kind of the table called `name`, if any
    pub fn table_kind(&mut self, name: &[u8]) -> Result<Option<TableKind>> {
        Ok(self.load_meta(name)?.map(|meta| meta.kind))
    }

    /// Names of every collection table
    pub fn table_names(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .engine
            .keys_with_prefix(&[tag::CATALOG])?
            .into_iter()
            .map(|key| key[1..].to_vec())
            .collect())
    }

    // ---- hash ----

    /// Returns true if the field is new
    pub fn hset(&mut self, name: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        check_name(name)?;
        let mut meta = self
            .meta(name, TableKind::Hash)?
            .unwrap_or_else(|| TableMeta::new(TableKind::Hash));
        let key = element_key(tag::HASH, name, field);
        let fresh = !self.engine.contains(&key)?;
        self.engine.put(&key, value)?;
        if fresh {
            meta.len += 1;
            self.save_meta(name, &meta)?;
        }
        Ok(fresh)
    }

    pub fn hget(&mut self, name: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.meta(name, TableKind::Hash)?.is_none() {
            return Ok(None);
        }
        self.engine.get(&element_key(tag::HASH, name, field))
    }

    pub fn hexists(&mut self, name: &[u8], field: &[u8]) -> Result<bool> {
        if self.meta(name, TableKind::Hash)?.is_none() {
            return Ok(false);
        }
        self.engine.contains(&element_key(tag::HASH, name, field))
    }

    pub fn hdel(&mut self, name: &[u8], field: &[u8]) -> Result<bool> {
        let mut meta = match self.meta(name, TableKind::Hash)? {
            Some(meta) => meta,
            None => return Ok(false),
        };
        if !self.engine.delete(&element_key(tag::HASH, name, field))? {
            return Ok(false);
        }
        meta.len -= 1;
        self.save_meta(name, &meta)?;
        Ok(true)
    }

    pub fn hlen(&mut self, name: &[u8]) -> Result<u64> {
        Ok(self.meta(name, TableKind::Hash)?.map_or(0, |meta| meta.len))
    }

    /// Field/value pairs in field order; `None` if the hash does not exist
    pub fn hgetall(&mut self, name: &[u8]) -> Result<Option<Vec<(Vec<u8>, Vec<u8>)>>> {
        if self.meta(name, TableKind::Hash)?.is_none() {
            return Ok(None);
        }
        let prefix = hash_prefix(name);
        let entries = self.engine.scan(&prefix)?;
        Ok(Some(
            entries
                .into_iter()
                .map(|(key, value)| (key[prefix.len()..].to_vec(), value))
                .collect(),
        ))
    }

    pub fn hkeys(&mut self, name: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        if self.meta(name, TableKind::Hash)?.is_none() {
            return Ok(None);
        }
        let prefix = hash_prefix(name);
        Ok(Some(
            self.engine
                .keys_with_prefix(&prefix)?
                .into_iter()
                .map(|key| key[prefix.len()..].to_vec())
                .collect(),
        ))
    }

    pub fn hvals(&mut self, name: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        Ok(self
            .hgetall(name)?
            .map(|entries| entries.into_iter().map(|(_, value)| value).collect()))
    }

    // ---- set ----

    /// Returns true if the member was not already present
    pub fn sadd(&mut self, name: &[u8], member: &[u8]) -> Result<bool> {
        check_name(name)?;
        let mut meta = self
            .meta(name, TableKind::Set)?
            .unwrap_or_else(|| TableMeta::new(TableKind::Set));
        let member_key = element_key(tag::SET_MEMBER, name, member);
        if self.engine.contains(&member_key)? {
            return Ok(false);
        }

        let seq = meta.next.to_be_bytes();
        self.engine.put(&member_key, &seq)?;
        self.engine
            .put(&element_key(tag::SET_ORDER, name, &seq), member)?;
        meta.next += 1;
        meta.len += 1;
        self.save_meta(name, &meta)?;
        Ok(true)
    }

    pub fn srem(&mut self, name: &[u8], member: &[u8]) -> Result<bool> {
        let mut meta = match self.meta(name, TableKind::Set)? {
            Some(meta) => meta,
            None => return Ok(false),
        };
        let member_key = element_key(tag::SET_MEMBER, name, member);
        let seq = match self.engine.get(&member_key)? {
            Some(seq) => seq,
            None => return Ok(false),
        };
        decode_u64(&seq)?;

        self.engine.delete(&member_key)?;
        self.engine.delete(&element_key(tag::SET_ORDER, name, &seq))?;
        meta.len -= 1;
        self.save_meta(name, &meta)?;
        Ok(true)
    }

    pub fn sismember(&mut self, name: &[u8], member: &[u8]) -> Result<bool> {
        if self.meta(name, TableKind::Set)?.is_none() {
            return Ok(false);
        }
        self.engine
            .contains(&element_key(tag::SET_MEMBER, name, member))
    }

    pub fn scard(&mut self, name: &[u8]) -> Result<u64> {
        Ok(self.meta(name, TableKind::Set)?.map_or(0, |meta| meta.len))
    }

    /// Most recently added member
    pub fn speek(&mut self, name: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.meta(name, TableKind::Set)?.is_none() {
            return Ok(None);
        }
        match self
            .engine
            .last_key(&element_prefix(tag::SET_ORDER, name))?
        {
            Some(key) => self.engine.get(&key),
            None => Ok(None),
        }
    }

    /// Oldest member
    pub fn stop(&mut self, name: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.meta(name, TableKind::Set)?.is_none() {
            return Ok(None);
        }
        match self
            .engine
            .next_key(&element_prefix(tag::SET_ORDER, name), None)?
        {
            Some(key) => self.engine.get(&key),
            None => Ok(None),
        }
    }

    /// Remove and return the most recently added member
    pub fn spop(&mut self, name: &[u8]) -> Result<Option<Vec<u8>>> {
        let member = match self.speek(name)? {
            Some(member) => member,
            None => return Ok(None),
        };
        self.srem(name, &member)?;
        Ok(Some(member))
    }

    /// Members in insertion order; empty if the set does not exist
    pub fn smembers(&mut self, name: &[u8]) -> Result<Vec<Vec<u8>>> {
        if self.meta(name, TableKind::Set)?.is_none() {
            return Ok(Vec::new());
        }
        let entries = self.engine.scan(&element_prefix(tag::SET_ORDER, name))?;
        Ok(entries.into_iter().map(|(_, member)| member).collect())
    }

    // ---- list ----

    /// Append to the tail; returns the new length
    pub fn lpush(&mut self, name: &[u8], value: &[u8]) -> Result<u64> {
        check_name(name)?;
        let mut meta = self
            .meta(name, TableKind::List)?
            .unwrap_or_else(|| TableMeta::new(TableKind::List));
        if meta.len == 0 {
            meta.head = 0;
            meta.next = 0;
        }
        self.engine
            .put(&element_key(tag::LIST, name, &meta.next.to_be_bytes()), value)?;
        meta.next += 1;
        meta.len += 1;
        self.save_meta(name, &meta)?;
        Ok(meta.len)
    }

    /// Remove and return the head
    pub fn lpop(&mut self, name: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut meta = match self.meta(name, TableKind::List)? {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let key = element_key(tag::LIST, name, &meta.head.to_be_bytes());
        let value = self
            .engine
            .get(&key)?
            .ok_or_else(|| Error::Corrupted(format!("list slot {} missing", meta.head)))?;
        self.engine.delete(&key)?;
        meta.head += 1;
        meta.len -= 1;
        self.save_meta(name, &meta)?;
        Ok(Some(value))
    }

    /// Element `index` counted from the head; negative counts from the tail
    pub fn lindex(&mut self, name: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        let meta = match self.meta(name, TableKind::List)? {
            Some(meta) => meta,
            None => return Ok(None),
        };
        let offset = if index < 0 {
            match (meta.len as i64).checked_add(index) {
                Some(offset) if offset >= 0 => offset as u64,
                _ => return Ok(None),
            }
        } else {
            index as u64
        };
        if offset >= meta.len {
            return Ok(None);
        }
        let slot = meta.head + offset;
        self.engine
            .get(&element_key(tag::LIST, name, &slot.to_be_bytes()))
    }

    pub fn llen(&mut self, name: &[u8]) -> Result<u64> {
        Ok(self.meta(name, TableKind::List)?.map_or(0, |meta| meta.len))
    }

    /// Elements head to tail
    pub fn lrange(&mut self, name: &[u8]) -> Result<Vec<Vec<u8>>> {
        if self.meta(name, TableKind::List)?.is_none() {
            return Ok(Vec::new());
        }
        let entries = self.engine.scan(&element_prefix(tag::LIST, name))?;
        Ok(entries.into_iter().map(|(_, value)| value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vedis_storage::StorageConfig;

    fn engine() -> StorageEngine {
        StorageEngine::open_memory(StorageConfig::default()).expect("Failed to open engine")
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let mut engine = engine();
        let mut store = Store::new(&mut engine);

        store.kv_set(b"name", b"kv").unwrap();
        store.hset(b"name", b"f", b"hash").unwrap();
        store.sadd(b"other", b"m").unwrap();

        assert_eq!(store.kv_get(b"name").unwrap(), Some(b"kv".to_vec()));
        assert_eq!(store.hget(b"name", b"f").unwrap(), Some(b"hash".to_vec()));
        assert!(!store.kv_exists(b"other").unwrap());
        assert_eq!(store.table_kind(b"other").unwrap(), Some(TableKind::Set));
    }

    #[test]
    fn test_wrong_kind_is_type_error() {
        let mut engine = engine();
        let mut store = Store::new(&mut engine);

        store.lpush(b"queue", b"a").unwrap();
        assert!(matches!(store.hget(b"queue", b"f"), Err(Error::TypeError(_))));
        assert!(matches!(store.sadd(b"queue", b"m"), Err(Error::TypeError(_))));
        assert_eq!(store.llen(b"queue").unwrap(), 1);
    }

    #[test]
    fn test_hash_fields() {
        let mut engine = engine();
        let mut store = Store::new(&mut engine);

        assert!(store.hset(b"h", b"k2", b"v2").unwrap());
        assert!(store.hset(b"h", b"k1", b"v1").unwrap());
        assert!(!store.hset(b"h", b"k1", b"v1b").unwrap());
        assert_eq!(store.hlen(b"h").unwrap(), 2);
        assert_eq!(
            store.hkeys(b"h").unwrap(),
            Some(vec![b"k1".to_vec(), b"k2".to_vec()])
        );
        assert_eq!(
            store.hvals(b"h").unwrap(),
            Some(vec![b"v1b".to_vec(), b"v2".to_vec()])
        );
        assert_eq!(store.hkeys(b"missing").unwrap(), None);

        assert!(store.hdel(b"h", b"k1").unwrap());
        assert!(!store.hdel(b"h", b"k1").unwrap());
        assert!(store.hdel(b"h", b"k2").unwrap());
        assert_eq!(store.table_kind(b"h").unwrap(), None);
        assert!(store.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_hash_names_are_length_prefixed() {
        let mut engine = engine();
        let mut store = Store::new(&mut engine);

        store.hset(b"a", b"bc", b"1").unwrap();
        store.hset(b"ab", b"c", b"2").unwrap();
        assert_eq!(store.hkeys(b"a").unwrap(), Some(vec![b"bc".to_vec()]));
        assert_eq!(store.hkeys(b"ab").unwrap(), Some(vec![b"c".to_vec()]));
    }

    #[test]
    fn test_set_order() {
        let mut engine = engine();
        let mut store = Store::new(&mut engine);

        assert!(store.sadd(b"s", b"v1").unwrap());
        assert!(store.sadd(b"s", b"v2").unwrap());
        assert!(!store.sadd(b"s", b"v1").unwrap());
        assert!(!store.sadd(b"s", b"v2").unwrap());

        assert_eq!(store.speek(b"s").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.stop(b"s").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.spop(b"s").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.scard(b"s").unwrap(), 1);
        assert_eq!(store.smembers(b"s").unwrap(), vec![b"v1".to_vec()]);

        assert_eq!(store.spop(b"s").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.spop(b"s").unwrap(), None);
        assert_eq!(store.table_kind(b"s").unwrap(), None);
    }

    #[test]
    fn test_list_index_follows_head() {
        let mut engine = engine();
        let mut store = Store::new(&mut engine);

        for value in [b"v1", b"v2", b"v3"] {
            store.lpush(b"l", value).unwrap();
        }
        assert_eq!(store.llen(b"l").unwrap(), 3);
        assert_eq!(store.lpop(b"l").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(store.lindex(b"l", 0).unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.lindex(b"l", 1).unwrap(), Some(b"v3".to_vec()));
        assert_eq!(store.lindex(b"l", -1).unwrap(), Some(b"v3".to_vec()));
        assert_eq!(store.lindex(b"l", 2).unwrap(), None);
        assert_eq!(store.lindex(b"l", -3).unwrap(), None);
        assert_eq!(
            store.lrange(b"l").unwrap(),
            vec![b"v2".to_vec(), b"v3".to_vec()]
        );
    }

    #[test]
    fn test_meta_codec() {
        let meta = TableMeta {
            kind: TableKind::List,
            len: 3,
            head: 7,
            next: 10,
        };
        assert_eq!(TableMeta::decode(&meta.encode().unwrap()).unwrap(), meta);
        assert!(matches!(TableMeta::decode(&[9]), Err(Error::Serialization(_))));
    }
}
