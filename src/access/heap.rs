//! Heap relations and sequential scans.
//!
//! A [`HeapRelation`] is an open handle on one relation: its identity,
//! its tuple descriptor, and the buffer manager that serves its blocks.
//! The two bootstrap relations open from compiled-in descriptors; every
//! other relation is resolved by scanning `bp_class` for its name and
//! `bp_attribute` for its attribute list.
//!
//! A [`HeapScan`] walks the relation forward one page at a time. It holds
//! at most one pinned buffer, takes the page's shared lock only while
//! walking line pointers, and keeps the pin between calls so a page is
//! fetched once per visit.

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};
use tracing::debug;

use crate::access::catalog::{
    attribute_columns, class_columns, ATTRIBUTE_REL_ID, ATTRIBUTE_TUPLE_DESC, CLASS_REL_ID,
    CLASS_TUPLE_DESC,
};
use crate::access::{Attribute, HeapTuple, ScanKey, TupleDesc};
use crate::storage::{Buffer, BufferManager};
use crate::system::{
    BlockNumber, ItemPointer, Oid, OffsetNumber, RelFileNode, StoreError,
    DEFAULT_TABLESPACE_OID, FIRST_OFFSET_NUMBER, OID_ATTR_NUMBER,
};
use crate::types::{type_info, Datum, Name};

/// Scan qualifier list. Usually one or two entries, so keep them inline.
pub type ScanKeys = SmallVec<[ScanKey; 2]>;

pub struct HeapRelation {
    rel_id: Oid,
    rel_name: Name,
    rel_desc: Arc<TupleDesc>,
    node: RelFileNode,
    bufmgr: Arc<BufferManager>,
}

impl std::fmt::Debug for HeapRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapRelation")
            .field("rel_id", &self.rel_id)
            .field("rel_name", &self.rel_name)
            .field("node", &self.node)
            .finish()
    }
}

/// Opens a relation by oid: the bootstrap relations from their
/// compiled-in descriptors, everything else through the catalog.
pub fn heap_open(relid: Oid, bufmgr: Arc<BufferManager>) -> eyre::Result<HeapRelation> {
    if relid == CLASS_REL_ID {
        return Ok(HeapRelation::bootstrap(
            relid,
            "bp_class",
            Arc::clone(&CLASS_TUPLE_DESC),
            bufmgr,
        ));
    }
    if relid == ATTRIBUTE_REL_ID {
        return Ok(HeapRelation::bootstrap(
            relid,
            "bp_attribute",
            Arc::clone(&ATTRIBUTE_TUPLE_DESC),
            bufmgr,
        ));
    }

    debug!(%relid, "resolving relation through the catalog");

    // Find the class row; only the relation name is recorded so far.
    let class_rel = heap_open(CLASS_REL_ID, Arc::clone(&bufmgr))?;
    let class_key = ScanKey {
        attnum: OID_ATTR_NUMBER,
        value: Datum::Oid(relid),
    };
    let mut class_scan = class_rel.begin_scan(smallvec![class_key.clone()])?;
    let mut rel_name = None;
    while let Some(tuple) = class_scan.next()? {
        if !scan_key_matches(&tuple, std::slice::from_ref(&class_key))? {
            continue;
        }
        match tuple.fetch(class_columns::RELNAME)? {
            Some(Datum::Name(name)) => rel_name = Some(name),
            _ => return Err(StoreError::internal("bp_class relname is not a name").into()),
        }
        break;
    }
    class_scan.end_scan();
    let rel_name = rel_name
        .ok_or_else(|| StoreError::not_found(format!("relation {relid} does not exist")))?;

    // Gather the attribute rows in the order the catalog yields them.
    let attr_rel = heap_open(ATTRIBUTE_REL_ID, Arc::clone(&bufmgr))?;
    let attr_key = ScanKey {
        attnum: attribute_columns::ATTRELID,
        value: Datum::Oid(relid),
    };
    let mut attr_scan = attr_rel.begin_scan(smallvec![attr_key.clone()])?;
    let mut attrs = Vec::new();
    while let Some(tuple) = attr_scan.next()? {
        if !scan_key_matches(&tuple, std::slice::from_ref(&attr_key))? {
            continue;
        }
        let name = match tuple.fetch(attribute_columns::ATTNAME)? {
            Some(Datum::Name(name)) => name,
            _ => return Err(StoreError::internal("bp_attribute attname is not a name").into()),
        };
        let type_id = match tuple.fetch(attribute_columns::ATTTYPID)? {
            Some(Datum::Oid(oid)) => oid,
            _ => return Err(StoreError::internal("bp_attribute atttypid is not an oid").into()),
        };
        attrs.push(Attribute {
            name,
            type_id,
            type_info: type_info(type_id)?,
        });
    }
    attr_scan.end_scan();

    Ok(HeapRelation {
        rel_id: relid,
        rel_name,
        rel_desc: Arc::new(TupleDesc::new(attrs, relid, false)),
        node: relation_node(relid),
        bufmgr,
    })
}

/// Physical location of a relation. A single database with the fixed oid
/// 1 for now; the tablespace is always the default one.
fn relation_node(relid: Oid) -> RelFileNode {
    RelFileNode::new(Oid::new(1), DEFAULT_TABLESPACE_OID, relid)
}

/// Tests a tuple against equality scan keys. Key evaluation lives with
/// the scan's consumer, not inside the scan.
fn scan_key_matches(tuple: &HeapTuple, keys: &[ScanKey]) -> eyre::Result<bool> {
    for key in keys {
        if tuple.fetch(key.attnum)?.as_ref() != Some(&key.value) {
            return Ok(false);
        }
    }
    Ok(true)
}

impl HeapRelation {
    fn bootstrap(
        relid: Oid,
        name: &str,
        desc: Arc<TupleDesc>,
        bufmgr: Arc<BufferManager>,
    ) -> Self {
        Self::with_descriptor(
            relid,
            Name::new(name).expect("bootstrap relation name"),
            desc,
            bufmgr,
        )
    }

    /// Opens a relation from an already-known descriptor, bypassing the
    /// catalog. This is how layers that materialize their own schema
    /// (bootstrap, loaders) get a scannable handle.
    pub fn with_descriptor(
        relid: Oid,
        name: Name,
        desc: Arc<TupleDesc>,
        bufmgr: Arc<BufferManager>,
    ) -> Self {
        Self {
            rel_id: relid,
            rel_name: name,
            rel_desc: desc,
            node: relation_node(relid),
            bufmgr,
        }
    }

    pub fn rel_id(&self) -> Oid {
        self.rel_id
    }

    pub fn rel_name(&self) -> &Name {
        &self.rel_name
    }

    pub fn rel_desc(&self) -> &Arc<TupleDesc> {
        &self.rel_desc
    }

    pub fn node(&self) -> RelFileNode {
        self.node
    }

    /// Starts a forward scan. The block count is latched here; blocks
    /// appended afterwards are not visited by this scan.
    pub fn begin_scan(&self, keys: ScanKeys) -> eyre::Result<HeapScan<'_>> {
        Ok(HeapScan {
            rel: self,
            keys,
            forward: true,
            start_block: 0,
            n_blocks: self.bufmgr.nblocks(self.node)?,
            cur_block: 0,
            cur_offset: FIRST_OFFSET_NUMBER,
            cur_buf: None,
            inited: false,
            done: false,
        })
    }
}

pub struct HeapScan<'rel> {
    rel: &'rel HeapRelation,
    keys: ScanKeys,
    forward: bool,
    start_block: BlockNumber,
    n_blocks: BlockNumber,
    cur_block: BlockNumber,
    cur_offset: OffsetNumber,
    cur_buf: Option<Buffer>,
    inited: bool,
    done: bool,
}

impl HeapScan<'_> {
    /// The qualifiers this scan carries for its consumer.
    pub fn keys(&self) -> &[ScanKey] {
        &self.keys
    }

    /// Scan direction. Only forward scans exist so far.
    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// Visibility predicate. Transaction snapshots plug in here; until
    /// then every NORMAL tuple is returned.
    fn tuple_visible(&self, _tuple: &HeapTuple) -> bool {
        true
    }

    /// Returns the next tuple, or `None` once the relation is exhausted.
    pub fn next(&mut self) -> eyre::Result<Option<HeapTuple>> {
        if self.done {
            return Ok(None);
        }
        if !self.inited {
            if self.n_blocks == 0 {
                self.done = true;
                return Ok(None);
            }
            self.cur_block = self.start_block;
            self.cur_buf = Some(self.rel.bufmgr.read_buffer(self.rel.node, self.cur_block)?);
            self.cur_offset = FIRST_OFFSET_NUMBER;
            self.inited = true;
        }

        loop {
            let buf = self.cur_buf.as_ref().expect("scan holds a pinned buffer");
            let mut found = None;
            {
                let page = buf.page_read();
                let max_offset = page.max_offset_number();
                while self.cur_offset <= max_offset {
                    let offset = self.cur_offset;
                    self.cur_offset += 1;

                    let item_id = page.item_id(offset);
                    if !item_id.is_normal() {
                        continue;
                    }
                    let mut tuple = HeapTuple::from_item(
                        page.item(item_id),
                        Arc::clone(&self.rel.rel_desc),
                        ItemPointer::new(self.cur_block, offset),
                    );
                    tuple.set_table_oid(self.rel.rel_id);
                    if self.tuple_visible(&tuple) {
                        found = Some(tuple);
                        break;
                    }
                }
            }
            // The shared lock is gone; the pin stays until the scan moves
            // off this page.
            if found.is_some() {
                return Ok(found);
            }

            self.cur_buf = None;
            self.cur_block = (self.cur_block + 1) % self.n_blocks;
            if self.cur_block == self.start_block {
                self.done = true;
                return Ok(None);
            }
            self.cur_buf = Some(self.rel.bufmgr.read_buffer(self.rel.node, self.cur_block)?);
            self.cur_offset = FIRST_OFFSET_NUMBER;
        }
    }

    /// Releases any pinned buffer and ends the scan. Safe to call more
    /// than once; `next` afterwards keeps returning `None`.
    pub fn end_scan(&mut self) {
        self.cur_buf = None;
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BUFFER_COUNT;
    use crate::system::ErrorCode;
    use tempfile::tempdir;

    fn manager(dir: &std::path::Path) -> Arc<BufferManager> {
        Arc::new(BufferManager::new(dir, DEFAULT_BUFFER_COUNT))
    }

    fn create_relation_file(base: &std::path::Path, relid: u32) {
        let dir = base.join("base").join("1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::File::create(dir.join(relid.to_string())).unwrap();
    }

    #[test]
    fn bootstrap_relations_open_without_catalog_files() {
        let dir = tempdir().unwrap();
        let bufmgr = manager(dir.path());

        let class_rel = heap_open(CLASS_REL_ID, Arc::clone(&bufmgr)).unwrap();
        assert_eq!(*class_rel.rel_name(), "bp_class");
        assert_eq!(class_rel.rel_desc().natts(), 2);
        assert!(class_rel.rel_desc().has_oid());

        let attr_rel = heap_open(ATTRIBUTE_REL_ID, bufmgr).unwrap();
        assert_eq!(*attr_rel.rel_name(), "bp_attribute");
        assert_eq!(attr_rel.rel_desc().natts(), 4);
    }

    #[test]
    fn scan_of_empty_relation_is_immediately_exhausted() {
        let dir = tempdir().unwrap();
        create_relation_file(dir.path(), CLASS_REL_ID.as_u32());
        let bufmgr = manager(dir.path());

        let rel = heap_open(CLASS_REL_ID, bufmgr).unwrap();
        let mut scan = rel.begin_scan(ScanKeys::new()).unwrap();
        assert!(scan.next().unwrap().is_none());
        assert!(scan.next().unwrap().is_none());
    }

    #[test]
    fn open_of_uncataloged_relation_reports_not_found() {
        let dir = tempdir().unwrap();
        create_relation_file(dir.path(), CLASS_REL_ID.as_u32());
        create_relation_file(dir.path(), ATTRIBUTE_REL_ID.as_u32());
        let bufmgr = manager(dir.path());

        let err = heap_open(Oid::new(50000), bufmgr).unwrap_err();
        let store_err = err.downcast_ref::<StoreError>().unwrap();
        assert_eq!(store_err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn scan_keys_are_carried_not_evaluated() {
        let dir = tempdir().unwrap();
        create_relation_file(dir.path(), CLASS_REL_ID.as_u32());
        let bufmgr = manager(dir.path());

        let rel = heap_open(CLASS_REL_ID, bufmgr).unwrap();
        let keys: ScanKeys = smallvec![ScanKey {
            attnum: OID_ATTR_NUMBER,
            value: Datum::Oid(Oid::new(1)),
        }];
        let scan = rel.begin_scan(keys).unwrap();
        assert_eq!(scan.keys().len(), 1);
    }

    #[test]
    fn scan_key_matching_compares_fetched_values() {
        let desc = Arc::clone(&*ATTRIBUTE_TUPLE_DESC);
        let values = [
            Some(Datum::Oid(Oid::new(50000))),
            Some(Datum::Name(Name::new("id").unwrap())),
            Some(Datum::Int4(1)),
            Some(Datum::Oid(Oid::INT4_TYPE)),
        ];
        let tuple = HeapTuple::form(&values, &desc).unwrap();

        let matching = [ScanKey {
            attnum: attribute_columns::ATTRELID,
            value: Datum::Oid(Oid::new(50000)),
        }];
        let other = [ScanKey {
            attnum: attribute_columns::ATTRELID,
            value: Datum::Oid(Oid::new(1)),
        }];
        assert!(scan_key_matches(&tuple, &matching).unwrap());
        assert!(!scan_key_matches(&tuple, &other).unwrap());
    }
}
