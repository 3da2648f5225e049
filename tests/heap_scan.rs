//! End-to-end heap scan tests.
//!
//! Builds real catalog and table files by hand (catalog rows in
//! `bp_class` and `bp_attribute`, data pages in the user relation), then
//! drives `heap_open` and sequential scans over them through the buffer
//! pool, the way the executor layer would.

use std::path::Path;
use std::sync::Arc;

use heapstore::access::catalog::{ATTRIBUTE_REL_ID, CLASS_REL_ID};
use heapstore::access::{heap_open, HeapTuple, ScanKeys, TupleDesc};
use heapstore::config::BLOCK_SIZE;
use heapstore::storage::{BufferManager, Page, SegmentManager};
use heapstore::system::{
    ItemPointer, Oid, RelFileNode, Xid, DEFAULT_TABLESPACE_OID, INVALID_OFFSET_NUMBER,
};
use heapstore::types::{Datum, Name};
use smallvec::smallvec;
use tempfile::tempdir;

const WIDGETS_REL_ID: u32 = 50000;

fn node(relid: u32) -> RelFileNode {
    RelFileNode::new(Oid::new(1), DEFAULT_TABLESPACE_OID, Oid::new(relid))
}

fn create_relation_file(base: &Path, relid: u32) {
    let dir = base.join("base").join("1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::File::create(dir.join(relid.to_string())).unwrap();
}

fn name_datum(value: &str) -> Datum {
    Datum::Name(Name::new(value).unwrap())
}

/// Appends one block holding the given tuple images to a relation file.
fn write_page(smgr: &mut SegmentManager, relid: u32, block: u32, tuples: &[&HeapTuple]) {
    let mut page = Page::new(vec![0u8; BLOCK_SIZE]);
    page.init(0);
    for tuple in tuples {
        let offset = page.add_item(tuple.data(), INVALID_OFFSET_NUMBER, false, true);
        assert_ne!(offset, INVALID_OFFSET_NUMBER, "catalog page overflowed");
    }
    let block_bytes: &[u8; BLOCK_SIZE] = page.bytes().try_into().unwrap();
    smgr.extend(node(relid), block, block_bytes).unwrap();
}

fn widgets_desc() -> Arc<TupleDesc> {
    use heapstore::access::Attribute;
    Arc::new(TupleDesc::new(
        vec![
            Attribute::new("id", Oid::INT4_TYPE).unwrap(),
            Attribute::new("label", Oid::NAME_TYPE).unwrap(),
            Attribute::new("owner", Oid::OID_TYPE).unwrap(),
        ],
        Oid::new(WIDGETS_REL_ID),
        false,
    ))
}

/// Lays down the catalog files plus a two-block `widgets` table.
fn build_database(base: &Path) {
    create_relation_file(base, CLASS_REL_ID.as_u32());
    create_relation_file(base, ATTRIBUTE_REL_ID.as_u32());
    create_relation_file(base, WIDGETS_REL_ID);

    let mut smgr = SegmentManager::new(base);

    // bp_class: one row describing widgets, keyed by its row oid.
    let class_desc = Arc::clone(&heapstore::access::CLASS_TUPLE_DESC);
    let mut class_row = HeapTuple::form(
        &[
            Some(name_datum("widgets")),
            Some(Datum::Oid(Oid::new(WIDGETS_REL_ID))),
        ],
        &class_desc,
    )
    .unwrap();
    class_row.set_oid(Oid::new(WIDGETS_REL_ID));
    class_row.set_xmin(Xid::BOOTSTRAP);
    write_page(&mut smgr, CLASS_REL_ID.as_u32(), 0, &[&class_row]);

    // bp_attribute: the three widget columns, attnum ascending.
    let attr_desc = Arc::clone(&heapstore::access::ATTRIBUTE_TUPLE_DESC);
    let columns = [
        ("id", 1, Oid::INT4_TYPE),
        ("label", 2, Oid::NAME_TYPE),
        ("owner", 3, Oid::OID_TYPE),
    ];
    let attr_rows: Vec<HeapTuple> = columns
        .iter()
        .map(|(attname, attnum, atttypid)| {
            let mut row = HeapTuple::form(
                &[
                    Some(Datum::Oid(Oid::new(WIDGETS_REL_ID))),
                    Some(name_datum(attname)),
                    Some(Datum::Int4(*attnum)),
                    Some(Datum::Oid(*atttypid)),
                ],
                &attr_desc,
            )
            .unwrap();
            row.set_xmin(Xid::BOOTSTRAP);
            row
        })
        .collect();
    write_page(
        &mut smgr,
        ATTRIBUTE_REL_ID.as_u32(),
        0,
        &attr_rows.iter().collect::<Vec<_>>(),
    );

    // widgets: two pages of rows.
    let desc = widgets_desc();
    let make_row = |id: i32, label: &str, owner: u32| {
        HeapTuple::form(
            &[
                Some(Datum::Int4(id)),
                Some(name_datum(label)),
                Some(Datum::Oid(Oid::new(owner))),
            ],
            &desc,
        )
        .unwrap()
    };
    let a = make_row(1, "anvil", 10);
    let b = make_row(2, "bolt", 10);
    let c = make_row(3, "cog", 20);
    write_page(&mut smgr, WIDGETS_REL_ID, 0, &[&a, &b]);
    write_page(&mut smgr, WIDGETS_REL_ID, 1, &[&c]);
}

#[test]
fn heap_open_resolves_relation_through_the_catalog() {
    let dir = tempdir().unwrap();
    build_database(dir.path());
    let bufmgr = Arc::new(BufferManager::new(dir.path(), 16));

    let rel = heap_open(Oid::new(WIDGETS_REL_ID), bufmgr).unwrap();
    assert_eq!(*rel.rel_name(), "widgets");
    assert_eq!(rel.rel_id(), Oid::new(WIDGETS_REL_ID));

    let desc = rel.rel_desc();
    assert_eq!(desc.natts(), 3);
    assert_eq!(desc.attr(0).name, "id");
    assert_eq!(desc.attr(0).type_id, Oid::INT4_TYPE);
    assert_eq!(desc.attr(1).name, "label");
    assert_eq!(desc.attr(1).type_id, Oid::NAME_TYPE);
    assert_eq!(desc.attr(2).name, "owner");
    assert_eq!(desc.attr(2).type_id, Oid::OID_TYPE);
}

#[test]
fn sequential_scan_returns_tuples_across_pages() {
    let dir = tempdir().unwrap();
    build_database(dir.path());
    let bufmgr = Arc::new(BufferManager::new(dir.path(), 16));

    let rel = heap_open(Oid::new(WIDGETS_REL_ID), bufmgr).unwrap();
    let mut scan = rel.begin_scan(ScanKeys::new()).unwrap();

    let mut rows = Vec::new();
    while let Some(tuple) = scan.next().unwrap() {
        let id = match tuple.fetch(1).unwrap() {
            Some(Datum::Int4(v)) => v,
            other => panic!("unexpected id datum: {other:?}"),
        };
        let label = match tuple.fetch(2).unwrap() {
            Some(Datum::Name(n)) => n.to_string(),
            other => panic!("unexpected label datum: {other:?}"),
        };
        rows.push((id, label, tuple.self_tid(), tuple.table_oid()));
    }
    scan.end_scan();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].0, 1);
    assert_eq!(rows[0].1, "anvil");
    assert_eq!(rows[0].2, ItemPointer::new(0, 1));
    assert_eq!(rows[1].2, ItemPointer::new(0, 2));
    assert_eq!(rows[2].0, 3);
    assert_eq!(rows[2].1, "cog");
    assert_eq!(rows[2].2, ItemPointer::new(1, 1));
    for row in &rows {
        assert_eq!(row.3, Oid::new(WIDGETS_REL_ID));
    }

    // A finished scan stays finished.
    assert!(scan.next().unwrap().is_none());
}

#[test]
fn scan_skips_line_pointers_without_normal_tuples() {
    let dir = tempdir().unwrap();
    create_relation_file(dir.path(), WIDGETS_REL_ID);

    let desc = widgets_desc();
    let live = HeapTuple::form(
        &[
            Some(Datum::Int4(1)),
            Some(name_datum("live")),
            Some(Datum::Oid(Oid::new(1))),
        ],
        &desc,
    )
    .unwrap();
    let doomed = HeapTuple::form(
        &[
            Some(Datum::Int4(2)),
            Some(name_datum("doomed")),
            Some(Datum::Oid(Oid::new(1))),
        ],
        &desc,
    )
    .unwrap();

    let mut page = Page::new(vec![0u8; BLOCK_SIZE]);
    page.init(0);
    page.add_item(live.data(), INVALID_OFFSET_NUMBER, false, true);
    let dead_offset = page.add_item(doomed.data(), INVALID_OFFSET_NUMBER, false, true);
    let mut item_id = page.item_id(dead_offset);
    item_id.mark_dead();
    page.set_item_id(dead_offset, item_id);

    let mut smgr = SegmentManager::new(dir.path());
    let block: &[u8; BLOCK_SIZE] = page.bytes().try_into().unwrap();
    smgr.extend(node(WIDGETS_REL_ID), 0, block).unwrap();

    // Scan through a relation handle built from a known descriptor, no
    // catalog involved.
    let bufmgr = Arc::new(BufferManager::new(dir.path(), 16));
    let rel = heapstore::access::HeapRelation::with_descriptor(
        Oid::new(WIDGETS_REL_ID),
        Name::new("widgets").unwrap(),
        desc,
        bufmgr,
    );
    let mut scan = rel.begin_scan(ScanKeys::new()).unwrap();

    let first = scan.next().unwrap().expect("live tuple");
    assert_eq!(first.fetch(1).unwrap(), Some(Datum::Int4(1)));
    assert!(scan.next().unwrap().is_none());
}

#[test]
fn catalog_scan_with_keys_carries_them_to_the_consumer() {
    let dir = tempdir().unwrap();
    build_database(dir.path());
    let bufmgr = Arc::new(BufferManager::new(dir.path(), 16));

    let attr_rel = heap_open(ATTRIBUTE_REL_ID, bufmgr).unwrap();
    let keys: ScanKeys = smallvec![heapstore::access::ScanKey {
        attnum: 1,
        value: Datum::Oid(Oid::new(WIDGETS_REL_ID)),
    }];
    let mut scan = attr_rel.begin_scan(keys).unwrap();
    assert_eq!(scan.keys().len(), 1);

    // The scan itself does not filter: it returns every live row and the
    // consumer applies the keys.
    let mut count = 0;
    while let Some(_tuple) = scan.next().unwrap() {
        count += 1;
    }
    assert_eq!(count, 3);
}
