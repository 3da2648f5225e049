//! Relation file identity and path resolution.

use std::path::{Path, PathBuf};

use crate::system::error::StoreError;
use crate::system::ids::Oid;

pub const DEFAULT_TABLESPACE_OID: Oid = Oid::new(1663);
pub const GLOBAL_TABLESPACE_OID: Oid = Oid::new(1664);

/// Physical identity of a relation: the database, tablespace, and relation
/// oids that together select its backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelFileNode {
    pub dbid: Oid,
    pub tsid: Oid,
    pub relid: Oid,
}

impl RelFileNode {
    pub fn new(dbid: Oid, tsid: Oid, relid: Oid) -> Self {
        Self { dbid, tsid, relid }
    }
}

/// Resolves the backing file for a relation under the data directory.
/// Only the global and default tablespaces exist; anything else is a sign
/// of catalog corruption.
pub fn rel_path(base: &Path, node: RelFileNode) -> eyre::Result<PathBuf> {
    if node.tsid == GLOBAL_TABLESPACE_OID {
        Ok(base.join("base").join("global").join(node.relid.to_string()))
    } else if node.tsid == DEFAULT_TABLESPACE_OID {
        Ok(base
            .join("base")
            .join(node.dbid.to_string())
            .join(node.relid.to_string()))
    } else {
        Err(StoreError::internal(format!(
            "tablespace {} is not supported",
            node.tsid
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tablespace_resolves_per_database() {
        let node = RelFileNode::new(Oid::new(1), DEFAULT_TABLESPACE_OID, Oid::new(1259));
        let path = rel_path(Path::new("/data"), node).unwrap();
        assert_eq!(path, PathBuf::from("/data/base/1/1259"));
    }

    #[test]
    fn global_tablespace_resolves_shared() {
        let node = RelFileNode::new(Oid::new(1), GLOBAL_TABLESPACE_OID, Oid::new(1262));
        let path = rel_path(Path::new("/data"), node).unwrap();
        assert_eq!(path, PathBuf::from("/data/base/global/1262"));
    }

    #[test]
    fn unknown_tablespace_is_an_error() {
        let node = RelFileNode::new(Oid::new(1), Oid::new(9999), Oid::new(1));
        assert!(rel_path(Path::new("/data"), node).is_err());
    }
}
