//! High-level database façade: one blocking call per server opcode.
//!
//! Methods assemble the argument map for their operation, dispatch through
//! the connection and lift the decoded map into typed results.

use filament_record::{BagPointer, Rid};
use filament_wire::exec::{Value, ValueMap, require_i64};
use filament_wire::ops::{
    Command, CommandClass, CommandMode, CommandPayload, ConfigGet, ConfigList, ConfigSet,
    Connect, DbClose, DbCountRecords, DbCreate, DbDrop, DbExist, DbList, DbOpen, DbReload,
    DbSize, Mode, RECORD_KIND_NULL, RecordCreate, RecordDelete, RecordLoad, RecordType,
    RecordUpdate, RidbagSize, Shutdown, TxCommit, TxEntry,
};
use filament_wire::Result;

use crate::config::{DRIVER_NAME, DRIVER_VERSION, DriverConfig};
use crate::conn::Connection;

/// Database storage model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbType {
    Document,
    #[default]
    Graph,
}

impl DbType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Graph => "graph",
        }
    }
}

/// Server-side storage engine for create/drop/exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    #[default]
    PLocal,
    Memory,
}

impl StorageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PLocal => "plocal",
            Self::Memory => "memory",
        }
    }
}

/// One entry of the cluster directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    pub id: i16,
}

/// Result of DB_OPEN.
#[derive(Debug, Clone, PartialEq)]
pub struct DbOpenResult {
    pub session_id: i32,
    pub clusters: Vec<Cluster>,
    pub release: String,
}

/// One record lifted out of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub kind: i16,
    pub record_type: Option<i8>,
    pub rid: Option<Rid>,
    pub version: Option<i32>,
    pub content: Option<Vec<u8>>,
}

impl RawRecord {
    fn from_map(map: &ValueMap) -> Self {
        let kind = map
            .get("record-kind")
            .and_then(Value::as_i64)
            .unwrap_or(i64::from(RECORD_KIND_NULL)) as i16;
        let rid = match (
            map.get("cluster-id").and_then(Value::as_i64),
            map.get("cluster-position").and_then(Value::as_i64),
        ) {
            (Some(cluster), Some(position)) => Some(Rid::new(cluster as i16, position)),
            _ => None,
        };
        Self {
            kind,
            record_type: map
                .get("record-type")
                .and_then(Value::as_i64)
                .map(|v| v as i8),
            rid,
            version: map.get("record-version").and_then(Value::as_i32),
            content: map
                .get("record-content")
                .and_then(Value::as_bytes)
                .map(<[u8]>::to_vec),
        }
    }
}

/// Result of COMMAND.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandResult {
    /// The synchronous result-type byte, when the mode was synchronous.
    pub result_type: Option<i8>,
    pub records: Vec<RawRecord>,
    /// Opaque payload of an `'a'` (serialized) result.
    pub serialized: Option<Vec<u8>>,
}

impl CommandResult {
    fn from_map(map: &ValueMap) -> Self {
        let records = map
            .get("records")
            .and_then(Value::as_list)
            .map(|items| items.iter().map(RawRecord::from_map).collect())
            .unwrap_or_default();
        Self {
            result_type: map
                .get("synch-result-type")
                .and_then(Value::as_i64)
                .map(|v| v as i8),
            records,
            serialized: map
                .get("serialized-result")
                .and_then(Value::as_bytes)
                .map(<[u8]>::to_vec),
        }
    }

    /// The first persisted rid in the result, the shape CREATE statements
    /// come back with.
    pub fn first_rid(&self) -> Option<(Rid, Option<i32>)> {
        self.records
            .iter()
            .find_map(|r| r.rid.map(|rid| (rid, r.version)))
    }
}

/// A record created inside a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCreated {
    pub client_rid: Rid,
    pub created_rid: Rid,
}

/// A record updated inside a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxUpdated {
    pub rid: Rid,
    pub version: i32,
}

/// Result of TX_COMMIT.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxResult {
    pub created: Vec<TxCreated>,
    pub updated: Vec<TxUpdated>,
    pub collection_changes: usize,
}

/// Blocking façade over one connection.
pub struct Database {
    conn: Connection,
    config: DriverConfig,
}

impl Database {
    /// Connects the socket and consumes the greeting; no authentication
    /// happens yet.
    pub fn open(config: DriverConfig) -> Result<Self> {
        let conn = Connection::open(&config)?;
        Ok(Self { conn, config })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn handshake_args(&self) -> ValueMap {
        let mut args = ValueMap::new();
        args.insert("driver-name".into(), Value::from(DRIVER_NAME));
        args.insert("driver-version".into(), Value::from(DRIVER_VERSION));
        args.insert(
            "protocol-version".into(),
            Value::Short(self.conn.protocol_version()),
        );
        args.insert("client-id".into(), Value::from("-1"));
        args.insert(
            "serialization-impl".into(),
            Value::from(self.config.serialization.impl_name()),
        );
        args.insert(
            "token-session".into(),
            Value::Bool(self.config.token_session),
        );
        args
    }

    /// CONNECT: authenticates against the server. Returns the session id.
    pub fn connect(&mut self, user: &str, password: &str) -> Result<i32> {
        let mut args = self.handshake_args();
        args.insert("user-name".into(), Value::from(user));
        args.insert("user-password".into(), Value::from(password));
        let map = self.conn.exec(&Connect, &args)?;
        Ok(require_i64(&map, "session-id")? as i32)
    }

    /// DB_OPEN: binds the session to a database and returns its cluster
    /// directory.
    pub fn db_open(
        &mut self,
        name: &str,
        db_type: DbType,
        user: &str,
        password: &str,
    ) -> Result<DbOpenResult> {
        let mut args = self.handshake_args();
        args.insert("database-name".into(), Value::from(name));
        args.insert("database-type".into(), Value::from(db_type.as_str()));
        args.insert("user-name".into(), Value::from(user));
        args.insert("user-password".into(), Value::from(password));
        let map = self.conn.exec(&DbOpen, &args)?;

        let clusters = map
            .get("clusters")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(Cluster {
                            name: item.get("cluster-name")?.as_str()?.to_string(),
                            id: item.get("cluster-id")?.as_i64()? as i16,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(DbOpenResult {
            session_id: require_i64(&map, "session-id")? as i32,
            clusters,
            release: map
                .get("release")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// DB_CLOSE: lets the server drop the session and closes the socket.
    pub fn db_close(&mut self) -> Result<()> {
        self.conn.exec(&DbClose, &ValueMap::new())?;
        Ok(())
    }

    /// SHUTDOWN: stops the server (root credentials required).
    pub fn shutdown(&mut self, user: &str, password: &str) -> Result<()> {
        let mut args = ValueMap::new();
        args.insert("user-name".into(), Value::from(user));
        args.insert("user-password".into(), Value::from(password));
        self.conn.exec(&Shutdown, &args)?;
        Ok(())
    }

    pub fn db_create(
        &mut self,
        name: &str,
        db_type: DbType,
        storage: StorageType,
    ) -> Result<()> {
        let mut args = ValueMap::new();
        args.insert("database-name".into(), Value::from(name));
        args.insert("database-type".into(), Value::from(db_type.as_str()));
        args.insert("storage-type".into(), Value::from(storage.as_str()));
        self.conn.exec(&DbCreate, &args)?;
        Ok(())
    }

    pub fn db_drop(&mut self, name: &str, storage: StorageType) -> Result<()> {
        let mut args = ValueMap::new();
        args.insert("database-name".into(), Value::from(name));
        args.insert("server-storage-type".into(), Value::from(storage.as_str()));
        self.conn.exec(&DbDrop, &args)?;
        Ok(())
    }

    pub fn db_exist(&mut self, name: &str, storage: StorageType) -> Result<bool> {
        let mut args = ValueMap::new();
        args.insert("database-name".into(), Value::from(name));
        args.insert("server-storage-type".into(), Value::from(storage.as_str()));
        let map = self.conn.exec(&DbExist, &args)?;
        Ok(require_i64(&map, "result")? != 0)
    }

    /// DB_LIST: the raw serialized database listing.
    pub fn db_list(&mut self) -> Result<Vec<u8>> {
        let map = self.conn.exec(&DbList, &ValueMap::new())?;
        Ok(map
            .get("list")
            .and_then(Value::as_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default())
    }

    pub fn db_size(&mut self) -> Result<i64> {
        let map = self.conn.exec(&DbSize, &ValueMap::new())?;
        require_i64(&map, "size")
    }

    pub fn db_count_records(&mut self) -> Result<i64> {
        let map = self.conn.exec(&DbCountRecords, &ValueMap::new())?;
        require_i64(&map, "count")
    }

    /// DB_RELOAD: refreshes and returns the cluster directory.
    pub fn db_reload(&mut self) -> Result<Vec<Cluster>> {
        let map = self.conn.exec(&DbReload, &ValueMap::new())?;
        Ok(map
            .get("clusters")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(Cluster {
                            name: item.get("cluster-name")?.as_str()?.to_string(),
                            id: item.get("cluster-id")?.as_i64()? as i16,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn config_get(&mut self, key: &str) -> Result<String> {
        let mut args = ValueMap::new();
        args.insert("key".into(), Value::from(key));
        let map = self.conn.exec(&ConfigGet, &args)?;
        Ok(map
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub fn config_set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut args = ValueMap::new();
        args.insert("key".into(), Value::from(key));
        args.insert("value".into(), Value::from(value));
        self.conn.exec(&ConfigSet, &args)?;
        Ok(())
    }

    pub fn config_list(&mut self) -> Result<Vec<(String, String)>> {
        let map = self.conn.exec(&ConfigList, &ValueMap::new())?;
        Ok(map
            .get("items")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some((
                            item.get("config-key")?.as_str()?.to_string(),
                            item.get("config-value")?.as_str()?.to_string(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// RECORD_LOAD: fetches one record by rid, `None` on a miss.
    pub fn record_load(
        &mut self,
        rid: Rid,
        fetch_plan: &str,
        ignore_cache: bool,
        load_tombstones: bool,
    ) -> Result<Option<RawRecord>> {
        let mut args = ValueMap::new();
        args.insert("cluster-id".into(), Value::Short(rid.cluster));
        args.insert("cluster-position".into(), Value::Long(rid.position));
        args.insert("fetch-plan".into(), Value::from(fetch_plan));
        args.insert("ignore-cache".into(), Value::Byte(i8::from(ignore_cache)));
        args.insert(
            "load-tombstones".into(),
            Value::Byte(i8::from(load_tombstones)),
        );
        let map = self.conn.exec(&RecordLoad, &args)?;

        let record = map
            .get("records")
            .and_then(Value::as_list)
            .and_then(<[ValueMap]>::first)
            .map(|item| {
                let mut record = RawRecord::from_map(item);
                record.kind = 0;
                record.rid = Some(rid);
                record
            });
        Ok(record)
    }

    /// RECORD_CREATE: returns the assigned cluster position and version.
    pub fn record_create(
        &mut self,
        content: &[u8],
        record_type: RecordType,
        mode: Mode,
    ) -> Result<(i64, i32)> {
        let mut args = ValueMap::new();
        args.insert("cluster-id".into(), Value::Short(-1));
        args.insert("record-content".into(), Value::Bytes(content.to_vec()));
        args.insert(
            "record-type".into(),
            Value::Byte(record_type.as_byte() as i8),
        );
        args.insert("mode".into(), Value::Byte(mode.as_i8()));
        let map = self.conn.exec(&RecordCreate, &args)?;
        Ok((
            require_i64(&map, "cluster-position")?,
            require_i64(&map, "record-version")? as i32,
        ))
    }

    /// RECORD_UPDATE: returns the new record version.
    pub fn record_update(
        &mut self,
        rid: Rid,
        update_content: bool,
        content: &[u8],
        version: i32,
        record_type: RecordType,
        mode: Mode,
    ) -> Result<i32> {
        let mut args = ValueMap::new();
        args.insert("cluster-id".into(), Value::Short(rid.cluster));
        args.insert("cluster-position".into(), Value::Long(rid.position));
        args.insert("update-content".into(), Value::Bool(update_content));
        args.insert("record-content".into(), Value::Bytes(content.to_vec()));
        args.insert("record-version".into(), Value::Int(version));
        args.insert(
            "record-type".into(),
            Value::Byte(record_type.as_byte() as i8),
        );
        args.insert("mode".into(), Value::Byte(mode.as_i8()));
        let map = self.conn.exec(&RecordUpdate, &args)?;
        Ok(require_i64(&map, "record-version")? as i32)
    }

    /// RECORD_DELETE: true when the record existed and was deleted.
    pub fn record_delete(&mut self, rid: Rid, version: i32, mode: Mode) -> Result<bool> {
        let mut args = ValueMap::new();
        args.insert("cluster-id".into(), Value::Short(rid.cluster));
        args.insert("cluster-position".into(), Value::Long(rid.position));
        args.insert("record-version".into(), Value::Int(version));
        args.insert("mode".into(), Value::Byte(mode.as_i8()));
        let map = self.conn.exec(&RecordDelete, &args)?;
        Ok(require_i64(&map, "payload-status")? != 0)
    }

    /// COMMAND: executes a query, command or script.
    pub fn command(
        &mut self,
        class: CommandClass,
        mode: CommandMode,
        payload: CommandPayload,
    ) -> Result<CommandResult> {
        let op = Command {
            class,
            mode,
            payload,
            protocol_version: self.conn.protocol_version(),
        };
        let map = self.conn.exec(&op, &ValueMap::new())?;
        Ok(CommandResult::from_map(&map))
    }

    /// TX_COMMIT: applies a batch of entries atomically.
    pub fn tx_commit(
        &mut self,
        tx_id: i32,
        using_log: bool,
        entries: Vec<TxEntry>,
    ) -> Result<TxResult> {
        let op = TxCommit {
            tx_id,
            using_log,
            entries,
        };
        let map = self.conn.exec(&op, &ValueMap::new())?;

        let created = map
            .get("created")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(TxCreated {
                            client_rid: Rid::new(
                                item.get("client-specified-cluster-id")?.as_i64()? as i16,
                                item.get("client-specified-cluster-position")?.as_i64()?,
                            ),
                            created_rid: Rid::new(
                                item.get("created-cluster-id")?.as_i64()? as i16,
                                item.get("created-cluster-position")?.as_i64()?,
                            ),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let updated = map
            .get("updated")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(TxUpdated {
                            rid: Rid::new(
                                item.get("updated-cluster-id")?.as_i64()? as i16,
                                item.get("updated-cluster-position")?.as_i64()?,
                            ),
                            version: item.get("new-record-version")?.as_i32()?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let collection_changes = map
            .get("changes")
            .and_then(Value::as_list)
            .map_or(0, <[ValueMap]>::len);
        Ok(TxResult {
            created,
            updated,
            collection_changes,
        })
    }

    /// RIDBAG_GET_SIZE: size of a tree-resident reference bag.
    pub fn ridbag_size(&mut self, pointer: &BagPointer, changes: &[u8]) -> Result<i32> {
        let mut args = ValueMap::new();
        args.insert("file-id".into(), Value::Long(pointer.file_id));
        args.insert("page-index".into(), Value::Long(pointer.page_index));
        args.insert("page-offset".into(), Value::Int(pointer.page_offset));
        args.insert("changes".into(), Value::Bytes(changes.to_vec()));
        let map = self.conn.exec(&RidbagSize, &args)?;
        Ok(require_i64(&map, "size")? as i32)
    }
}
