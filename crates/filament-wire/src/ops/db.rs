//! Database-level operations.

use std::sync::LazyLock;

use super::{Opcode, Operation, parse_static};
use crate::profile::Profile;

static EMPTY: LazyLock<Profile> = LazyLock::new(|| parse_static(""));

/// DB_OPEN binds the session to one database. Only this state supports
/// data operations. The response carries the cluster directory.
pub struct DbOpen;

static DB_OPEN_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(driver-name:string)(driver-version:string)(protocol-version:short)(client-id:string)\
         (serialization-impl:string)(token-session:boolean)(database-name:string)\
         (database-type:string)(user-name:string)(user-password:string)",
    )
});
static DB_OPEN_RES: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(session-id:int)(num-of-clusters:short)\
         [{clusters}(cluster-name:string)(cluster-id:short)]\
         (cluster-config:bytes)(release:string)",
    )
});

impl Operation for DbOpen {
    fn opcode(&self) -> Opcode {
        Opcode::DbOpen
    }

    fn request_profile(&self) -> &Profile {
        &DB_OPEN_REQ
    }

    fn response_profile(&self) -> &Profile {
        &DB_OPEN_RES
    }
}

/// DB_CLOSE tells the server to drop the session; no response follows and
/// the caller closes the socket.
pub struct DbClose;

impl Operation for DbClose {
    fn opcode(&self) -> Opcode {
        Opcode::DbClose
    }

    fn request_profile(&self) -> &Profile {
        &EMPTY
    }

    fn response_profile(&self) -> &Profile {
        &EMPTY
    }

    fn expects_response(&self) -> bool {
        false
    }
}

pub struct DbCreate;

static DB_CREATE_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static("(database-name:string)(database-type:string)(storage-type:string)")
});

impl Operation for DbCreate {
    fn opcode(&self) -> Opcode {
        Opcode::DbCreate
    }

    fn request_profile(&self) -> &Profile {
        &DB_CREATE_REQ
    }

    fn response_profile(&self) -> &Profile {
        &EMPTY
    }
}

pub struct DbDrop;

static DB_DROP_REQ: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(database-name:string)(server-storage-type:string)"));

impl Operation for DbDrop {
    fn opcode(&self) -> Opcode {
        Opcode::DbDrop
    }

    fn request_profile(&self) -> &Profile {
        &DB_DROP_REQ
    }

    fn response_profile(&self) -> &Profile {
        &EMPTY
    }
}

pub struct DbExist;

static DB_EXIST_REQ: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(database-name:string)(server-storage-type:string)"));
static DB_EXIST_RES: LazyLock<Profile> = LazyLock::new(|| parse_static("(result:byte)"));

impl Operation for DbExist {
    fn opcode(&self) -> Opcode {
        Opcode::DbExist
    }

    fn request_profile(&self) -> &Profile {
        &DB_EXIST_REQ
    }

    fn response_profile(&self) -> &Profile {
        &DB_EXIST_RES
    }
}

/// DB_LIST returns a serialized document enumerating the databases; the
/// document stays opaque at this layer.
pub struct DbList;

static DB_LIST_RES: LazyLock<Profile> = LazyLock::new(|| parse_static("(list:bytes)"));

impl Operation for DbList {
    fn opcode(&self) -> Opcode {
        Opcode::DbList
    }

    fn request_profile(&self) -> &Profile {
        &EMPTY
    }

    fn response_profile(&self) -> &Profile {
        &DB_LIST_RES
    }
}

pub struct DbSize;

static DB_SIZE_RES: LazyLock<Profile> = LazyLock::new(|| parse_static("(size:long)"));

impl Operation for DbSize {
    fn opcode(&self) -> Opcode {
        Opcode::DbSize
    }

    fn request_profile(&self) -> &Profile {
        &EMPTY
    }

    fn response_profile(&self) -> &Profile {
        &DB_SIZE_RES
    }
}

pub struct DbCountRecords;

static DB_COUNT_RES: LazyLock<Profile> = LazyLock::new(|| parse_static("(count:long)"));

impl Operation for DbCountRecords {
    fn opcode(&self) -> Opcode {
        Opcode::DbCountRecords
    }

    fn request_profile(&self) -> &Profile {
        &EMPTY
    }

    fn response_profile(&self) -> &Profile {
        &DB_COUNT_RES
    }
}

/// DB_RELOAD refreshes the cluster directory without reopening.
pub struct DbReload;

static DB_RELOAD_RES: LazyLock<Profile> = LazyLock::new(|| {
    parse_static("(num-of-clusters:short)[{clusters}(cluster-name:string)(cluster-id:short)]")
});

impl Operation for DbReload {
    fn opcode(&self) -> Opcode {
        Opcode::DbReload
    }

    fn request_profile(&self) -> &Profile {
        &EMPTY
    }

    fn response_profile(&self) -> &Profile {
        &DB_RELOAD_RES
    }
}
