//! Server configuration operations.

use std::sync::LazyLock;

use super::{Opcode, Operation, parse_static};
use crate::profile::Profile;

static EMPTY: LazyLock<Profile> = LazyLock::new(|| parse_static(""));

pub struct ConfigGet;

static CONFIG_GET_REQ: LazyLock<Profile> = LazyLock::new(|| parse_static("(key:string)"));
static CONFIG_GET_RES: LazyLock<Profile> = LazyLock::new(|| parse_static("(value:string)"));

impl Operation for ConfigGet {
    fn opcode(&self) -> Opcode {
        Opcode::ConfigGet
    }

    fn request_profile(&self) -> &Profile {
        &CONFIG_GET_REQ
    }

    fn response_profile(&self) -> &Profile {
        &CONFIG_GET_RES
    }
}

pub struct ConfigSet;

static CONFIG_SET_REQ: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(key:string)(value:string)"));

impl Operation for ConfigSet {
    fn opcode(&self) -> Opcode {
        Opcode::ConfigSet
    }

    fn request_profile(&self) -> &Profile {
        &CONFIG_SET_REQ
    }

    fn response_profile(&self) -> &Profile {
        &EMPTY
    }
}

/// CONFIG_LIST returns a count-gated list of key/value pairs.
pub struct ConfigList;

static CONFIG_LIST_RES: LazyLock<Profile> = LazyLock::new(|| {
    parse_static("(num-cfg-items:short)[{items}(config-key:string)(config-value:string)]")
});

impl Operation for ConfigList {
    fn opcode(&self) -> Opcode {
        Opcode::ConfigList
    }

    fn request_profile(&self) -> &Profile {
        &EMPTY
    }

    fn response_profile(&self) -> &Profile {
        &CONFIG_LIST_RES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Writer;
    use crate::exec::Value;
    use crate::ops::decode_response;

    #[test]
    fn config_list_is_count_driven() {
        let mut w = Writer::new();
        w.write_i8(0);
        w.write_i32(7);
        w.write_i16(2);
        w.write_string("tx.log.synch");
        w.write_string("false");
        w.write_string("db.pool.max");
        w.write_string("50");
        let bytes = w.into_bytes();

        let map = decode_response(&ConfigList, &bytes, false).unwrap();
        let items = map["items"].as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["config-key"], Value::Str("tx.log.synch".into()));
        assert_eq!(items[1]["config-value"], Value::Str("50".into()));
    }
}
