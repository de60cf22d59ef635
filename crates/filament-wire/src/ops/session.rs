//! Session-level operations: CONNECT and SHUTDOWN.
//!
//! The initial greeting is not an operation — the server pushes a bare
//! `(protocol:int16)` on accept, which the connection reads directly.

use std::sync::LazyLock;

use super::{Opcode, Operation, parse_static};
use crate::profile::Profile;

static EMPTY: LazyLock<Profile> = LazyLock::new(|| parse_static(""));

/// CONNECT authenticates against the server (not a database). The response
/// carries the fresh session id and, for token sessions, the bearer token.
pub struct Connect;

static CONNECT_REQ: LazyLock<Profile> = LazyLock::new(|| {
    parse_static(
        "(driver-name:string)(driver-version:string)(protocol-version:short)(client-id:string)\
         (serialization-impl:string)(token-session:boolean)(user-name:string)(user-password:string)",
    )
});
static CONNECT_RES: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(session-id:int)(token:bytes)"));

impl Operation for Connect {
    fn opcode(&self) -> Opcode {
        Opcode::Connect
    }

    fn request_profile(&self) -> &Profile {
        &CONNECT_REQ
    }

    fn response_profile(&self) -> &Profile {
        &CONNECT_RES
    }
}

/// SHUTDOWN stops a server that accepts the root credentials.
pub struct Shutdown;

static SHUTDOWN_REQ: LazyLock<Profile> =
    LazyLock::new(|| parse_static("(user-name:string)(user-password:string)"));

impl Operation for Shutdown {
    fn opcode(&self) -> Opcode {
        Opcode::Shutdown
    }

    fn request_profile(&self) -> &Profile {
        &SHUTDOWN_REQ
    }

    fn response_profile(&self) -> &Profile {
        &EMPTY
    }
}
