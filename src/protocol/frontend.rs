//! PostgreSQL frontend (client → server) messages.

use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::protocol::codec::Encoder;
use crate::protocol::types::Oid;

/// Protocol version 3.0 (0x00030000)
pub const PROTOCOL_VERSION_3_0: i32 = 196608;

/// SSL request code
pub const SSL_REQUEST_CODE: i32 = 80877103;

/// Frontend message type bytes.
pub mod msg_type {
    /// Password response
    pub const PASSWORD: u8 = b'p';
    /// Query (simple query protocol)
    pub const QUERY: u8 = b'Q';
    /// Parse (extended query protocol)
    pub const PARSE: u8 = b'P';
    /// Execute (extended query protocol)
    pub const EXECUTE: u8 = b'E';
    /// Describe (extended query protocol)
    pub const DESCRIBE: u8 = b'D';
    /// Sync (extended query protocol)
    pub const SYNC: u8 = b'S';
    /// Flush (extended query protocol)
    pub const FLUSH: u8 = b'H';
    /// Function call
    pub const FUNCTION_CALL: u8 = b'F';
    /// CopyData
    pub const COPY_DATA: u8 = b'd';
    /// CopyDone
    pub const COPY_DONE: u8 = b'c';
    /// Terminate
    pub const TERMINATE: u8 = b'X';
}

/// Target of a Describe message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeKind {
    /// Prepared statement
    Statement,
    /// Portal
    Portal,
}

impl DescribeKind {
    fn as_str(self) -> &'static str {
        match self {
            DescribeKind::Statement => "S",
            DescribeKind::Portal => "P",
        }
    }
}

/// Outbound protocol message with its typed payload.
#[derive(Debug, Clone)]
pub enum FrontendMessage {
    /// StartupMessage: protocol version plus option mapping. No tag byte.
    StartupMessage {
        /// Startup options, e.g. `user` and `database`
        options: Vec<(String, String)>,
    },
    /// Simple query
    Query {
        /// SQL text, possibly multiple statements
        sql: String,
    },
    /// Parse a statement server-side
    Parse {
        /// Statement name (empty for the unnamed statement)
        name: String,
        /// SQL with `$1`, `$2`, ... placeholders
        query: String,
        /// Parameter type OIDs (0 = let the server infer)
        param_types: Vec<Oid>,
    },
    /// Request metadata for a statement or portal
    Describe {
        /// Statement or portal
        kind: DescribeKind,
        /// Name to describe
        name: String,
    },
    /// Run a portal
    Execute {
        /// Portal name
        portal: String,
        /// Maximum rows to return (0 = unlimited)
        max_rows: i32,
    },
    /// Force pending responses without waiting for Sync
    Flush,
    /// End an extended query sequence
    Sync,
    /// Graceful connection shutdown
    Terminate,
    /// Cleartext or MD5-hashed password
    PasswordMessage {
        /// Password text, already hashed for MD5 auth
        password: String,
    },
    /// Request TLS. Built but never sent by this client.
    SslRequest,
    /// COPY data stream. Declared, not implemented.
    CopyData,
    /// COPY completion. Declared, not implemented.
    CopyDone,
    /// Function call. Declared, not implemented.
    FunctionCall,
}

impl FrontendMessage {
    /// Serialize this message into `buf`.
    ///
    /// The declared-but-unimplemented kinds fail loudly instead of silently
    /// emitting an empty message.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            FrontendMessage::StartupMessage { options } => {
                let mut msg = Encoder::untagged(buf);
                msg.push_int32(PROTOCOL_VERSION_3_0);
                let pairs: Vec<(&str, &str)> = options
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                msg.push_hash(&pairs);
                msg.finish();
            }
            FrontendMessage::Query { sql } => {
                let mut msg = Encoder::new(buf, msg_type::QUERY);
                msg.push_cstring(sql);
                msg.finish();
            }
            FrontendMessage::Parse {
                name,
                query,
                param_types,
            } => {
                let mut msg = Encoder::new(buf, msg_type::PARSE);
                msg.push_cstring(name);
                msg.push_cstring(query);
                msg.push_int16(param_types.len() as i16);
                for &oid in param_types {
                    msg.push_int32(oid as i32);
                }
                msg.finish();
            }
            FrontendMessage::Describe { kind, name } => {
                let mut msg = Encoder::new(buf, msg_type::DESCRIBE);
                msg.push_raw_string(kind.as_str());
                msg.push_cstring(name);
                msg.finish();
            }
            FrontendMessage::Execute { portal, max_rows } => {
                let mut msg = Encoder::new(buf, msg_type::EXECUTE);
                msg.push_cstring(portal);
                msg.push_int32(*max_rows);
                msg.finish();
            }
            FrontendMessage::Flush => {
                Encoder::new(buf, msg_type::FLUSH).finish();
            }
            FrontendMessage::Sync => {
                Encoder::new(buf, msg_type::SYNC).finish();
            }
            FrontendMessage::Terminate => {
                Encoder::new(buf, msg_type::TERMINATE).finish();
            }
            FrontendMessage::PasswordMessage { password } => {
                let mut msg = Encoder::new(buf, msg_type::PASSWORD);
                msg.push_cstring(password);
                msg.finish();
            }
            FrontendMessage::SslRequest => {
                let mut msg = Encoder::untagged(buf);
                msg.push_int32(SSL_REQUEST_CODE);
                msg.finish();
            }
            FrontendMessage::CopyData => {
                return Err(Error::Unsupported("CopyData is not implemented".into()));
            }
            FrontendMessage::CopyDone => {
                return Err(Error::Unsupported("CopyDone is not implemented".into()));
            }
            FrontendMessage::FunctionCall => {
                return Err(Error::Unsupported("FunctionCall is not implemented".into()));
            }
        }
        Ok(())
    }

    /// Short name for trace output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FrontendMessage::StartupMessage { .. } => "StartupMessage",
            FrontendMessage::Query { .. } => "Query",
            FrontendMessage::Parse { .. } => "Parse",
            FrontendMessage::Describe { .. } => "Describe",
            FrontendMessage::Execute { .. } => "Execute",
            FrontendMessage::Flush => "Flush",
            FrontendMessage::Sync => "Sync",
            FrontendMessage::Terminate => "Terminate",
            FrontendMessage::PasswordMessage { .. } => "PasswordMessage",
            FrontendMessage::SslRequest => "SSLRequest",
            FrontendMessage::CopyData => "CopyData",
            FrontendMessage::CopyDone => "CopyDone",
            FrontendMessage::FunctionCall => "FunctionCall",
        }
    }
}

/// Compute the MD5 password response.
///
/// PostgreSQL MD5 password format: `"md5" + md5(md5(password + username) + salt)`
/// where each inner digest is lowercase hex.
pub fn md5_password(username: &str, password: &str, salt: &[u8; 4]) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    let first_hash_hex = format!("{:x}", hasher.finalize());

    let mut hasher = Md5::new();
    hasher.update(first_hash_hex.as_bytes());
    hasher.update(salt);

    format!("md5{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_message_layout() {
        let mut buf = Vec::new();
        FrontendMessage::StartupMessage {
            options: vec![
                ("user".into(), "alice".into()),
                ("database".into(), "db".into()),
            ],
        }
        .encode(&mut buf)
        .unwrap();

        // Length covers the whole message
        let len = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_eq!(len as usize, buf.len());

        let version = i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        assert_eq!(version, PROTOCOL_VERSION_3_0);

        // Terminated by an empty cstring
        assert_eq!(buf[buf.len() - 1], 0);
        assert_eq!(buf[buf.len() - 2], 0);
    }

    #[test]
    fn query_layout() {
        let mut buf = Vec::new();
        FrontendMessage::Query {
            sql: "SELECT 1".into(),
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(buf[0], b'Q');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len, 13);
        assert_eq!(&buf[5..14], b"SELECT 1\0");
    }

    #[test]
    fn parse_layout() {
        let mut buf = Vec::new();
        FrontendMessage::Parse {
            name: "s1".into(),
            query: "SELECT $1".into(),
            param_types: vec![23],
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(buf[0], b'P');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len as usize, buf.len() - 1);
        // Tail: int16 count followed by one int32 OID
        assert_eq!(&buf[buf.len() - 6..], &[0, 1, 0, 0, 0, 23]);
    }

    #[test]
    fn describe_layout() {
        let mut buf = Vec::new();
        FrontendMessage::Describe {
            kind: DescribeKind::Statement,
            name: "s1".into(),
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(buf[0], b'D');
        assert_eq!(buf[5], b'S');
        assert_eq!(&buf[6..9], b"s1\0");
    }

    #[test]
    fn execute_layout() {
        let mut buf = Vec::new();
        FrontendMessage::Execute {
            portal: String::new(),
            max_rows: 0,
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(buf[0], b'E');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len, 9);
    }

    #[test]
    fn bare_messages() {
        for (msg, tag) in [
            (FrontendMessage::Flush, b'H'),
            (FrontendMessage::Sync, b'S'),
            (FrontendMessage::Terminate, b'X'),
        ] {
            let mut buf = Vec::new();
            msg.encode(&mut buf).unwrap();
            assert_eq!(buf.len(), 5);
            assert_eq!(buf[0], tag);
            assert_eq!(&buf[1..5], &4_i32.to_be_bytes());
        }
    }

    #[test]
    fn ssl_request_layout() {
        let mut buf = Vec::new();
        FrontendMessage::SslRequest.encode(&mut buf).unwrap();

        assert_eq!(buf.len(), 8);
        assert_eq!(&buf[0..4], &8_i32.to_be_bytes());
        assert_eq!(&buf[4..8], &SSL_REQUEST_CODE.to_be_bytes());
    }

    #[test]
    fn unimplemented_kinds_fail_loudly() {
        for msg in [
            FrontendMessage::CopyData,
            FrontendMessage::CopyDone,
            FrontendMessage::FunctionCall,
        ] {
            let mut buf = Vec::new();
            assert!(matches!(
                msg.encode(&mut buf),
                Err(Error::Unsupported(_))
            ));
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn md5_password_formula() {
        // "md5" + hex(md5(hex(md5("pw" + "user")) + salt))
        let salt = [0x01, 0x02, 0x03, 0x04];
        let result = md5_password("user", "pw", &salt);
        assert!(result.starts_with("md5"));
        assert_eq!(result.len(), 35);

        let mut hasher = Md5::new();
        hasher.update(b"pwuser");
        let inner = format!("{:x}", hasher.finalize());
        let mut hasher = Md5::new();
        hasher.update(inner.as_bytes());
        hasher.update(salt);
        assert_eq!(result, format!("md5{:x}", hasher.finalize()));
    }

    #[test]
    fn password_message_layout() {
        let mut buf = Vec::new();
        FrontendMessage::PasswordMessage {
            password: "secret".into(),
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(buf[0], b'p');
        assert!(buf.ends_with(b"secret\0"));
    }
}
