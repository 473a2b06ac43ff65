//! PostgreSQL backend (server → client) messages.
//!
//! One inbound frame's tag and body decode into a single [`BackendMessage`].
//! Unknown tags and auth sub-codes fail with [`Error::Decode`]: the frame
//! boundary is intact, so the caller logs and skips the frame.

use crate::error::{Error, ErrorFields, Result};
use crate::protocol::codec::Decoder;
use crate::protocol::types::{FormatCode, Oid};

/// Backend message type bytes.
pub mod msg_type {
    /// Authentication request
    pub const AUTHENTICATION: u8 = b'R';
    /// BackendKeyData
    pub const BACKEND_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// NoticeResponse
    pub const NOTICE_RESPONSE: u8 = b'N';
}

/// Authentication sub-codes inside the 'R' body.
pub mod auth_code {
    pub const OK: i32 = 0;
    pub const KERBEROS_V5: i32 = 2;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const CRYPT_PASSWORD: i32 = 4;
    pub const MD5_PASSWORD: i32 = 5;
    pub const SCM_CREDENTIAL: i32 = 6;
    pub const GSS: i32 = 7;
    pub const SSPI: i32 = 8;
}

/// Authentication request from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    /// Authentication successful
    Ok,
    /// Kerberos V5 authentication required
    KerberosV5,
    /// Cleartext password required
    CleartextPassword,
    /// Crypt password required (2-byte salt)
    CryptPassword {
        /// Salt for crypt(3)
        salt: [u8; 2],
    },
    /// MD5 password required (4-byte salt)
    Md5Password {
        /// Salt appended to the inner digest
        salt: [u8; 4],
    },
    /// SCM credentials message expected
    ScmCredential,
    /// GSSAPI authentication
    Gss,
    /// SSPI authentication
    Sspi,
}

impl AuthRequest {
    fn parse(dec: &mut Decoder<'_>) -> Result<Self> {
        let code = dec.shift_int32()?;
        match code {
            auth_code::OK => Ok(AuthRequest::Ok),
            auth_code::KERBEROS_V5 => Ok(AuthRequest::KerberosV5),
            auth_code::CLEARTEXT_PASSWORD => Ok(AuthRequest::CleartextPassword),
            auth_code::CRYPT_PASSWORD => {
                let raw = dec.shift_raw_string(2)?;
                Ok(AuthRequest::CryptPassword {
                    salt: [raw[0], raw[1]],
                })
            }
            auth_code::MD5_PASSWORD => {
                let raw = dec.shift_raw_string(4)?;
                Ok(AuthRequest::Md5Password {
                    salt: [raw[0], raw[1], raw[2], raw[3]],
                })
            }
            auth_code::SCM_CREDENTIAL => Ok(AuthRequest::ScmCredential),
            auth_code::GSS => Ok(AuthRequest::Gss),
            // GSSContinue intentionally unhandled
            auth_code::SSPI => Ok(AuthRequest::Sspi),
            _ => Err(Error::Decode(format!(
                "unknown authentication sub-code: {code}"
            ))),
        }
    }

    /// Protocol name of the requested method, for errors and trace output.
    pub fn method_name(&self) -> &'static str {
        match self {
            AuthRequest::Ok => "Ok",
            AuthRequest::KerberosV5 => "KerberosV5",
            AuthRequest::CleartextPassword => "CleartextPassword",
            AuthRequest::CryptPassword { .. } => "CryptPassword",
            AuthRequest::Md5Password { .. } => "MD5Password",
            AuthRequest::ScmCredential => "SCMCredential",
            AuthRequest::Gss => "GSS",
            AuthRequest::Sspi => "SSPI",
        }
    }
}

/// One column of a RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    /// Field name
    pub name: String,
    /// Table OID (0 if not a table column)
    pub table_oid: Oid,
    /// Column attribute number (0 if not a table column)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: Oid,
    /// Type size (-1 for variable, -2 for null-terminated)
    pub type_size: i16,
    /// Type modifier (type-specific)
    pub type_modifier: i32,
    /// Format code (0=text, 1=binary)
    pub format: FormatCode,
}

/// RowDescription message - ordered field descriptors for a result set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowDescription {
    /// Field descriptors in declared order
    pub fields: Vec<FieldDescription>,
}

impl RowDescription {
    fn parse(dec: &mut Decoder<'_>) -> Result<Self> {
        let num_fields = dec.shift_int16()?;
        let mut fields = Vec::with_capacity(num_fields.max(0) as usize);
        for _ in 0..num_fields {
            let name = dec.shift_cstring()?.to_string();
            let table_oid = dec.shift_int32()? as Oid;
            let column_id = dec.shift_int16()?;
            let type_oid = dec.shift_int32()? as Oid;
            let type_size = dec.shift_int16()?;
            let type_modifier = dec.shift_int32()?;
            let format = FormatCode::from_u16(dec.shift_int16()? as u16);
            fields.push(FieldDescription {
                name,
                table_oid,
                column_id,
                type_oid,
                type_size,
                type_modifier,
                format,
            });
        }
        Ok(Self { fields })
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Typed event decoded from one inbound frame.
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// Authentication request or success ('R')
    Authentication(AuthRequest),
    /// Error from the server ('E')
    ErrorResponse(ErrorFields),
    /// Non-fatal notice from the server ('N')
    NoticeResponse(ErrorFields),
    /// Runtime parameter report ('S')
    ParameterStatus {
        /// Parameter name
        name: String,
        /// Parameter value
        value: String,
    },
    /// Cancellation key data ('K')
    BackendKeyData {
        /// Backend process ID
        pid: i32,
        /// Secret key for cancellation
        secret: i32,
    },
    /// Server will accept the next query ('Z')
    ReadyForQuery {
        /// Transaction status byte
        status: u8,
    },
    /// Result set column descriptors ('T')
    RowDescription(RowDescription),
    /// One row of column values, None = SQL NULL ('D')
    DataRow(Vec<Option<Vec<u8>>>),
    /// Command finished ('C')
    CommandComplete {
        /// Command tag text, e.g. "SELECT 5"
        tag: String,
    },
}

impl BackendMessage {
    /// Decode one frame's tag and body into a typed event.
    pub fn parse(tag: u8, payload: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(payload);
        match tag {
            msg_type::AUTHENTICATION => Ok(BackendMessage::Authentication(AuthRequest::parse(
                &mut dec,
            )?)),
            msg_type::ERROR_RESPONSE => {
                Ok(BackendMessage::ErrorResponse(parse_fields(&mut dec)?))
            }
            msg_type::NOTICE_RESPONSE => {
                Ok(BackendMessage::NoticeResponse(parse_fields(&mut dec)?))
            }
            msg_type::PARAMETER_STATUS => {
                let name = dec.shift_cstring()?.to_string();
                let value = dec.shift_cstring()?.to_string();
                Ok(BackendMessage::ParameterStatus { name, value })
            }
            msg_type::BACKEND_KEY_DATA => {
                let pid = dec.shift_int32()?;
                let secret = dec.shift_int32()?;
                Ok(BackendMessage::BackendKeyData { pid, secret })
            }
            msg_type::READY_FOR_QUERY => {
                let status = dec.shift_code()?;
                Ok(BackendMessage::ReadyForQuery { status })
            }
            msg_type::ROW_DESCRIPTION => Ok(BackendMessage::RowDescription(RowDescription::parse(
                &mut dec,
            )?)),
            msg_type::DATA_ROW => {
                let num_fields = dec.shift_int16()?;
                let mut values = Vec::with_capacity(num_fields.max(0) as usize);
                for _ in 0..num_fields {
                    let size = dec.shift_int32()?;
                    if size == -1 {
                        values.push(None);
                    } else {
                        values.push(Some(dec.shift_raw_string(size as usize)?.to_vec()));
                    }
                }
                Ok(BackendMessage::DataRow(values))
            }
            msg_type::COMMAND_COMPLETE => Ok(BackendMessage::CommandComplete {
                tag: dec.shift_cstring()?.to_string(),
            }),
            _ => Err(Error::Decode(format!(
                "unknown response tag: '{}' (0x{tag:02x})",
                tag as char
            ))),
        }
    }

    /// Short name for trace output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BackendMessage::Authentication(_) => "Authentication",
            BackendMessage::ErrorResponse(_) => "ErrorResponse",
            BackendMessage::NoticeResponse(_) => "NoticeResponse",
            BackendMessage::ParameterStatus { .. } => "ParameterStatus",
            BackendMessage::BackendKeyData { .. } => "BackendKeyData",
            BackendMessage::ReadyForQuery { .. } => "ReadyForQuery",
            BackendMessage::RowDescription(_) => "RowDescription",
            BackendMessage::DataRow(_) => "DataRow",
            BackendMessage::CommandComplete { .. } => "CommandComplete",
        }
    }
}

/// Error field type codes from the protocol.
mod field_code {
    pub const SEVERITY: u8 = b'S';
    pub const CODE: u8 = b'C';
    pub const MESSAGE: u8 = b'M';
    pub const DETAIL: u8 = b'D';
    pub const HINT: u8 = b'H';
    pub const POSITION: u8 = b'P';
    pub const WHERE: u8 = b'W';
    pub const FILE: u8 = b'F';
    pub const LINE: u8 = b'L';
    pub const ROUTINE: u8 = b'R';
}

/// Parse the error/notice field list: repeated 1-byte field code + text,
/// terminated by an empty cstring.
fn parse_fields(dec: &mut Decoder<'_>) -> Result<ErrorFields> {
    let mut fields = ErrorFields::default();

    for entry in dec.shift_multi_cstring()? {
        let Some((code, value)) = entry.split_at_checked(1) else {
            continue;
        };
        match code.as_bytes()[0] {
            field_code::SEVERITY => fields.severity = Some(value.to_string()),
            field_code::CODE => fields.code = Some(value.to_string()),
            field_code::MESSAGE => fields.message = Some(value.to_string()),
            field_code::DETAIL => fields.detail = Some(value.to_string()),
            field_code::HINT => fields.hint = Some(value.to_string()),
            field_code::POSITION => fields.position = value.parse().ok(),
            field_code::WHERE => fields.where_ = Some(value.to_string()),
            field_code::FILE => fields.file = Some(value.to_string()),
            field_code::LINE => fields.line = value.parse().ok(),
            field_code::ROUTINE => fields.routine = Some(value.to_string()),
            _ => {
                tracing::debug!("unknown error field code: {code}");
            }
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_ok() {
        let msg = BackendMessage::parse(b'R', &0_i32.to_be_bytes()).unwrap();
        assert!(matches!(
            msg,
            BackendMessage::Authentication(AuthRequest::Ok)
        ));
    }

    #[test]
    fn auth_md5_carries_salt() {
        let mut payload = 5_i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let msg = BackendMessage::parse(b'R', &payload).unwrap();
        match msg {
            BackendMessage::Authentication(AuthRequest::Md5Password { salt }) => {
                assert_eq!(salt, [0xAA, 0xBB, 0xCC, 0xDD]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn auth_crypt_carries_two_byte_salt() {
        let mut payload = 4_i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0x41, 0x42]);
        let msg = BackendMessage::parse(b'R', &payload).unwrap();
        assert!(matches!(
            msg,
            BackendMessage::Authentication(AuthRequest::CryptPassword { salt: [0x41, 0x42] })
        ));
    }

    #[test]
    fn auth_unknown_code_is_recoverable() {
        let payload = 10_i32.to_be_bytes();
        let err = BackendMessage::parse(b'R', &payload).unwrap_err();
        assert!(err.is_recoverable_decode());
    }

    #[test]
    fn unknown_tag_is_recoverable() {
        let err = BackendMessage::parse(b'!', &[]).unwrap_err();
        assert!(err.is_recoverable_decode());
    }

    #[test]
    fn error_response_fields() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"SFATAL\0");
        payload.extend_from_slice(b"C28000\0");
        payload.extend_from_slice(b"Mrole does not exist\0");
        payload.push(0);

        let msg = BackendMessage::parse(b'E', &payload).unwrap();
        match msg {
            BackendMessage::ErrorResponse(fields) => {
                assert_eq!(fields.severity.as_deref(), Some("FATAL"));
                assert_eq!(fields.code.as_deref(), Some("28000"));
                assert_eq!(fields.message.as_deref(), Some("role does not exist"));
                assert!(fields.is_fatal());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parameter_status() {
        let msg = BackendMessage::parse(b'S', b"DateStyle\0ISO, MDY\0").unwrap();
        match msg {
            BackendMessage::ParameterStatus { name, value } => {
                assert_eq!(name, "DateStyle");
                assert_eq!(value, "ISO, MDY");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn backend_key_data() {
        let mut payload = 1234_i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&5678_i32.to_be_bytes());
        let msg = BackendMessage::parse(b'K', &payload).unwrap();
        assert!(matches!(
            msg,
            BackendMessage::BackendKeyData {
                pid: 1234,
                secret: 5678
            }
        ));
    }

    #[test]
    fn ready_for_query_status() {
        let msg = BackendMessage::parse(b'Z', b"I").unwrap();
        assert!(matches!(
            msg,
            BackendMessage::ReadyForQuery { status: b'I' }
        ));
    }

    #[test]
    fn row_description_layout() {
        let mut payload = 1_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(b"id\0");
        payload.extend_from_slice(&0_i32.to_be_bytes()); // table oid
        payload.extend_from_slice(&0_i16.to_be_bytes()); // column id
        payload.extend_from_slice(&23_i32.to_be_bytes()); // type oid
        payload.extend_from_slice(&4_i16.to_be_bytes()); // type size
        payload.extend_from_slice(&(-1_i32).to_be_bytes()); // type modifier
        payload.extend_from_slice(&0_i16.to_be_bytes()); // format code

        let msg = BackendMessage::parse(b'T', &payload).unwrap();
        match msg {
            BackendMessage::RowDescription(desc) => {
                assert_eq!(desc.len(), 1);
                let field = &desc.fields[0];
                assert_eq!(field.name, "id");
                assert_eq!(field.type_oid, 23);
                assert_eq!(field.type_size, 4);
                assert_eq!(field.type_modifier, -1);
                assert_eq!(field.format, FormatCode::Text);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn data_row_null_is_none_not_empty() {
        let mut payload = 2_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&(-1_i32).to_be_bytes()); // NULL
        payload.extend_from_slice(&0_i32.to_be_bytes()); // empty string
        let msg = BackendMessage::parse(b'D', &payload).unwrap();
        match msg {
            BackendMessage::DataRow(values) => {
                assert_eq!(values.len(), 2);
                assert_eq!(values[0], None);
                assert_eq!(values[1], Some(Vec::new()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn data_row_value_bytes() {
        let mut payload = 1_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&3_i32.to_be_bytes());
        payload.extend_from_slice(b"abc");
        let msg = BackendMessage::parse(b'D', &payload).unwrap();
        match msg {
            BackendMessage::DataRow(values) => {
                assert_eq!(values, vec![Some(b"abc".to_vec())]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn data_row_truncated_is_underflow() {
        let mut payload = 1_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&10_i32.to_be_bytes());
        payload.extend_from_slice(b"abc");
        assert!(matches!(
            BackendMessage::parse(b'D', &payload),
            Err(Error::Underflow { .. })
        ));
    }

    #[test]
    fn command_complete_tag() {
        let msg = BackendMessage::parse(b'C', b"SELECT 5\0").unwrap();
        match msg {
            BackendMessage::CommandComplete { tag } => assert_eq!(tag, "SELECT 5"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
