//! Operation envelope codec
//!
//! Every appliance operation is the same round trip: a `ServiceRequest` carrying the
//! session id, operation name, optional key label and payload, answered by a
//! `ServiceResponse` whose nested `retCode` decides the outcome.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::KsemaError;
use crate::return_code::ReturnCode;
use crate::session::Session;
use crate::transport::{REQUEST_PATH, Transport};
use crate::types::{Operation, ServiceRequest, ServiceResponse};

pub const IV_LEN: usize = 16;

/// Separator between the public and private labels of a key pair.
pub const KEY_PAIR_LABEL_SEPARATOR: char = ';';

pub fn build_request(
    session: &Session,
    operation: Operation,
    label: &str,
    data: Option<Vec<u8>>,
) -> Result<Vec<u8>, KsemaError> {
    let request = ServiceRequest {
        session_id: session.id().to_string(),
        operation,
        label: label.to_string(),
        data,
    };
    Ok(serde_json::to_vec(&request)?)
}

/// Resolve a response body into its `message`, or the failure it describes.
pub fn resolve_response(body: &[u8]) -> Result<String, KsemaError> {
    let response: ServiceResponse = serde_json::from_slice(body)?;

    if !response.success {
        let message = if response.error.is_empty() {
            "request was declined by the server".to_string()
        } else {
            response.error
        };
        return Err(KsemaError::OperationRejected(message));
    }

    let code = ReturnCode::resolve(response.data.ret_code);
    if !code.is_success() {
        return Err(KsemaError::SemanticFailure(code));
    }

    Ok(response.data.message)
}

/// Decode a base64 result. Fails even though the envelope itself succeeded.
pub fn decode_binary(message: &str) -> Result<Vec<u8>, KsemaError> {
    Ok(BASE64.decode(message)?)
}

/// Send one envelope and resolve the reply. Not retried.
pub async fn perform<T: Transport + ?Sized>(
    transport: &T,
    session: &Session,
    operation: Operation,
    label: &str,
    data: Option<Vec<u8>>,
) -> Result<String, KsemaError> {
    let body = build_request(session, operation, label, data)?;
    tracing::debug!(
        "{} request for session {} (label: {:?})",
        operation,
        session.short_id(),
        label
    );

    let response = transport.post(REQUEST_PATH, body).await?;

    resolve_response(&response).inspect_err(|e| {
        tracing::warn!("{} failed: {}", operation, e);
    })
}

/// Like [`perform`], base64-decoding the result.
pub async fn perform_binary<T: Transport + ?Sized>(
    transport: &T,
    session: &Session,
    operation: Operation,
    label: &str,
    data: Option<Vec<u8>>,
) -> Result<Vec<u8>, KsemaError> {
    let message = perform(transport, session, operation, label, data).await?;
    decode_binary(&message)
}

/// `u16 len(data) | data | u16 len(signature) | signature`, big-endian.
pub fn frame_verify_payload(data: &[u8], signature: &[u8]) -> Result<Vec<u8>, KsemaError> {
    let data_len = prefix_len("data", data)?;
    let signature_len = prefix_len("signature", signature)?;

    let mut payload = Vec::with_capacity(4 + data.len() + signature.len());
    payload.extend_from_slice(&data_len.to_be_bytes());
    payload.extend_from_slice(data);
    payload.extend_from_slice(&signature_len.to_be_bytes());
    payload.extend_from_slice(signature);
    Ok(payload)
}

fn prefix_len(field: &'static str, bytes: &[u8]) -> Result<u16, KsemaError> {
    u16::try_from(bytes.len()).map_err(|_| KsemaError::FieldTooLong {
        field,
        len: bytes.len(),
    })
}

/// Random payload: absent for the server default, otherwise the big-endian length.
pub fn random_payload(length: Option<u16>) -> Option<Vec<u8>> {
    length
        .filter(|len| *len > 0)
        .map(|len| len.to_be_bytes().to_vec())
}

/// Pick the key generation shape from the labels supplied.
pub fn gen_key_request(label: &str, private_label: Option<&str>) -> (Operation, String) {
    match private_label.filter(|l| !l.is_empty()) {
        Some(private_label) => (
            Operation::GenKeyAsym,
            format!("{}{}{}", label, KEY_PAIR_LABEL_SEPARATOR, private_label),
        ),
        None => (Operation::GenKeySym, label.to_string()),
    }
}

pub fn validate_iv(iv: &[u8]) -> Result<(), KsemaError> {
    if iv.len() != IV_LEN {
        return Err(KsemaError::InvalidIvLength(iv.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::PrivilegeLevel;

    #[test]
    fn test_build_request_shape() {
        let session = Session::new("sess-1", PrivilegeLevel::new(1));
        let body = build_request(&session, Operation::Sign, "signing-key", Some(vec![1, 2, 3]))
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sessionId": "sess-1",
                "operation": "SIGN",
                "label": "signing-key",
                "data": [1, 2, 3]
            })
        );
    }

    #[test]
    fn test_resolve_success() {
        let body = br#"{"success": true, "data": {"message": "aGVsbG8=", "retCode": 1}, "error": ""}"#;
        assert_eq!(resolve_response(body).unwrap(), "aGVsbG8=");
    }

    #[test]
    fn test_resolve_rejected_with_message() {
        let body = br#"{"success": false, "data": {"message": "", "retCode": 0}, "error": "session expired"}"#;
        let err = resolve_response(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationRejected);
        assert!(matches!(err, KsemaError::OperationRejected(ref msg) if msg == "session expired"));
    }

    #[test]
    fn test_resolve_rejected_without_message() {
        let err = resolve_response(br#"{"success": false}"#).unwrap_err();
        assert!(matches!(err, KsemaError::OperationRejected(ref msg) if !msg.is_empty()));
    }

    #[test]
    fn test_resolve_session_invalid_is_semantic_failure() {
        let body = br#"{"success": true, "data": {"message": "", "retCode": 9}, "error": ""}"#;
        let err = resolve_response(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SemanticFailure);
        assert_eq!(err.return_code(), Some(ReturnCode::SessionInvalid));
    }

    #[test]
    fn test_resolve_unknown_code() {
        let body = br#"{"success": true, "data": {"message": "", "retCode": 99}, "error": ""}"#;
        let err = resolve_response(body).unwrap_err();
        assert_eq!(err.return_code(), Some(ReturnCode::Unknown(99)));
    }

    #[test]
    fn test_resolve_malformed_json() {
        let err = resolve_response(b"not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_decode_binary() {
        assert_eq!(decode_binary("aGVsbG8=").unwrap(), b"hello");
        let err = decode_binary("!!not base64!!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_frame_verify_payload() {
        let payload = frame_verify_payload(b"ab", b"xyz").unwrap();
        assert_eq!(payload, b"\x00\x02ab\x00\x03xyz");
    }

    #[test]
    fn test_frame_verify_payload_empty_fields() {
        assert_eq!(frame_verify_payload(b"", b"").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_frame_verify_payload_too_long() {
        let data = vec![0u8; u16::MAX as usize + 1];
        let err = frame_verify_payload(&data, b"sig").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(matches!(err, KsemaError::FieldTooLong { field: "data", .. }));
    }

    #[test]
    fn test_random_payload() {
        assert_eq!(random_payload(None), None);
        assert_eq!(random_payload(Some(0)), None);
        assert_eq!(random_payload(Some(48)), Some(vec![0, 48]));
        assert_eq!(random_payload(Some(0x0102)), Some(vec![1, 2]));
    }

    #[test]
    fn test_gen_key_request() {
        assert_eq!(
            gen_key_request("aes-key", None),
            (Operation::GenKeySym, "aes-key".to_string())
        );
        assert_eq!(
            gen_key_request("aes-key", Some("")),
            (Operation::GenKeySym, "aes-key".to_string())
        );
        assert_eq!(
            gen_key_request("pub", Some("priv")),
            (Operation::GenKeyAsym, "pub;priv".to_string())
        );
    }

    #[test]
    fn test_validate_iv() {
        assert!(validate_iv(&[0u8; 16]).is_ok());
        assert!(matches!(
            validate_iv(&[0u8; 15]),
            Err(KsemaError::InvalidIvLength(15))
        ));
        assert!(matches!(
            validate_iv(&[0u8; 17]),
            Err(KsemaError::InvalidIvLength(17))
        ));
    }
}
