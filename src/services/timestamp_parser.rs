//! Timestamp response parsing with structural validation.
//!
//! ```text
//! TimeStampResp ::= SEQUENCE {
//!     status          PKIStatusInfo,
//!     timeStampToken  TimeStampToken OPTIONAL }
//! PKIStatusInfo ::= SEQUENCE { status PKIStatus, ... }
//! ```

use crate::domain::constants::{
    ASN1_INTEGER_TAG, ASN1_SEQUENCE_TAG, PKI_STATUS_GRANTED, PKI_STATUS_GRANTED_WITH_MODS,
};
use crate::infra::error::{SigningError, SigningResult};

/// One DER element: tag, content, and the full encoding.
struct Tlv<'a> {
    tag: u8,
    content: &'a [u8],
    encoded: &'a [u8],
}

fn read_tlv(data: &[u8]) -> SigningResult<(Tlv<'_>, &[u8])> {
    let malformed = |what: &str| SigningError::TimestampError(format!("Malformed DER: {what}"));

    let (&tag, rest) = data.split_first().ok_or_else(|| malformed("missing tag"))?;
    let (&first, rest) = rest.split_first().ok_or_else(|| malformed("missing length"))?;

    let (len, rest) = if first & 0x80 == 0 {
        (first as usize, rest)
    } else {
        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 || rest.len() < count {
            return Err(malformed("unsupported length encoding"));
        }
        let len = rest[..count]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[count..])
    };

    if rest.len() < len {
        return Err(malformed("truncated element"));
    }
    let header_len = data.len() - rest.len();
    Ok((
        Tlv {
            tag,
            content: &rest[..len],
            encoded: &data[..header_len + len],
        },
        &rest[len..],
    ))
}

/// Parse a `TimeStampResp` and return the token when the authority granted it.
///
/// The token must contain `expected_imprint`, the digest that was sent.
pub fn parse_timestamp_response(
    response: &[u8],
    expected_imprint: &[u8],
) -> SigningResult<Vec<u8>> {
    let (outer, _) = read_tlv(response)?;
    if outer.tag != ASN1_SEQUENCE_TAG {
        return Err(SigningError::TimestampError(
            "Timestamp response is not a SEQUENCE".to_string(),
        ));
    }

    let (status_info, after_status) = read_tlv(outer.content)?;
    if status_info.tag != ASN1_SEQUENCE_TAG {
        return Err(SigningError::TimestampError(
            "Timestamp response has no PKIStatusInfo".to_string(),
        ));
    }
    let (status, _) = read_tlv(status_info.content)?;
    if status.tag != ASN1_INTEGER_TAG || status.content.len() != 1 {
        return Err(SigningError::TimestampError(
            "Timestamp response status is not a small INTEGER".to_string(),
        ));
    }

    let code = status.content[0];
    if code != PKI_STATUS_GRANTED && code != PKI_STATUS_GRANTED_WITH_MODS {
        return Err(SigningError::TimestampError(format!(
            "Timestamp authority rejected the request (PKIStatus {code})"
        )));
    }

    if after_status.is_empty() {
        return Err(SigningError::TimestampError(
            "Timestamp response granted but carries no token".to_string(),
        ));
    }
    let (token, _) = read_tlv(after_status)?;

    if !token
        .encoded
        .windows(expected_imprint.len())
        .any(|w| w == expected_imprint)
    {
        return Err(SigningError::TimestampError(
            "Timestamp token message imprint does not match the signature".to_string(),
        ));
    }

    Ok(token.encoded.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u8, token: Option<&[u8]>) -> Vec<u8> {
        let mut body = vec![0x30, 0x03, 0x02, 0x01, status];
        if let Some(token) = token {
            body.extend_from_slice(token);
        }
        let mut out = vec![0x30, body.len() as u8];
        out.extend(body);
        out
    }

    #[test]
    fn granted_response_yields_token() {
        let imprint = [0xAB; 32];
        let mut token = vec![0x30, 34, 0x04, 32];
        token.extend_from_slice(&imprint);

        let parsed = parse_timestamp_response(&response(0, Some(&token)), &imprint).unwrap();
        assert_eq!(parsed, token);

        let parsed = parse_timestamp_response(&response(1, Some(&token)), &imprint).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn rejection_status_is_an_error() {
        let err = parse_timestamp_response(&response(2, None), &[1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("PKIStatus 2"));
    }

    #[test]
    fn imprint_mismatch_is_an_error() {
        let token = [0x30, 0x03, 0x04, 0x01, 0x00];
        let err = parse_timestamp_response(&response(0, Some(&token)), &[0xFF; 32]).unwrap_err();
        assert!(err.to_string().contains("imprint"));
    }

    #[test]
    fn long_form_lengths_are_supported() {
        let imprint = [0x11; 20];
        let mut content = vec![0x04, 20];
        content.extend_from_slice(&imprint);
        content.extend(std::iter::repeat_n(0u8, 200));
        let mut token = vec![0x30, 0x81, content.len() as u8];
        token.extend(content);

        let mut body = vec![0x30, 0x03, 0x02, 0x01, 0x00];
        body.extend_from_slice(&token);
        let mut resp = vec![0x30, 0x81, body.len() as u8];
        resp.extend(body);

        assert_eq!(parse_timestamp_response(&resp, &imprint).unwrap(), token);
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(parse_timestamp_response(&[0x30], &[1]).is_err());
        assert!(parse_timestamp_response(&[0x30, 0x10, 0x30], &[1]).is_err());
    }
}
