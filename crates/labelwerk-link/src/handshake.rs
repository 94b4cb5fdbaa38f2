// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identity handshake: probe a live link and decode the printer's reply.
//
// The wire grammar is deliberately plain. The probe is `~HI`; the printer
// answers with one `KEY=VALUE` attribute per line, ended by a blank line or
// the end of the stream. The same grammar is spoken in UDP discovery
// replies, so network scanning and the info command share this parser.
// Failing to parse is a distinct outcome from failing to read: an open
// connection with an unreadable reply means "connected but unreadable",
// not "unreachable".

use tracing::debug;

use labelwerk_core::{DataMap, LabelwerkError, Result};

use crate::transport::Transport;

/// Probe written to a live link to request the identity block.
pub const HANDSHAKE_PROBE: &[u8] = b"~HI\r\n";

/// Cap on handshake reply size.
pub const MAX_REPLY_BYTES: usize = 8192;

/// Decode a handshake reply into the canonical attribute map.
///
/// Keys are uppercased on the way in so lookups use the canonical names.
/// Anything after the first blank line is ignored.
pub fn parse_data_map(reply: &[u8]) -> Result<DataMap> {
    let text = std::str::from_utf8(reply)
        .map_err(|_| LabelwerkError::Decode("handshake reply is not valid UTF-8".into()))?;

    let mut map = DataMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(LabelwerkError::Decode(format!(
                "malformed attribute line: {line:?}"
            )));
        };
        map.insert(key.trim().to_ascii_uppercase(), value.trim().to_string());
    }

    if map.is_empty() {
        return Err(LabelwerkError::Decode(
            "handshake reply carried no attributes".into(),
        ));
    }
    debug!(attributes = map.len(), "handshake decoded");
    Ok(map)
}

/// Probe an open transport and decode its reply.
///
/// Link failures surface as `Connection`, an unreadable reply as `Decode`.
pub fn fetch_data_map(transport: &mut dyn Transport) -> Result<DataMap> {
    let reply = transport.exchange(HANDSHAKE_PROBE, MAX_REPLY_BYTES)?;
    parse_data_map(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFactory;
    use labelwerk_core::data_keys;

    #[test]
    fn parses_attribute_block() {
        let reply = b"PRODUCT_NAME=ZT411\r\nADDRESS=10.1.1.5\r\nDARKNESS=15\r\n\r\n";
        let map = parse_data_map(reply).unwrap();
        assert_eq!(map.get(data_keys::PRODUCT_NAME).unwrap(), "ZT411");
        assert_eq!(map.get(data_keys::ADDRESS).unwrap(), "10.1.1.5");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn keys_are_canonicalized_uppercase() {
        let map = parse_data_map(b"serial_number = XXZKJ191500160\n").unwrap();
        assert_eq!(map.get(data_keys::SERIAL_NUMBER).unwrap(), "XXZKJ191500160");
    }

    #[test]
    fn values_keep_embedded_equals_signs() {
        let map = parse_data_map(b"AVAILABLE_LANGUAGES=ZPL=2,CPCL\n").unwrap();
        assert_eq!(
            map.get(data_keys::AVAILABLE_LANGUAGES).unwrap(),
            "ZPL=2,CPCL"
        );
    }

    #[test]
    fn trailing_lines_after_blank_are_ignored() {
        let map = parse_data_map(b"ADDRESS=10.0.0.2\n\ngarbage without equals\n").unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn empty_reply_is_decode_error() {
        assert!(matches!(
            parse_data_map(b""),
            Err(LabelwerkError::Decode(_))
        ));
        assert!(matches!(
            parse_data_map(b"\r\n\r\n"),
            Err(LabelwerkError::Decode(_))
        ));
    }

    #[test]
    fn malformed_line_is_decode_error() {
        let err = parse_data_map(b"this is not an attribute\n").unwrap_err();
        assert!(matches!(err, LabelwerkError::Decode(_)));
    }

    #[test]
    fn non_utf8_reply_is_decode_error() {
        assert!(matches!(
            parse_data_map(&[0xFF, 0xFE, 0x00]),
            Err(LabelwerkError::Decode(_))
        ));
    }

    #[test]
    fn fetch_decodes_scripted_reply() {
        use crate::transport::TransportFactory;
        let factory =
            FakeFactory::healthy().with_exchange_reply(b"PRODUCT_NAME=ZQ630\r\n\r\n".to_vec());
        let mut link = factory
            .create(&labelwerk_core::ConnectionTarget::tcp("10.0.0.5", None))
            .unwrap();
        link.open().unwrap();
        let map = fetch_data_map(link.as_mut()).unwrap();
        assert_eq!(map.get(data_keys::PRODUCT_NAME).unwrap(), "ZQ630");
    }

    #[test]
    fn fetch_passes_link_failures_through() {
        use crate::transport::TransportFactory;
        let factory = FakeFactory::healthy().with_exchange_error("link dropped");
        let mut link = factory
            .create(&labelwerk_core::ConnectionTarget::tcp("10.0.0.5", None))
            .unwrap();
        link.open().unwrap();
        let err = fetch_data_map(link.as_mut()).unwrap_err();
        assert!(matches!(err, LabelwerkError::Connection(_)));
    }
}
