// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for DNS error types.

#[cfg(test)]
mod tests {
    use crate::dns_errors::*;

    #[test]
    fn test_protocol_error_message() {
        let error = WinDnsError::Protocol {
            code: 5,
            name: "REFUSED".to_string(),
        };

        assert_eq!(error.to_string(), "DNS error: REFUSED (5)");
    }

    #[test]
    fn test_record_format_error_message() {
        let error = WinDnsError::record_format("bad. 300 A nope", "invalid IPv4 address");

        assert_eq!(
            error.to_string(),
            "Invalid resource record 'bad. 300 A nope': invalid IPv4 address"
        );
    }

    #[test]
    fn test_timeout_error_message() {
        let error = WinDnsError::Timeout {
            server: "10.0.0.1:53".to_string(),
            timeout_ms: 1500,
        };

        assert_eq!(error.to_string(), "Exchange with 10.0.0.1:53 timed out after 1500ms");
    }

    #[test]
    fn test_transient_errors() {
        assert!(WinDnsError::network("10.0.0.1:53", "connection refused").is_transient());
        assert!(WinDnsError::Timeout {
            server: "10.0.0.1:53".to_string(),
            timeout_ms: 10,
        }
        .is_transient());
        assert!(WinDnsError::Protocol {
            code: 2,
            name: "SERVFAIL".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!WinDnsError::NoContext.is_transient());
        assert!(!WinDnsError::configuration("missing username").is_transient());
        assert!(!WinDnsError::authentication("dns", "clock skew").is_transient());
        assert!(!WinDnsError::Protocol {
            code: 5,
            name: "REFUSED".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(WinDnsError::NoContext.reason(), "NoContextError");
        assert_eq!(
            WinDnsError::EmptyResponse {
                server: "dns".to_string()
            }
            .reason(),
            "EmptyResponseError"
        );
        assert_eq!(
            WinDnsError::record_format("x", "y").reason(),
            "RecordFormatError"
        );
    }

    #[test]
    fn test_rcode_names() {
        assert_eq!(rcode_name(0), "NOERROR");
        assert_eq!(rcode_name(3), "NXDOMAIN");
        assert_eq!(rcode_name(9), "NOTAUTH");
        assert_eq!(rcode_name(16), "BADSIG");
        assert_eq!(rcode_name(17), "BADKEY");
        assert_eq!(rcode_name(18), "BADTIME");
        assert_eq!(rcode_name(4095), "UNKNOWN");
    }

    #[test]
    fn test_servfail_from_response_code_is_transient() {
        let code = u16::from(hickory_proto::op::ResponseCode::ServFail);
        let error = WinDnsError::Protocol {
            code,
            name: rcode_name(code),
        };

        assert!(error.is_transient());
        assert_eq!(error.to_string(), "DNS error: SERVFAIL (2)");
        assert!(!WinDnsError::Protocol {
            code: 9,
            name: rcode_name(9),
        }
        .is_transient());
    }
}
