//! Classification of gRPC outcomes into metric label values.

use std::error::Error;

use http::HeaderMap;
use tonic::{Code, Status};

const GRPC_STATUS_HEADER: &str = "grpc-status";

/// Canonical upper-case name of a gRPC status code.
#[allow(unreachable_patterns)]
pub fn code_label(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
        _ => "UNKNOWN",
    }
}

/// Reads the `grpc-status` header of a trailers-only response.
///
/// Returns `None` when the header is absent. A value that is not a known
/// numeric code classifies as [`Code::Unknown`].
pub fn code_from_headers(headers: &HeaderMap) -> Option<Code> {
    let value = headers.get(GRPC_STATUS_HEADER)?;
    let code = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i32>().ok())
        .map(Code::from_i32)
        .unwrap_or(Code::Unknown);
    Some(code)
}

/// Finds the first [`Status`] in an error's source chain.
///
/// Anything else classifies as [`Code::Unknown`].
pub fn classify_error(err: &(dyn Error + 'static)) -> Code {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(status) = e.downcast_ref::<Status>() {
            return status.code();
        }
        current = e.source();
    }
    Code::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped(Status);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapped: {}", self.0)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn labels_use_canonical_names() {
        assert_eq!(code_label(Code::Ok), "OK");
        assert_eq!(code_label(Code::Cancelled), "CANCELLED");
        assert_eq!(code_label(Code::InvalidArgument), "INVALID_ARGUMENT");
        assert_eq!(code_label(Code::DeadlineExceeded), "DEADLINE_EXCEEDED");
        assert_eq!(code_label(Code::ResourceExhausted), "RESOURCE_EXHAUSTED");
        assert_eq!(code_label(Code::Unauthenticated), "UNAUTHENTICATED");
    }

    #[test]
    fn header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(code_from_headers(&headers), None);

        headers.insert(GRPC_STATUS_HEADER, HeaderValue::from_static("5"));
        assert_eq!(code_from_headers(&headers), Some(Code::NotFound));

        headers.insert(GRPC_STATUS_HEADER, HeaderValue::from_static("0"));
        assert_eq!(code_from_headers(&headers), Some(Code::Ok));

        headers.insert(GRPC_STATUS_HEADER, HeaderValue::from_static("not-a-code"));
        assert_eq!(code_from_headers(&headers), Some(Code::Unknown));

        headers.insert(GRPC_STATUS_HEADER, HeaderValue::from_static("99"));
        assert_eq!(code_from_headers(&headers), Some(Code::Unknown));
    }

    #[test]
    fn classifies_status_in_source_chain() {
        let direct = Status::permission_denied("nope");
        assert_eq!(classify_error(&direct), Code::PermissionDenied);

        let wrapped = Wrapped(Status::deadline_exceeded("slow"));
        assert_eq!(classify_error(&wrapped), Code::DeadlineExceeded);
    }

    #[test]
    fn unrecognised_errors_are_unknown() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "broken pipe");
        assert_eq!(classify_error(&io), Code::Unknown);
    }
}
