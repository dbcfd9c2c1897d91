//! Echo service semantics, independent of any transport.

use std::fmt;

use callbridge_core::MethodType;

use crate::proto;

/// The four echo methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoMethod {
    /// One request, echoed once.
    Unary,
    /// One request, one response per whitespace-separated word.
    ServerStreaming,
    /// Many requests, one response joining them with spaces.
    ClientStreaming,
    /// Each request echoed as it arrives.
    BidirectionalStreaming,
}

impl EchoMethod {
    /// Resolve a method path. The leading `/` is optional.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.strip_prefix('/').unwrap_or(path);
        [
            EchoMethod::Unary,
            EchoMethod::ServerStreaming,
            EchoMethod::ClientStreaming,
            EchoMethod::BidirectionalStreaming,
        ]
        .into_iter()
        .find(|m| m.path().strip_prefix('/') == Some(path))
    }

    pub fn path(&self) -> &'static str {
        match self {
            EchoMethod::Unary => proto::UNARY_ECHO,
            EchoMethod::ServerStreaming => proto::SERVER_STREAMING_ECHO,
            EchoMethod::ClientStreaming => proto::CLIENT_STREAMING_ECHO,
            EchoMethod::BidirectionalStreaming => proto::BIDIRECTIONAL_STREAMING_ECHO,
        }
    }

    pub fn method_type(&self) -> MethodType {
        match self {
            EchoMethod::Unary => MethodType::Unary,
            EchoMethod::ServerStreaming => MethodType::ServerStreaming,
            EchoMethod::ClientStreaming => MethodType::ClientStreaming,
            EchoMethod::BidirectionalStreaming => MethodType::BidiStreaming,
        }
    }

    /// Responses to one request as it arrives. Only bidi answers early.
    pub fn on_request(&self, request: &str) -> Vec<String> {
        match self {
            EchoMethod::BidirectionalStreaming => vec![request.to_string()],
            _ => Vec::new(),
        }
    }

    /// Responses once the request side is finished, given every request
    /// received. `None` when the requests don't fit the method.
    pub fn on_finish(&self, requests: &[String]) -> Option<Vec<String>> {
        match self {
            EchoMethod::Unary => match requests {
                [only] => Some(vec![only.clone()]),
                _ => None,
            },
            EchoMethod::ServerStreaming => match requests {
                [only] => Some(only.split_whitespace().map(str::to_string).collect()),
                _ => None,
            },
            EchoMethod::ClientStreaming => Some(vec![requests.join(" ")]),
            EchoMethod::BidirectionalStreaming => Some(Vec::new()),
        }
    }
}

impl fmt::Display for EchoMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
