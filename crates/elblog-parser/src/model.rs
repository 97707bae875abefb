use std::fmt;

use serde::{Deserialize, Serialize};

/// Positional fields of an application load balancer access log entry, in the
/// order the grammar captures them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Type,
    Timestamp,
    Alb,
    ClientIp,
    ClientPort,
    BackendIp,
    BackendPort,
    RequestProcessingTime,
    BackendProcessingTime,
    ResponseProcessingTime,
    AlbStatusCode,
    BackendStatusCode,
    ReceivedBytes,
    SentBytes,
    RequestVerb,
    RequestUrl,
    RequestProto,
    UserAgent,
    SslCipher,
    SslProtocol,
    TargetGroupArn,
    TraceId,
    DomainName,
    ChosenCertArn,
    MatchedRulePriority,
    RequestCreationTime,
    ActionsExecuted,
    RedirectUrl,
    Trailing,
}

impl Field {
    pub const COUNT: usize = 29;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Type,
        Field::Timestamp,
        Field::Alb,
        Field::ClientIp,
        Field::ClientPort,
        Field::BackendIp,
        Field::BackendPort,
        Field::RequestProcessingTime,
        Field::BackendProcessingTime,
        Field::ResponseProcessingTime,
        Field::AlbStatusCode,
        Field::BackendStatusCode,
        Field::ReceivedBytes,
        Field::SentBytes,
        Field::RequestVerb,
        Field::RequestUrl,
        Field::RequestProto,
        Field::UserAgent,
        Field::SslCipher,
        Field::SslProtocol,
        Field::TargetGroupArn,
        Field::TraceId,
        Field::DomainName,
        Field::ChosenCertArn,
        Field::MatchedRulePriority,
        Field::RequestCreationTime,
        Field::ActionsExecuted,
        Field::RedirectUrl,
        Field::Trailing,
    ];

    /// Zero-based position of the field within a matched line.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Type => "type",
            Field::Timestamp => "timestamp",
            Field::Alb => "alb",
            Field::ClientIp => "client_ip",
            Field::ClientPort => "client_port",
            Field::BackendIp => "backend_ip",
            Field::BackendPort => "backend_port",
            Field::RequestProcessingTime => "request_processing_time",
            Field::BackendProcessingTime => "backend_processing_time",
            Field::ResponseProcessingTime => "response_processing_time",
            Field::AlbStatusCode => "alb_status_code",
            Field::BackendStatusCode => "backend_status_code",
            Field::ReceivedBytes => "received_bytes",
            Field::SentBytes => "sent_bytes",
            Field::RequestVerb => "request_verb",
            Field::RequestUrl => "request_url",
            Field::RequestProto => "request_proto",
            Field::UserAgent => "user_agent",
            Field::SslCipher => "ssl_cipher",
            Field::SslProtocol => "ssl_protocol",
            Field::TargetGroupArn => "target_group_arn",
            Field::TraceId => "trace_id",
            Field::DomainName => "domain_name",
            Field::ChosenCertArn => "chosen_cert_arn",
            Field::MatchedRulePriority => "matched_rule_priority",
            Field::RequestCreationTime => "request_creation_time",
            Field::ActionsExecuted => "actions_executed",
            Field::RedirectUrl => "redirect_url",
            Field::Trailing => "trailing",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&str> for Field {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown log field '{trimmed}'"))
    }
}

/// The raw strings captured from one matching log line. Every [`Field`] is
/// present; groups that did not participate in the match are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFields {
    values: Vec<String>,
}

impl ParsedFields {
    pub(crate) fn from_values(values: Vec<String>) -> Self {
        debug_assert_eq!(values.len(), Field::COUNT);
        Self { values }
    }

    pub fn get(&self, field: Field) -> &str {
        self.values
            .get(field.index())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        Field::ALL
            .iter()
            .copied()
            .map(move |field| (field, self.get(field)))
    }
}
