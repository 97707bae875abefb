//! Turns matched log lines into stored rows.

use elblog_parser::{
    parse_timestamp, timestamp_to_id, to_int, to_str, Field, LineParser, ParsedFields, ParserError,
};
use elblog_repository::{Column, ColumnValue, LogRecord};

use crate::error::{PipelineError, Result};
use crate::geo::GeoResolver;
use crate::user_agent::{UserAgentEnricher, UserAgentField};

/// Where a column's raw input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Log(Field),
    UserAgent(UserAgentField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Microseconds since the epoch; fails on an unparseable instant.
    TimestampId,
    Timestamp,
    Int,
    Str,
    Country,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRule {
    pub column: Column,
    pub source: FieldSource,
    pub converter: Converter,
}

const fn rule(column: Column, source: FieldSource, converter: Converter) -> ColumnRule {
    ColumnRule {
        column,
        source,
        converter,
    }
}

/// One rule per stored column, in stored order.
pub const COLUMN_RULES: [ColumnRule; 17] = [
    rule(Column::Id, FieldSource::Log(Field::Timestamp), Converter::TimestampId),
    rule(Column::Timestamp, FieldSource::Log(Field::Timestamp), Converter::Timestamp),
    rule(Column::ClientIp, FieldSource::Log(Field::ClientIp), Converter::Str),
    rule(Column::BackendIp, FieldSource::Log(Field::BackendIp), Converter::Str),
    rule(Column::Status, FieldSource::Log(Field::AlbStatusCode), Converter::Int),
    rule(Column::BackendStatus, FieldSource::Log(Field::BackendStatusCode), Converter::Int),
    rule(Column::RequestUrl, FieldSource::Log(Field::RequestUrl), Converter::Str),
    rule(Column::RedirectUrl, FieldSource::Log(Field::RedirectUrl), Converter::Str),
    rule(Column::UserAgent, FieldSource::Log(Field::UserAgent), Converter::Str),
    rule(Column::CountryCode, FieldSource::Log(Field::ClientIp), Converter::Country),
    rule(Column::BrowserFamily, FieldSource::UserAgent(UserAgentField::BrowserFamily), Converter::Str),
    rule(Column::BrowserMajor, FieldSource::UserAgent(UserAgentField::BrowserMajor), Converter::Str),
    rule(Column::DeviceBrand, FieldSource::UserAgent(UserAgentField::DeviceBrand), Converter::Str),
    rule(Column::DeviceFamily, FieldSource::UserAgent(UserAgentField::DeviceFamily), Converter::Str),
    rule(Column::DeviceModel, FieldSource::UserAgent(UserAgentField::DeviceModel), Converter::Str),
    rule(Column::OsFamily, FieldSource::UserAgent(UserAgentField::OsFamily), Converter::Str),
    rule(Column::OsMajor, FieldSource::UserAgent(UserAgentField::OsMajor), Converter::Str),
];

/// Result of feeding one line through the parser and builder.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Record(Box<LogRecord>),
    /// The line does not follow the access-log grammar.
    NoMatch,
    /// The line matched but a field could not be converted.
    Invalid(ParserError),
}

pub struct RecordBuilder {
    parser: LineParser,
    geo: GeoResolver,
    user_agents: UserAgentEnricher,
}

impl RecordBuilder {
    pub fn new(geo: GeoResolver, user_agents: UserAgentEnricher) -> Self {
        Self {
            parser: LineParser::new(),
            geo,
            user_agents,
        }
    }

    pub fn geo(&self) -> &GeoResolver {
        &self.geo
    }

    pub fn parse_line(&mut self, line: &str) -> Result<LineOutcome> {
        let Some(fields) = self.parser.parse_line(line) else {
            return Ok(LineOutcome::NoMatch);
        };

        match self.build(&fields) {
            Ok(record) => Ok(LineOutcome::Record(Box::new(record))),
            Err(PipelineError::Parser(err)) => Ok(LineOutcome::Invalid(err)),
            Err(err) => Err(err),
        }
    }

    /// Applies [`COLUMN_RULES`] to a matched line. Only the id and timestamp
    /// conversions can fail.
    pub fn build(&mut self, fields: &ParsedFields) -> Result<LogRecord> {
        let user_agent = self.user_agents.enrich(&to_str(Some(fields.get(Field::UserAgent))));

        let mut record = LogRecord::default();
        for rule in &COLUMN_RULES {
            let raw = match rule.source {
                FieldSource::Log(field) => fields.get(field),
                FieldSource::UserAgent(field) => user_agent.get(field),
            };
            let value = self.convert(rule.converter, raw)?;
            record.set(rule.column, value)?;
        }
        Ok(record)
    }

    fn convert(
        &mut self,
        converter: Converter,
        raw: &str,
    ) -> std::result::Result<ColumnValue, ParserError> {
        let value = match converter {
            Converter::TimestampId => ColumnValue::Integer(timestamp_to_id(raw)?),
            Converter::Timestamp => ColumnValue::DateTime(parse_timestamp(raw)?),
            Converter::Int => ColumnValue::Integer(to_int(Some(raw))),
            Converter::Str => ColumnValue::Text(to_str(Some(raw))),
            Converter::Country => ColumnValue::Text(self.geo.resolve(&to_str(Some(raw)))),
        };
        Ok(value)
    }
}
