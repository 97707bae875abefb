//! User-agent enrichment: browser, device and OS attributes derived from the
//! raw user-agent header.

use std::borrow::Cow;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uaparser::{Parser, UserAgentParser};

use crate::error::{PipelineError, Result};

/// The seven enrichment positions, in the order they follow the parsed log
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAgentField {
    BrowserFamily,
    BrowserMajor,
    DeviceBrand,
    DeviceFamily,
    DeviceModel,
    OsFamily,
    OsMajor,
}

impl UserAgentField {
    pub const ALL: [UserAgentField; 7] = [
        UserAgentField::BrowserFamily,
        UserAgentField::BrowserMajor,
        UserAgentField::DeviceBrand,
        UserAgentField::DeviceFamily,
        UserAgentField::DeviceModel,
        UserAgentField::OsFamily,
        UserAgentField::OsMajor,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserAgentInfo {
    pub browser_family: String,
    pub browser_major: String,
    pub device_brand: String,
    pub device_family: String,
    pub device_model: String,
    pub os_family: String,
    pub os_major: String,
}

impl UserAgentInfo {
    pub fn get(&self, field: UserAgentField) -> &str {
        match field {
            UserAgentField::BrowserFamily => &self.browser_family,
            UserAgentField::BrowserMajor => &self.browser_major,
            UserAgentField::DeviceBrand => &self.device_brand,
            UserAgentField::DeviceFamily => &self.device_family,
            UserAgentField::DeviceModel => &self.device_model,
            UserAgentField::OsFamily => &self.os_family,
            UserAgentField::OsMajor => &self.os_major,
        }
    }
}

#[derive(Debug, Error)]
#[error("user agent parse failed: {0}")]
pub struct UserAgentError(pub String);

pub trait UserAgentParse: Send + Sync {
    fn parse(&self, user_agent: &str) -> std::result::Result<UserAgentInfo, UserAgentError>;
}

/// [`UserAgentParse`] over the uap-core regex rules.
pub struct UaParserBackend {
    parser: UserAgentParser,
}

impl UaParserBackend {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let location = path.to_str().ok_or_else(|| {
            PipelineError::UserAgentRules(format!("non UTF-8 path {}", path.display()))
        })?;
        let parser = UserAgentParser::from_yaml(location)
            .map_err(|err| PipelineError::UserAgentRules(format!("{}: {err:?}", path.display())))?;
        Ok(Self { parser })
    }

    pub fn from_bytes(rules: &[u8]) -> Result<Self> {
        let parser = UserAgentParser::from_bytes(rules)
            .map_err(|err| PipelineError::UserAgentRules(format!("{err:?}")))?;
        Ok(Self { parser })
    }
}

fn owned(value: Option<Cow<'_, str>>) -> String {
    value.map(Cow::into_owned).unwrap_or_default()
}

impl UserAgentParse for UaParserBackend {
    fn parse(&self, user_agent: &str) -> std::result::Result<UserAgentInfo, UserAgentError> {
        let client = self.parser.parse(user_agent);
        Ok(UserAgentInfo {
            browser_family: client.user_agent.family.into_owned(),
            browser_major: owned(client.user_agent.major),
            device_brand: owned(client.device.brand),
            device_family: client.device.family.into_owned(),
            device_model: owned(client.device.model),
            os_family: client.os.family.into_owned(),
            os_major: owned(client.os.major),
        })
    }
}

/// Wraps a [`UserAgentParse`] so that enrichment never fails: an empty header
/// or a parser error yields all-empty fields.
pub struct UserAgentEnricher {
    parser: Box<dyn UserAgentParse>,
}

impl UserAgentEnricher {
    pub fn new(parser: Box<dyn UserAgentParse>) -> Self {
        Self { parser }
    }

    pub fn enrich(&self, user_agent: &str) -> UserAgentInfo {
        let user_agent = user_agent.trim();
        if user_agent.is_empty() {
            return UserAgentInfo::default();
        }

        match self.parser.parse(user_agent) {
            Ok(info) => info,
            Err(err) => {
                warn!(user_agent, error = %err, "user agent enrichment failed");
                UserAgentInfo::default()
            }
        }
    }
}
