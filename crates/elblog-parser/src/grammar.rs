//! The fixed access-log grammar.
//!
//! Follows the load balancer log layout documented at
//! <https://docs.aws.amazon.com/athena/latest/ug/application-load-balancer-logs.html#create-alb-table>.
//! Every field after `redirect_url` is swallowed by the trailing catch-all
//! group so newer log versions keep matching.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Field, ParsedFields};

pub const ALB_LINE_PATTERN: &str = concat!(
    r#"([^ ]*) ([^ ]*) ([^ ]*) ([^ ]*):([0-9]*) ([^ ]*)[:-]([0-9]*) "#,
    r#"([-.0-9]*) ([-.0-9]*) ([-.0-9]*) (|[-0-9]*) (-|[-0-9]*) ([-0-9]*) ([-0-9]*) "#,
    r#""([^ ]*) ([^ ]*) (- |[^ ]*)" "([^"]*)" ([A-Z0-9-]+) ([A-Za-z0-9.-]*) ([^ ]*) "#,
    r#""([^"]*)" "([^"]*)" "([^"]*)" ([-.0-9]*) ([^ ]*) "([^"]*)" ($|"[^ ]*")(.*)"#,
);

static ALB_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(ALB_LINE_PATTERN).expect("access log grammar must compile"));

/// Matches single log lines against [`ALB_LINE_PATTERN`].
///
/// A line that does not match yields `None`; that is the normal outcome for
/// blank, truncated or foreign lines and never an error.
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    grammar: &'static Regex,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            grammar: &ALB_LINE,
        }
    }

    pub fn parse_line(&self, line: &str) -> Option<ParsedFields> {
        let line = line.trim_end_matches(['\r', '\n']);
        let captures = self.grammar.captures(line)?;

        let values = Field::ALL
            .iter()
            .map(|field| {
                captures
                    .get(field.index() + 1)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect();

        Some(ParsedFields::from_values(values))
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.grammar.is_match(line.trim_end_matches(['\r', '\n']))
    }
}
