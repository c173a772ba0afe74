//! QuickFIX-style session settings file: `[DEFAULT]` key/values inherited
//! by each `[SESSION]` block.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub sender_comp_id: String,
    pub target_comp_id: String,
    pub host: String,
    pub port: u16,
    pub heart_bt_int: u64,
    pub reconnect_interval: u64,
    /// Distinguishes sessions sharing comp ids; the order-entry session
    /// carries `TRADE`, the market-data session nothing.
    pub qualifier: Option<String>,
}

impl SessionConfig {
    pub fn is_trade_session(&self) -> bool {
        self.qualifier.as_deref() == Some(crate::domain::constants::TRADE_SESSION_QUALIFIER)
    }
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub sessions: Vec<SessionConfig>,
}

impl SessionSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading session settings {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut defaults: HashMap<String, String> = HashMap::new();
        let mut sections: Vec<HashMap<String, String>> = Vec::new();
        let mut in_session = false;
        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.eq_ignore_ascii_case("[DEFAULT]") {
                in_session = false;
                continue;
            }
            if line.eq_ignore_ascii_case("[SESSION]") {
                in_session = true;
                sections.push(HashMap::new());
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("settings line {}: expected key=value", line_no + 1))?;
            let target = if in_session {
                sections
                    .last_mut()
                    .ok_or_else(|| anyhow!("settings line {}: key before any section", line_no + 1))?
            } else {
                &mut defaults
            };
            target.insert(key.trim().to_string(), value.trim().to_string());
        }
        if sections.is_empty() {
            return Err(anyhow!("no [SESSION] blocks in settings"));
        }
        let sessions = sections
            .into_iter()
            .map(|section| build_session(&defaults, section))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sessions })
    }
}

fn build_session(
    defaults: &HashMap<String, String>,
    section: HashMap<String, String>,
) -> Result<SessionConfig> {
    let lookup = |key: &str| -> Option<&String> { section.get(key).or_else(|| defaults.get(key)) };
    let required =
        |key: &str| -> Result<String> { lookup(key).cloned().ok_or_else(|| anyhow!("missing {key}")) };
    let begin_string = required("BeginString")?;
    if begin_string != super::codec::BEGIN_STRING {
        return Err(anyhow!("unsupported BeginString {begin_string}"));
    }
    Ok(SessionConfig {
        sender_comp_id: required("SenderCompID")?,
        target_comp_id: required("TargetCompID")?,
        host: required("SocketConnectHost")?,
        port: required("SocketConnectPort")?
            .parse()
            .context("SocketConnectPort")?,
        heart_bt_int: lookup("HeartBtInt")
            .map(|v| v.parse())
            .transpose()
            .context("HeartBtInt")?
            .unwrap_or(30),
        reconnect_interval: lookup("ReconnectInterval")
            .map(|v| v.parse())
            .transpose()
            .context("ReconnectInterval")?
            .unwrap_or(5),
        qualifier: lookup("SessionQualifier").cloned(),
    })
}
