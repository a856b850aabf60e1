//! Pre-write security check for agent file edits.
//!
//! Inspects a proposed write: the target path is matched against a deny
//! list (block), and the new text against secret-like patterns (warn).

use crate::error::{EvalError, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// Exit code that tells the calling tool to abort the write.
pub const EXIT_BLOCK: i32 = 2;

const BLOCKED_PATHS: &[&str] = &[
    r"\.env\.production$",
    r"\.env\.local$",
    r"/secrets/",
    r"credentials\.json$",
    r"\.pem$",
    r"\.key$",
    r"id_rsa",
    r"\.aws/credentials",
];

const SENSITIVE_PATTERNS: &[(&str, &str)] = &[
    (
        r#"["']?password["']?\s*[:=]\s*["'][^"']+["']"#,
        "Hardcoded password detected",
    ),
    (
        r#"["']?api[_-]?key["']?\s*[:=]\s*["'][^"']+["']"#,
        "Hardcoded API key detected",
    ),
    (
        r#"["']?secret["']?\s*[:=]\s*["'][^"']+["']"#,
        "Hardcoded secret detected",
    ),
    (
        r"-----BEGIN (?:RSA |EC )?PRIVATE KEY-----",
        "Private key detected",
    ),
    (r"sk-[a-zA-Z0-9]{20,}", "OpenAI API key pattern detected"),
    (r"ghp_[a-zA-Z0-9]{36}", "GitHub token pattern detected"),
    (r"xox[baprs]-[a-zA-Z0-9-]+", "Slack token pattern detected"),
];

/// Payload the calling tool writes to stdin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub tool_input: ToolInput,
}

/// The proposed write. `content` is set for full writes, `new_string` for
/// edits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub new_string: Option<String>,
}

impl ToolInput {
    /// Text to scan: `content` when non-empty, else `new_string`.
    pub fn text(&self) -> &str {
        match self.content.as_deref() {
            Some(content) if !content.is_empty() => content,
            _ => self.new_string.as_deref().unwrap_or_default(),
        }
    }
}

impl HookInput {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EvalError::Serialization(e.to_string()))
    }
}

/// Outcome of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Allowed, with one message per matched pattern.
    Warn(Vec<String>),
    Block { path: String },
}

impl Decision {
    pub fn exit_code(&self) -> i32 {
        match self {
            Decision::Block { .. } => EXIT_BLOCK,
            _ => 0,
        }
    }

    /// Lines to print on stderr.
    pub fn report_lines(&self) -> Vec<String> {
        match self {
            Decision::Allow => Vec::new(),
            Decision::Block { path } => {
                vec![format!("BLOCKED: Cannot write to sensitive file: {}", path)]
            }
            Decision::Warn(messages) => {
                let mut lines = Vec::with_capacity(messages.len() + 2);
                lines.push("Security warnings:".to_string());
                lines.extend(messages.iter().map(|m| format!("  - {}", m)));
                lines.push("Consider using environment variables instead.".to_string());
                lines
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SensitivePattern {
    regex: Regex,
    message: &'static str,
}

/// Compiled path and content rules.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    blocked_paths: Vec<Regex>,
    sensitive: Vec<SensitivePattern>,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| EvalError::Config(format!("invalid security pattern {:?}: {}", pattern, e)))
}

impl SecurityPolicy {
    pub fn new() -> Result<Self> {
        let blocked_paths = BLOCKED_PATHS
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>>>()?;
        let sensitive = SENSITIVE_PATTERNS
            .iter()
            .map(|&(p, message)| {
                Ok(SensitivePattern {
                    regex: compile(p)?,
                    message,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            blocked_paths,
            sensitive,
        })
    }

    pub fn is_blocked_path(&self, path: &str) -> bool {
        self.blocked_paths.iter().any(|re| re.is_match(path))
    }

    /// Messages for every sensitive pattern found in `text`, in rule order.
    pub fn scan(&self, text: &str) -> Vec<String> {
        self.sensitive
            .iter()
            .filter(|p| p.regex.is_match(text))
            .map(|p| p.message.to_string())
            .collect()
    }

    pub fn check(&self, input: &ToolInput) -> Decision {
        let path = input.file_path.as_deref().unwrap_or_default();
        if self.is_blocked_path(path) {
            return Decision::Block {
                path: path.to_string(),
            };
        }

        let warnings = self.scan(input.text());
        if warnings.is_empty() {
            Decision::Allow
        } else {
            Decision::Warn(warnings)
        }
    }

    /// Check a raw stdin payload. Unparseable input is allowed.
    pub fn check_json(&self, json: &str) -> Decision {
        match HookInput::from_json(json) {
            Ok(input) => self.check(&input.tool_input),
            Err(_) => Decision::Allow,
        }
    }
}
