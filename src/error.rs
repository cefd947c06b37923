use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("{0}")]
    Validation(String),
    #[error("{reason}")]
    GateBlocked { code: GateCode, reason: String },
    #[error("{0}")]
    PromptRule(PromptRule),
    #[error("{stage} failed: {message}")]
    Delegate { stage: &'static str, message: String },
    #[error("sqlite: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn delegate(stage: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Delegate {
            stage,
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn gate_code(&self) -> Option<GateCode> {
        match self {
            Self::GateBlocked { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Which sync precondition rejected the request, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCode {
    InvalidDate,
    NotDefault,
    SyncDisabled,
    CredentialMissing,
}

impl GateCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDate => "INVALID_DATE",
            Self::NotDefault => "NOT_DEFAULT",
            Self::SyncDisabled => "SYNC_DISABLED",
            Self::CredentialMissing => "CREDENTIAL_MISSING",
        }
    }

    pub fn stage(self) -> &'static str {
        match self {
            Self::InvalidDate => "validate_diary_date",
            Self::NotDefault => "validate_day_default",
            Self::SyncDisabled => "precheck_cloud_sync",
            Self::CredentialMissing => "precheck_api_key",
        }
    }

    /// What the user is told; each reason names the fix.
    pub fn reason(self) -> &'static str {
        match self {
            Self::InvalidDate => "diary date is required for sync",
            Self::NotDefault => {
                "sync blocked: this diary is not the day default, use 'Set Default' first"
            }
            Self::SyncDisabled => "sync blocked: cloud sync is disabled in Settings",
            Self::CredentialMissing => {
                "sync blocked: API key is not configured. Set it in Settings or run `diary-studio settings --api-key <key>`"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRule {
    NoEnabledTemplate,
    BuiltinProtected,
    LastTemplate,
}

impl PromptRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoEnabledTemplate => "NO_ENABLED_TEMPLATE",
            Self::BuiltinProtected => "BUILTIN_PROTECTED",
            Self::LastTemplate => "LAST_TEMPLATE",
        }
    }
}

impl std::fmt::Display for PromptRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NoEnabledTemplate => "at least one prompt must remain enabled",
            Self::BuiltinProtected => "builtin prompt cannot be deleted",
            Self::LastTemplate => "at least one prompt must exist",
        };
        write!(f, "{} ({})", text, self.as_str())
    }
}

pub type StudioResult<T> = Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocked_displays_reason_only() {
        let err = StudioError::GateBlocked {
            code: GateCode::SyncDisabled,
            reason: "sync blocked: cloud sync is disabled in Settings".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "sync blocked: cloud sync is disabled in Settings"
        );
        assert_eq!(err.gate_code(), Some(GateCode::SyncDisabled));
    }

    #[test]
    fn prompt_rule_message_carries_code() {
        let err = StudioError::PromptRule(PromptRule::NoEnabledTemplate);
        assert!(err.to_string().contains("NO_ENABLED_TEMPLATE"));
    }
}
