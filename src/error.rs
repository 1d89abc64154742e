// =============================================================================
// vt-greeter — Error Taxonomy
//
// Every failure mode the supervisor can hit maps to one variant here. Each
// variant carries enough context for a `tracing` event, and separately
// resolves to a locale-table key for the info line shown on the form (see
// `Locale::phrase_for`). PAM return codes fold into the fifteen `Pam*`
// variants from the PAM diagnosis table.
// =============================================================================

use thiserror::Error;

/// Recoverable and fatal failure kinds produced by the supervisor.
///
/// Non-fatal variants leave the login form usable; the caller is expected to
/// push `Display`-formatted text (looked up against the active `Locale`)
/// into the diagnostic slot via [`record`] and keep looping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GreeterError {
    #[error("out of memory allocating credential buffer")]
    AllocErr,
    #[error("gethostname failed")]
    HostnameErr,
    #[error("could not open console device")]
    ConsoleDev,
    #[error("failed to lock password buffer in memory")]
    MlockErr,
    #[error("could not access session directory")]
    XSessionsDir,
    #[error("could not open session directory")]
    XSessionsOpen,

    #[error("account expired")]
    PamAcctExpired,
    #[error("authentication failed")]
    PamAuth,
    #[error("authentication info unavailable")]
    PamAuthInfoUnavail,
    #[error("PAM conversation buffer error")]
    PamBuf,
    #[error("PAM credential error")]
    PamCredErr,
    #[error("credentials expired")]
    PamCredExpired,
    #[error("insufficient credentials")]
    PamCredInsufficient,
    #[error("credentials unavailable")]
    PamCredUnavail,
    #[error("too many authentication attempts")]
    PamMaxTries,
    #[error("new authentication token required")]
    PamNewAuthTokReqd,
    #[error("permission denied")]
    PamPermDenied,
    #[error("PAM session error")]
    PamSessionErr,
    #[error("PAM system error")]
    PamSysErr,
    #[error("unknown user")]
    PamUserUnknown,
    #[error("authentication aborted")]
    PamAbort,

    #[error("no passwd entry for user")]
    PwnamErr,
    #[error("failed to set PATH for session")]
    PathErr,
    #[error("failed to chdir into home directory")]
    ChdirErr,
    #[error("failed to initialize supplementary groups")]
    UserInit,
    #[error("failed to drop to user's group")]
    UserGid,
    #[error("failed to drop to user's uid")]
    UserUid,
}

impl GreeterError {
    /// Maps a raw PAM return code to its taxonomy variant. Unrecognized
    /// codes default to `PamAbort`, matching the original diagnosis switch.
    pub fn from_pam_code(code: i32) -> Self {
        use crate::auth::pam_const::*;
        match code {
            PAM_ACCT_EXPIRED => Self::PamAcctExpired,
            PAM_AUTH_ERR => Self::PamAuth,
            PAM_AUTHINFO_UNAVAIL => Self::PamAuthInfoUnavail,
            PAM_BUF_ERR => Self::PamBuf,
            PAM_CRED_ERR => Self::PamCredErr,
            PAM_CRED_EXPIRED => Self::PamCredExpired,
            PAM_CRED_INSUFFICIENT => Self::PamCredInsufficient,
            PAM_CRED_UNAVAIL => Self::PamCredUnavail,
            PAM_MAXTRIES => Self::PamMaxTries,
            PAM_NEW_AUTHTOK_REQD => Self::PamNewAuthTokReqd,
            PAM_PERM_DENIED => Self::PamPermDenied,
            PAM_SESSION_ERR => Self::PamSessionErr,
            PAM_SYSTEM_ERR => Self::PamSysErr,
            PAM_USER_UNKNOWN => Self::PamUserUnknown,
            _ => Self::PamAbort,
        }
    }

    /// The key this error resolves to in the locale phrase table.
    pub fn locale_key(&self) -> &'static str {
        match self {
            Self::AllocErr => "err_alloc",
            Self::HostnameErr => "err_hostname",
            Self::ConsoleDev => "err_console_dev",
            Self::MlockErr => "err_mlock",
            Self::XSessionsDir => "err_xsessions_dir",
            Self::XSessionsOpen => "err_xsessions_open",
            Self::PamAcctExpired => "err_pam_acct_expired",
            Self::PamAuth => "err_pam_auth",
            Self::PamAuthInfoUnavail => "err_pam_authinfo_unavail",
            Self::PamBuf => "err_pam_buf",
            Self::PamCredErr => "err_pam_cred_err",
            Self::PamCredExpired => "err_pam_cred_expired",
            Self::PamCredInsufficient => "err_pam_cred_insufficient",
            Self::PamCredUnavail => "err_pam_cred_unavail",
            Self::PamMaxTries => "err_pam_maxtries",
            Self::PamNewAuthTokReqd => "err_pam_authok_reqd",
            Self::PamPermDenied => "err_pam_perm_denied",
            Self::PamSessionErr => "err_pam_session",
            Self::PamSysErr => "err_pam_sys",
            Self::PamUserUnknown => "err_pam_user_unknown",
            Self::PamAbort => "err_pam_abort",
            Self::PwnamErr => "err_pwnam",
            Self::PathErr => "err_path",
            Self::ChdirErr => "err_chdir",
            Self::UserInit => "err_user_init",
            Self::UserGid => "err_user_gid",
            Self::UserUid => "err_user_uid",
        }
    }
}

/// Single diagnostic slot: the most recent non-fatal error, if any.
///
/// The original system keeps this as a pointer into the global `lang` table;
/// here it is an owned, already-localized `String` so the UI layer never
/// has to reach back into `Locale` itself.
pub struct Diagnostics {
    last: Option<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "non-fatal error recorded");
        self.last = Some(message);
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    pub fn current(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
