// =============================================================================
// vt-greeter — Authenticator
//
// Drives the PAM transaction via raw FFI against libpam. The five-step
// entry sequence (start, authenticate, acct_mgmt, setcred, open_session)
// short-circuits on the first failure and unwinds everything already done;
// the three-step exit sequence (close_session, setcred(DELETE), end) runs
// once the launched session's child has exited.
// =============================================================================

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use crate::error::GreeterError;

/// PAM constants, mirrored from `<security/pam_appl.h>`. Kept in their own
/// module so `GreeterError::from_pam_code` can match on them without a
/// second source of truth.
pub mod pam_const {
    use std::os::raw::c_int;

    pub const PAM_SUCCESS: c_int = 0;
    pub const PAM_PROMPT_ECHO_OFF: c_int = 1;
    pub const PAM_PROMPT_ECHO_ON: c_int = 2;
    pub const PAM_ERROR_MSG: c_int = 3;
    pub const PAM_TEXT_INFO: c_int = 4;
    pub const PAM_BUF_ERR: c_int = 5;
    pub const PAM_ABORT: c_int = 26;
    pub const PAM_AUTH_ERR: c_int = 7;
    pub const PAM_CRED_INSUFFICIENT: c_int = 8;
    pub const PAM_AUTHINFO_UNAVAIL: c_int = 9;
    pub const PAM_USER_UNKNOWN: c_int = 10;
    pub const PAM_MAXTRIES: c_int = 11;
    pub const PAM_NEW_AUTHTOK_REQD: c_int = 12;
    pub const PAM_ACCT_EXPIRED: c_int = 13;
    pub const PAM_SESSION_ERR: c_int = 14;
    pub const PAM_CRED_UNAVAIL: c_int = 15;
    pub const PAM_CRED_EXPIRED: c_int = 16;
    pub const PAM_CRED_ERR: c_int = 17;
    pub const PAM_PERM_DENIED: c_int = 6;
    pub const PAM_SYSTEM_ERR: c_int = 4;

    pub const PAM_ESTABLISH_CRED: c_int = 0x2;
    pub const PAM_DELETE_CRED: c_int = 0x4;
}

use pam_const::*;

#[repr(C)]
struct PamConv {
    conv: extern "C" fn(
        num_msg: c_int,
        msg: *mut *const PamMessage,
        resp: *mut *mut PamResponse,
        appdata_ptr: *mut c_void,
    ) -> c_int,
    appdata_ptr: *mut c_void,
}

#[repr(C)]
struct PamMessage {
    msg_style: c_int,
    msg: *const c_char,
}

#[repr(C)]
struct PamResponse {
    resp: *mut c_char,
    resp_retcode: c_int,
}

#[link(name = "pam")]
extern "C" {
    fn pam_start(
        service_name: *const c_char,
        user: *const c_char,
        pam_conversation: *const PamConv,
        pamh: *mut *mut c_void,
    ) -> c_int;
    fn pam_end(pamh: *mut c_void, pam_status: c_int) -> c_int;
    fn pam_authenticate(pamh: *mut c_void, flags: c_int) -> c_int;
    fn pam_acct_mgmt(pamh: *mut c_void, flags: c_int) -> c_int;
    fn pam_setcred(pamh: *mut c_void, flags: c_int) -> c_int;
    fn pam_open_session(pamh: *mut c_void, flags: c_int) -> c_int;
    fn pam_close_session(pamh: *mut c_void, flags: c_int) -> c_int;
    fn pam_getenvlist(pamh: *mut c_void) -> *mut *mut c_char;
}

/// Credentials handed to the conversation callback through its opaque
/// `appdata_ptr`. Not retained beyond the call that receives it.
struct ConvData {
    login: CString,
    password: CString,
}

extern "C" fn conversation(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata_ptr: *mut c_void,
) -> c_int {
    unsafe {
        let responses =
            libc::calloc(num_msg as usize, std::mem::size_of::<PamResponse>()) as *mut PamResponse;
        if responses.is_null() {
            return PAM_BUF_ERR;
        }

        let creds = &*(appdata_ptr as *const ConvData);
        let messages = *msg;
        let mut failed = false;

        for i in 0..num_msg as isize {
            let message = &*messages.offset(i);
            match message.msg_style {
                PAM_PROMPT_ECHO_ON => {
                    (*responses.offset(i)).resp = libc::strdup(creds.login.as_ptr());
                    (*responses.offset(i)).resp_retcode = 0;
                }
                PAM_PROMPT_ECHO_OFF => {
                    (*responses.offset(i)).resp = libc::strdup(creds.password.as_ptr());
                    (*responses.offset(i)).resp_retcode = 0;
                }
                PAM_ERROR_MSG => {
                    failed = true;
                    break;
                }
                _ => {
                    (*responses.offset(i)).resp = ptr::null_mut();
                    (*responses.offset(i)).resp_retcode = 0;
                }
            }
        }

        if failed {
            for j in 0..num_msg as isize {
                let r = (*responses.offset(j)).resp;
                if !r.is_null() {
                    libc::free(r as *mut c_void);
                }
                (*responses.offset(j)).resp = ptr::null_mut();
            }
            libc::free(responses as *mut c_void);
            *resp = ptr::null_mut();
            return PAM_BUF_ERR;
        }

        *resp = responses;
        PAM_SUCCESS
    }
}

/// An open PAM transaction. Holds the raw handle until [`AuthHandle::close`]
/// runs the step A/B/C unwind described in the module doc comment — there
/// is deliberately no `Drop` impl, since the unwind must happen after the
/// session child has been reaped, not whenever the value happens to go out
/// of scope.
pub struct AuthHandle {
    pamh: *mut c_void,
}

// The handle is only ever touched from the single-threaded main loop.
unsafe impl Send for AuthHandle {}

impl AuthHandle {
    /// Returns the PAM environment list contributed by modules in the
    /// open session (e.g. `pam_env`), as `name=value` strings.
    pub fn environment(&self) -> Vec<String> {
        let mut out = Vec::new();
        unsafe {
            let list = pam_getenvlist(self.pamh);
            if list.is_null() {
                return out;
            }
            let mut i = 0;
            loop {
                let entry = *list.offset(i);
                if entry.is_null() {
                    break;
                }
                out.push(CStr::from_ptr(entry).to_string_lossy().into_owned());
                libc::free(entry as *mut c_void);
                i += 1;
            }
            libc::free(list as *mut c_void);
        }
        out
    }

    /// Runs the post-session unwind: `pam_close_session`, then
    /// `pam_setcred(DELETE_CRED)`, then `pam_end`. Diagnostics from a
    /// failing step are still recorded, but every remaining step still
    /// runs — PAM resources must not leak even on a dirty unwind.
    pub fn close(self) -> Result<(), GreeterError> {
        let mut first_err = None;

        let ret = unsafe { pam_close_session(self.pamh, 0) };
        if ret != PAM_SUCCESS {
            first_err.get_or_insert(GreeterError::from_pam_code(ret));
        }

        let ret = unsafe { pam_setcred(self.pamh, PAM_DELETE_CRED) };
        if ret != PAM_SUCCESS {
            first_err.get_or_insert(GreeterError::from_pam_code(ret));
        }

        unsafe { pam_end(self.pamh, PAM_SUCCESS) };

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Zero out the bytes of a String in memory to prevent password leakage.
///
/// Uses `write_volatile` to prevent the compiler from optimizing away the
/// zeroing of a buffer it can see is about to be dropped.
pub fn zeroize_string(s: &mut String) {
    unsafe {
        let bytes = s.as_mut_vec();
        for byte in bytes.iter_mut() {
            std::ptr::write_volatile(byte, 0);
        }
    }
    s.clear();
}

/// Runs the five-step PAM entry sequence. On success, ownership of the
/// handle passes to the caller (ultimately the Session Launcher); on
/// failure, every step already taken is unwound (`pam_end`) before
/// returning.
pub fn authenticate(service_name: &str, login: &str, password: &str) -> Result<AuthHandle, GreeterError> {
    let service = CString::new(service_name).map_err(|_| GreeterError::PamBuf)?;
    let conv_data = Box::into_raw(Box::new(ConvData {
        login: CString::new(login).map_err(|_| GreeterError::PamBuf)?,
        password: CString::new(password).map_err(|_| GreeterError::PamBuf)?,
    }));

    let conv = PamConv {
        conv: conversation,
        appdata_ptr: conv_data as *mut c_void,
    };

    let mut pamh: *mut c_void = ptr::null_mut();

    let result = unsafe {
        // Step 1.
        let ret = pam_start(service.as_ptr(), ptr::null(), &conv, &mut pamh);
        if ret != PAM_SUCCESS {
            let _ = Box::from_raw(conv_data);
            return Err(GreeterError::from_pam_code(ret));
        }

        // Step 2.
        let ret = pam_authenticate(pamh, 0);
        if ret != PAM_SUCCESS {
            pam_end(pamh, ret);
            let _ = Box::from_raw(conv_data);
            return Err(GreeterError::from_pam_code(ret));
        }

        // Step 3.
        let ret = pam_acct_mgmt(pamh, 0);
        if ret != PAM_SUCCESS {
            pam_end(pamh, ret);
            let _ = Box::from_raw(conv_data);
            return Err(GreeterError::from_pam_code(ret));
        }

        // Step 4.
        let ret = pam_setcred(pamh, PAM_ESTABLISH_CRED);
        if ret != PAM_SUCCESS {
            pam_end(pamh, ret);
            let _ = Box::from_raw(conv_data);
            return Err(GreeterError::from_pam_code(ret));
        }

        // Step 5.
        let ret = pam_open_session(pamh, 0);
        if ret != PAM_SUCCESS {
            pam_end(pamh, ret);
            let _ = Box::from_raw(conv_data);
            return Err(GreeterError::from_pam_code(ret));
        }

        Ok(AuthHandle { pamh })
    };

    // PAM no longer needs the conversation callback after open_session.
    unsafe {
        let _ = Box::from_raw(conv_data);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pam_code_maps_to_abort() {
        assert_eq!(GreeterError::from_pam_code(9999), GreeterError::PamAbort);
    }

    #[test]
    fn known_pam_codes_map_to_distinct_variants() {
        assert_eq!(GreeterError::from_pam_code(PAM_AUTH_ERR), GreeterError::PamAuth);
        assert_eq!(
            GreeterError::from_pam_code(PAM_USER_UNKNOWN),
            GreeterError::PamUserUnknown
        );
        assert_eq!(
            GreeterError::from_pam_code(PAM_ACCT_EXPIRED),
            GreeterError::PamAcctExpired
        );
    }
}
