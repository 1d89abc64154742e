// =============================================================================
// vt-greeter — utmp bookkeeping
//
// Records a `USER_PROCESS` entry when a session child is forked and
// rewrites it as `DEAD_PROCESS` once that child has been reaped. Field
// derivation (`ut_line`/`ut_id` from `ttyname(stdin)`) assumes the greeter
// is run on a real tty, matching the original system's assumption — see
// the Open Question in SPEC_FULL.md §9 on pty/redirected-stdin behavior.
// =============================================================================

use std::ffi::CString;
use std::os::unix::io::RawFd;

const UT_LINESIZE: usize = 32;
const UT_NAMESIZE: usize = 32;
const UT_HOSTSIZE: usize = 256;
const USER_PROCESS: libc::c_short = 7;
const DEAD_PROCESS: libc::c_short = 8;

#[repr(C)]
struct ExitStatus {
    e_termination: libc::c_short,
    e_exit: libc::c_short,
}

#[repr(C)]
struct Timeval {
    tv_sec: i32,
    tv_usec: i32,
}

/// Layout matching glibc's `struct utmp` on Linux (`<utmp.h>`).
#[repr(C)]
struct RawUtmp {
    ut_type: libc::c_short,
    ut_pid: libc::pid_t,
    ut_line: [libc::c_char; UT_LINESIZE],
    ut_id: [libc::c_char; 4],
    ut_user: [libc::c_char; UT_NAMESIZE],
    ut_host: [libc::c_char; UT_HOSTSIZE],
    ut_exit: ExitStatus,
    ut_session: i32,
    ut_tv: Timeval,
    ut_addr_v6: [i32; 4],
    __unused: [libc::c_char; 20],
}

extern "C" {
    fn ttyname(fd: libc::c_int) -> *const libc::c_char;
    fn setutent();
    fn pututline(ut: *const RawUtmp) -> *mut RawUtmp;
    fn endutent();
}

/// An active utmp record for one session child. Created with
/// [`UtmpEntry::insert`] at fork time, converted to a `DEAD_PROCESS` record
/// by [`UtmpEntry::remove`] once the child has been reaped.
pub struct UtmpEntry {
    raw: RawUtmp,
}

impl UtmpEntry {
    /// Writes a `USER_PROCESS` entry for `child_pid` logged in as `login`.
    /// If `ttyname(stdin)` can't be resolved (e.g. stdin isn't a tty), the
    /// line/id fields are left zeroed rather than guessed at — the session
    /// still proceeds either way.
    pub fn insert(login: &str, child_pid: libc::pid_t) -> Self {
        let mut raw: RawUtmp = unsafe { std::mem::zeroed() };
        raw.ut_type = USER_PROCESS;
        raw.ut_pid = child_pid;

        if let Some(tty_path) = current_ttyname() {
            if let Some(line) = tty_path.strip_prefix("/dev/") {
                copy_into(&mut raw.ut_line, line);
            }
            if let Some(id) = tty_path.strip_prefix("/dev/tty") {
                copy_into_short(&mut raw.ut_id, id);
            }
        }

        raw.ut_tv.tv_sec = now_secs();
        copy_into(&mut raw.ut_user, login);

        unsafe {
            setutent();
            pututline(&raw);
            endutent();
        }

        Self { raw }
    }

    /// Rewrites this entry as `DEAD_PROCESS`, clearing the line/time/user
    /// fields, matching the original teardown behavior.
    pub fn remove(mut self) {
        self.raw.ut_type = DEAD_PROCESS;
        self.raw.ut_line = [0; UT_LINESIZE];
        self.raw.ut_tv.tv_sec = 0;
        self.raw.ut_user = [0; UT_NAMESIZE];

        unsafe {
            setutent();
            pututline(&self.raw);
            endutent();
        }
    }
}

fn current_ttyname() -> Option<String> {
    const STDIN_FD: RawFd = 0;
    unsafe {
        let ptr = ttyname(STDIN_FD);
        if ptr.is_null() {
            return None;
        }
        std::ffi::CStr::from_ptr(ptr).to_str().ok().map(str::to_string)
    }
}

fn copy_into(dst: &mut [libc::c_char], src: &str) {
    let bytes = src.as_bytes();
    let cstr = CString::new(bytes.to_vec()).unwrap_or_default();
    let cbytes = cstr.as_bytes_with_nul();
    let n = cbytes.len().min(dst.len());
    for i in 0..n {
        dst[i] = cbytes[i] as libc::c_char;
    }
}

fn copy_into_short(dst: &mut [libc::c_char; 4], src: &str) {
    let bytes = src.as_bytes();
    let n = bytes.len().min(4);
    for i in 0..n {
        dst[i] = bytes[i] as libc::c_char;
    }
}

fn now_secs() -> i32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_into_truncates_to_field_width() {
        let mut buf = [0 as libc::c_char; 4];
        copy_into_short(&mut buf, "tty1extra");
        assert_eq!(&buf, &[b't' as libc::c_char, b't' as libc::c_char, b'y' as libc::c_char, b'1' as libc::c_char]);
    }
}
