//! Small lookup tables used by semantic inference.

pub static ERRNO_NAMES: &[&str] = &[
    "E2BIG", "EACCES", "EADDRINUSE", "EADDRNOTAVAIL", "EAFNOSUPPORT", "EAGAIN", "EALREADY",
    "EBADF", "EBADMSG", "EBUSY", "ECANCELED", "ECHILD", "ECONNABORTED", "ECONNREFUSED",
    "ECONNRESET", "EDEADLK", "EDESTADDRREQ", "EDOM", "EDQUOT", "EEXIST", "EFAULT", "EFBIG",
    "EHOSTUNREACH", "EIDRM", "EILSEQ", "EINPROGRESS", "EINTR", "EINVAL", "EIO", "EISCONN",
    "EISDIR", "ELOOP", "EMFILE", "EMLINK", "EMSGSIZE", "ENAMETOOLONG", "ENETDOWN",
    "ENETUNREACH", "ENFILE", "ENOBUFS", "ENODEV", "ENOENT", "ENOEXEC", "ENOLCK", "ENOMEM",
    "ENOMSG", "ENOSPC", "ENOSYS", "ENOTCONN", "ENOTDIR", "ENOTEMPTY", "ENOTSOCK", "ENOTSUP",
    "ENOTTY", "ENXIO", "EOPNOTSUPP", "EOVERFLOW", "EPERM", "EPIPE", "EPROTO", "ERANGE",
    "EROFS", "ESPIPE", "ESRCH", "ESTALE", "ETIMEDOUT", "ETXTBSY", "EWOULDBLOCK", "EXDEV",
];

pub static ENVIRONMENT_VARIABLES: &[&str] = &[
    "COLUMNS", "DISPLAY", "EDITOR", "HOME", "HOSTNAME", "IFS", "LANG", "LANGUAGE", "LC_ALL",
    "LC_COLLATE", "LC_CTYPE", "LC_MESSAGES", "LC_NUMERIC", "LC_TIME", "LD_LIBRARY_PATH",
    "LD_PRELOAD", "LINES", "LOGNAME", "MAIL", "MANPATH", "PAGER", "PATH", "POSIXLY_CORRECT",
    "PWD", "SHELL", "TERM", "TERMINFO", "TMPDIR", "TZ", "USER", "VISUAL", "XDG_CONFIG_HOME",
];

/// mdoc `.St` standard abbreviations.
pub static STANDARDS: &[(&str, &str)] = &[
    ("-ansiC", "ANSI X3.159-1989 (\u{201c}ANSI C89\u{201d})"),
    ("-ansiC-89", "ANSI X3.159-1989 (\u{201c}ANSI C89\u{201d})"),
    ("-isoC", "ISO/IEC 9899:1990 (\u{201c}ISO C90\u{201d})"),
    ("-isoC-99", "ISO/IEC 9899:1999 (\u{201c}ISO C99\u{201d})"),
    ("-isoC-2011", "ISO/IEC 9899:2011 (\u{201c}ISO C11\u{201d})"),
    ("-p1003.1", "IEEE Std 1003.1 (\u{201c}POSIX.1\u{201d})"),
    ("-p1003.1-88", "IEEE Std 1003.1-1988 (\u{201c}POSIX.1\u{201d})"),
    ("-p1003.1-90", "IEEE Std 1003.1-1990 (\u{201c}POSIX.1\u{201d})"),
    ("-p1003.1-96", "ISO/IEC 9945-1:1996 (\u{201c}POSIX.1\u{201d})"),
    ("-p1003.1-2001", "IEEE Std 1003.1-2001 (\u{201c}POSIX.1\u{201d})"),
    ("-p1003.1-2008", "IEEE Std 1003.1-2008 (\u{201c}POSIX.1\u{201d})"),
    ("-p1003.2", "IEEE Std 1003.2 (\u{201c}POSIX.2\u{201d})"),
    ("-p1003.2-92", "IEEE Std 1003.2-1992 (\u{201c}POSIX.2\u{201d})"),
    ("-susv2", "Version 2 of the Single UNIX Specification (\u{201c}SUSv2\u{201d})"),
    ("-susv3", "Version 3 of the Single UNIX Specification (\u{201c}SUSv3\u{201d})"),
    ("-svid4", "System V Interface Definition, Fourth Edition (\u{201c}SVID4\u{201d})"),
    ("-xpg4", "X/Open Portability Guide Issue 4 (\u{201c}XPG4\u{201d})"),
    ("-ieee754", "IEEE Std 754-1985"),
];

/// mdoc operating-system name macros.
pub static SYSTEMS: &[(&str, &str)] = &[
    ("Bx", "BSD"),
    ("Bsx", "BSD/OS"),
    ("Dx", "DragonFly"),
    ("Fx", "FreeBSD"),
    ("Nx", "NetBSD"),
    ("Ox", "OpenBSD"),
    ("Ux", "UNIX"),
    ("At", "AT&T UNIX"),
];

pub fn is_errno(token: &str) -> bool {
    ERRNO_NAMES.binary_search(&token).is_ok()
}

pub fn is_environment_variable(token: &str) -> bool {
    ENVIRONMENT_VARIABLES.binary_search(&token).is_ok()
}

pub fn standard(abbrev: &str) -> Option<&'static str> {
    STANDARDS.iter().find(|(k, _)| *k == abbrev).map(|(_, v)| *v)
}

pub fn system(mac: &str) -> Option<&'static str> {
    SYSTEMS.iter().find(|(k, _)| *k == mac).map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_sorted_for_binary_search() {
        assert!(ERRNO_NAMES.windows(2).all(|w| w[0] < w[1]));
        assert!(ENVIRONMENT_VARIABLES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_lookups() {
        assert!(is_errno("ENOENT"));
        assert!(!is_errno("ENOPE"));
        assert!(is_environment_variable("HOME"));
        assert_eq!(system("Fx"), Some("FreeBSD"));
        assert!(standard("-p1003.1").is_some_and(|s| s.contains("POSIX.1")));
    }
}
