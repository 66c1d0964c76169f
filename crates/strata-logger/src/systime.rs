use std::time::{SystemTime, UNIX_EPOCH};

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Returns the current local time in the format YYYY-MM-DD HH:MM:SS TZ
#[cfg(target_family = "unix")]
pub fn now() -> String {
    use std::ffi::CStr;

    let secs = unix_seconds() as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    let mut buf = [0 as libc::c_char; 100];

    unsafe {
        if libc::localtime_r(&secs, &mut tm).is_null() {
            return format!("@{}", secs);
        }
        let len = libc::strftime(
            buf.as_mut_ptr(),
            buf.len(),
            c"%Y-%m-%d %H:%M:%S %Z".as_ptr(),
            &tm,
        );
        if len == 0 {
            return format!("@{}", secs);
        }
        CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
    }
}

/// Returns the current local time in the format YYYY-MM-DD HH:MM:SS TZ
#[cfg(target_family = "windows")]
pub fn now() -> String {
    use windows_sys::Win32::Foundation::SYSTEMTIME;
    use windows_sys::Win32::System::SystemInformation::GetLocalTime;

    let mut tm: SYSTEMTIME = unsafe { std::mem::zeroed() };
    unsafe {
        GetLocalTime(&mut tm);
    }
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} {}",
        tm.wYear,
        tm.wMonth,
        tm.wDay,
        tm.wHour,
        tm.wMinute,
        tm.wSecond,
        timezone_name()
    )
}

#[cfg(target_family = "windows")]
fn timezone_name() -> String {
    use windows_sys::Win32::System::Time::{GetTimeZoneInformation, TIME_ZONE_INFORMATION};

    let mut tz: TIME_ZONE_INFORMATION = unsafe { std::mem::zeroed() };
    unsafe {
        GetTimeZoneInformation(&mut tz);
    }
    let len = tz
        .StandardName
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(tz.StandardName.len());
    String::from_utf16_lossy(&tz.StandardName[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_starts_with_date() {
        let now = now();
        let date = now.split(' ').next().unwrap_or_default();
        let parts: Vec<_> = date.split('-').collect();
        assert_eq!(parts.len(), 3, "unexpected timestamp {now}");
        assert_eq!(parts[0].len(), 4);
        assert!(parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())));
    }
}
