/// Reports how much memory is left, as a fraction of the total.
pub trait MemoryProbe: Send + Sync {
    /// Free memory divided by the maximum, in `0.0..=1.0`.
    fn free_ratio(&self) -> f64;
}

/// Queries the operating system. On platforms without a supported query it
/// never reports pressure.
///
/// On Linux the reading is `MemAvailable / MemTotal` from `/proc/meminfo`,
/// which counts reclaimable page cache as free. Kernels without
/// `MemAvailable` fall back to `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemoryProbe;

#[cfg(target_os = "linux")]
const MEMINFO: &str = "/proc/meminfo";

#[cfg(target_os = "linux")]
impl MemoryProbe for SystemMemoryProbe {
    fn free_ratio(&self) -> f64 {
        std::fs::read_to_string(MEMINFO)
            .ok()
            .and_then(|text| meminfo_ratio(&text))
            .unwrap_or_else(sysinfo_ratio)
    }
}

#[cfg(not(target_os = "linux"))]
impl MemoryProbe for SystemMemoryProbe {
    fn free_ratio(&self) -> f64 {
        1.0
    }
}

/// `MemAvailable / MemTotal`, or `None` if either line is missing.
#[cfg(target_os = "linux")]
fn meminfo_ratio(text: &str) -> Option<f64> {
    let field = |name: &str| -> Option<f64> {
        text.lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb as f64)
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable")?;
    if total == 0.0 {
        return None;
    }
    Some((available / total).clamp(0.0, 1.0))
}

#[cfg(target_os = "linux")]
fn sysinfo_ratio() -> f64 {
    let mut info: libc::sysinfo = unsafe { std::mem::zeroed() };
    if unsafe { libc::sysinfo(&mut info) } != 0 || info.totalram == 0 {
        return 1.0;
    }
    let free = info.freeram as f64 + info.bufferram as f64;
    (free / info.totalram as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_ratio_in_range() {
        let ratio = SystemMemoryProbe.free_ratio();
        assert!((0.0..=1.0).contains(&ratio));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_meminfo_counts_available_memory() {
        let text = "MemTotal:       16000000 kB\n\
                    MemFree:         1000000 kB\n\
                    MemAvailable:   12000000 kB\n\
                    Buffers:          200000 kB\n\
                    Cached:         10000000 kB\n";
        assert_eq!(meminfo_ratio(text), Some(0.75));
        assert_eq!(meminfo_ratio("MemTotal: 100 kB\nMemFree: 10 kB\n"), None);
        assert_eq!(meminfo_ratio("MemTotal: 0 kB\nMemAvailable: 0 kB\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_ratio_follows_mem_available() {
        let Some(expected) = std::fs::read_to_string(MEMINFO)
            .ok()
            .and_then(|text| meminfo_ratio(&text))
        else {
            return;
        };
        let ratio = SystemMemoryProbe.free_ratio();
        assert!(
            (ratio - expected).abs() < 0.05,
            "reading {} vs MemAvailable {}",
            ratio,
            expected
        );
    }
}
