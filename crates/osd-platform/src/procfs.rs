//! Parsers for `/proc` and sysfs pseudo-files.

use crate::services::MemoryUsage;

/// First integer in `text`, after skipping leading whitespace. Accepts a sign.
pub fn leading_int(text: &str) -> Option<i64> {
    let t = text.trim_start();
    let end = t
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(t.len(), |(i, _)| i);
    t[..end].parse().ok()
}

/// First run of digits anywhere in `text`. `"signal: -52 dBm"` gives 52.
pub fn first_digits(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// First whitespace separated token as a float.
pub fn leading_float(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// Used and total memory from `/proc/meminfo` content, divided by `divider`
/// (kB to MB with 1024). Free memory is `MemFree + Buffers + Cached`.
pub fn parse_meminfo(text: &str, divider: i64) -> Option<MemoryUsage> {
    let mut total = None;
    let mut free = None;
    let mut buffers = None;
    let mut cached = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut total,
            "MemFree" => &mut free,
            "Buffers" => &mut buffers,
            "Cached" => &mut cached,
            _ => continue,
        };
        *slot = leading_int(value);
    }
    let divider = divider.max(1);
    let total = total? / divider;
    if total <= 0 {
        return None;
    }
    let free = (free.unwrap_or(0) + buffers.unwrap_or(0) + cached.unwrap_or(0)) / divider;
    Some(MemoryUsage {
        used: total - free,
        total,
    })
}

/// Busy and total jiffies of the aggregate `cpu` line of `/proc/stat`.
/// Busy is user + nice + system.
pub fn parse_stat(text: &str) -> Option<(u64, u64)> {
    let line = text.lines().find(|l| l.starts_with("cpu "))?;
    let mut fields = line.split_whitespace().skip(1).map(|f| f.parse::<u64>());
    let mut next = || fields.next().and_then(|f| f.ok());
    let (user, nice, system, idle) = (next()?, next()?, next()?, next()?);
    let busy = user + nice + system;
    Some((busy, busy + idle))
}

/// CPU load from successive `/proc/stat` samples, without sleeping between
/// them. The first sample measures the load since boot.
#[derive(Debug, Default)]
pub struct CpuLoadSampler {
    prev: (u64, u64),
    last: Option<i32>,
}

impl CpuLoadSampler {
    pub fn sample(&mut self, stat: &str) -> Option<i32> {
        let (busy, total) = parse_stat(stat)?;
        let d_busy = busy.saturating_sub(self.prev.0);
        let d_total = total.saturating_sub(self.prev.1);
        if d_total == 0 {
            return self.last;
        }
        self.prev = (busy, total);
        let load = (d_busy as f64 / d_total as f64 * 100.0).clamp(0.0, 100.0) as i32;
        self.last = Some(load);
        self.last
    }
}

/// Whole seconds from `/proc/uptime`.
pub fn parse_uptime(text: &str) -> Option<u64> {
    leading_float(text).map(|secs| secs.max(0.0) as u64)
}

/// Value of `vcgencmd get_mem <key>` output such as `malloc_total=14M`.
pub fn parse_vcgencmd_mem(text: &str, key: &str) -> Option<i64> {
    let line = text.lines().find(|l| l.contains(key))?;
    first_digits(line)
}
