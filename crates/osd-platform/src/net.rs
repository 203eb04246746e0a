//! Network interfaces and wireless link quality.

use std::ffi::CStr;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::Command;

use crate::procfs::first_digits;
use crate::services::{NetInterface, WifiLink};

/// Interfaces listed on the full OSD at most.
pub const MAX_INTERFACES: usize = 10;

/// Non-loopback interfaces with an IPv4 address, via `getifaddrs`.
pub fn ipv4_interfaces() -> Vec<(String, Ipv4Addr)> {
    let mut found = Vec::new();
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: on success getifaddrs stores a list we release with freeifaddrs.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        log::debug!("getifaddrs: {}", std::io::Error::last_os_error());
        return found;
    }

    let mut cur = head;
    while !cur.is_null() && found.len() < MAX_INTERFACES {
        // SAFETY: `cur` is a node of the list returned above.
        let ifa = unsafe { &*cur };
        cur = ifa.ifa_next;

        if ifa.ifa_addr.is_null() || ifa.ifa_flags & libc::IFF_LOOPBACK as libc::c_uint != 0 {
            continue;
        }
        // SAFETY: non-null address, family read before reinterpreting.
        let family = unsafe { (*ifa.ifa_addr).sa_family };
        if i32::from(family) != libc::AF_INET {
            continue;
        }
        // SAFETY: AF_INET addresses are sockaddr_in.
        let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
        let addr = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
        // SAFETY: ifa_name is a NUL terminated string owned by the list.
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .into_owned();
        found.push((name, addr));
    }

    // SAFETY: `head` came from getifaddrs and is freed once.
    unsafe { libc::freeifaddrs(head) };
    found
}

/// Link speed and signal from `iw dev <if> link` output.
///
/// ```text
/// Connected to 00:11:22:33:44:55 (on wlan0)
///         signal: -52 dBm
///         tx bitrate: 72.2 MBit/s
/// ```
pub fn parse_iw_link(output: &str) -> Option<WifiLink> {
    let mut link = WifiLink::default();
    for line in output.lines() {
        if link.signal == 0 && line.contains("signal") {
            link.signal = first_digits(line).unwrap_or(0) as i32;
        } else if link.speed == 0 && line.contains("bitrate") {
            link.speed = first_digits(line).unwrap_or(0) as i32;
        }
        if link.signal != 0 && link.speed != 0 {
            break;
        }
    }
    (link.signal != 0 || link.speed != 0).then_some(link)
}

/// Query `iw` for one interface. `None` for wired or disconnected interfaces.
pub fn wifi_link(iw: &Path, interface: &str) -> Option<WifiLink> {
    let out = Command::new(iw)
        .args(["dev", interface, "link"])
        .output()
        .map_err(|e| log::debug!("{}: {e}", iw.display()))
        .ok()?;
    parse_iw_link(&String::from_utf8_lossy(&out.stdout))
}

/// Interfaces with link data filled in when `iw` is installed.
pub fn interfaces(iw: &Path) -> Vec<NetInterface> {
    let has_iw = iw.exists();
    ipv4_interfaces()
        .into_iter()
        .map(|(name, addr)| {
            let link = if has_iw { wifi_link(iw, &name) } else { None };
            NetInterface { name, addr, link }
        })
        .collect()
}
