//! Serial device discovery.

use serialport::available_ports;

use crate::domain::error::TermLinkResult;

/// Enumerate serial device paths known to the platform, optionally
/// filtered by a name fragment.
pub fn serial_devices(filter: Option<&str>) -> TermLinkResult<Vec<String>> {
    let mut devices: Vec<String> = available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .filter(|name| filter.map_or(true, |fragment| name.contains(fragment)))
        .collect();
    devices.sort();
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_is_applied() {
        let devices = serial_devices(Some("termlink-no-such-device")).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_unfiltered_enumeration_is_sorted() {
        let devices = serial_devices(None).unwrap();
        let mut sorted = devices.clone();
        sorted.sort();
        assert_eq!(devices, sorted);
    }
}
