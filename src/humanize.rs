const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Render a byte count for log lines and limit messages, e.g. "4 GiB".
pub fn human_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return String::from("0 B");
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let value = format!("{size:.1}");
    let value = value.trim_end_matches(".0");
    format!("{value} {}", UNITS[unit])
}
