/// Render a human-friendly byte count.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < MIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / MIB)
    }
}

/// Compute download progress as a whole percentage, rounded down.
///
/// Returns `None` when the total is unknown or zero, since no meaningful
/// percentage exists then. Overshoot past the advertised total clamps to 100.
#[must_use]
pub fn progress_percent(downloaded: u64, total: Option<u64>) -> Option<u8> {
    match total {
        Some(total) if total > 0 => {
            let pct = (u128::from(downloaded) * 100 / u128::from(total)).min(100);
            Some(pct as u8)
        }
        _ => None,
    }
}
