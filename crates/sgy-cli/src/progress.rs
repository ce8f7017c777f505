// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Single-line terminal progress bar.

use std::io::Write;

use sgy_core::Progress;

/// Number of cells in the bar.
pub const BAR_WIDTH: usize = 50;
const LABEL_WIDTH: usize = 28;

/// Renders `label: [####....] NN%` for `current` of `total`, or `None` when
/// there is nothing to measure.
pub fn render(label: &str, current: u64, total: u64, width: usize) -> Option<String> {
    if total == 0 {
        return None;
    }
    let fraction = (current.min(total) as f64) / (total as f64);
    let filled = (fraction * width as f64) as usize;
    let bar: String = (0..width).map(|i| if i < filled { '#' } else { '.' }).collect();
    Some(format!(
        "{label:<LABEL_WIDTH$}: [{bar}] {}%",
        (fraction * 100.0) as u32
    ))
}

/// Redraws a progress bar in place on stderr; finishes the line when
/// `current` reaches `total`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrProgress;

impl Progress for StderrProgress {
    fn report(&self, label: &str, current: u64, total: u64) {
        let Some(line) = render(label, current, total, BAR_WIDTH) else {
            return;
        };
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r{line}");
        if current >= total {
            let _ = writeln!(err);
        }
        let _ = err.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fill_and_percent() {
        let line = render("Stacking", 1, 4, 8).unwrap();
        assert!(line.starts_with("Stacking"));
        assert!(line.ends_with(": [##......] 25%"));
        assert_eq!(render("x", 9, 9, 4).unwrap().rsplit(' ').next(), Some("100%"));
    }

    #[test]
    fn zero_total_renders_nothing() {
        assert!(render("idle", 0, 0, BAR_WIDTH).is_none());
    }
}
