use std::collections::HashMap;

use owo_colors::AnsiColors;

const ROTATION: [AnsiColors; 8] = [
    AnsiColors::Cyan,
    AnsiColors::Magenta,
    AnsiColors::Yellow,
    AnsiColors::Green,
    AnsiColors::Blue,
    AnsiColors::Red,
    AnsiColors::BrightCyan,
    AnsiColors::BrightMagenta,
];

/// Assigns each distinct package name the next color in a fixed rotation,
/// on first sight. Owned by the `Supervisor` instance rather than kept as
/// process-global static state, so color assignment is deterministic only
/// for the lifetime of one `Supervisor`, and trivially testable.
#[derive(Debug, Default)]
pub struct Palette {
    assigned: HashMap<String, AnsiColors>,
    next: usize,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&mut self, package_name: &str) -> AnsiColors {
        if let Some(color) = self.assigned.get(package_name) {
            return *color;
        }
        let color = ROTATION[self.next % ROTATION.len()];
        self.next += 1;
        self.assigned.insert(package_name.to_string(), color);
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_always_gets_same_color() {
        let mut palette = Palette::new();
        let first = palette.color_for("core");
        let second = palette.color_for("core");
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_names_cycle_through_rotation() {
        let mut palette = Palette::new();
        let colors: Vec<_> = (0..ROTATION.len() + 1)
            .map(|i| palette.color_for(&format!("pkg-{i}")))
            .collect();
        assert_eq!(colors[0], colors[ROTATION.len()]);
    }
}
