use serde::{Deserialize, Serialize};

/// Where on the page a watermark line is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Center,
    TopCenter,
    BottomCenter,
    Left,
    Right,
}

/// One line of watermark text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    /// Counter-clockwise rotation in degrees.
    pub rotation_deg: f32,
    /// Fill opacity in `0.0..=1.0`.
    pub opacity: f32,
}

/// Lowest opacity accepted by [`WatermarkStyle::with_opacity`].
pub const MIN_OPACITY: f32 = 0.08;
/// Highest opacity accepted by [`WatermarkStyle::with_opacity`].
pub const MAX_OPACITY: f32 = 0.15;

/// Visual parameters of a stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkStyle {
    /// Helvetica size in points.
    pub font_size: f32,
    /// Distance kept from the page edge for edge-anchored lines, in points.
    pub margin: f32,
    pub placements: Vec<Placement>,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        let line = |position, rotation_deg| Placement {
            position,
            rotation_deg,
            opacity: 0.1,
        };
        Self {
            font_size: 20.0,
            margin: 30.0,
            placements: vec![
                line(Position::Center, 45.0),
                line(Position::TopCenter, 0.0),
                line(Position::BottomCenter, 0.0),
                line(Position::Left, 90.0),
                line(Position::Right, -90.0),
            ],
        }
    }
}

impl WatermarkStyle {
    /// Set the opacity of every placement, clamped to the legible range.
    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        let opacity = opacity.clamp(MIN_OPACITY, MAX_OPACITY);
        for p in &mut self.placements {
            p.opacity = opacity;
        }
        self
    }

    #[must_use]
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_five_lines() {
        let style = WatermarkStyle::default();
        let positions: Vec<Position> = style.placements.iter().map(|p| p.position).collect();
        assert_eq!(
            positions,
            vec![
                Position::Center,
                Position::TopCenter,
                Position::BottomCenter,
                Position::Left,
                Position::Right,
            ]
        );
        assert!((style.font_size - 20.0).abs() < f32::EPSILON);
        assert!(
            style
                .placements
                .iter()
                .all(|p| (MIN_OPACITY..=MAX_OPACITY).contains(&p.opacity))
        );
    }

    #[test]
    fn opacity_is_clamped() {
        let style = WatermarkStyle::default().with_opacity(0.9);
        assert!(
            style
                .placements
                .iter()
                .all(|p| (p.opacity - MAX_OPACITY).abs() < f32::EPSILON)
        );
        let style = WatermarkStyle::default().with_opacity(0.0);
        assert!((style.placements[0].opacity - MIN_OPACITY).abs() < f32::EPSILON);
    }
}
