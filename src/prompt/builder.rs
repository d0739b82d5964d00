use super::types::{BoxRegion, Label, Point, Prompt};
use crate::error::{Error, Result};

/// Per-label point limit enforced by the selection UI.
pub const MAX_POINTS_PER_LABEL: usize = 5;

/// Assembles model-space points and box into a [`Prompt`].
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    max_points_per_label: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_points_per_label: MAX_POINTS_PER_LABEL,
        }
    }
}

impl PromptBuilder {
    pub fn new(max_points_per_label: usize) -> Self {
        Self {
            max_points_per_label,
        }
    }

    /// Foreground points come first (label 1), then background points
    /// (label 0). Downstream models may break ties on that order, so it
    /// never changes.
    pub fn build(
        &self,
        foreground: &[Point],
        background: &[Point],
        bbox: Option<BoxRegion>,
    ) -> Result<Prompt> {
        if foreground.is_empty() && background.is_empty() && bbox.is_none() {
            return Err(Error::validation(
                "prompt needs at least one point or a box",
            ));
        }
        self.check_limit("foreground", foreground)?;
        self.check_limit("background", background)?;

        let points = foreground
            .iter()
            .map(|&p| (p, Label::Foreground))
            .chain(background.iter().map(|&p| (p, Label::Background)))
            .collect();

        Ok(Prompt { points, bbox })
    }

    fn check_limit(&self, kind: &str, points: &[Point]) -> Result<()> {
        if points.len() > self.max_points_per_label {
            return Err(Error::validation(format!(
                "{} {kind} points supplied, at most {} allowed",
                points.len(),
                self.max_points_per_label
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptMode;

    #[test]
    fn foreground_points_precede_background_points() {
        let fg = [Point::new(1, 1), Point::new(2, 2)];
        let bg = [Point::new(9, 9)];
        let prompt = PromptBuilder::default().build(&fg, &bg, None).unwrap();

        let labels: Vec<Label> = prompt.points().iter().map(|(_, l)| *l).collect();
        assert_eq!(
            labels,
            vec![Label::Foreground, Label::Foreground, Label::Background]
        );
        assert_eq!(prompt.points()[2].0, Point::new(9, 9));
        assert_eq!(prompt.mode(), PromptMode::PointOnly);
    }

    #[test]
    fn empty_prompt_is_rejected() {
        let err = PromptBuilder::default().build(&[], &[], None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn box_alone_is_a_valid_prompt() {
        let bbox = BoxRegion::from_corners(Point::new(5, 5), Point::new(1, 1));
        let prompt = PromptBuilder::default().build(&[], &[], Some(bbox)).unwrap();
        assert_eq!(prompt.mode(), PromptMode::BoxOnly);
        assert_eq!(prompt.bbox().unwrap().to_array(), [1, 1, 5, 5]);

        let prompt = PromptBuilder::default()
            .build(&[], &[Point::new(3, 3)], Some(bbox))
            .unwrap();
        assert_eq!(prompt.mode(), PromptMode::BoxAndPoint);
    }

    #[test]
    fn point_limit_is_enforced_per_label() {
        let many = vec![Point::new(0, 0); MAX_POINTS_PER_LABEL + 1];
        let builder = PromptBuilder::default();
        assert!(builder.build(&many, &[], None).is_err());
        assert!(builder.build(&[], &many, None).is_err());
        assert!(builder
            .build(&many[..MAX_POINTS_PER_LABEL], &many[..MAX_POINTS_PER_LABEL], None)
            .is_ok());
    }
}
