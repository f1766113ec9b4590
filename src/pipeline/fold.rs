//! Fold extracted points into the heading list sent to stage 2.

use crate::types::RevisionPoint;

/// One `## <title>` heading per point, in order, separated by a blank line.
///
/// Titles are flattened to a single line, so the result has exactly one
/// line-start `## ` per point. Summaries are not carried over: stage 2
/// rebuilds the content from the titles.
pub fn fold_headings(points: &[RevisionPoint]) -> String {
    points
        .iter()
        .map(|p| format!("## {}", flatten_title(&p.title)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn flatten_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(titles: &[&str]) -> Vec<RevisionPoint> {
        titles
            .iter()
            .map(|t| RevisionPoint::new(*t, "summary"))
            .collect()
    }

    #[test]
    fn single_point() {
        assert_eq!(fold_headings(&points(&["Photosynthesis"])), "## Photosynthesis");
    }

    #[test]
    fn headings_keep_order_and_blank_line_separator() {
        let folded = fold_headings(&points(&["Mitosis", "Meiosis", "Apoptosis"]));
        assert_eq!(folded, "## Mitosis\n\n## Meiosis\n\n## Apoptosis");
    }

    #[test]
    fn multiline_titles_stay_one_heading() {
        let folded = fold_headings(&points(&["Cell\ncycle ", "  DNA   replication"]));
        assert_eq!(folded, "## Cell cycle\n\n## DNA replication");
        let headings = folded.lines().filter(|l| l.starts_with("## ")).count();
        assert_eq!(headings, 2);
    }

    #[test]
    fn folding_is_deterministic() {
        let pts = points(&["A", "B"]);
        assert_eq!(fold_headings(&pts), fold_headings(&pts));
    }

    #[test]
    fn no_points_folds_to_empty() {
        assert_eq!(fold_headings(&[]), "");
    }
}
